//! Theme agent - picks the party theme and its look

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{estimate, latest_mention};
use crate::agents::error::AgentError;
use crate::agents::traits::{AgentContext, AgentOutput, DynamicAgent};

pub const NAME: &str = "theme_agent";

const THEMES: &[(&str, &[&str], &[&str])] = &[
    ("dinosaur", &["green", "brown", "orange"], &["volcano centerpiece", "fossil dig table"]),
    ("jungle", &["green", "yellow", "brown"], &["palm leaves", "animal balloons"]),
    ("princess", &["pink", "gold", "white"], &["castle backdrop", "tiaras"]),
    ("superhero", &["red", "blue", "yellow"], &["city skyline banner", "capes"]),
    ("pirate", &["black", "red", "gold"], &["treasure chest", "ship flags"]),
    ("unicorn", &["pastel pink", "lavender", "mint"], &["rainbow garland", "unicorn horns"]),
    ("space", &["navy", "silver", "purple"], &["planet mobiles", "glow stars"]),
    ("mermaid", &["teal", "purple", "silver"], &["seashell tableware", "bubble machine"]),
    ("safari", &["khaki", "green", "orange"], &["binocular favors", "animal prints"]),
];

pub struct ThemeAgent;

#[async_trait]
impl DynamicAgent for ThemeAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let text = ctx.text();
        let names: Vec<&str> = THEMES.iter().map(|(name, _, _)| *name).collect();
        let picked = latest_mention(&text, &names);
        debug!(session_id = %ctx.session_id(), ?picked, "ThemeAgent::execute");

        let Some((theme, colors, decorations)) = picked.and_then(|p| THEMES.iter().find(|(name, _, _)| *name == p))
        else {
            return Ok(AgentOutput::new(
                json!({
                    "theme": "custom",
                    "colors": [],
                    "decorations": [],
                    "estimate": estimate(50.0, 150.0),
                    "recommendations": ["Pick a named theme to get matching decorations"],
                }),
                0.4,
            ));
        };

        Ok(AgentOutput::new(
            json!({
                "theme": theme,
                "colors": colors,
                "decorations": decorations,
                "estimate": estimate(80.0, 250.0),
                "recommendations": [format!("Decorate in {} with {}", colors.join(", "), decorations.join(" and "))],
            }),
            0.9,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builtin::tests_support::context;

    #[tokio::test]
    async fn test_latest_theme_wins() {
        let ctx = context(&["jungle theme please", "no wait, make it a pirate party"], &[]);
        let output = ThemeAgent.execute(&ctx).await.unwrap();
        assert_eq!(output.result["theme"], "pirate");
        assert_eq!(output.confidence, 0.9);
        assert_eq!(output.result["estimate"]["min"], 80.0);
    }

    #[tokio::test]
    async fn test_unknown_theme_is_custom() {
        let ctx = context(&["something themed and fun"], &[]);
        let output = ThemeAgent.execute(&ctx).await.unwrap();
        assert_eq!(output.result["theme"], "custom");
        assert!(output.confidence < 0.5);
    }
}
