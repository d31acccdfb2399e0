//! Vendor agent - entertainment and rentals

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{estimate, mentioned, str_field};
use crate::agents::error::AgentError;
use crate::agents::traits::{AgentContext, AgentOutput, DynamicAgent};

pub const NAME: &str = "vendor_agent";

/// Service keyword, display name, price range
const SERVICES: &[(&str, &str, f64, f64)] = &[
    ("magician", "magician", 150.0, 400.0),
    ("clown", "clown", 120.0, 300.0),
    ("dj", "DJ", 200.0, 600.0),
    ("music", "DJ", 200.0, 600.0),
    ("balloons", "balloon artist", 80.0, 250.0),
    ("photographer", "photographer", 200.0, 500.0),
    ("bounce", "bounce house rental", 150.0, 350.0),
    ("rental", "party rentals", 100.0, 300.0),
    ("rentals", "party rentals", 100.0, 300.0),
];

pub struct VendorAgent;

#[async_trait]
impl DynamicAgent for VendorAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let text = ctx.text();
        let keywords: Vec<&str> = SERVICES.iter().map(|(k, _, _, _)| *k).collect();
        let hits = mentioned(&text, &keywords);

        let mut services: Vec<(&str, f64, f64)> = Vec::new();
        for hit in hits {
            if let Some((_, display, min, max)) = SERVICES.iter().find(|(k, _, _, _)| *k == hit)
                && !services.iter().any(|(d, _, _)| d == display)
            {
                services.push((*display, *min, *max));
            }
        }
        debug!(session_id = %ctx.session_id(), services = services.len(), "VendorAgent::execute");

        let mut recommendations: Vec<String> = services
            .iter()
            .map(|(name, _, _)| format!("Book the {} at least three weeks ahead", name))
            .collect();
        if let Some(theme) = str_field(ctx.upstream("theme_agent"), "theme").filter(|t| *t != "custom") {
            recommendations.push(format!("Ask vendors for {}-themed costumes or props", theme));
        }

        let (min, max) = services
            .iter()
            .fold((0.0, 0.0), |(lo, hi), (_, min, max)| (lo + min, hi + max));

        Ok(AgentOutput::new(
            json!({
                "services": services.iter().map(|(name, _, _)| *name).collect::<Vec<_>>(),
                "estimate": estimate(min, max),
                "recommendations": recommendations,
            }),
            if services.is_empty() { 0.5 } else { 0.8 },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builtin::tests_support::context;

    #[tokio::test]
    async fn test_services_are_deduplicated() {
        let ctx = context(&["a dj for music and some balloons"], &[]);
        let output = VendorAgent.execute(&ctx).await.unwrap();
        assert_eq!(output.result["services"], json!(["DJ", "balloon artist"]));
        assert_eq!(output.result["estimate"], json!({"min": 280.0, "max": 850.0}));
    }

    #[tokio::test]
    async fn test_theme_props_recommendation() {
        let ctx = context(&["hire a magician"], &[("theme_agent", json!({"theme": "pirate"}))]);
        let output = VendorAgent.execute(&ctx).await.unwrap();
        let recs = output.result["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs[1].as_str().unwrap().contains("pirate"));
    }
}
