//! Catering agent - menu style and per-head food estimate

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{DEFAULT_GUEST_COUNT, estimate, guest_count, mentioned, str_field};
use crate::agents::error::AgentError;
use crate::agents::traits::{AgentContext, AgentOutput, DynamicAgent};

pub const NAME: &str = "catering_agent";

const STYLES: &[&str] = &["buffet", "pizza", "bbq", "picnic", "lunch", "dinner", "snacks", "brunch"];
const DIETARY: &[&str] = &["vegetarian", "vegan", "allergy", "allergies", "halal", "kosher", "gluten-free"];

pub struct CateringAgent;

#[async_trait]
impl DynamicAgent for CateringAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let text = ctx.text();
        let styles = mentioned(&text, STYLES);
        let dietary = mentioned(&text, DIETARY);
        let venue = ctx.upstream("venue_agent");
        let guests = venue
            .and_then(|v| v.get("guest_count"))
            .and_then(|g| g.as_u64())
            .or_else(|| guest_count(&text))
            .unwrap_or(DEFAULT_GUEST_COUNT);
        debug!(session_id = %ctx.session_id(), ?styles, guests, "CateringAgent::execute");

        let style = styles.first().copied().unwrap_or("buffet");
        let (per_head_min, per_head_max) = match style {
            "pizza" | "snacks" | "picnic" => (6.0, 12.0),
            "dinner" => (18.0, 35.0),
            _ => (10.0, 20.0),
        };

        let mut recommendations = vec![format!("Plan a {} menu for {} guests", style, guests)];
        if !dietary.is_empty() {
            recommendations.push(format!("Label dishes for {}", dietary.join(", ")));
        }
        if str_field(venue, "setting") == Some("outdoor") {
            recommendations.push("Bring coolers for drinks and perishables".to_string());
        }

        Ok(AgentOutput::new(
            json!({
                "style": style,
                "guest_count": guests,
                "dietary": dietary,
                "estimate": estimate(guests as f64 * per_head_min, guests as f64 * per_head_max),
                "recommendations": recommendations,
            }),
            if styles.is_empty() { 0.6 } else { 0.8 },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::builtin::tests_support::context;

    #[tokio::test]
    async fn test_uses_venue_headcount_and_setting() {
        let ctx = context(
            &["pizza for everyone, two vegetarian kids"],
            &[("venue_agent", json!({"guest_count": 10, "setting": "outdoor"}))],
        );
        let output = CateringAgent.execute(&ctx).await.unwrap();
        assert_eq!(output.result["style"], "pizza");
        assert_eq!(output.result["guest_count"], 10);
        assert_eq!(output.result["estimate"], json!({"min": 60.0, "max": 120.0}));
        assert_eq!(output.result["recommendations"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_text_headcount() {
        let ctx = context(&["lunch buffet for 8 adults"], &[]);
        let output = CateringAgent.execute(&ctx).await.unwrap();
        assert_eq!(output.result["guest_count"], 8);
    }
}
