//! Cake agent - flavor, design and dietary constraints

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{DEFAULT_GUEST_COUNT, estimate, latest_mention, mentioned, str_field};
use crate::agents::error::AgentError;
use crate::agents::traits::{AgentContext, AgentOutput, DynamicAgent};

pub const NAME: &str = "cake_agent";

const FLAVORS: &[&str] = &["chocolate", "vanilla", "strawberry", "lemon", "carrot", "funfetti"];
const DIETARY: &[&str] = &["gluten-free", "vegan", "nut-free", "dairy-free"];

pub struct CakeAgent;

#[async_trait]
impl DynamicAgent for CakeAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let text = ctx.text();
        let flavor = latest_mention(&text, FLAVORS);
        let dietary = mentioned(&text, DIETARY);
        let theme = str_field(ctx.upstream("theme_agent"), "theme").filter(|t| *t != "custom");
        let servings = ctx
            .upstream("venue_agent")
            .and_then(|v| v.get("guest_count"))
            .and_then(|g| g.as_u64())
            .unwrap_or(DEFAULT_GUEST_COUNT);
        debug!(session_id = %ctx.session_id(), ?flavor, ?theme, servings, "CakeAgent::execute");

        let design = match theme {
            Some(theme) => format!("{}-themed layer cake", theme),
            None => "classic layer cake".to_string(),
        };

        let mut recommendations = vec![format!("Order a {} for {} servings", design, servings)];
        if !dietary.is_empty() {
            recommendations.push(format!("Ask the bakery for a {} option", dietary.join(", ")));
        }

        // dietary restrictions narrow the bakery list and raise the price
        let surcharge = if dietary.is_empty() { 1.0 } else { 1.3 };
        let confidence = if flavor.is_some() { 0.85 } else { 0.6 };

        Ok(AgentOutput::new(
            json!({
                "flavor": flavor.unwrap_or("vanilla"),
                "design": design,
                "servings": servings,
                "dietary": dietary,
                "estimate": estimate(servings as f64 * 3.0 * surcharge, servings as f64 * 6.0 * surcharge),
                "recommendations": recommendations,
            }),
            confidence,
        ))
    }
}
