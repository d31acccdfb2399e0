//! Venue agent - indoor/outdoor setting and headcount

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{DEFAULT_GUEST_COUNT, estimate, guest_count, latest_mention, str_field};
use crate::agents::error::AgentError;
use crate::agents::traits::{AgentContext, AgentOutput, DynamicAgent};

pub const NAME: &str = "venue_agent";

const OUTDOOR: &[&str] = &["park", "backyard", "garden", "beach", "outdoor", "outdoors"];
const INDOOR: &[&str] = &["hall", "restaurant", "indoor", "indoors", "home", "gym", "studio"];

pub struct VenueAgent;

#[async_trait]
impl DynamicAgent for VenueAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let text = ctx.text();
        let guests = guest_count(&text);
        let place = latest_mention(&text, &[OUTDOOR, INDOOR].concat());
        let setting = match place {
            Some(p) if OUTDOOR.contains(&p) => "outdoor",
            Some(_) => "indoor",
            None => "undecided",
        };
        debug!(session_id = %ctx.session_id(), ?guests, setting, "VenueAgent::execute");

        let headcount = guests.unwrap_or(DEFAULT_GUEST_COUNT) as f64;
        let (per_head_min, per_head_max) = match setting {
            "outdoor" => (2.0, 6.0),
            "indoor" => (8.0, 20.0),
            _ => (5.0, 15.0),
        };

        let mut recommendations = Vec::new();
        if setting == "outdoor" {
            recommendations.push("Book a rain backup or rent a canopy".to_string());
        }
        if guests.is_none() {
            recommendations.push("Confirm the guest count to size the venue".to_string());
        }
        if let Some(theme) = str_field(ctx.upstream("theme_agent"), "theme").filter(|t| *t != "custom") {
            recommendations.push(format!("Leave wall space for the {} decorations", theme));
        }

        let confidence = match (place.is_some(), guests.is_some()) {
            (true, true) => 0.9,
            (true, false) | (false, true) => 0.7,
            (false, false) => 0.4,
        };

        Ok(AgentOutput::new(
            json!({
                "setting": setting,
                "suggested_venue": place.unwrap_or("community hall"),
                "guest_count": headcount as u64,
                "estimate": estimate(headcount * per_head_min + 50.0, headcount * per_head_max + 150.0),
                "recommendations": recommendations,
            }),
            confidence,
        ))
    }
}
