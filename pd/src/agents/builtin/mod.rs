//! Built-in planning agents
//!
//! Deterministic heuristics over the session's inputs. No network; every
//! dynamic result carries an `estimate {min, max}` and a `recommendations`
//! list that the reactive agents aggregate.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Value, json};

mod budget;
mod cake;
mod catering;
mod final_plan;
mod theme;
mod vendor;
mod venue;

pub use budget::BudgetAgent;
pub use cake::CakeAgent;
pub use catering::CateringAgent;
pub use final_plan::FinalPlanAgent;
pub use theme::ThemeAgent;
pub use vendor::VendorAgent;
pub use venue::VenueAgent;

use super::traits::{DynamicAgent, ReactiveAgent};

/// Guest count used when nobody mentioned one
pub const DEFAULT_GUEST_COUNT: u64 = 15;

static GUEST_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4})\s*(?:guests|kids|children|people|friends|adults|attendees)\b")
        .expect("invalid guest-count pattern")
});

/// Last guest count mentioned in the text
pub(crate) fn guest_count(text: &str) -> Option<u64> {
    GUEST_COUNT
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        .last()
}

/// Options mentioned as whole words, in option order
pub(crate) fn mentioned<'a>(text: &str, options: &[&'a str]) -> Vec<&'a str> {
    options
        .iter()
        .copied()
        .filter(|option| {
            text.split(|c: char| !c.is_alphanumeric() && c != '-')
                .any(|word| word == *option)
        })
        .collect()
}

/// Option whose last mention comes latest in the text
pub(crate) fn latest_mention<'a>(text: &str, options: &[&'a str]) -> Option<&'a str> {
    let words: Vec<&str> = text.split(|c: char| !c.is_alphanumeric() && c != '-').collect();
    words.iter().rev().find_map(|word| options.iter().copied().find(|o| o == word))
}

pub(crate) fn estimate(min: f64, max: f64) -> Value {
    json!({ "min": min.round(), "max": max.round() })
}

/// String field of an upstream result
pub(crate) fn str_field<'a>(result: Option<&'a Value>, field: &str) -> Option<&'a str> {
    result.and_then(|r| r.get(field)).and_then(Value::as_str)
}

/// The five classifier-driven agents
pub fn dynamic_agents() -> Vec<Arc<dyn DynamicAgent>> {
    vec![
        Arc::new(ThemeAgent),
        Arc::new(VenueAgent),
        Arc::new(CakeAgent),
        Arc::new(CateringAgent),
        Arc::new(VendorAgent),
    ]
}

/// Budget and final plan, tracking the given dynamic agents
pub fn reactive_agents(expected_agents: Vec<String>) -> Vec<Arc<dyn ReactiveAgent>> {
    vec![Arc::new(BudgetAgent), Arc::new(FinalPlanAgent::new(expected_agents))]
}

#[cfg(test)]
pub(crate) mod tests_support {
    use serde_json::Value;

    use crate::agents::traits::AgentContext;
    use crate::domain::{AgentResult, Input, SessionState};
    use crate::events::{ExecutionType, ShouldExecute};

    /// Context whose trigger names every input, with completed upstream results
    pub(crate) fn context(texts: &[&str], upstream: &[(&str, Value)]) -> AgentContext {
        let mut session = SessionState::new("party-test");
        session.inputs = texts.iter().map(|t| Input::text(*t)).collect();
        for (agent, result) in upstream {
            let mut slot = AgentResult::running(*agent);
            slot.complete(result.clone(), 0.9);
            session.agent_results.insert(agent.to_string(), slot);
        }
        AgentContext {
            inputs: session.inputs.clone(),
            trigger: ShouldExecute {
                agent_name: "test_agent".to_string(),
                execution_type: ExecutionType::Start,
                input_ids: session.inputs.iter().map(|i| i.input_id.clone()).collect(),
                priority: 1,
            },
            session,
            execution_id: "exec-test".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_count_takes_last_mention() {
        assert_eq!(guest_count("about 20 kids, maybe 25 guests"), Some(25));
        assert_eq!(guest_count("a party for 12 people"), Some(12));
        assert_eq!(guest_count("no numbers here"), None);
    }

    #[test]
    fn test_mentioned_is_whole_word() {
        let text = "chocolate cake, not chocolatey";
        assert_eq!(mentioned(text, &["chocolate", "vanilla"]), vec!["chocolate"]);
        assert!(mentioned("gluten-free", &["gluten"]).is_empty());
        assert_eq!(mentioned("gluten-free please", &["gluten-free"]), vec!["gluten-free"]);
    }

    #[test]
    fn test_latest_mention_wins() {
        let text = "jungle theme\nactually pirate";
        assert_eq!(latest_mention(text, &["jungle", "pirate"]), Some("pirate"));
        assert_eq!(latest_mention("nothing", &["jungle"]), None);
    }
}
