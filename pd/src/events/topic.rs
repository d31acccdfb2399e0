//! Topic catalog
//!
//! The bus only knows these nine topics. There is no dynamic topic creation:
//! publishing or subscribing to any other name fails with `UnknownTopic`.

use serde::{Deserialize, Serialize};

/// A channel on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "party.input.added")]
    InputAdded,
    #[serde(rename = "party.input.removed")]
    InputRemoved,
    #[serde(rename = "party.agent.should_execute")]
    AgentShouldExecute,
    #[serde(rename = "party.agent.started")]
    AgentStarted,
    #[serde(rename = "party.agent.completed")]
    AgentCompleted,
    #[serde(rename = "party.agent.failed")]
    AgentFailed,
    #[serde(rename = "party.agent.data_removed")]
    AgentDataRemoved,
    #[serde(rename = "party.budget.updated")]
    BudgetUpdated,
    #[serde(rename = "party.plan.updated")]
    PlanUpdated,
}

impl Topic {
    /// Every topic in the catalog, in lifecycle order
    pub const ALL: [Topic; 9] = [
        Topic::InputAdded,
        Topic::InputRemoved,
        Topic::AgentShouldExecute,
        Topic::AgentStarted,
        Topic::AgentCompleted,
        Topic::AgentFailed,
        Topic::AgentDataRemoved,
        Topic::BudgetUpdated,
        Topic::PlanUpdated,
    ];

    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputAdded => "party.input.added",
            Self::InputRemoved => "party.input.removed",
            Self::AgentShouldExecute => "party.agent.should_execute",
            Self::AgentStarted => "party.agent.started",
            Self::AgentCompleted => "party.agent.completed",
            Self::AgentFailed => "party.agent.failed",
            Self::AgentDataRemoved => "party.agent.data_removed",
            Self::BudgetUpdated => "party.budget.updated",
            Self::PlanUpdated => "party.plan.updated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown topic: {}", s))
    }
}
