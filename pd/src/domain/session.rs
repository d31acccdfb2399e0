//! SessionState - the per-party aggregate root
//!
//! `budget` and `final_plan` are caches of a pure function over `inputs` and
//! `agent_results`; they are never a source of truth.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::input::Input;
use super::result::{AgentResult, AgentStatus};

/// Session lifecycle status (derived on every mutation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for facts or for agents to be triggered
    #[default]
    Collecting,
    /// At least one agent is executing
    Planning,
    /// The final plan reports full completion
    Ready,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collecting => write!(f, "collecting"),
            Self::Planning => write!(f, "planning"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Inclusive money range
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl BudgetRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn add(&self, other: &BudgetRange) -> BudgetRange {
        BudgetRange::new(self.min + other.min, self.max + other.max)
    }
}

/// Aggregated budget estimate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Budget {
    pub total_budget: BudgetRange,
    /// Per-agent contribution
    pub breakdown: BTreeMap<String, BudgetRange>,
    /// Agents whose results fed the estimate (sorted)
    pub based_on_agents: Vec<String>,
}

/// Aggregated plan view
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinalPlan {
    /// 0..=100
    pub completion_percent: u8,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub active_agents: Vec<String>,
    pub missing_agents: Vec<String>,
}

/// Full state of one planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,

    pub status: SessionStatus,

    pub inputs: Vec<Input>,

    /// Latest result per agent name
    pub agent_results: BTreeMap<String, AgentResult>,

    #[serde(default)]
    pub budget: Option<Budget>,

    #[serde(default)]
    pub final_plan: Option<FinalPlan>,

    /// Bumped on every successful mutation
    pub version: u64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Create an empty session
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Collecting,
            inputs: Vec::new(),
            agent_results: BTreeMap::new(),
            budget: None,
            final_plan: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful mutation
    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = if self.agent_results.values().any(|r| r.status.is_active()) {
            SessionStatus::Planning
        } else if self.final_plan.as_ref().is_some_and(|p| p.completion_percent >= 100) {
            SessionStatus::Ready
        } else {
            SessionStatus::Collecting
        };
    }

    pub fn input(&self, input_id: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.input_id == input_id)
    }

    pub fn agent_status(&self, agent_name: &str) -> Option<AgentStatus> {
        self.agent_results.get(agent_name).map(|r| r.status)
    }

    /// Agents with an execution in flight (sorted)
    pub fn running_agents(&self) -> Vec<String> {
        self.agent_results
            .values()
            .filter(|r| r.status.is_active())
            .map(|r| r.agent_name.clone())
            .collect()
    }

    /// Agents holding a completed result (sorted)
    pub fn completed_agents(&self) -> Vec<String> {
        self.agent_results
            .values()
            .filter(|r| r.is_completed())
            .map(|r| r.agent_name.clone())
            .collect()
    }

    /// Completed result for an agent, if any
    pub fn completed_result(&self, agent_name: &str) -> Option<&AgentResult> {
        self.agent_results.get(agent_name).filter(|r| r.is_completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_is_empty() {
        let state = SessionState::new("party-1");
        assert_eq!(state.version, 0);
        assert_eq!(state.status, SessionStatus::Collecting);
        assert!(state.inputs.is_empty());
        assert!(state.agent_results.is_empty());
    }

    #[test]
    fn test_touch_bumps_version_and_status() {
        let mut state = SessionState::new("party-1");
        state
            .agent_results
            .insert("theme_agent".to_string(), AgentResult::running("theme_agent"));
        state.touch();

        assert_eq!(state.version, 1);
        assert_eq!(state.status, SessionStatus::Planning);
        assert_eq!(state.running_agents(), vec!["theme_agent".to_string()]);

        state
            .agent_results
            .get_mut("theme_agent")
            .unwrap()
            .complete(json!({}), 0.9);
        state.final_plan = Some(FinalPlan {
            completion_percent: 100,
            ..Default::default()
        });
        state.touch();

        assert_eq!(state.version, 2);
        assert_eq!(state.status, SessionStatus::Ready);
        assert_eq!(state.completed_agents(), vec!["theme_agent".to_string()]);
    }

    #[test]
    fn test_budget_range_add() {
        let total = BudgetRange::new(10.0, 20.0).add(&BudgetRange::new(5.0, 7.5));
        assert_eq!(total, BudgetRange::new(15.0, 27.5));
    }
}
