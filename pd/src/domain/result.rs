//! AgentResult domain type
//!
//! One slot per agent per session. The slot is overwritten on every run,
//! but `started_at` survives the running → completed/failed transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Agent execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Scheduled but not picked up
    #[default]
    Pending,
    /// Executing right now
    Running,
    /// Produced a result
    Completed,
    /// Execution raised an error
    Failed,
}

impl AgentStatus {
    /// Whether an execution is in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Latest outcome of one agent inside one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,

    pub status: AgentStatus,

    /// Inputs the latest execution was triggered with
    #[serde(default)]
    pub input_ids: Vec<String>,

    /// Agent-specific JSON result (null until completed)
    #[serde(default)]
    pub result: Value,

    /// Confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error string when status is failed
    #[serde(default)]
    pub error: Option<String>,
}

impl AgentResult {
    /// A fresh running slot
    pub fn running(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Running,
            input_ids: Vec::new(),
            result: Value::Null,
            confidence: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn with_inputs(mut self, input_ids: Vec<String>) -> Self {
        self.input_ids = input_ids;
        self
    }

    /// Whether the latest execution was fed by this input
    pub fn used_input(&self, input_id: &str) -> bool {
        self.input_ids.iter().any(|id| id == input_id)
    }

    /// Transition to completed, keeping started_at
    pub fn complete(&mut self, result: Value, confidence: f64) {
        self.status = AgentStatus::Completed;
        self.result = result;
        self.confidence = confidence.clamp(0.0, 1.0);
        self.completed_at = Some(Utc::now());
        self.error = None;
    }

    /// Transition to failed, keeping started_at
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = AgentStatus::Failed;
        self.result = Value::Null;
        self.confidence = 0.0;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_preserves_started_at() {
        let mut result = AgentResult::running("theme_agent");
        let started = result.started_at;

        result.complete(json!({"theme": "jungle"}), 0.8);

        assert_eq!(result.status, AgentStatus::Completed);
        assert_eq!(result.started_at, started);
        assert!(result.completed_at.is_some());
        assert_eq!(result.result["theme"], "jungle");
    }

    #[test]
    fn test_confidence_clamped() {
        let mut result = AgentResult::running("cake_agent");
        result.complete(json!({}), 1.7);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_fail_clears_result() {
        let mut result = AgentResult::running("venue_agent");
        result.complete(json!({"venue": "park"}), 0.5);
        result.fail("boom");

        assert_eq!(result.status, AgentStatus::Failed);
        assert_eq!(result.result, Value::Null);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&AgentStatus::Completed).unwrap(), "\"completed\"");
        assert!(AgentStatus::Running.is_active());
        assert!(!AgentStatus::Failed.is_active());
    }
}
