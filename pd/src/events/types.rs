//! Event envelope and payload types
//!
//! Each topic maps to exactly one `EventPayload` variant. The envelope's
//! `topic` is derived from the payload, so a well-formed event can never
//! disagree with its own topic. `Event::from_json` is the one place events
//! are decoded from the wire, and it runs the same validation as publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::topic::Topic;
use crate::domain::{Budget, FinalPlan, SourceType};

/// Why a should-execute event was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    /// The agent has never produced a result in this session
    Start,
    /// The agent's supporting inputs changed
    Rerun,
    /// An upstream agent reran; refresh against its new output
    Recalculate,
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Rerun => write!(f, "rerun"),
            Self::Recalculate => write!(f, "recalculate"),
        }
    }
}

/// Failure classification carried by `agent.failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    Validation,
    ExternalApi,
    Internal,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Validation => write!(f, "validation"),
            Self::ExternalApi => write!(f, "external_api"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Why an input was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    #[default]
    UserAction,
    Duplicate,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAdded {
    pub input_id: String,
    pub content: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub added_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRemoved {
    pub input_id: String,
    pub removed_by: String,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShouldExecute {
    pub agent_name: String,
    pub execution_type: ExecutionType,
    #[serde(default)]
    pub input_ids: Vec<String>,
    /// 1 runs first, 5 runs last
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStarted {
    pub agent_name: String,
    pub execution_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCompleted {
    pub agent_name: String,
    pub execution_id: String,
    pub result: Value,
    pub confidence: f64,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailed {
    pub agent_name: String,
    pub execution_id: String,
    pub error: String,
    pub error_type: ErrorType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRemoved {
    pub agent_name: String,
    pub reason: String,
    #[serde(default)]
    pub removed_input_id: Option<String>,
}

/// Payload union - one variant per topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    InputAdded(InputAdded),
    InputRemoved(InputRemoved),
    ShouldExecute(ShouldExecute),
    AgentStarted(AgentStarted),
    AgentCompleted(AgentCompleted),
    AgentFailed(AgentFailed),
    DataRemoved(DataRemoved),
    BudgetUpdated(Budget),
    PlanUpdated(FinalPlan),
}

impl EventPayload {
    /// The topic this payload belongs on
    pub fn topic(&self) -> Topic {
        match self {
            Self::InputAdded(_) => Topic::InputAdded,
            Self::InputRemoved(_) => Topic::InputRemoved,
            Self::ShouldExecute(_) => Topic::AgentShouldExecute,
            Self::AgentStarted(_) => Topic::AgentStarted,
            Self::AgentCompleted(_) => Topic::AgentCompleted,
            Self::AgentFailed(_) => Topic::AgentFailed,
            Self::DataRemoved(_) => Topic::AgentDataRemoved,
            Self::BudgetUpdated(_) => Topic::BudgetUpdated,
            Self::PlanUpdated(_) => Topic::PlanUpdated,
        }
    }

    /// Agent the payload is about, for agent-scoped topics
    pub fn agent_name(&self) -> Option<&str> {
        match self {
            Self::ShouldExecute(p) => Some(&p.agent_name),
            Self::AgentStarted(p) => Some(&p.agent_name),
            Self::AgentCompleted(p) => Some(&p.agent_name),
            Self::AgentFailed(p) => Some(&p.agent_name),
            Self::DataRemoved(p) => Some(&p.agent_name),
            Self::InputAdded(_) | Self::InputRemoved(_) | Self::BudgetUpdated(_) | Self::PlanUpdated(_) => None,
        }
    }

    /// Check value ranges the type system cannot express
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::ShouldExecute(p) if !(1..=5).contains(&p.priority) => {
                Err(format!("priority {} outside [1, 5]", p.priority))
            }
            Self::AgentCompleted(p) if !(0.0..=1.0).contains(&p.confidence) => {
                Err(format!("confidence {} outside [0, 1]", p.confidence))
            }
            Self::PlanUpdated(p) if p.completion_percent > 100 => {
                Err(format!("completion_percent {} outside [0, 100]", p.completion_percent))
            }
            Self::BudgetUpdated(b) if b.total_budget.min > b.total_budget.max => Err(format!(
                "budget min {} exceeds max {}",
                b.total_budget.min, b.total_budget.max
            )),
            Self::ShouldExecute(p) if p.agent_name.is_empty() => Err("empty agent_name".to_string()),
            Self::InputAdded(p) if p.input_id.is_empty() => Err("empty input_id".to_string()),
            Self::InputRemoved(p) if p.input_id.is_empty() => Err("empty input_id".to_string()),
            _ => Ok(()),
        }
    }
}

/// Immutable message on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub session_id: String,
    pub topic: Topic,
    pub timestamp: DateTime<Utc>,
    /// Shared by every event in one causal chain
    pub correlation_id: String,
    pub payload: EventPayload,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Event {
    /// Start a new causal chain
    pub fn new(session_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            session_id: session_id.into(),
            topic: payload.topic(),
            timestamp: Utc::now(),
            correlation_id: uuid::Uuid::now_v7().to_string(),
            payload,
            metadata: Map::new(),
        }
    }

    /// Derive an event that continues `parent`'s chain
    pub fn caused_by(parent: &Event, payload: EventPayload) -> Self {
        Self::new(parent.session_id.clone(), payload).with_correlation_id(parent.correlation_id.clone())
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_metadata_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validate envelope/payload agreement and payload ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.topic != self.payload.topic() {
            return Err(format!(
                "topic {} does not match payload for {}",
                self.topic,
                self.payload.topic()
            ));
        }
        if self.session_id.is_empty() {
            return Err("empty session_id".to_string());
        }
        self.payload.validate()
    }

    /// Decode and validate an event from JSON
    pub fn from_json(json: &str) -> Result<Self, super::BusError> {
        let event: Event =
            serde_json::from_str(json).map_err(|e| super::BusError::InvalidPayload(e.to_string()))?;
        event.validate().map_err(super::BusError::InvalidPayload)?;
        Ok(event)
    }

    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        self.topic.as_str()
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.payload.agent_name()
    }
}
