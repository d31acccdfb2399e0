//! Agent contracts
//!
//! Dynamic agents do work when the classifier asks for it. Reactive agents
//! recompute a derived view from the whole session whenever a relevant
//! event arrives. Neither kind talks to another agent directly; dependent
//! agents read upstream results from the session snapshot.

use async_trait::async_trait;
use serde_json::Value;

use super::error::AgentError;
use crate::domain::{Input, SessionState};
use crate::events::{EventPayload, ShouldExecute, Topic};
use crate::state::{StateResponse, StateStore};

/// Everything one dynamic execution may look at
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Snapshot re-read from the store right before execution
    pub session: SessionState,

    /// The should-execute payload that triggered this run
    pub trigger: ShouldExecute,

    /// Inputs named by the trigger that still exist
    pub inputs: Vec<Input>,

    pub execution_id: String,
}

impl AgentContext {
    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    /// Completed result of another agent in this session
    pub fn upstream(&self, agent_name: &str) -> Option<&Value> {
        self.session.completed_result(agent_name).map(|r| &r.result)
    }

    /// Lowercased content and tags of the triggering inputs, in input order
    ///
    /// Falls back to every session input when the trigger named none (a
    /// recalculation with no direct support).
    pub fn text(&self) -> String {
        let inputs = if self.inputs.is_empty() {
            &self.session.inputs
        } else {
            &self.inputs
        };
        inputs.iter().map(Input::searchable_text).collect::<Vec<_>>().join("\n")
    }
}

/// What a successful execution produced
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub result: Value,
    /// In [0, 1]
    pub confidence: f64,
}

impl AgentOutput {
    pub fn new(result: Value, confidence: f64) -> Self {
        Self { result, confidence }
    }
}

/// Agent triggered by `agent.should_execute`
#[async_trait]
pub trait DynamicAgent: Send + Sync {
    /// Unique name, matched against `ShouldExecute::agent_name`
    fn name(&self) -> &str;

    /// Domain step; runs outside any session lock
    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError>;
}

/// Agent that maintains a derived view of the session
#[async_trait]
pub trait ReactiveAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Topics that trigger a recomputation
    fn topics(&self) -> Vec<Topic>;

    /// Pure function of the session; returns the payload to publish
    fn recompute(&self, state: &SessionState) -> Result<EventPayload, AgentError>;

    /// Cache the recomputed view in the store
    async fn apply(&self, store: &StateStore, session_id: &str, payload: &EventPayload) -> StateResponse<()>;
}
