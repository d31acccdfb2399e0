//! InputAnalyzer - turns input events into agent triggers
//!
//! Listens to `party.input.added` and `party.input.removed`, plans against a
//! fresh session snapshot, clears stale results, then publishes the plan's
//! should-execute events in priority order.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use super::keywords::category_hints;
use super::plan::ExecutionPlan;
use crate::agents::{AgentHandle, AgentKind};
use crate::events::{
    DataRemoved, Event, EventPayload, InputAdded, InputRemoved, RecvOutcome, Subscription, Topic,
};
use crate::runtime::Runtime;

pub const ANALYZER_NAME: &str = "input_analyzer";

/// Reason carried on data_removed events
const STALE_REASON: &str = "supporting inputs removed";

pub struct InputAnalyzer {
    runtime: Arc<Runtime>,
    handle: AgentHandle,
}

impl InputAnalyzer {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            handle: AgentHandle::new(ANALYZER_NAME, AgentKind::Analyzer),
        }
    }

    pub fn topics() -> Vec<Topic> {
        vec![Topic::InputAdded, Topic::InputRemoved]
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub async fn run(self, mut sub: Subscription) {
        info!("InputAnalyzer started");
        let poll = self.runtime.config.agents.poll_interval();

        while self.handle.is_running() {
            match sub.recv_timeout(poll).await {
                RecvOutcome::Event(event) => {
                    if let Err(e) = self.handle_event(&event).await {
                        warn!(session_id = %event.session_id, event_type = event.event_type(), error = %e, "InputAnalyzer failed to handle event");
                    }
                }
                RecvOutcome::Idle => {}
                RecvOutcome::Closed => break,
            }
        }

        info!("InputAnalyzer stopped");
    }

    /// Plan and apply for one input event
    pub async fn handle_event(&self, event: &Event) -> Result<ExecutionPlan> {
        debug!(event_type = event.event_type(), session_id = %event.session_id, "handle_event: called");
        let plan = match &event.payload {
            EventPayload::InputAdded(added) => self.plan_added(event, added).await,
            EventPayload::InputRemoved(removed) => self.plan_removed(event, removed).await,
            _ => return Ok(ExecutionPlan::default()),
        };
        let Some(plan) = plan else {
            return Ok(ExecutionPlan::default());
        };

        self.apply(event, &plan).await?;
        Ok(plan)
    }

    async fn plan_added(&self, event: &Event, added: &InputAdded) -> Option<ExecutionPlan> {
        let Some(state) = self.runtime.store.get_session(&event.session_id).await else {
            debug!(session_id = %event.session_id, "plan_added: session gone");
            return None;
        };
        let Some(input) = state.input(&added.input_id).cloned() else {
            debug!(input_id = %added.input_id, "plan_added: input already removed");
            return None;
        };

        let hints = category_hints(&event.metadata);
        Some(self.runtime.planner().plan_for_added(&state, &input, &hints))
    }

    async fn plan_removed(&self, event: &Event, removed: &InputRemoved) -> Option<ExecutionPlan> {
        let Some(state) = self.runtime.store.get_session(&event.session_id).await else {
            debug!(session_id = %event.session_id, "plan_removed: session gone");
            return None;
        };
        Some(self.runtime.planner().plan_for_removed(&state, &removed.input_id))
    }

    async fn apply(&self, event: &Event, plan: &ExecutionPlan) -> Result<()> {
        let removed_input_id = match &event.payload {
            EventPayload::InputRemoved(removed) => Some(removed.input_id.clone()),
            _ => None,
        };

        for agent in &plan.data_removed {
            if !self.runtime.store.clear_agent_result(&event.session_id, agent).await? {
                continue;
            }
            info!(session_id = %event.session_id, %agent, "Cleared stale agent result");
            self.runtime
                .bus
                .publish(Event::caused_by(
                    event,
                    EventPayload::DataRemoved(DataRemoved {
                        agent_name: agent.clone(),
                        reason: STALE_REASON.to_string(),
                        removed_input_id: removed_input_id.clone(),
                    }),
                ))
                .await?;
        }

        for entry in &plan.entries {
            debug!(agent = %entry.agent_name, execution_type = %entry.execution_type, priority = entry.priority, "apply: scheduling");
            self.runtime
                .bus
                .publish(Event::caused_by(event, EventPayload::ShouldExecute(entry.to_payload())))
                .await?;
        }

        if !plan.skipped.is_empty() {
            debug!(skipped = ?plan.skipped, "apply: agents already in flight");
        }
        Ok(())
    }
}
