//! Agent loops
//!
//! Each registered agent gets one long-lived task. The loop polls its
//! subscription with `recv_timeout` so a cleared running flag is noticed
//! within one poll interval. Every error is logged and the loop keeps
//! listening.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::error::AgentError;
use super::handle::{AgentHandle, AgentKind};
use super::traits::{AgentContext, AgentOutput, DynamicAgent, ReactiveAgent};
use crate::domain::generate_id;
use crate::events::{
    AgentCompleted, AgentFailed, AgentStarted, Event, EventPayload, RecvOutcome, ShouldExecute, Subscription,
};
use crate::runtime::Runtime;
use crate::state::StateError;

/// Drives one dynamic agent
pub struct DynamicRunner {
    agent: Arc<dyn DynamicAgent>,
    runtime: Arc<Runtime>,
    handle: AgentHandle,
}

impl DynamicRunner {
    pub fn new(agent: Arc<dyn DynamicAgent>, runtime: Arc<Runtime>) -> Self {
        let handle = AgentHandle::new(agent.name(), AgentKind::Dynamic);
        Self { agent, runtime, handle }
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    /// Main loop
    ///
    /// Executions for different sessions run concurrently. A trigger for a
    /// session whose execution is still in flight is parked (latest wins)
    /// and run when that execution finishes.
    pub async fn run(self, mut sub: Subscription) {
        let name = self.agent.name().to_string();
        info!(agent = %name, "Dynamic agent started");

        let poll = self.runtime.config.agents.poll_interval();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut deferred: HashMap<String, Event> = HashMap::new();

        while self.handle.is_running() {
            tokio::select! {
                outcome = sub.recv_timeout(poll) => match outcome {
                    RecvOutcome::Event(event) => {
                        let event = *event;
                        let EventPayload::ShouldExecute(trigger) = &event.payload else {
                            continue;
                        };
                        if trigger.agent_name != name {
                            continue;
                        }
                        if in_flight.contains(&event.session_id) {
                            debug!(agent = %name, session_id = %event.session_id, "DynamicRunner: execution in flight, deferring trigger");
                            deferred.insert(event.session_id.clone(), event);
                        } else {
                            in_flight.insert(event.session_id.clone());
                            self.spawn_execution(event, done_tx.clone());
                        }
                    }
                    RecvOutcome::Idle => {}
                    RecvOutcome::Closed => {
                        debug!(agent = %name, "DynamicRunner: subscription closed");
                        break;
                    }
                },
                Some(session_id) = done_rx.recv() => {
                    in_flight.remove(&session_id);
                    if let Some(event) = deferred.remove(&session_id) {
                        debug!(agent = %name, %session_id, "DynamicRunner: running deferred trigger");
                        in_flight.insert(session_id);
                        self.spawn_execution(event, done_tx.clone());
                    }
                }
            }
        }

        info!(agent = %name, in_flight = in_flight.len(), "Dynamic agent stopped");
    }

    fn spawn_execution(&self, event: Event, done_tx: mpsc::UnboundedSender<String>) {
        let agent = self.agent.clone();
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let session_id = event.session_id.clone();
            if let Err(e) = execute_once(agent, runtime, &event).await {
                warn!(%session_id, error = %e, "DynamicRunner: execution bookkeeping failed");
            }
            let _ = done_tx.send(session_id);
        });
    }
}

/// One full start → execute → complete/fail cycle
pub async fn execute_once(agent: Arc<dyn DynamicAgent>, runtime: Arc<Runtime>, event: &Event) -> Result<()> {
    let EventPayload::ShouldExecute(trigger) = &event.payload else {
        return Ok(());
    };
    let name = trigger.agent_name.clone();
    let session_id = event.session_id.as_str();
    let execution_id = generate_id("exec");
    debug!(agent = %name, %session_id, %execution_id, execution_type = %trigger.execution_type, "execute_once: called");

    match runtime
        .store
        .set_agent_started(session_id, &name, &trigger.input_ids)
        .await
    {
        Ok(_) => {}
        Err(StateError::NotFound(_)) => {
            debug!(%session_id, "execute_once: session gone, skipping");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    runtime
        .bus
        .publish(Event::caused_by(
            event,
            EventPayload::AgentStarted(AgentStarted {
                agent_name: name.clone(),
                execution_id: execution_id.clone(),
                message: Some(format!("{} ({})", name, trigger.execution_type)),
            }),
        ))
        .await?;

    let ctx = build_context(&runtime, session_id, trigger, &execution_id).await?;
    let started = Instant::now();
    let outcome = run_bounded(agent, ctx, &runtime).await;
    let execution_time_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            match runtime
                .store
                .set_agent_result(session_id, &name, output.result.clone(), output.confidence)
                .await
            {
                Ok(_) => {}
                Err(StateError::AgentNotStarted { .. } | StateError::NotFound(_)) => {
                    debug!(agent = %name, %session_id, "execute_once: slot cleared while running, dropping result");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            info!(agent = %name, %session_id, execution_time_ms, "Agent completed");
            runtime
                .bus
                .publish(Event::caused_by(
                    event,
                    EventPayload::AgentCompleted(AgentCompleted {
                        agent_name: name,
                        execution_id,
                        result: output.result,
                        confidence: output.confidence,
                        execution_time_ms,
                    }),
                ))
                .await?;
        }
        Err(agent_error) => {
            error!(agent = %name, %session_id, error = %agent_error, "Agent execution failed");
            match runtime
                .store
                .set_agent_failed(session_id, &name, &agent_error.to_string())
                .await
            {
                Ok(_) => {}
                Err(StateError::AgentNotStarted { .. } | StateError::NotFound(_)) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
            runtime
                .bus
                .publish(Event::caused_by(
                    event,
                    EventPayload::AgentFailed(AgentFailed {
                        agent_name: name,
                        execution_id,
                        error: agent_error.to_string(),
                        error_type: agent_error.error_type(),
                    }),
                ))
                .await?;
        }
    }

    Ok(())
}

async fn build_context(
    runtime: &Runtime,
    session_id: &str,
    trigger: &ShouldExecute,
    execution_id: &str,
) -> Result<AgentContext> {
    let session = runtime.store.get_session_required(session_id).await?;
    let inputs = session
        .inputs
        .iter()
        .filter(|i| trigger.input_ids.contains(&i.input_id))
        .cloned()
        .collect();
    Ok(AgentContext {
        session,
        trigger: trigger.clone(),
        inputs,
        execution_id: execution_id.to_string(),
    })
}

/// Run `execute` on its own task, bounded by the execution timeout
///
/// A panic inside the agent surfaces as an internal error.
async fn run_bounded(agent: Arc<dyn DynamicAgent>, ctx: AgentContext, runtime: &Runtime) -> Result<AgentOutput, AgentError> {
    let timeout = runtime.config.agents.execution_timeout();
    let mut task = tokio::spawn(async move { agent.execute(&ctx).await });

    let output = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => return Err(AgentError::Internal(describe_join_error(join_error))),
        Err(_) => {
            task.abort();
            return Err(AgentError::Timeout(timeout));
        }
    };

    if !(0.0..=1.0).contains(&output.confidence) {
        return Err(AgentError::Validation(format!(
            "confidence {} outside [0, 1]",
            output.confidence
        )));
    }
    Ok(output)
}

fn describe_join_error(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let panic = join_error.into_panic();
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("agent panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("agent panicked: {}", msg)
    } else {
        "agent panicked".to_string()
    }
}

/// Drives one reactive agent
pub struct ReactiveRunner {
    agent: Arc<dyn ReactiveAgent>,
    runtime: Arc<Runtime>,
    handle: AgentHandle,
}

impl ReactiveRunner {
    pub fn new(agent: Arc<dyn ReactiveAgent>, runtime: Arc<Runtime>) -> Self {
        let handle = AgentHandle::new(agent.name(), AgentKind::Reactive);
        Self { agent, runtime, handle }
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub async fn run(self, mut sub: Subscription) {
        let name = self.agent.name().to_string();
        info!(agent = %name, topics = ?self.agent.topics(), "Reactive agent started");
        let poll = self.runtime.config.agents.poll_interval();

        while self.handle.is_running() {
            match sub.recv_timeout(poll).await {
                RecvOutcome::Event(event) => {
                    if let Err(e) = self.react(&event).await {
                        warn!(agent = %name, session_id = %event.session_id, error = %e, "Reactive agent failed to recompute");
                    }
                }
                RecvOutcome::Idle => {}
                RecvOutcome::Closed => break,
            }
        }

        info!(agent = %name, "Reactive agent stopped");
    }

    /// Re-read the whole session, recompute, cache and publish
    pub async fn react(&self, event: &Event) -> Result<()> {
        debug!(agent = %self.agent.name(), event_type = event.event_type(), session_id = %event.session_id, "react: called");
        let Some(state) = self.runtime.store.get_session(&event.session_id).await else {
            debug!(session_id = %event.session_id, "react: session gone");
            return Ok(());
        };

        let payload = self.agent.recompute(&state)?;
        self.agent.apply(&self.runtime.store, &event.session_id, &payload).await?;
        self.runtime.bus.publish(Event::caused_by(event, payload)).await?;
        Ok(())
    }
}
