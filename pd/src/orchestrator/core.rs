//! Orchestrator - boundary API and agent task lifecycle

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, eyre};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agents::builtin;
use crate::agents::{AgentHandle, AgentInfo, DynamicAgent, DynamicRunner, ReactiveAgent, ReactiveRunner};
use crate::analyzer::{InputAnalyzer, agent_name};
use crate::config::Config;
use crate::domain::{Input, SessionState, SourceType};
use crate::events::{BusMetrics, Event, EventPayload, InputAdded, InputRemoved, RemovalReason, Topic};
use crate::runtime::Runtime;
use crate::state::StoreMetrics;

/// Who the orchestrator attributes boundary actions to
const BOUNDARY_ACTOR: &str = "user";

/// Session view returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    pub running_agents: Vec<String>,
    pub completed_agents: Vec<String>,
}

impl From<SessionState> for SessionSnapshot {
    fn from(state: SessionState) -> Self {
        Self {
            running_agents: state.running_agents(),
            completed_agents: state.completed_agents(),
            state,
        }
    }
}

/// Whole-system status
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub started: bool,
    pub bus: BusMetrics,
    pub store: StoreMetrics,
    pub agents: Vec<AgentInfo>,
}

/// Owns the runtime and every agent task
pub struct Orchestrator {
    runtime: Arc<Runtime>,
    dynamic_agents: Vec<Arc<dyn DynamicAgent>>,
    reactive_agents: Vec<Arc<dyn ReactiveAgent>>,
    handles: Vec<AgentHandle>,
    tasks: Vec<(String, JoinHandle<()>)>,
    started: bool,
}

impl Orchestrator {
    /// Build an orchestrator with the built-in agents registered
    pub fn new(config: Config) -> Result<Self> {
        let mut orchestrator = Self::empty(config)?;
        for agent in builtin::dynamic_agents() {
            orchestrator.register_dynamic_agent(agent)?;
        }
        let expected = orchestrator.runtime.keywords.categories().map(agent_name).collect();
        for agent in builtin::reactive_agents(expected) {
            orchestrator.register_reactive_agent(agent)?;
        }
        Ok(orchestrator)
    }

    /// Build an orchestrator with no agents registered
    pub fn empty(config: Config) -> Result<Self> {
        debug!("Orchestrator::empty: called");
        Ok(Self {
            runtime: Runtime::new(config)?,
            dynamic_agents: Vec::new(),
            reactive_agents: Vec::new(),
            handles: Vec::new(),
            tasks: Vec::new(),
            started: false,
        })
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.started {
            return Err(eyre!("Cannot register {} after start", name));
        }
        let taken = self.dynamic_agents.iter().any(|a| a.name() == name)
            || self.reactive_agents.iter().any(|a| a.name() == name);
        if taken {
            return Err(eyre!("Agent {} is already registered", name));
        }
        Ok(())
    }

    /// Plug in a dynamic agent; only allowed before `start`
    pub fn register_dynamic_agent(&mut self, agent: Arc<dyn DynamicAgent>) -> Result<()> {
        debug!(agent = %agent.name(), "register_dynamic_agent: called");
        self.ensure_unique(agent.name())?;
        self.dynamic_agents.push(agent);
        Ok(())
    }

    /// Plug in a reactive agent; only allowed before `start`
    pub fn register_reactive_agent(&mut self, agent: Arc<dyn ReactiveAgent>) -> Result<()> {
        debug!(agent = %agent.name(), "register_reactive_agent: called");
        self.ensure_unique(agent.name())?;
        self.reactive_agents.push(agent);
        Ok(())
    }

    /// Subscribe every agent, then spawn their loops
    ///
    /// All subscriptions exist before any task runs, so nothing published
    /// after `start` returns can be missed.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(eyre!("Orchestrator already started"));
        }
        info!(
            dynamic = self.dynamic_agents.len(),
            reactive = self.reactive_agents.len(),
            "Starting orchestrator"
        );
        let bus = &self.runtime.bus;

        let analyzer = InputAnalyzer::new(self.runtime.clone());
        let analyzer_sub = bus.subscribe_topics(&InputAnalyzer::topics());

        let dynamic: Vec<_> = self
            .dynamic_agents
            .iter()
            .map(|agent| {
                let runner = DynamicRunner::new(agent.clone(), self.runtime.clone());
                (runner, bus.subscribe(Topic::AgentShouldExecute))
            })
            .collect();

        let reactive: Vec<_> = self
            .reactive_agents
            .iter()
            .map(|agent| {
                let runner = ReactiveRunner::new(agent.clone(), self.runtime.clone());
                (runner, bus.subscribe_topics(&agent.topics()))
            })
            .collect();

        let handle = analyzer.handle();
        self.tasks
            .push((handle.name().to_string(), tokio::spawn(analyzer.run(analyzer_sub))));
        self.handles.push(handle);

        for (runner, sub) in dynamic {
            let handle = runner.handle();
            self.tasks.push((handle.name().to_string(), tokio::spawn(runner.run(sub))));
            self.handles.push(handle);
        }
        for (runner, sub) in reactive {
            let handle = runner.handle();
            self.tasks.push((handle.name().to_string(), tokio::spawn(runner.run(sub))));
            self.handles.push(handle);
        }

        self.started = true;
        info!(tasks = self.tasks.len(), "Orchestrator started");
        Ok(())
    }

    /// Stop every agent loop, then shut the bus down
    ///
    /// Loops get `stop_timeout` to notice their cleared flag; stragglers are
    /// aborted.
    pub async fn stop(&mut self) -> Result<()> {
        debug!(task_count = self.tasks.len(), "stop: called");
        info!("Stopping orchestrator with {} agent tasks", self.tasks.len());

        for handle in &self.handles {
            handle.stop();
        }

        let timeout = self.runtime.config.agents.stop_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        for (name, mut task) in self.tasks.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                warn!(agent = %name, "Aborting agent task after stop timeout");
                task.abort();
            } else {
                debug!(agent = %name, "stop: task finished");
            }
        }

        self.runtime.bus.shutdown(self.runtime.config.bus.shutdown_grace()).await;
        self.started = false;
        info!("Orchestrator stopped");
        Ok(())
    }

    /// Create a session and announce its initial inputs
    pub async fn create_session(&self, session_id: Option<String>, initial_inputs: Vec<Input>) -> Result<String> {
        debug!(?session_id, inputs = initial_inputs.len(), "create_session: called");
        let announced = initial_inputs.clone();
        let session_id = self.runtime.store.create_session(session_id, initial_inputs).await?;

        for input in &announced {
            self.publish_added(&session_id, input).await?;
        }
        Ok(session_id)
    }

    /// Add a fact to a session; returns the new input's ID
    pub async fn add_input(
        &self,
        session_id: &str,
        content: &str,
        source_type: SourceType,
        tags: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        let input = Input::new(content, source_type)
            .with_tags(tags)
            .with_added_by(BOUNDARY_ACTOR)
            .with_metadata(metadata);
        self.submit_input(session_id, input).await
    }

    /// Store a prepared input and announce it
    pub async fn submit_input(&self, session_id: &str, input: Input) -> Result<String> {
        debug!(%session_id, input_id = %input.input_id, "submit_input: called");
        self.runtime.store.add_input(session_id, input.clone()).await?;
        self.publish_added(session_id, &input).await?;
        Ok(input.input_id)
    }

    async fn publish_added(&self, session_id: &str, input: &Input) -> Result<()> {
        let event = Event::new(
            session_id,
            EventPayload::InputAdded(InputAdded {
                input_id: input.input_id.clone(),
                content: input.content.clone(),
                source_type: input.source_type,
                tags: input.tags.clone(),
                added_by: input.added_by.clone(),
            }),
        )
        .with_metadata(input.metadata.clone());
        self.runtime.bus.publish(event).await?;
        Ok(())
    }

    /// Remove a fact; returns false when the session had no such input
    pub async fn remove_input(&self, session_id: &str, input_id: &str) -> Result<bool> {
        debug!(%session_id, %input_id, "remove_input: called");
        if !self.runtime.store.remove_input(session_id, input_id).await? {
            return Ok(false);
        }

        self.runtime
            .bus
            .publish(Event::new(
                session_id,
                EventPayload::InputRemoved(InputRemoved {
                    input_id: input_id.to_string(),
                    removed_by: BOUNDARY_ACTOR.to_string(),
                    reason: RemovalReason::UserAction,
                }),
            ))
            .await?;
        Ok(true)
    }

    pub async fn get_session_status(&self, session_id: &str) -> Option<SessionSnapshot> {
        debug!(%session_id, "get_session_status: called");
        self.runtime.store.get_session(session_id).await.map(SessionSnapshot::from)
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        SystemStatus {
            started: self.started,
            bus: self.runtime.bus.metrics(),
            store: self.runtime.store.metrics().await,
            agents: self.handles.iter().map(AgentHandle::info).collect(),
        }
    }

    /// Recent events from the bus ring buffer
    pub fn recent_events(&self, session_id: Option<&str>, limit: usize) -> Vec<Event> {
        self.runtime.bus.recent_events(session_id, limit)
    }

    /// Wait until a session stops changing
    ///
    /// Settled means no agent is running and the version held still for
    /// `quiet`. Gives up after `max_wait` and returns the latest snapshot.
    pub async fn wait_until_settled(
        &self,
        session_id: &str,
        quiet: Duration,
        max_wait: Duration,
    ) -> Option<SessionSnapshot> {
        debug!(%session_id, ?quiet, ?max_wait, "wait_until_settled: called");
        let deadline = tokio::time::Instant::now() + max_wait;
        let step = (quiet / 4).max(Duration::from_millis(5));
        let mut last_version = None;
        let mut stable_since = tokio::time::Instant::now();

        loop {
            let state = self.runtime.store.get_session(session_id).await?;
            let now = tokio::time::Instant::now();
            if last_version != Some(state.version) || !state.running_agents().is_empty() {
                last_version = Some(state.version);
                stable_since = now;
            } else if now.duration_since(stable_since) >= quiet {
                return Some(state.into());
            }
            if now >= deadline {
                warn!(%session_id, "wait_until_settled: gave up waiting");
                return Some(state.into());
            }
            tokio::time::sleep(step).await;
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.stop();
        }
    }
}
