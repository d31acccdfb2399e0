//! PartyDaemon - reactive multi-agent coordination for party planning
//!
//! Independent planning agents react to user-supplied facts about a party
//! and build a shared plan incrementally. Agents never call each other; all
//! coordination goes through a typed topic bus and a per-session state store.
//!
//! # Core Concepts
//!
//! - **Events, not calls**: every state change is announced on a topic
//! - **Per-session serialization**: one session's mutations never interleave
//! - **Reactive recomputation**: derived views are pure functions of state
//! - **Dependency cascades**: rerunning an agent recalculates its dependents
//!
//! # Modules
//!
//! - [`events`] - Topic catalog, event envelope and the event bus
//! - [`domain`] - Inputs, agent results, sessions
//! - [`state`] - Per-session locked state store
//! - [`agents`] - Agent contracts, runners and built-in agents
//! - [`analyzer`] - Input classification and execution planning
//! - [`orchestrator`] - Boundary API and agent lifecycle
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agents;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod orchestrator;
pub mod runtime;
pub mod state;

// Re-export commonly used types
pub use agents::{AgentContext, AgentError, AgentOutput, DynamicAgent, ReactiveAgent};
pub use analyzer::{DependencyGraph, ExecutionPlan, GraphError, InputAnalyzer, KeywordTable, Planner};
pub use config::Config;
pub use domain::{AgentResult, AgentStatus, Budget, FinalPlan, Input, SessionState, SessionStatus, SourceType};
pub use events::{BusError, Event, EventBus, EventPayload, Subscription, Topic};
pub use orchestrator::{Orchestrator, SessionSnapshot, SystemStatus};
pub use runtime::Runtime;
pub use state::{StateError, StateStore};
