//! Event bus for agent coordination
//!
//! Every state change in a planning session is announced on a topic. Agents
//! never call each other; they only publish and subscribe.
//!
//! # Architecture
//!
//! ```text
//!   Orchestrator            InputAnalyzer               Dynamic agents
//!   publishes:              publishes:                  publish:
//!   - input.added           - agent.should_execute      - agent.started
//!   - input.removed         - agent.data_removed        - agent.completed
//!        │                        │                     - agent.failed
//!        ↓                        ↓                           ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          EVENT BUS                              │
//! │   one bounded mpsc queue per subscriber, FIFO per topic         │
//! │   full queue → send_timeout → drop for that subscriber only     │
//! └─────────────────────────────────────────────────────────────────┘
//!        ↓                        ↓                           ↓
//!   InputAnalyzer           Dynamic agents              Reactive agents
//!   (input.*)               (should_execute)            (completed, data_removed,
//!                                                        budget.updated)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use partydaemon::events::{Event, EventBus, EventPayload, Topic};
//!
//! let bus = EventBus::with_default_config();
//! let mut sub = bus.subscribe(Topic::AgentCompleted);
//!
//! bus.publish(Event::new("party-1", payload)).await?;
//! while let Some(event) = sub.recv().await {
//!     println!("{}: {:?}", event.topic, event.payload);
//! }
//! ```

mod bus;
mod error;
mod topic;
mod types;

pub use bus::{BusMetrics, EventBus, RecvOutcome, Subscription};
pub use error::BusError;
pub use topic::Topic;
pub use types::{
    AgentCompleted, AgentFailed, AgentStarted, DataRemoved, ErrorType, Event, EventPayload, ExecutionType, InputAdded,
    InputRemoved, RemovalReason, ShouldExecute,
};
