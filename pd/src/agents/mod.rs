//! Agents and their runtime contract
//!
//! - `traits`: `DynamicAgent` / `ReactiveAgent` contracts and `AgentContext`
//! - `runner`: the long-lived loops that drive each agent off the bus
//! - `handle`: stop switch and status per loop
//! - `builtin`: heuristic planning agents shipped with the daemon

pub mod builtin;
mod error;
mod handle;
mod runner;
mod traits;

pub use error::AgentError;
pub use handle::{AgentHandle, AgentInfo, AgentKind};
pub use runner::{DynamicRunner, ReactiveRunner, execute_once};
pub use traits::{AgentContext, AgentOutput, DynamicAgent, ReactiveAgent};
