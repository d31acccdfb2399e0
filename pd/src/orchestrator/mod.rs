//! Orchestrator - the system's boundary
//!
//! Creates sessions, accepts and removes inputs, reports status, and owns
//! the lifecycle of the analyzer and every agent loop.

mod core;

pub use self::core::{Orchestrator, SessionSnapshot, SystemStatus};
