//! Domain types for PartyDaemon
//!
//! Core domain types: Input, AgentResult, SessionState and the derived
//! Budget / FinalPlan caches. SessionState is the aggregate root and is
//! exclusively owned by the StateStore.

mod id;
mod input;
mod result;
mod session;

pub use id::{generate_id, short_id};
pub use input::{Input, SourceType};
pub use result::{AgentResult, AgentStatus};
pub use session::{Budget, BudgetRange, FinalPlan, SessionState, SessionStatus};
