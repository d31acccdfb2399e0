//! Session state management
//!
//! The StateStore owns every planning session. Each session sits behind its
//! own async mutex, so mutations of one session are fully serialized while
//! different sessions proceed in parallel.

mod messages;
mod store;

pub use messages::{StateError, StateResponse};
pub use store::{StateStore, StoreMetrics};
