//! Event bus errors

use thiserror::Error;

/// Errors returned to bus callers
///
/// A delivery timeout to one slow subscriber is not an error: it is counted,
/// logged, and the publish still succeeds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Event bus is shut down")]
    Closed,
}
