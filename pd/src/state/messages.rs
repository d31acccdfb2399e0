//! State store errors

use thiserror::Error;

/// Errors from state operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Agent {agent} has no result slot in session {session_id}")]
    AgentNotStarted { session_id: String, agent: String },
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;
