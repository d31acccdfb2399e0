//! Agent execution errors

use std::time::Duration;

use thiserror::Error;

use crate::events::ErrorType;

/// Errors raised by an agent's domain step
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Classification carried on `agent.failed`
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Timeout(_) => ErrorType::Timeout,
            Self::Validation(_) => ErrorType::Validation,
            Self::ExternalApi(_) => ErrorType::ExternalApi,
            Self::Internal(_) => ErrorType::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_classification() {
        assert_eq!(AgentError::Timeout(Duration::from_secs(1)).error_type(), ErrorType::Timeout);
        assert_eq!(AgentError::Validation("x".into()).error_type(), ErrorType::Validation);
        assert_eq!(AgentError::ExternalApi("x".into()).error_type(), ErrorType::ExternalApi);
        assert_eq!(AgentError::Internal("x".into()).error_type(), ErrorType::Internal);
    }
}
