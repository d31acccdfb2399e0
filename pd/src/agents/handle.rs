//! AgentHandle - stop switch and status for one agent loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::debug;

/// How an agent is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Runs on `agent.should_execute`
    Dynamic,
    /// Recomputes on state-change topics
    Reactive,
    /// The input classifier
    Analyzer,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dynamic => write!(f, "dynamic"),
            Self::Reactive => write!(f, "reactive"),
            Self::Analyzer => write!(f, "analyzer"),
        }
    }
}

/// Status row for system status reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub kind: AgentKind,
    pub running: bool,
}

/// Handle shared between an agent loop and whoever stops it
///
/// Stopping only clears the flag; the loop notices on its next poll.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    name: String,
    kind: AgentKind,
    running: Arc<AtomicBool>,
}

impl AgentHandle {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to exit
    pub fn stop(&self) {
        debug!(name = %self.name, "AgentHandle::stop: called");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            kind: self.kind,
            running: self.is_running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_shared_between_clones() {
        let handle = AgentHandle::new("theme_agent", AgentKind::Dynamic);
        let loop_side = handle.clone();
        assert!(loop_side.is_running());

        handle.stop();
        assert!(!loop_side.is_running());
        assert_eq!(
            loop_side.info(),
            AgentInfo {
                name: "theme_agent".to_string(),
                kind: AgentKind::Dynamic,
                running: false
            }
        );
    }
}
