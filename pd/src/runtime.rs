//! Runtime - shared context handed to every agent
//!
//! Built once by the orchestrator. There are no process-wide singletons; tests
//! build as many independent runtimes as they like.

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::debug;

use crate::analyzer::{DependencyGraph, KeywordTable, Planner};
use crate::config::Config;
use crate::events::EventBus;
use crate::state::StateStore;

pub struct Runtime {
    pub config: Config,
    pub bus: EventBus,
    pub store: StateStore,
    pub graph: DependencyGraph,
    pub keywords: KeywordTable,
}

impl Runtime {
    /// Validate the configuration and build the shared context
    pub fn new(config: Config) -> Result<Arc<Self>> {
        debug!("Runtime::new: called");
        config.validate()?;
        let graph = DependencyGraph::from_config(&config.classifier).context("Invalid classifier.dependencies")?;
        let keywords = KeywordTable::from_config(&config.classifier).context("Invalid classifier.keywords")?;

        Ok(Arc::new(Self {
            bus: EventBus::new(config.bus.clone()),
            store: StateStore::new(),
            graph,
            keywords,
            config,
        }))
    }

    pub fn planner(&self) -> Planner<'_> {
        Planner::new(&self.keywords, &self.graph)
    }
}
