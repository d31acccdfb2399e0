//! Input classification and execution planning
//!
//! - `keywords`: category scoring over content, tags and hints
//! - `graph`: static dependency graph, validated for cycles at startup
//! - `plan`: pure planner producing start/rerun/recalculate entries
//! - `core`: the InputAnalyzer loop that applies plans to the bus and store

mod core;
mod graph;
mod keywords;
mod plan;

pub use self::core::{ANALYZER_NAME, InputAnalyzer};
pub use graph::{DependencyGraph, GraphError, agent_name, category_of};
pub use keywords::{CATEGORY_HINTS_KEY, KeywordTable, category_hints};
pub use plan::{ExecutionPlan, PlanEntry, Planner, Support};
