//! Agent dependency graph
//!
//! Nodes are categories (`theme`, `venue`, ...). An edge `a → b` means b's
//! result derives from a's, so a rerun of a forces a recalculation of b.
//! The graph is static and validated once at startup.

use std::collections::{BTreeMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::debug;

use crate::config::ClassifierConfig;

/// Suffix joining a category to its agent name
const AGENT_SUFFIX: &str = "_agent";

/// Agent name for a category (`theme` → `theme_agent`)
pub fn agent_name(category: &str) -> String {
    format!("{}{}", category, AGENT_SUFFIX)
}

/// Category for an agent name (`theme_agent` → `theme`)
pub fn category_of(agent_name: &str) -> Option<&str> {
    agent_name.strip_suffix(AGENT_SUFFIX)
}

/// Errors found while validating the graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("{from} affects unknown category {target}")]
    UnknownAgent { from: String, target: String },

    #[error("Priority {priority} for {category} outside [1, 5]")]
    InvalidPriority { category: String, priority: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DependencyNode {
    affects: Vec<String>,
    priority: u8,
}

/// Validated category dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    /// Build and validate the graph from classifier configuration
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, GraphError> {
        debug!(nodes = config.dependencies.len(), "DependencyGraph::from_config: called");
        let nodes = config
            .dependencies
            .iter()
            .map(|(category, dep)| {
                (
                    category.clone(),
                    DependencyNode {
                        affects: dep.affects.clone(),
                        priority: dep.priority,
                    },
                )
            })
            .collect();

        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), GraphError> {
        for (category, node) in &self.nodes {
            if !(1..=5).contains(&node.priority) {
                return Err(GraphError::InvalidPriority {
                    category: category.clone(),
                    priority: node.priority,
                });
            }
            if let Some(target) = node.affects.iter().find(|t| !self.nodes.contains_key(t.as_str())) {
                return Err(GraphError::UnknownAgent {
                    from: category.clone(),
                    target: target.clone(),
                });
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut cycle_path = Vec::new();

        for category in self.nodes.keys() {
            if !visited.contains(category.as_str())
                && self.has_cycle_dfs(category, &mut visited, &mut rec_stack, &mut cycle_path)
            {
                debug!(?cycle_path, "DependencyGraph::validate: cycle detected");
                return Err(GraphError::Cycle(cycle_path));
            }
        }

        debug!("DependencyGraph::validate: no cycles found");
        Ok(())
    }

    /// DFS helper for cycle detection
    fn has_cycle_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        cycle_path: &mut Vec<String>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(node.to_string());

        for target in self.affects(node) {
            if !visited.contains(target.as_str()) {
                if self.has_cycle_dfs(target, visited, rec_stack, cycle_path) {
                    return true;
                }
            } else if rec_stack.contains(target.as_str()) {
                debug!(%node, %target, "has_cycle_dfs: back edge found");
                cycle_path.push(target.clone());
                return true;
            }
        }

        rec_stack.remove(node);
        cycle_path.pop();
        false
    }

    pub fn contains(&self, category: &str) -> bool {
        self.nodes.contains_key(category)
    }

    /// All categories (sorted)
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Scheduling priority of a category (1 runs first)
    pub fn priority(&self, category: &str) -> Option<u8> {
        self.nodes.get(category).map(|n| n.priority)
    }

    /// Direct downstream categories
    pub fn affects(&self, category: &str) -> &[String] {
        self.nodes.get(category).map(|n| n.affects.as_slice()).unwrap_or(&[])
    }

    /// Every category reachable from `category`, excluding itself, in BFS order
    pub fn downstream(&self, category: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::from([category]);
        let mut queue: VecDeque<&str> = VecDeque::from([category]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for target in self.affects(current) {
                if seen.insert(target.as_str()) {
                    out.push(target.clone());
                    queue.push_back(target.as_str());
                }
            }
        }

        debug!(%category, ?out, "DependencyGraph::downstream");
        out
    }

    /// Categories ordered by priority, ties by name
    pub fn by_priority(&self) -> Vec<(&str, u8)> {
        let mut nodes: Vec<(&str, u8)> = self.nodes.iter().map(|(c, n)| (c.as_str(), n.priority)).collect();
        nodes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DependencyConfig;

    fn config_with(deps: &[(&str, &[&str], u8)]) -> ClassifierConfig {
        ClassifierConfig {
            dependencies: deps
                .iter()
                .map(|(c, affects, priority)| {
                    (
                        c.to_string(),
                        DependencyConfig {
                            affects: affects.iter().map(|s| s.to_string()).collect(),
                            priority: *priority,
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_graph_is_valid() {
        let graph = DependencyGraph::from_config(&ClassifierConfig::default()).unwrap();
        assert_eq!(graph.priority("theme"), Some(1));
        assert_eq!(graph.priority("vendor"), Some(4));
        assert_eq!(graph.affects("theme"), &["cake", "venue", "vendor"]);
    }

    #[test]
    fn test_downstream_is_transitive() {
        let graph = DependencyGraph::from_config(&ClassifierConfig::default()).unwrap();
        let downstream = graph.downstream("theme");
        for category in ["cake", "venue", "vendor", "catering", "budget"] {
            assert!(downstream.contains(&category.to_string()), "missing {}", category);
        }
        assert!(!downstream.contains(&"theme".to_string()));
        assert!(graph.downstream("cake").is_empty());
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let config = config_with(&[("a", &["b"], 1), ("b", &["c"], 2), ("c", &["a"], 3)]);
        match DependencyGraph::from_config(&config) {
            Err(GraphError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("Expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_target_rejected() {
        let config = config_with(&[("a", &["ghost"], 1)]);
        assert_eq!(
            DependencyGraph::from_config(&config).unwrap_err(),
            GraphError::UnknownAgent {
                from: "a".to_string(),
                target: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_priority_range_enforced() {
        let config = config_with(&[("a", &[], 0)]);
        assert!(matches!(
            DependencyGraph::from_config(&config),
            Err(GraphError::InvalidPriority { .. })
        ));
    }

    #[test]
    fn test_agent_name_mapping() {
        assert_eq!(agent_name("cake"), "cake_agent");
        assert_eq!(category_of("cake_agent"), Some("cake"));
        assert_eq!(category_of("budget"), None);
    }

    #[test]
    fn test_by_priority_orders_ties_by_name() {
        let graph = DependencyGraph::from_config(&ClassifierConfig::default()).unwrap();
        let order: Vec<&str> = graph.by_priority().into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec!["theme", "venue", "cake", "catering", "vendor", "budget"]);
    }
}
