//! PartyDaemon configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::analyzer::DependencyGraph;

/// Main PartyDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Event bus tuning
    pub bus: BusConfig,

    /// Agent runner tuning
    pub agents: AgentsConfig,

    /// Keyword table and dependency graph
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Builds the dependency graph, so a cycle or a dangling edge fails here
    /// rather than at the first cascade.
    pub fn validate(&self) -> Result<()> {
        if self.bus.queue_capacity == 0 {
            return Err(eyre!("bus.queue-capacity must be at least 1"));
        }
        if self.agents.poll_interval_ms == 0 {
            return Err(eyre!("agents.poll-interval-ms must be at least 1"));
        }
        if self.classifier.keywords.is_empty() {
            return Err(eyre!("classifier.keywords must name at least one category"));
        }
        let graph = DependencyGraph::from_config(&self.classifier).context("Invalid classifier.dependencies")?;
        if let Some(category) = self.classifier.keywords.keys().find(|c| !graph.contains(c)) {
            return Err(eyre!("classifier keyword category {} has no dependencies entry", category));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .partydaemon.yml
        let local_config = PathBuf::from(".partydaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/partydaemon/partydaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("partydaemon").join("partydaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Event bus tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscriber queue capacity
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// How long publish waits on a full queue before dropping
    #[serde(rename = "delivery-timeout-ms")]
    pub delivery_timeout_ms: u64,

    /// Events kept in the debug ring buffer
    #[serde(rename = "history-size")]
    pub history_size: usize,

    /// How long shutdown waits for in-flight deliveries
    #[serde(rename = "shutdown-grace-ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            delivery_timeout_ms: 100,
            history_size: 1000,
            shutdown_grace_ms: 2000,
        }
    }
}

impl BusConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Agent runner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// How often an idle agent loop checks its running flag
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on one dynamic agent execution
    #[serde(rename = "execution-timeout-ms")]
    pub execution_timeout_ms: u64,

    /// How long stop waits for agent tasks before aborting them
    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            execution_timeout_ms: 30_000,
            stop_timeout_ms: 5000,
        }
    }
}

impl AgentsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// One node of the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Categories whose results derive from this one
    #[serde(default)]
    pub affects: Vec<String>,

    /// 1 runs first, 5 runs last
    pub priority: u8,
}

impl DependencyConfig {
    fn new(affects: &[&str], priority: u8) -> Self {
        Self {
            affects: affects.iter().map(|s| s.to_string()).collect(),
            priority,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Score added per category named in `category_hints` metadata
    #[serde(rename = "hint-boost")]
    pub hint_boost: u32,

    /// Category → whole-word keywords
    pub keywords: BTreeMap<String, Vec<String>>,

    /// Category → downstream categories and priority
    pub dependencies: BTreeMap<String, DependencyConfig>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let keywords = BTreeMap::from([
            (
                "theme".to_string(),
                words(&[
                    "theme", "themed", "costume", "costumes", "dinosaur", "dinosaurs", "jungle", "princess",
                    "superhero", "pirate", "unicorn", "space", "mermaid", "safari", "decorations", "colors",
                ]),
            ),
            (
                "venue".to_string(),
                words(&[
                    "venue", "park", "hall", "backyard", "restaurant", "location", "indoor", "outdoor", "garden",
                    "beach", "guests", "kids", "people",
                ]),
            ),
            (
                "cake".to_string(),
                words(&[
                    "cake", "cakes", "cupcake", "cupcakes", "dessert", "frosting", "bakery", "candles", "sweets",
                ]),
            ),
            (
                "catering".to_string(),
                words(&[
                    "food", "catering", "menu", "lunch", "dinner", "snacks", "pizza", "drinks", "vegetarian",
                    "vegan", "allergy", "allergies", "buffet",
                ]),
            ),
            (
                "vendor".to_string(),
                words(&[
                    "vendor", "vendors", "entertainer", "magician", "clown", "dj", "music", "balloons",
                    "photographer", "bounce", "rental", "rentals", "supplies",
                ]),
            ),
        ]);

        let dependencies = BTreeMap::from([
            ("theme".to_string(), DependencyConfig::new(&["cake", "venue", "vendor"], 1)),
            ("venue".to_string(), DependencyConfig::new(&["catering", "budget"], 2)),
            ("cake".to_string(), DependencyConfig::new(&[], 3)),
            ("catering".to_string(), DependencyConfig::new(&["budget"], 3)),
            ("vendor".to_string(), DependencyConfig::new(&[], 4)),
            ("budget".to_string(), DependencyConfig::new(&[], 5)),
        ]);

        Self {
            hint_boost: 3,
            keywords,
            dependencies,
        }
    }
}
