//! Keyword scoring
//!
//! Each category compiles to one case-insensitive, whole-word regex. An
//! input's score for a category is the number of keyword hits over its
//! content and tags, plus one per tag equal to the category name, plus
//! `hint_boost` when an upstream classifier named the category.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::domain::Input;

/// Metadata key carrying upstream category hints (array of strings)
pub const CATEGORY_HINTS_KEY: &str = "category_hints";

/// Read `category_hints` from a metadata object
pub fn category_hints(metadata: &Map<String, Value>) -> Vec<String> {
    metadata
        .get(CATEGORY_HINTS_KEY)
        .and_then(Value::as_array)
        .map(|hints| {
            hints
                .iter()
                .filter_map(Value::as_str)
                .map(|h| h.trim().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
    pattern: Option<Regex>,
}

/// Compiled category → keyword table
#[derive(Debug, Clone)]
pub struct KeywordTable {
    categories: Vec<Category>,
    hint_boost: u32,
}

impl KeywordTable {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        debug!(categories = config.keywords.len(), "KeywordTable::from_config: called");
        let mut categories = Vec::with_capacity(config.keywords.len());

        for (name, keywords) in &config.keywords {
            let alternatives: Vec<String> = keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(regex::escape)
                .collect();
            let pattern = if alternatives.is_empty() {
                None
            } else {
                Some(Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))?)
            };
            categories.push(Category {
                name: name.to_lowercase(),
                pattern,
            });
        }

        Ok(Self {
            categories,
            hint_boost: config.hint_boost,
        })
    }

    /// Category names (sorted)
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.name == category)
    }

    /// Score text, tags and hints; only positive scores are returned
    pub fn score(&self, content: &str, tags: &[String], hints: &[String]) -> BTreeMap<String, u32> {
        let mut scores = BTreeMap::new();

        for category in &self.categories {
            let mut score = 0u32;
            if let Some(pattern) = &category.pattern {
                score += pattern.find_iter(content).count() as u32;
                for tag in tags {
                    score += pattern.find_iter(tag).count() as u32;
                }
            }
            score += tags.iter().filter(|t| t.eq_ignore_ascii_case(&category.name)).count() as u32;
            if hints.iter().any(|h| *h == category.name) {
                score += self.hint_boost;
            }
            if score > 0 {
                scores.insert(category.name.clone(), score);
            }
        }

        scores
    }

    /// Score an input
    ///
    /// Hints from the triggering event win over hints stored on the input.
    pub fn score_input(&self, input: &Input, event_hints: &[String]) -> BTreeMap<String, u32> {
        let stored;
        let hints = if event_hints.is_empty() {
            stored = category_hints(&input.metadata);
            &stored
        } else {
            event_hints
        };
        let scores = self.score(&input.content, &input.tags, hints);
        debug!(input_id = %input.input_id, ?scores, "KeywordTable::score_input");
        scores
    }
}
