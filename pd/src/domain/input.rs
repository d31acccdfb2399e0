//! Input domain type
//!
//! A user-supplied fact about the party. Created on add_input, destroyed on
//! remove_input, never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::generate_id;

/// Where an input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Text,
    Image,
    Url,
    Upload,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Url => write!(f, "url"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "url" => Ok(Self::Url),
            "upload" => Ok(Self::Upload),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// A single fact contributed to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    /// Unique identifier
    pub input_id: String,

    /// Raw content (text, URL, image caption, file name)
    pub content: String,

    /// Origin of the content
    pub source_type: SourceType,

    /// User-supplied tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Who added it
    pub added_by: String,

    /// When it was added
    pub added_at: DateTime<Utc>,

    /// Free-form metadata (e.g. upstream classifier hints)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Input {
    /// Create a new input with a generated ID
    pub fn new(content: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            input_id: generate_id("input"),
            content: content.into(),
            source_type,
            tags: Vec::new(),
            added_by: "user".to_string(),
            added_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Create a text input
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, SourceType::Text)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_added_by(mut self, added_by: impl Into<String>) -> Self {
        self.added_by = added_by.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Content and tags joined for matching
    pub fn searchable_text(&self) -> String {
        let mut text = self.content.to_lowercase();
        for tag in &self.tags {
            text.push(' ');
            text.push_str(&tag.to_lowercase());
        }
        text
    }
}
