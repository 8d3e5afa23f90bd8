//! Knowledge item types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Category tag for an item.
///
/// Kinds serialize to snake_case for storage compatibility.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Question,
    Answer,
    Insight,
    Document,
    #[default]
    Note,
    Concept,
    Fact,
    Other,
}

/// The unit of retrieval.
///
/// Items are owned by the caller's data partition. The engine reads them and
/// only annotates `access_count` / `last_accessed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    pub id: String,
    /// The text body.
    pub content: String,
    /// Optional title; indexed together with the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Category tag.
    #[serde(default)]
    pub kind: ItemKind,
    /// Query-independent importance (user visible).
    #[serde(default)]
    pub relevance_score: f32,
    /// Number of times the item was accessed.
    #[serde(default)]
    pub access_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last access timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Custom metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Item {
    /// Create a new item stamped with the current time.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            title: None,
            kind: ItemKind::default(),
            relevance_score: 0.0,
            access_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed: None,
            metadata: HashMap::new(),
        }
    }

    /// Create an item with a generated UUID.
    pub fn with_generated_id(content: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), content)
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the relevance score.
    pub fn with_relevance(mut self, score: f32) -> Self {
        self.relevance_score = score;
        self
    }

    /// Set both timestamps.
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Text that is indexed and embedded: title followed by content.
    pub fn searchable_text(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => format!("{}\n{}", title, self.content),
            _ => self.content.clone(),
        }
    }

    /// Record an access at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_string_forms() {
        assert_eq!(ItemKind::Insight.to_string(), "insight");
        assert_eq!(ItemKind::from_str("document").unwrap(), ItemKind::Document);
        assert!(ItemKind::from_str("spreadsheet").is_err());

        let json = serde_json::to_string(&ItemKind::Question).unwrap();
        assert_eq!(json, "\"question\"");
    }

    #[test]
    fn test_searchable_text_includes_title() {
        let item = Item::new("a", "body text").with_title("Heading");
        assert_eq!(item.searchable_text(), "Heading\nbody text");

        let untitled = Item::new("b", "body text").with_title("   ");
        assert_eq!(untitled.searchable_text(), "body text");
    }

    #[test]
    fn test_touch_bumps_counters() {
        let mut item = Item::new("a", "x");
        let now = Utc::now();
        item.touch(now);
        item.touch(now);
        assert_eq!(item.access_count, 2);
        assert_eq!(item.last_accessed, Some(now));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "id": "n1",
            "content": "hello",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, ItemKind::Note);
        assert_eq!(item.access_count, 0);
        assert!(item.metadata.is_empty());
    }
}
