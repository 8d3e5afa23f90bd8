//! In-memory repository.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activation::NodeRecord;
use crate::error::{EngramError, EngramResult};
use crate::traits::KnowledgeRepository;
use crate::types::Item;

/// Repository backed by two `RwLock<HashMap>`s.
#[derive(Default)]
pub struct InMemoryRepository {
    items: RwLock<HashMap<String, Item>>,
    nodes: RwLock<HashMap<String, NodeRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> EngramError {
    EngramError::repository(format!("lock poisoned: {}", e))
}

#[async_trait]
impl KnowledgeRepository for InMemoryRepository {
    async fn upsert_item(&self, item: &Item) -> EngramResult<()> {
        self.items
            .write()
            .map_err(poisoned)?
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get_item(&self, id: &str) -> EngramResult<Option<Item>> {
        Ok(self.items.read().map_err(poisoned)?.get(id).cloned())
    }

    async fn list_items(&self) -> EngramResult<Vec<Item>> {
        let mut items: Vec<Item> = self.items.read().map_err(poisoned)?.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn record_access(&self, id: &str, at: DateTime<Utc>) -> EngramResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        let item = items.get_mut(id).ok_or_else(|| EngramError::not_found(id))?;
        item.touch(at);
        Ok(())
    }

    async fn save_node(&self, node: &NodeRecord) -> EngramResult<()> {
        self.nodes
            .write()
            .map_err(poisoned)?
            .insert(node.node.id.clone(), node.clone());
        Ok(())
    }

    async fn load_nodes(&self) -> EngramResult<Vec<NodeRecord>> {
        Ok(self.nodes.read().map_err(poisoned)?.values().cloned().collect())
    }

    async fn item_count(&self) -> EngramResult<usize> {
        Ok(self.items.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_access() {
        let repo = InMemoryRepository::new();
        repo.upsert_item(&Item::new("a", "alpha")).await.unwrap();
        repo.upsert_item(&Item::new("a", "alpha v2")).await.unwrap();
        assert_eq!(repo.item_count().await.unwrap(), 1);

        let now = Utc::now();
        repo.record_access("a", now).await.unwrap();
        let item = repo.get_item("a").await.unwrap().unwrap();
        assert_eq!(item.content, "alpha v2");
        assert_eq!(item.access_count, 1);
        assert_eq!(item.last_accessed, Some(now));
    }

    #[tokio::test]
    async fn test_record_access_missing() {
        let repo = InMemoryRepository::new();
        let err = repo.record_access("nope", Utc::now()).await.unwrap_err();
        assert!(matches!(err, EngramError::NotFound { .. }));
    }
}
