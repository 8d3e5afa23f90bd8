//! Persistence seam for items and activation nodes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activation::NodeRecord;
use crate::error::EngramResult;
use crate::types::Item;

/// Narrow repository interface the engine persists through.
///
/// Implementations are scoped to one owner's data partition.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Insert or replace an item.
    async fn upsert_item(&self, item: &Item) -> EngramResult<()>;

    /// Fetch an item by id.
    async fn get_item(&self, id: &str) -> EngramResult<Option<Item>>;

    /// Every item in the partition.
    async fn list_items(&self) -> EngramResult<Vec<Item>>;

    /// Bump `access_count` and set `last_accessed`.
    ///
    /// Returns `NotFound` when the item does not exist.
    async fn record_access(&self, id: &str, at: DateTime<Utc>) -> EngramResult<()>;

    /// Persist a node together with its outgoing connections.
    async fn save_node(&self, node: &NodeRecord) -> EngramResult<()>;

    /// Load every persisted node.
    async fn load_nodes(&self) -> EngramResult<Vec<NodeRecord>>;

    /// Number of items.
    async fn item_count(&self) -> EngramResult<usize> {
        Ok(self.list_items().await?.len())
    }
}
