//! SQLite-backed repository.
//!
//! Items, activation nodes and their outgoing edges live in three tables.
//! Timestamps are stored as RFC 3339 text, metadata as JSON text.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};

use crate::activation::{ActivationNode, Connection as Edge, EdgeKind, NodeRecord};
use crate::error::{EngramError, EngramResult};
use crate::traits::KnowledgeRepository;
use crate::types::{Item, ItemKind};

/// Single-connection SQLite store.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> EngramResult<Self> {
        let conn = Connection::open(path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    /// In-memory database (useful for testing).
    pub fn in_memory() -> EngramResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> EngramResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngramError::repository(e.to_string()))
    }

    fn init_schema(&self) -> EngramResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                title TEXT,
                kind TEXT NOT NULL DEFAULT 'note',
                relevance_score REAL NOT NULL DEFAULT 0,
                access_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_accessed TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
            CREATE INDEX IF NOT EXISTS idx_items_updated_at ON items(updated_at);

            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL DEFAULT 'note',
                activation_strength REAL NOT NULL,
                base_activation REAL NOT NULL,
                decay_rate REAL NOT NULL,
                propagation_depth INTEGER NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT,
                created_at TEXT NOT NULL,
                last_decayed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                strength REAL NOT NULL,
                kind TEXT NOT NULL DEFAULT 'semantic',
                PRIMARY KEY (source_id, target_id)
            );
            ",
        )?;
        Ok(())
    }
}

/// Read an RFC3339 timestamp column. Unparsable values fail the row.
fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => ts_column(row, idx).map(Some),
        None => Ok(None),
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let kind: String = row.get(3)?;
    let access_count: i64 = row.get(5)?;
    let metadata: String = row.get(9)?;

    Ok(Item {
        id: row.get(0)?,
        content: row.get(1)?,
        title: row.get(2)?,
        kind: ItemKind::from_str(&kind).unwrap_or_default(),
        relevance_score: row.get(4)?,
        access_count: access_count.max(0) as u64,
        created_at: ts_column(row, 6)?,
        updated_at: ts_column(row, 7)?,
        last_accessed: opt_ts_column(row, 8)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
    })
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<ActivationNode> {
    let kind: String = row.get(1)?;
    let depth: i64 = row.get(5)?;
    let access_count: i64 = row.get(6)?;

    Ok(ActivationNode {
        id: row.get(0)?,
        kind: ItemKind::from_str(&kind).unwrap_or_default(),
        activation_strength: row.get(2)?,
        base_activation: row.get(3)?,
        decay_rate: row.get(4)?,
        propagation_depth: depth.max(0) as usize,
        access_count: access_count.max(0) as u64,
        last_accessed: opt_ts_column(row, 7)?,
        created_at: ts_column(row, 8)?,
        last_decayed_at: ts_column(row, 9)?,
    })
}

const ITEM_COLUMNS: &str = "id, content, title, kind, relevance_score, access_count, \
                            created_at, updated_at, last_accessed, metadata";

#[async_trait]
impl KnowledgeRepository for SqliteRepository {
    async fn upsert_item(&self, item: &Item) -> EngramResult<()> {
        let metadata = serde_json::to_string(&item.metadata)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO items (id, content, title, kind, relevance_score, access_count,
                                created_at, updated_at, last_accessed, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                title = excluded.title,
                kind = excluded.kind,
                relevance_score = excluded.relevance_score,
                access_count = excluded.access_count,
                updated_at = excluded.updated_at,
                last_accessed = excluded.last_accessed,
                metadata = excluded.metadata",
            params![
                item.id,
                item.content,
                item.title,
                item.kind.to_string(),
                item.relevance_score,
                item.access_count as i64,
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
                item.last_accessed.map(|t| t.to_rfc3339()),
                metadata,
            ],
        )?;
        Ok(())
    }

    async fn get_item(&self, id: &str) -> EngramResult<Option<Item>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    async fn list_items(&self) -> EngramResult<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM items ORDER BY id", ITEM_COLUMNS))?;
        let items = stmt
            .query_map([], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    async fn record_access(&self, id: &str, at: DateTime<Utc>) -> EngramResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE items SET access_count = access_count + 1, last_accessed = ?2 WHERE id = ?1",
            params![id, at.to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(EngramError::not_found(id));
        }
        Ok(())
    }

    async fn save_node(&self, record: &NodeRecord) -> EngramResult<()> {
        let node = &record.node;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO nodes (id, kind, activation_strength, base_activation,
                                           decay_rate, propagation_depth, access_count,
                                           last_accessed, created_at, last_decayed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                node.id,
                node.kind.to_string(),
                node.activation_strength,
                node.base_activation,
                node.decay_rate,
                node.propagation_depth as i64,
                node.access_count as i64,
                node.last_accessed.map(|t| t.to_rfc3339()),
                node.created_at.to_rfc3339(),
                node.last_decayed_at.to_rfc3339(),
            ],
        )?;
        tx.execute("DELETE FROM edges WHERE source_id = ?1", params![node.id])?;
        for edge in &record.connections {
            tx.execute(
                "INSERT OR REPLACE INTO edges (source_id, target_id, strength, kind)
                 VALUES (?1, ?2, ?3, ?4)",
                params![node.id, edge.target_id, edge.strength, edge.kind.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn load_nodes(&self) -> EngramResult<Vec<NodeRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, activation_strength, base_activation, decay_rate,
                    propagation_depth, access_count, last_accessed, created_at, last_decayed_at
             FROM nodes ORDER BY id",
        )?;
        let nodes = stmt
            .query_map([], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut edge_stmt = conn.prepare(
            "SELECT target_id, strength, kind FROM edges WHERE source_id = ?1 ORDER BY target_id",
        )?;
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            let connections = edge_stmt
                .query_map(params![node.id], |row| {
                    let kind: String = row.get(2)?;
                    Ok(Edge {
                        target_id: row.get(0)?,
                        strength: row.get(1)?,
                        kind: EdgeKind::from_str(&kind).unwrap_or_default(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            records.push(NodeRecord { node, connections });
        }
        Ok(records)
    }

    async fn item_count(&self) -> EngramResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationConfig;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn sample_item(id: &str) -> Item {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), serde_json::json!("unit-test"));
        Item::new(id, "Rust ownership rules")
            .with_title("Ownership")
            .with_kind(ItemKind::Concept)
            .with_relevance(0.4)
            .with_metadata(metadata)
    }

    #[tokio::test]
    async fn test_item_roundtrip() {
        let repo = SqliteRepository::in_memory().unwrap();
        let item = sample_item("a");
        repo.upsert_item(&item).await.unwrap();

        let loaded = repo.get_item("a").await.unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("Ownership"));
        assert_eq!(loaded.kind, ItemKind::Concept);
        assert_eq!(loaded.metadata.get("source"), Some(&serde_json::json!("unit-test")));
        assert!(repo.get_item("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_access() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.upsert_item(&sample_item("a")).await.unwrap();

        repo.record_access("a", Utc::now()).await.unwrap();
        repo.record_access("a", Utc::now()).await.unwrap();
        let loaded = repo.get_item("a").await.unwrap().unwrap();
        assert_eq!(loaded.access_count, 2);
        assert!(loaded.last_accessed.is_some());

        let err = repo.record_access("missing", Utc::now()).await.unwrap_err();
        assert!(matches!(err, EngramError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_nodes_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engram.db");

        {
            let repo = SqliteRepository::new(&path).unwrap();
            let node = ActivationNode::new("a", ItemKind::Note, Utc::now(), &ActivationConfig::default());
            let record = NodeRecord {
                node,
                connections: vec![Edge {
                    target_id: "b".to_string(),
                    strength: 0.7,
                    kind: EdgeKind::Manual,
                }],
            };
            repo.save_node(&record).await.unwrap();
            repo.upsert_item(&sample_item("a")).await.unwrap();
        }

        let repo = SqliteRepository::new(&path).unwrap();
        let nodes = repo.load_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].connections.len(), 1);
        assert_eq!(nodes[0].connections[0].kind, EdgeKind::Manual);
        assert!((nodes[0].connections[0].strength - 0.7).abs() < 1e-6);
        assert_eq!(repo.item_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_fails_read() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.upsert_item(&sample_item("a")).await.unwrap();
        let node = ActivationNode::new("a", ItemKind::Note, Utc::now(), &ActivationConfig::default());
        repo.save_node(&NodeRecord {
            node,
            connections: Vec::new(),
        })
        .await
        .unwrap();

        {
            let conn = repo.lock().unwrap();
            conn.execute("UPDATE items SET updated_at = 'yesterday' WHERE id = 'a'", [])
                .unwrap();
            conn.execute("UPDATE nodes SET last_decayed_at = 'never' WHERE id = 'a'", [])
                .unwrap();
        }

        let err = repo.get_item("a").await.unwrap_err();
        assert!(matches!(err, EngramError::Repository { .. }));
        assert!(repo.list_items().await.is_err());
        assert!(repo.load_nodes().await.is_err());
    }
}
