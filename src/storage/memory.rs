//! In-memory persistence adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::PersistenceAdapter;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::ConversationTree;

/// Keeps JSON snapshots in a process-local map.
///
/// Snapshots go through the same serialization a durable backend would use,
/// so a save/load cycle exercises the full wire format.
#[derive(Debug, Default)]
pub struct InMemoryPersistenceAdapter {
    snapshots: RwLock<HashMap<String, String>>,
}

impl InMemoryPersistenceAdapter {
    /// Create an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored JSON for a session.
    pub async fn raw_snapshot(&self, session_id: &str) -> Option<String> {
        self.snapshots.read().await.get(session_id).cloned()
    }

    /// Store raw JSON for a session, bypassing serialization.
    pub async fn insert_raw(&self, session_id: impl Into<String>, json: impl Into<String>) {
        self.snapshots.write().await.insert(session_id.into(), json.into());
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistenceAdapter {
    async fn save(&self, session_id: &str, tree: &ConversationTree) -> PersistenceResult<()> {
        let json = serde_json::to_string(tree).map_err(|source| PersistenceError::Serialization {
            session_id: session_id.to_string(),
            source,
        })?;
        let bytes = json.len();
        self.snapshots.write().await.insert(session_id.to_string(), json);
        debug!(session_id, bytes, "Session snapshot saved");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> PersistenceResult<Option<ConversationTree>> {
        let guard = self.snapshots.read().await;
        let Some(json) = guard.get(session_id) else {
            return Ok(None);
        };
        let tree = serde_json::from_str(json).map_err(|source| PersistenceError::Deserialization {
            session_id: session_id.to_string(),
            source,
        })?;
        Ok(Some(tree))
    }

    async fn delete(&self, session_id: &str) -> PersistenceResult<bool> {
        Ok(self.snapshots.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> PersistenceResult<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, session_id: &str) -> PersistenceResult<bool> {
        Ok(self.snapshots.read().await.contains_key(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QaPair, TopicNode};
    use pretty_assertions::assert_eq;

    fn tree() -> ConversationTree {
        let mut tree = ConversationTree::new("sess-1");
        let node = TopicNode::with_id("root", "rust")
            .with_score(71.5)
            .with_qa_pair(QaPair::new("What is Rust?", "A systems language."));
        tree.nodes.insert("root".to_string(), node);
        tree.root_nodes.push("root".to_string());
        tree.current_path.push("root".to_string());
        tree
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let adapter = InMemoryPersistenceAdapter::new();
        let original = tree();
        adapter.save("sess-1", &original).await.unwrap();

        let loaded = adapter.load("sess-1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_snapshot_uses_pairs_and_iso_timestamps() {
        let adapter = InMemoryPersistenceAdapter::new();
        adapter.save("sess-1", &tree()).await.unwrap();

        let raw = adapter.raw_snapshot("sess-1").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["nodes"][0][0], "root");
        assert_eq!(value["nodes"][0][1]["topic"], "rust");
        let created = value["createdAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
    }

    #[tokio::test]
    async fn test_missing_session_loads_none() {
        let adapter = InMemoryPersistenceAdapter::new();
        assert!(adapter.load("nope").await.unwrap().is_none());
        assert!(!adapter.exists("nope").await.unwrap());
        assert!(!adapter.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let adapter = InMemoryPersistenceAdapter::new();
        adapter.save("b", &tree()).await.unwrap();
        adapter.save("a", &tree()).await.unwrap();
        assert_eq!(adapter.list().await.unwrap(), vec!["a", "b"]);

        assert!(adapter.delete("a").await.unwrap());
        assert_eq!(adapter.list().await.unwrap(), vec!["b"]);
        assert!(adapter.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reports_session() {
        let adapter = InMemoryPersistenceAdapter::new();
        adapter.insert_raw("broken", "{not json").await;
        let err = adapter.load("broken").await.unwrap_err();
        assert!(matches!(err, PersistenceError::Deserialization { .. }));
        assert!(err.to_string().contains("broken"));
    }
}
