//! Session bookkeeping over per-session payloads.
//!
//! [`SessionManager`] replaces process-wide session state with an owned
//! struct. It is generic over the payload so the same lifecycle logic serves
//! both bare trees and full grading systems.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppResult, PersistenceError, SessionError};
use crate::models::{present_value, ConversationTree};
use crate::storage::PersistenceAdapter;
use crate::validation::validate_session_id;

/// Lifecycle record of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub metadata: Option<serde_json::Value>,
}

impl Session {
    /// A fresh record stamped now.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_accessed_at: now,
            metadata: None,
        }
    }

    /// Attach free-form metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether the session has been idle longer than `max_age`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_accessed_at > max_age
    }
}

/// Anything stored per session that exposes a conversation tree.
pub trait SessionPayload: Send + Sync {
    fn tree(&self) -> &ConversationTree;
}

impl SessionPayload for ConversationTree {
    fn tree(&self) -> &ConversationTree {
        self
    }
}

/// Memory usage summary across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_sessions: usize,
    pub total_nodes: usize,
    pub average_nodes_per_session: f64,
    pub oldest_session: Option<DateTime<Utc>>,
    pub newest_session: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SessionEntry<P> {
    session: Session,
    payload: P,
}

/// Owns the sessions of one host application.
pub struct SessionManager<P: SessionPayload = ConversationTree> {
    sessions: HashMap<String, SessionEntry<P>>,
    adapter: Option<Arc<dyn PersistenceAdapter>>,
}

impl<P: SessionPayload> std::fmt::Debug for SessionManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("persistence", &self.adapter.is_some())
            .finish()
    }
}

impl<P: SessionPayload> Default for SessionManager<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: SessionPayload> SessionManager<P> {
    /// Create a manager without persistence.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            adapter: None,
        }
    }

    /// Attach a persistence adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Replace the persistence adapter.
    pub fn set_adapter(&mut self, adapter: Option<Arc<dyn PersistenceAdapter>>) {
        self.adapter = adapter;
    }

    /// Whether persistence is configured.
    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    /// Create a session, generating an id when none is given, and build its
    /// payload with `build`.
    pub fn create_session<F>(&mut self, session_id: Option<&str>, build: F) -> AppResult<String>
    where
        F: FnOnce(&str) -> AppResult<P>,
    {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        validate_session_id(&session_id)?;
        if self.sessions.contains_key(&session_id) {
            return Err(SessionError::AlreadyExists { session_id }.into());
        }

        let payload = build(&session_id)?;
        self.insert_session(Session::new(&session_id), payload)?;
        info!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Insert a payload under an existing session record.
    pub fn insert_session(&mut self, session: Session, payload: P) -> AppResult<()> {
        validate_session_id(&session.session_id)?;
        if self.sessions.contains_key(&session.session_id) {
            return Err(SessionError::AlreadyExists {
                session_id: session.session_id,
            }
            .into());
        }
        self.sessions
            .insert(session.session_id.clone(), SessionEntry { session, payload });
        Ok(())
    }

    /// The lifecycle record, without touching it.
    pub fn get_session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id).map(|e| &e.session)
    }

    /// Whether the session exists.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Access a payload, marking the session as used.
    pub fn get(&mut self, session_id: &str) -> Option<&P> {
        self.get_mut(session_id).map(|p| &*p)
    }

    /// Mutable access to a payload, marking the session as used.
    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut P> {
        let entry = self.sessions.get_mut(session_id)?;
        entry.session.last_accessed_at = Utc::now();
        Some(&mut entry.payload)
    }

    /// Like [`get_mut`](Self::get_mut) but fails with `SessionError::NotFound`.
    pub fn require_mut(&mut self, session_id: &str) -> AppResult<&mut P> {
        self.get_mut(session_id).ok_or_else(|| {
            SessionError::NotFound {
                session_id: session_id.to_string(),
            }
            .into()
        })
    }

    /// Drop a session from memory; returns whether it existed.
    pub fn delete_session(&mut self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!(session_id, "Session deleted");
        }
        removed
    }

    /// Every session record, oldest first.
    pub fn list_sessions(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().map(|e| &e.session).collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Read a payload without marking the session as used.
    pub fn peek(&self, session_id: &str) -> Option<&P> {
        self.sessions.get(session_id).map(|e| &e.payload)
    }

    /// Purge sessions idle longer than `max_age`; returns how many were removed.
    pub fn cleanup_expired_sessions(&mut self, max_age: Duration) -> usize {
        self.purge_expired(max_age, None)
    }

    /// Like [`cleanup_expired_sessions`](Self::cleanup_expired_sessions) but
    /// never removes `protected`.
    pub fn cleanup_expired_sessions_except(&mut self, max_age: Duration, protected: &str) -> usize {
        self.purge_expired(max_age, Some(protected))
    }

    fn purge_expired(&mut self, max_age: Duration, protected: Option<&str>) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|id, entry| {
            Some(id.as_str()) == protected || !entry.session.is_expired(max_age, now)
        });
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!(removed, remaining = self.sessions.len(), "Expired sessions purged");
        }
        removed
    }

    /// Session and node counts plus creation-time bounds.
    pub fn get_memory_stats(&self) -> MemoryStats {
        let total_sessions = self.sessions.len();
        let total_nodes: usize = self.sessions.values().map(|e| e.payload.tree().len()).sum();
        MemoryStats {
            total_sessions,
            total_nodes,
            average_nodes_per_session: if total_sessions == 0 {
                0.0
            } else {
                total_nodes as f64 / total_sessions as f64
            },
            oldest_session: self.sessions.values().map(|e| e.session.created_at).min(),
            newest_session: self.sessions.values().map(|e| e.session.created_at).max(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    fn adapter(&self) -> Result<&Arc<dyn PersistenceAdapter>, PersistenceError> {
        self.adapter.as_ref().ok_or(PersistenceError::NotConfigured)
    }

    /// Persist a session's tree.
    pub async fn save_session(&self, session_id: &str) -> AppResult<()> {
        let adapter = self.adapter()?;
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound {
                session_id: session_id.to_string(),
            })?;
        adapter.save(session_id, entry.payload.tree()).await?;
        debug!(session_id, "Session persisted");
        Ok(())
    }

    /// Load a persisted tree, rebuild the payload with `build` and install it,
    /// replacing any in-memory payload. Returns `false` when nothing is stored.
    pub async fn load_session<F>(&mut self, session_id: &str, build: F) -> AppResult<bool>
    where
        F: FnOnce(ConversationTree) -> AppResult<P>,
    {
        validate_session_id(session_id)?;
        let Some(tree) = self.adapter()?.load(session_id).await? else {
            return Ok(false);
        };
        let payload = build(tree)?;

        match self.sessions.get_mut(session_id) {
            Some(entry) => {
                entry.payload = payload;
                entry.session.last_accessed_at = Utc::now();
            }
            None => {
                self.sessions.insert(
                    session_id.to_string(),
                    SessionEntry {
                        session: Session::new(session_id),
                        payload,
                    },
                );
            }
        }
        info!(session_id, "Session loaded");
        Ok(true)
    }

    /// Remove a persisted snapshot; returns whether one existed.
    pub async fn delete_persisted_session(&self, session_id: &str) -> AppResult<bool> {
        Ok(self.adapter()?.delete(session_id).await?)
    }

    /// Ids of every persisted session.
    pub async fn list_persisted_sessions(&self) -> AppResult<Vec<String>> {
        Ok(self.adapter()?.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::TopicNode;
    use crate::storage::InMemoryPersistenceAdapter;
    use mockall::mock;

    fn tree_for(id: &str) -> AppResult<ConversationTree> {
        Ok(ConversationTree::new(id))
    }

    fn stale_session(id: &str, idle: Duration) -> Session {
        let mut session = Session::new(id);
        session.last_accessed_at = Utc::now() - idle;
        session
    }

    #[test]
    fn test_session_metadata_null_round_trips() {
        let session = Session::new("s").with_metadata(serde_json::Value::Null);
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);

        let bare = Session::new("s");
        let restored: Session = serde_json::from_str(&serde_json::to_string(&bare).unwrap()).unwrap();
        assert_eq!(restored.metadata, None);
    }

    #[test]
    fn test_create_session_generates_id() {
        let mut manager: SessionManager = SessionManager::new();
        let id = manager.create_session(None, tree_for).unwrap();
        assert!(validate_session_id(&id).is_ok());
        assert_eq!(manager.get(&id).unwrap().session_id(), id);
    }

    #[test]
    fn test_create_session_rejects_duplicates_and_bad_ids() {
        let mut manager: SessionManager = SessionManager::new();
        manager.create_session(Some("main"), tree_for).unwrap();
        let err = manager.create_session(Some("main"), tree_for).unwrap_err();
        assert!(matches!(err, AppError::Session(SessionError::AlreadyExists { .. })));
        assert!(manager.create_session(Some("../etc"), tree_for).is_err());
    }

    #[test]
    fn test_access_touches_session() {
        let mut manager: SessionManager = SessionManager::new();
        manager
            .insert_session(stale_session("s", Duration::hours(2)), ConversationTree::new("s"))
            .unwrap();
        let before = manager.get_session("s").unwrap().last_accessed_at;

        assert!(manager.get("s").is_some());
        assert!(manager.get_session("s").unwrap().last_accessed_at > before);
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let mut manager: SessionManager = SessionManager::new();
        manager
            .insert_session(stale_session("old", Duration::hours(2)), ConversationTree::new("old"))
            .unwrap();
        manager
            .insert_session(stale_session("fresh", Duration::minutes(1)), ConversationTree::new("fresh"))
            .unwrap();

        assert_eq!(manager.cleanup_expired_sessions(Duration::hours(1)), 1);
        assert!(manager.contains("fresh"));
        assert!(!manager.contains("old"));
    }

    #[test]
    fn test_cleanup_spares_protected_session() {
        let mut manager: SessionManager = SessionManager::new();
        manager
            .insert_session(stale_session("current", Duration::hours(3)), ConversationTree::new("current"))
            .unwrap();
        assert_eq!(
            manager.cleanup_expired_sessions_except(Duration::hours(1), "current"),
            0
        );
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_memory_stats() {
        let mut manager: SessionManager = SessionManager::new();
        assert_eq!(manager.get_memory_stats(), MemoryStats::default());

        manager.create_session(Some("a"), tree_for).unwrap();
        manager
            .create_session(Some("b"), |id| {
                let mut tree = ConversationTree::new(id);
                tree.nodes.insert("n".to_string(), TopicNode::with_id("n", "topic"));
                tree.root_nodes.push("n".to_string());
                Ok(tree)
            })
            .unwrap();

        let stats = manager.get_memory_stats();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.average_nodes_per_session, 0.5);
        assert!(stats.oldest_session <= stats.newest_session);
    }

    #[test]
    fn test_delete_and_list() {
        let mut manager: SessionManager = SessionManager::new();
        manager.create_session(Some("a"), tree_for).unwrap();
        manager.create_session(Some("b"), tree_for).unwrap();
        assert_eq!(manager.list_sessions().len(), 2);

        assert!(manager.delete_session("a"));
        assert!(!manager.delete_session("a"));
        assert_eq!(manager.list_sessions()[0].session_id, "b");
    }

    #[tokio::test]
    async fn test_persistence_requires_adapter() {
        let mut manager: SessionManager = SessionManager::new();
        manager.create_session(Some("a"), tree_for).unwrap();

        let err = manager.save_session("a").await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(PersistenceError::NotConfigured)));
        let err = manager.load_session("a", Ok).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(PersistenceError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let adapter = Arc::new(InMemoryPersistenceAdapter::new());
        let mut manager: SessionManager = SessionManager::new().with_adapter(adapter.clone());
        manager.create_session(Some("a"), tree_for).unwrap();
        manager.save_session("a").await.unwrap();
        assert_eq!(manager.list_persisted_sessions().await.unwrap(), vec!["a"]);

        let mut other: SessionManager = SessionManager::new().with_adapter(adapter);
        assert!(other.load_session("a", Ok).await.unwrap());
        assert!(!other.load_session("missing", Ok).await.unwrap());
        assert_eq!(other.get("a").unwrap().session_id(), "a");

        assert!(other.delete_persisted_session("a").await.unwrap());
        assert!(other.list_persisted_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_unknown_session() {
        let manager: SessionManager =
            SessionManager::new().with_adapter(Arc::new(InMemoryPersistenceAdapter::new()));
        let err = manager.save_session("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::Session(SessionError::NotFound { .. })));
    }

    mock! {
        pub Adapter {}

        #[async_trait::async_trait]
        impl PersistenceAdapter for Adapter {
            async fn save(&self, session_id: &str, tree: &ConversationTree) -> crate::error::PersistenceResult<()>;
            async fn load(&self, session_id: &str) -> crate::error::PersistenceResult<Option<ConversationTree>>;
            async fn delete(&self, session_id: &str) -> crate::error::PersistenceResult<bool>;
            async fn list(&self) -> crate::error::PersistenceResult<Vec<String>>;
            async fn exists(&self, session_id: &str) -> crate::error::PersistenceResult<bool>;
        }
    }

    fn backend_failure(session_id: &str) -> PersistenceError {
        PersistenceError::Backend {
            session_id: session_id.to_string(),
            message: "disk full".to_string(),
        }
    }

    #[tokio::test]
    async fn test_backend_failures_are_propagated() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_save()
            .times(1)
            .returning(|id, _| Err(backend_failure(id)));
        adapter
            .expect_load()
            .times(1)
            .returning(|id| Err(backend_failure(id)));

        let mut manager: SessionManager = SessionManager::new().with_adapter(Arc::new(adapter));
        manager.create_session(Some("a"), tree_for).unwrap();

        let err = manager.save_session("a").await.unwrap_err();
        assert!(err.to_string().contains("disk full"));

        // A failed load leaves the in-memory session in place
        let err = manager.load_session("a", Ok).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(PersistenceError::Backend { .. })));
        assert!(manager.contains("a"));
    }
}
