//! Persistence layer for conversation tree snapshots.
//!
//! This module defines the [`PersistenceAdapter`] trait and a reference
//! in-memory implementation that stores each tree as a JSON document.

mod memory;

pub use memory::InMemoryPersistenceAdapter;

use async_trait::async_trait;

use crate::error::PersistenceResult;
use crate::models::ConversationTree;

/// Durable storage for conversation trees, keyed by session id.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Store a snapshot, replacing any previous one.
    async fn save(&self, session_id: &str, tree: &ConversationTree) -> PersistenceResult<()>;

    /// Load a snapshot; `None` when nothing is stored for the session.
    async fn load(&self, session_id: &str) -> PersistenceResult<Option<ConversationTree>>;

    /// Remove a snapshot; returns whether one existed.
    async fn delete(&self, session_id: &str) -> PersistenceResult<bool>;

    /// Ids of every stored session, sorted.
    async fn list(&self) -> PersistenceResult<Vec<String>>;

    /// Whether a snapshot exists for the session.
    async fn exists(&self, session_id: &str) -> PersistenceResult<bool>;
}
