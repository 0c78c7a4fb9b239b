//! Multi-session grading façade.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::system::ConversationGradingSystem;
use crate::analyzer::{FirstCandidate, KeywordTopicAnalyzer, TopicAnalyzer, TopicSelector};
use crate::config::{Config, ValidationConfig};
use crate::error::{AppResult, SessionError};
use crate::models::{ConversationTree, QaPair, TopicNode};
use crate::scoring::ScoringEngine;
use crate::session::{MemoryStats, Session, SessionManager};
use crate::storage::PersistenceAdapter;
use crate::tree::TreeStats;

/// Per-session statistics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub stats: TreeStats,
}

/// Components shared by every session's grading system.
#[derive(Clone)]
struct SystemTemplate {
    analyzer: Arc<dyn TopicAnalyzer>,
    engine: ScoringEngine,
    selector: Arc<dyn TopicSelector>,
    validation: ValidationConfig,
}

impl SystemTemplate {
    fn wire(&self, system: ConversationGradingSystem) -> ConversationGradingSystem {
        system
            .with_analyzer(self.analyzer.clone())
            .with_scoring_engine(self.engine.clone())
            .with_topic_selector(self.selector.clone())
            .with_validation_config(self.validation.clone())
    }

    fn build(&self, session_id: &str) -> AppResult<ConversationGradingSystem> {
        Ok(self.wire(ConversationGradingSystem::new(session_id)?))
    }

    fn resume(&self, tree: ConversationTree) -> AppResult<ConversationGradingSystem> {
        Ok(self.wire(ConversationGradingSystem::from_tree(tree)?))
    }
}

/// Grades many conversations, one of which is active at a time.
///
/// Single-session calls are delegated to the active session. The first
/// session created becomes active; the active session can be neither
/// deleted nor purged by expiry.
pub struct GradingSystemWithSessions {
    sessions: SessionManager<ConversationGradingSystem>,
    current: Option<String>,
    template: SystemTemplate,
    max_session_age: Duration,
}

impl std::fmt::Debug for GradingSystemWithSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingSystemWithSessions")
            .field("sessions", &self.sessions)
            .field("current", &self.current)
            .field("engine", &self.template.engine)
            .finish()
    }
}

impl Default for GradingSystemWithSessions {
    fn default() -> Self {
        Self {
            sessions: SessionManager::new(),
            current: None,
            template: SystemTemplate {
                analyzer: Arc::new(KeywordTopicAnalyzer::default()),
                engine: ScoringEngine::default(),
                selector: Arc::new(FirstCandidate),
                validation: ValidationConfig::default(),
            },
            max_session_age: Duration::seconds(3600),
        }
    }
}

impl GradingSystemWithSessions {
    /// Create a façade with default components and no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a façade wired from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut system = Self::default()
            .with_analyzer(Arc::new(KeywordTopicAnalyzer::new(config.analyzer.clone())))
            .with_scoring_engine(ScoringEngine::from_config(&config.scoring)?);
        system.template.validation = config.validation.clone();
        system.max_session_age = Duration::seconds(config.sessions.max_age_secs as i64);
        Ok(system)
    }

    /// Attach a persistence adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.sessions.set_adapter(Some(adapter));
        self
    }

    /// Analyzer used by sessions created from now on.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn TopicAnalyzer>) -> Self {
        self.template.analyzer = analyzer;
        self
    }

    /// Scoring engine used by sessions created from now on.
    pub fn with_scoring_engine(mut self, engine: ScoringEngine) -> Self {
        self.template.engine = engine;
        self
    }

    /// Topic selector used by sessions created from now on.
    pub fn with_topic_selector(mut self, selector: Arc<dyn TopicSelector>) -> Self {
        self.template.selector = selector;
        self
    }

    /// Idle time used by [`cleanup_stale_sessions`](Self::cleanup_stale_sessions).
    pub fn max_session_age(&self) -> Duration {
        self.max_session_age
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Create a session; the first one becomes active.
    pub fn create_session(&mut self, session_id: Option<&str>) -> AppResult<String> {
        let template = &self.template;
        let id = self
            .sessions
            .create_session(session_id, |id| template.build(id))?;
        if self.current.is_none() {
            self.current = Some(id.clone());
            info!(session_id = %id, "Active session set");
        }
        Ok(id)
    }

    /// Make another session active.
    pub fn switch_session(&mut self, session_id: &str) -> AppResult<()> {
        self.sessions.require_mut(session_id)?;
        self.current = Some(session_id.to_string());
        info!(session_id, "Switched active session");
        Ok(())
    }

    /// Id of the active session.
    pub fn current_session_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Delete a session that is not active.
    pub fn delete_session(&mut self, session_id: &str) -> AppResult<()> {
        if self.current.as_deref() == Some(session_id) {
            return Err(SessionError::ActiveSessionDeletion {
                session_id: session_id.to_string(),
            }
            .into());
        }
        if !self.sessions.delete_session(session_id) {
            return Err(SessionError::NotFound {
                session_id: session_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Every session record, oldest first.
    pub fn list_sessions(&self) -> Vec<&Session> {
        self.sessions.list_sessions()
    }

    /// The active grading system.
    pub fn current(&mut self) -> AppResult<&mut ConversationGradingSystem> {
        let id = self.current.as_deref().ok_or(SessionError::NoActiveSession)?;
        self.sessions.require_mut(id)
    }

    /// A specific session's grading system.
    pub fn session(&mut self, session_id: &str) -> AppResult<&mut ConversationGradingSystem> {
        self.sessions.require_mut(session_id)
    }

    /// Purge idle sessions other than the active one; returns how many were removed.
    pub fn cleanup_expired_sessions(&mut self, max_age: Duration) -> usize {
        match self.current.as_deref() {
            Some(current) => self.sessions.cleanup_expired_sessions_except(max_age, current),
            None => self.sessions.cleanup_expired_sessions(max_age),
        }
    }

    /// [`cleanup_expired_sessions`](Self::cleanup_expired_sessions) with the configured age.
    pub fn cleanup_stale_sessions(&mut self) -> usize {
        self.cleanup_expired_sessions(self.max_session_age)
    }

    /// Memory usage across sessions.
    pub fn get_memory_stats(&self) -> MemoryStats {
        self.sessions.get_memory_stats()
    }

    /// Tree statistics of every session, oldest first.
    pub fn get_all_sessions_stats(&self) -> Vec<SessionStats> {
        self.sessions
            .list_sessions()
            .into_iter()
            .filter_map(|session| {
                let system = self.sessions.peek(&session.session_id)?;
                Some(SessionStats {
                    session_id: session.session_id.clone(),
                    is_current: self.current.as_deref() == Some(session.session_id.as_str()),
                    created_at: session.created_at,
                    last_accessed_at: session.last_accessed_at,
                    stats: system.get_stats(),
                })
            })
            .collect()
    }

    /// Release every session and the active pointer.
    pub fn dispose(&mut self) {
        let released = self.sessions.len();
        self.sessions.clear();
        self.current = None;
        info!(released, "Sessions disposed");
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist a session, the active one when `session_id` is `None`.
    pub async fn save_session(&self, session_id: Option<&str>) -> AppResult<()> {
        let id = match session_id {
            Some(id) => id,
            None => self.current.as_deref().ok_or(SessionError::NoActiveSession)?,
        };
        self.sessions.save_session(id).await
    }

    /// Load a persisted session; it becomes active if none is. Returns
    /// `false` when nothing is stored.
    pub async fn load_session(&mut self, session_id: &str) -> AppResult<bool> {
        let template = self.template.clone();
        let loaded = self
            .sessions
            .load_session(session_id, |tree| template.resume(tree))
            .await?;
        if loaded && self.current.is_none() {
            self.current = Some(session_id.to_string());
        }
        Ok(loaded)
    }

    /// Ids of every persisted session.
    pub async fn list_persisted_sessions(&self) -> AppResult<Vec<String>> {
        self.sessions.list_persisted_sessions().await
    }

    // ========================================================================
    // Delegation to the active session
    // ========================================================================

    /// Record an exchange in the active session.
    pub async fn add_qa_pair(&mut self, qa_pair: QaPair, score_override: Option<f64>) -> AppResult<String> {
        self.current()?.add_qa_pair(qa_pair, score_override).await
    }

    /// Deepest unvisited topic of the active session.
    pub fn get_deepest_unvisited_branch(&mut self) -> AppResult<Option<&TopicNode>> {
        Ok(self.current()?.get_deepest_unvisited_branch())
    }

    /// Current topic of the active session.
    pub fn get_current_topic(&mut self) -> AppResult<Option<&TopicNode>> {
        Ok(self.current()?.get_current_topic())
    }

    /// Depth of a node in the active session.
    pub fn get_depth_from_root(&mut self, node_id: &str) -> AppResult<u32> {
        self.current()?.get_depth_from_root(node_id)
    }

    /// Record a visit in the active session.
    pub fn mark_topic_as_visited(&mut self, node_id: &str) -> AppResult<()> {
        self.current()?.mark_topic_as_visited(node_id)
    }

    /// Flag a topic of the active session as exhausted.
    pub fn mark_topic_as_exhausted(&mut self, node_id: &str) -> AppResult<()> {
        self.current()?.mark_topic_as_exhausted(node_id)
    }

    /// Tree statistics of the active session.
    pub fn get_stats(&mut self) -> AppResult<TreeStats> {
        Ok(self.current()?.get_stats())
    }

    /// Clear the active session's tree.
    pub fn clear(&mut self) -> AppResult<()> {
        self.current()?.clear();
        Ok(())
    }
}
