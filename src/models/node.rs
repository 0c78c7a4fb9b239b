//! Topic node and Q&A pair types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidationError};

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaPair {
    /// The question asked.
    pub question: String,
    /// The answer given.
    pub answer: String,
    /// When the exchange happened.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Optional free-form metadata.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub metadata: Option<serde_json::Value>,
}

/// Reads a present key as `Some`, so an explicit `null` survives a round trip.
pub(crate) fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl QaPair {
    /// Create a new Q&A pair stamped with the current time.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Exploration bookkeeping attached to a topic node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Exchanges recorded under this topic, oldest first.
    pub qa_pairs: Vec<QaPair>,
    /// How many times the topic has been visited.
    pub visit_count: u32,
    /// When the topic was last visited.
    pub last_visited: Option<DateTime<Utc>>,
    /// Whether the topic has been fully explored.
    pub is_exhausted: bool,
}

/// A vertex in the conversation topic tree.
///
/// Structural fields (`parent_topic`, `children`, `depth`) are maintained by
/// [`ConversationTree`](super::ConversationTree) and the tree manager; the
/// methods here only touch local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNode {
    id: String,
    /// Topic label.
    pub topic: String,
    /// Parent node id, `None` for roots.
    pub parent_topic: Option<String>,
    /// Child node ids in insertion order.
    pub children: Vec<String>,
    /// Depth in the tree, roots are at depth 1.
    pub depth: u32,
    /// Quality score (0-100).
    pub score: Option<f64>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last modified.
    pub updated_at: DateTime<Utc>,
    /// Exploration bookkeeping.
    pub metadata: NodeMetadata,
}

impl TopicNode {
    /// Create a new root-level node with a generated id.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), topic)
    }

    /// Create a new root-level node with an explicit id.
    pub fn with_id(id: impl Into<String>, topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            topic: topic.into(),
            parent_topic: None,
            children: Vec::new(),
            depth: 1,
            score: None,
            created_at: now,
            updated_at: now,
            metadata: NodeMetadata::default(),
        }
    }

    /// Set the parent id (the manager wires the link on insertion)
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_topic = Some(parent_id.into());
        self
    }

    /// Set the score, clamped to 0-100
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score.clamp(0.0, 100.0));
        self
    }

    /// Record an initial Q&A pair
    pub fn with_qa_pair(mut self, qa_pair: QaPair) -> Self {
        self.metadata.qa_pairs.push(qa_pair);
        self
    }

    /// The node id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_topic.is_none()
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the node was never visited and is not exhausted.
    pub fn is_unvisited(&self) -> bool {
        self.metadata.visit_count == 0 && !self.metadata.is_exhausted
    }

    /// Append a Q&A pair.
    pub fn add_qa_pair(&mut self, qa_pair: QaPair) {
        self.metadata.qa_pairs.push(qa_pair);
        self.touch();
    }

    /// Increment the visit count and stamp the visit time.
    pub fn mark_as_visited(&mut self) {
        let now = Utc::now();
        self.metadata.visit_count = self.metadata.visit_count.saturating_add(1);
        self.metadata.last_visited = Some(now);
        self.updated_at = now;
    }

    /// Flag the topic as fully explored.
    pub fn mark_as_exhausted(&mut self) {
        self.metadata.is_exhausted = true;
        self.touch();
    }

    /// Set the score; rejects non-finite values and values outside 0-100.
    pub fn update_score(&mut self, score: f64) -> AppResult<()> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(ValidationError::new("score", score.to_string(), "must be between 0 and 100").into());
        }
        self.score = Some(score);
        self.touch();
        Ok(())
    }

    /// Remove the score.
    pub fn clear_score(&mut self) {
        self.score = None;
        self.touch();
    }

    /// Whether a score has been assigned.
    pub fn has_score(&self) -> bool {
        self.score.is_some()
    }

    /// Serialize to a plain JSON object.
    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| AppError::Internal {
            message: format!("Failed to serialize node {}: {}", self.id, e),
        })
    }

    /// Deserialize from a plain JSON object.
    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        serde_json::from_value(value).map_err(|e| AppError::Internal {
            message: format!("Failed to deserialize node: {}", e),
        })
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a child id; duplicates are ignored.
    pub(crate) fn push_child(&mut self, child_id: &str) -> bool {
        if self.children.iter().any(|c| c == child_id) {
            return false;
        }
        self.children.push(child_id.to_string());
        self.touch();
        true
    }

    /// Remove a child id if present.
    pub(crate) fn remove_child_id(&mut self, child_id: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != child_id);
        let removed = self.children.len() != before;
        if removed {
            self.touch();
        }
        removed
    }
}
