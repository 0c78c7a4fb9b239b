//! Topic extraction and relationship classification.
//!
//! The [`TopicAnalyzer`] trait is the plug-in point; [`KeywordTopicAnalyzer`]
//! is the default lexical implementation. Which extracted candidate names a
//! node is decided separately by a [`TopicSelector`].

mod keyword;

pub use keyword::KeywordTopicAnalyzer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{QaPair, TopicNode};

/// Topic used when nothing meaningful can be extracted.
pub const DEFAULT_TOPIC: &str = "general discussion";
/// Upper bound on candidate topics returned by extraction.
pub const MAX_TOPIC_CANDIDATES: usize = 3;

/// How a new topic relates to the existing tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Start a new, parentless topic.
    NewRoot,
    /// Attach under the target node.
    ChildOf,
    /// Attach under the target node's parent.
    SiblingOf,
    /// Follow-up on the target node; attached under it.
    Continuation,
}

impl RelationshipType {
    /// Wire name of the relationship.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::NewRoot => "new_root",
            RelationshipType::ChildOf => "child_of",
            RelationshipType::SiblingOf => "sibling_of",
            RelationshipType::Continuation => "continuation",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    /// Target node; `None` only for [`RelationshipType::NewRoot`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_node_id: Option<String>,
    /// Confidence in 0-1.
    pub confidence: f64,
}

impl Relationship {
    /// A new-root classification.
    pub fn new_root(confidence: f64) -> Self {
        Self {
            relationship_type: RelationshipType::NewRoot,
            parent_node_id: None,
            confidence,
        }
    }

    /// A classification targeting an existing node.
    pub fn targeting(relationship_type: RelationshipType, node_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            relationship_type,
            parent_node_id: Some(node_id.into()),
            confidence,
        }
    }
}

/// Extracts topics from exchanges and relates them to existing nodes.
#[async_trait]
pub trait TopicAnalyzer: Send + Sync {
    /// Ordered candidate topics, at most three and never empty.
    async fn extract_topics(&self, qa_pair: &QaPair) -> AppResult<Vec<String>>;

    /// Classify `topic` (extracted from `question`) against `existing_nodes`.
    async fn determine_relationship(
        &self,
        topic: &str,
        question: &str,
        existing_nodes: &[&TopicNode],
    ) -> AppResult<Relationship>;
}

/// Picks the candidate that names a new node.
pub trait TopicSelector: Send + Sync + std::fmt::Debug {
    /// Choose among `candidates`; `None` when the list is empty.
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a str>;
}

/// Takes the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidate;

impl TopicSelector for FirstCandidate {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates.first().map(String::as_str)
    }
}

/// Takes the candidate with the most words, earliest on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestCandidate;

impl TopicSelector for LongestCandidate {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.split_whitespace()
                    .count()
                    .cmp(&b.split_whitespace().count())
                    .then(ib.cmp(ia))
            })
            .map(|(_, c)| c.as_str())
    }
}
