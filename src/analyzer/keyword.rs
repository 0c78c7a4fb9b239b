//! Lexical topic analyzer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use super::{Relationship, RelationshipType, TopicAnalyzer, DEFAULT_TOPIC, MAX_TOPIC_CANDIDATES};
use crate::config::AnalyzerConfig;
use crate::error::AppResult;
use crate::models::{QaPair, TopicNode};
use crate::text::{contains_phrase, jaccard_similarity, significant_words};
use crate::validation::MAX_TOPIC_LENGTH;

/// Fixed confidence for continuation classifications.
const CONTINUATION_CONFIDENCE: f64 = 0.8;
/// Significant words kept from the question for the primary topic.
const QUESTION_TOPIC_WORDS: usize = 4;

const CONTINUATION_CUES: &[&str] = &[
    "tell me more",
    "what about",
    "what else",
    "else",
    "additionally",
    "furthermore",
    "moreover",
    "more about",
    "go deeper",
    "elaborate",
    "expand on",
    "continue",
];

/// Keyword-overlap analyzer.
///
/// Topics are built from the significant (stop-word filtered) words of the
/// question, with the answer's most frequent keywords as alternatives.
/// Relationships use Jaccard similarity of significant words against each
/// existing node's topic.
#[derive(Debug, Clone)]
pub struct KeywordTopicAnalyzer {
    config: AnalyzerConfig,
}

impl Default for KeywordTopicAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl KeywordTopicAnalyzer {
    /// Create an analyzer with the given thresholds.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// The active thresholds.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Candidate limit, clamped to `1..=MAX_TOPIC_CANDIDATES`.
    fn topic_limit(&self) -> usize {
        self.config.max_topics.clamp(1, MAX_TOPIC_CANDIDATES)
    }

    fn candidates(&self, qa_pair: &QaPair) -> Vec<String> {
        let limit = self.topic_limit();
        let question_words = significant_words(&qa_pair.question);
        let mut candidates: Vec<String> = Vec::new();

        if !question_words.is_empty() {
            let phrase = question_words
                .iter()
                .take(QUESTION_TOPIC_WORDS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            candidates.push(phrase);
        }

        candidates.extend(top_keywords(&qa_pair.answer, limit));

        if let Some(first) = question_words.first() {
            candidates.push(first.clone());
        }

        let mut unique: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = truncate_topic(&candidate);
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
            if unique.len() >= limit {
                break;
            }
        }
        unique
    }

    fn is_continuation(topic: &str, question: &str) -> bool {
        let text = format!("{} {}", topic, question).to_lowercase();
        CONTINUATION_CUES.iter().any(|cue| contains_phrase(&text, cue))
    }
}

/// Most frequent significant words, earliest occurrence first on ties.
fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let words = significant_words(text);
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, word) in words.iter().enumerate() {
        counts.entry(word.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(w, _)| w.to_string())
        .collect()
}

fn truncate_topic(topic: &str) -> String {
    topic.chars().take(MAX_TOPIC_LENGTH).collect()
}

#[async_trait]
impl TopicAnalyzer for KeywordTopicAnalyzer {
    async fn extract_topics(&self, qa_pair: &QaPair) -> AppResult<Vec<String>> {
        let mut topics = self.candidates(qa_pair);
        if topics.is_empty() {
            topics.push(DEFAULT_TOPIC.to_string());
        }
        debug!(topics = ?topics, "Extracted topics");
        Ok(topics)
    }

    async fn determine_relationship(
        &self,
        topic: &str,
        question: &str,
        existing_nodes: &[&TopicNode],
    ) -> AppResult<Relationship> {
        if existing_nodes.is_empty() {
            return Ok(Relationship::new_root(1.0));
        }

        if Self::is_continuation(topic, question) {
            let window = Duration::seconds(self.config.recency_window_secs as i64);
            let recent = existing_nodes
                .iter()
                .copied()
                .reduce(|best, n| if n.updated_at >= best.updated_at { n } else { best });
            if let Some(node) = recent.filter(|n| Utc::now() - n.updated_at <= window) {
                debug!(target_node = %node.id(), "Continuation of recent topic");
                return Ok(Relationship::targeting(
                    RelationshipType::Continuation,
                    node.id(),
                    CONTINUATION_CONFIDENCE,
                ));
            }
        }

        let mut best: Option<(&TopicNode, f64)> = None;
        for &node in existing_nodes {
            let similarity = jaccard_similarity(topic, &node.topic);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((node, similarity));
            }
        }

        let relationship = match best {
            Some((node, similarity)) if similarity >= self.config.child_threshold => {
                Relationship::targeting(RelationshipType::ChildOf, node.id(), similarity)
            }
            Some((node, similarity)) if similarity >= self.config.sibling_threshold => {
                Relationship::targeting(RelationshipType::SiblingOf, node.id(), similarity)
            }
            Some((_, similarity)) => Relationship::new_root(1.0 - similarity),
            None => Relationship::new_root(1.0),
        };

        debug!(
            topic,
            relationship = %relationship.relationship_type,
            confidence = relationship.confidence,
            "Relationship determined"
        );
        Ok(relationship)
    }
}
