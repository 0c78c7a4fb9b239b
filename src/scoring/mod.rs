//! Pluggable answer scoring.
//!
//! - [`ScoringStrategy`]: single-method async trait for 0-100 scores
//! - [`ScoringEngine`]: primary strategy plus an ordered fallback chain and a
//!   terminal neutral score
//! - Built-in strategies: [`QualityIndicatorStrategy`], [`ComplexityStrategy`],
//!   [`ContextOverlapStrategy`], [`WeightedCompositeStrategy`],
//!   [`BaseScoringStrategy`], [`LengthOnlyStrategy`]

mod engine;
mod strategies;

pub use engine::*;
pub use strategies::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScoringResult;
use crate::models::{QaPair, TopicNode};

/// Inputs a strategy may use besides the Q&A pair itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringContext {
    /// Snapshot of the node the pair is filed under.
    pub current_topic: TopicNode,
    /// Earlier exchanges, oldest first.
    pub conversation_history: Vec<QaPair>,
    /// Depth of the current topic (1 for roots).
    pub topic_depth: u32,
}

impl ScoringContext {
    /// Build a context whose depth is taken from the topic node.
    pub fn new(current_topic: TopicNode, conversation_history: Vec<QaPair>) -> Self {
        let topic_depth = current_topic.depth.max(1);
        Self {
            current_topic,
            conversation_history,
            topic_depth,
        }
    }
}

/// A stateless algorithm mapping a Q&A pair and its context to a 0-100 score.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    /// Short identifier used in logs and score provenance.
    fn name(&self) -> &'static str;

    /// Score the pair. Errors and non-finite values make the engine fall back.
    async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> ScoringResult<f64>;
}
