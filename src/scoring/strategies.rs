//! Built-in scoring strategies.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ScoringContext, ScoringStrategy};
use crate::config::ScoringStrategyKind;
use crate::error::{ScoringError, ScoringResult};
use crate::models::QaPair;
use crate::text::{contains_phrase, sentence_count, significant_set, tokenize, word_count};

/// Number of trailing history entries the context strategy compares against.
const CONTINUITY_WINDOW: usize = 5;

const EXAMPLE_MARKERS: &[&str] = &["for example", "for instance", "such as", "e.g", "consider"];
const REASONING_MARKERS: &[&str] = &[
    "because",
    "therefore",
    "since",
    "as a result",
    "which means",
    "so that",
    "consequently",
];
const HEDGE_MARKERS: &[&str] = &["i don't know", "not sure", "no idea", "maybe", "i guess"];

/// Build the strategy selected in configuration.
pub fn strategy_for(kind: ScoringStrategyKind) -> Arc<dyn ScoringStrategy> {
    match kind {
        ScoringStrategyKind::Composite => Arc::new(WeightedCompositeStrategy::default()),
        ScoringStrategyKind::Quality => Arc::new(QualityIndicatorStrategy),
        ScoringStrategyKind::Complexity => Arc::new(ComplexityStrategy),
        ScoringStrategyKind::Context => Arc::new(ContextOverlapStrategy),
        ScoringStrategyKind::Base => Arc::new(BaseScoringStrategy),
        ScoringStrategyKind::Length => Arc::new(LengthOnlyStrategy),
    }
}

fn ratio(value: f64, full: f64) -> f64 {
    (value / full).min(1.0)
}

fn mentions_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| contains_phrase(text, m))
}

fn has_structure(answer: &str) -> bool {
    answer.contains("\n\n")
        || answer.lines().any(|line| {
            let line = line.trim_start();
            line.starts_with("- ")
                || line.starts_with("* ")
                || line
                    .split_once(['.', ')'])
                    .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
}

// ============================================================================
// Quality indicators
// ============================================================================

/// Rewards examples, reasoning, structure, concrete figures and length;
/// penalizes short hedging answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityIndicatorStrategy;

#[async_trait]
impl ScoringStrategy for QualityIndicatorStrategy {
    fn name(&self) -> &'static str {
        "quality"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, _context: &ScoringContext) -> ScoringResult<f64> {
        let answer = qa_pair.answer.as_str();
        let words = word_count(answer);
        let mut score = 30.0;

        if mentions_any(answer, EXAMPLE_MARKERS) {
            score += 15.0;
        }
        if mentions_any(answer, REASONING_MARKERS) {
            score += 15.0;
        }
        if has_structure(answer) {
            score += 10.0;
        }
        if answer.chars().any(|c| c.is_ascii_digit()) {
            score += 10.0;
        }
        score += ratio(words as f64, 150.0) * 20.0;

        if words <= 8 && mentions_any(answer, HEDGE_MARKERS) {
            score -= 20.0;
        }

        Ok(score.clamp(0.0, 100.0))
    }
}

// ============================================================================
// Complexity
// ============================================================================

/// Lexical diversity, word length, sentence count and topic depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityStrategy;

#[async_trait]
impl ScoringStrategy for ComplexityStrategy {
    fn name(&self) -> &'static str {
        "complexity"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> ScoringResult<f64> {
        let tokens = tokenize(&qa_pair.answer);
        if tokens.is_empty() {
            return Err(ScoringError::Strategy {
                strategy: self.name().to_string(),
                message: "answer contains no words".to_string(),
            });
        }

        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let diversity = unique.len() as f64 / tokens.len() as f64;
        let avg_len =
            tokens.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / tokens.len() as f64;
        let sentences = sentence_count(&qa_pair.answer) as f64;

        let score = diversity * 35.0
            + ratio(avg_len, 8.0) * 25.0
            + ratio(sentences, 5.0) * 20.0
            + ratio(context.topic_depth as f64, 5.0) * 20.0;
        Ok(score.clamp(0.0, 100.0))
    }
}

// ============================================================================
// Context overlap
// ============================================================================

/// Relevance to the question and topic plus continuity with recent history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOverlapStrategy;

#[async_trait]
impl ScoringStrategy for ContextOverlapStrategy {
    fn name(&self) -> &'static str {
        "context"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> ScoringResult<f64> {
        let answer = significant_set(&qa_pair.answer);
        if answer.is_empty() {
            return Err(ScoringError::Strategy {
                strategy: self.name().to_string(),
                message: "answer has no significant words".to_string(),
            });
        }

        let mut prompt = significant_set(&qa_pair.question);
        prompt.extend(significant_set(&context.current_topic.topic));
        let relevance = if prompt.is_empty() {
            0.0
        } else {
            prompt.intersection(&answer).count() as f64 / prompt.len() as f64
        };

        let skip = context.conversation_history.len().saturating_sub(CONTINUITY_WINDOW);
        let history: HashSet<String> = context.conversation_history[skip..]
            .iter()
            .flat_map(|qa| significant_set(&format!("{} {}", qa.question, qa.answer)))
            .collect();
        let continuity = if history.is_empty() {
            0.5
        } else {
            answer.intersection(&history).count() as f64 / answer.len() as f64
        };

        Ok((20.0 + relevance * 50.0 + continuity * 30.0).clamp(0.0, 100.0))
    }
}

// ============================================================================
// Weighted composite
// ============================================================================

/// Weighted mean over component strategies; failing components are skipped
/// and the remaining weights renormalized.
#[derive(Clone)]
pub struct WeightedCompositeStrategy {
    components: Vec<(Arc<dyn ScoringStrategy>, f64)>,
}

impl std::fmt::Debug for WeightedCompositeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.components.iter().map(|(s, w)| (s.name(), w)))
            .finish()
    }
}

impl Default for WeightedCompositeStrategy {
    fn default() -> Self {
        let components: Vec<(Arc<dyn ScoringStrategy>, f64)> = vec![
            (Arc::new(QualityIndicatorStrategy) as Arc<dyn ScoringStrategy>, 0.4),
            (Arc::new(ComplexityStrategy), 0.3),
            (Arc::new(ContextOverlapStrategy), 0.3),
        ];
        Self::new(components)
    }
}

impl WeightedCompositeStrategy {
    /// Create a composite; non-positive or non-finite weights are dropped.
    pub fn new(components: Vec<(Arc<dyn ScoringStrategy>, f64)>) -> Self {
        Self {
            components: components
                .into_iter()
                .filter(|(_, w)| w.is_finite() && *w > 0.0)
                .collect(),
        }
    }
}

#[async_trait]
impl ScoringStrategy for WeightedCompositeStrategy {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> ScoringResult<f64> {
        let mut total = 0.0;
        let mut weight_sum = 0.0;

        for (strategy, weight) in &self.components {
            match strategy.calculate_score(qa_pair, context).await {
                Ok(score) if score.is_finite() => {
                    total += score.clamp(0.0, 100.0) * weight;
                    weight_sum += weight;
                }
                Ok(_) => debug!(component = strategy.name(), "Skipping non-finite component score"),
                Err(e) => debug!(component = strategy.name(), error = %e, "Skipping failed component"),
            }
        }

        if weight_sum == 0.0 {
            return Err(ScoringError::Strategy {
                strategy: self.name().to_string(),
                message: "every component strategy failed".to_string(),
            });
        }
        Ok(total / weight_sum)
    }
}

// ============================================================================
// Fallback heuristics
// ============================================================================

/// Answer length (up to 70) plus a depth bonus (up to 30).
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseScoringStrategy;

#[async_trait]
impl ScoringStrategy for BaseScoringStrategy {
    fn name(&self) -> &'static str {
        "base"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> ScoringResult<f64> {
        let length = ratio(word_count(&qa_pair.answer) as f64, 100.0) * 70.0;
        let depth = (context.topic_depth.saturating_sub(1) as f64 * 10.0).min(30.0);
        Ok(length + depth)
    }
}

/// One point per five answer characters, capped at 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthOnlyStrategy;

#[async_trait]
impl ScoringStrategy for LengthOnlyStrategy {
    fn name(&self) -> &'static str {
        "length"
    }

    async fn calculate_score(&self, qa_pair: &QaPair, _context: &ScoringContext) -> ScoringResult<f64> {
        Ok((qa_pair.answer.chars().count() as f64 / 5.0).min(100.0))
    }
}
