//! Scoring engine with an explicit degradation chain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::strategies::{strategy_for, BaseScoringStrategy, LengthOnlyStrategy, WeightedCompositeStrategy};
use super::{ScoringContext, ScoringStrategy};
use crate::config::ScoringConfig;
use crate::error::{AppResult, ScoringError, ScoringResult, ValidationError};
use crate::models::QaPair;
use crate::validation::{safe_error_message, validate_qa_pair, validate_score, validate_scoring_context};

/// Which tier of the chain produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    /// The configured primary strategy.
    Primary,
    /// A fallback strategy, by position in the chain.
    Fallback(usize),
    /// Every strategy failed.
    Neutral,
}

/// A score together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// Score in 0-100.
    pub score: f64,
    /// Name of the strategy that produced it, or "neutral".
    pub strategy: String,
    /// Tier of the chain that produced it.
    pub tier: ScoreTier,
}

/// Runs the primary strategy, degrades through the fallback list, and ends
/// with a fixed neutral score.
#[derive(Clone)]
pub struct ScoringEngine {
    primary: Arc<dyn ScoringStrategy>,
    fallbacks: Vec<Arc<dyn ScoringStrategy>>,
    neutral_score: f64,
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("primary", &self.primary.name())
            .field(
                "fallbacks",
                &self.fallbacks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("neutral_score", &self.neutral_score)
            .finish()
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(Arc::new(WeightedCompositeStrategy::default()))
    }
}

impl ScoringEngine {
    /// Neutral score used when no other is configured.
    pub const DEFAULT_NEUTRAL_SCORE: f64 = 50.0;

    /// Create an engine with the default fallback chain
    /// (base heuristic, then length-only).
    pub fn new(primary: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            primary,
            fallbacks: vec![
                Arc::new(BaseScoringStrategy) as Arc<dyn ScoringStrategy>,
                Arc::new(LengthOnlyStrategy),
            ],
            neutral_score: Self::DEFAULT_NEUTRAL_SCORE,
        }
    }

    /// Create an engine from configuration.
    pub fn from_config(config: &ScoringConfig) -> AppResult<Self> {
        Ok(Self::new(strategy_for(config.strategy)).with_neutral_score(config.neutral_score)?)
    }

    /// Replace the fallback chain (tried in order).
    pub fn with_fallbacks(mut self, fallbacks: Vec<Arc<dyn ScoringStrategy>>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Set the terminal neutral score.
    pub fn with_neutral_score(mut self, score: f64) -> Result<Self, ValidationError> {
        validate_score(score).map_err(|e| ValidationError::new("neutral_score", &e.value, e.reason))?;
        self.neutral_score = score;
        Ok(self)
    }

    /// Swap the primary strategy.
    pub fn set_strategy(&mut self, strategy: Arc<dyn ScoringStrategy>) -> Result<(), ValidationError> {
        let name = strategy.name();
        if name.trim().is_empty() {
            return Err(ValidationError::new(
                "strategy",
                name,
                "must expose a non-empty name",
            ));
        }
        debug!(from = self.primary.name(), to = name, "Scoring strategy replaced");
        self.primary = strategy;
        Ok(())
    }

    /// Name of the primary strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Names of the fallback strategies, in order.
    pub fn fallback_names(&self) -> Vec<&'static str> {
        self.fallbacks.iter().map(|s| s.name()).collect()
    }

    /// The terminal neutral score.
    pub fn neutral_score(&self) -> f64 {
        self.neutral_score
    }

    /// Score a pair; always within 0-100 once the inputs validate.
    pub async fn calculate_score(&self, qa_pair: &QaPair, context: &ScoringContext) -> AppResult<f64> {
        Ok(self.calculate_score_detailed(qa_pair, context).await?.score)
    }

    /// Score a pair and report which tier produced the value.
    pub async fn calculate_score_detailed(
        &self,
        qa_pair: &QaPair,
        context: &ScoringContext,
    ) -> AppResult<ScoreOutcome> {
        validate_qa_pair(qa_pair)?;
        validate_scoring_context(context)?;

        match attempt(self.primary.as_ref(), qa_pair, context).await {
            Ok(score) => {
                return Ok(ScoreOutcome {
                    score,
                    strategy: self.primary.name().to_string(),
                    tier: ScoreTier::Primary,
                })
            }
            Err(e) => warn!(
                strategy = self.primary.name(),
                error = %safe_error_message(&e),
                "Primary scoring strategy failed, falling back"
            ),
        }

        for (index, fallback) in self.fallbacks.iter().enumerate() {
            match attempt(fallback.as_ref(), qa_pair, context).await {
                Ok(score) => {
                    debug!(strategy = fallback.name(), score, "Fallback strategy produced score");
                    return Ok(ScoreOutcome {
                        score,
                        strategy: fallback.name().to_string(),
                        tier: ScoreTier::Fallback(index),
                    });
                }
                Err(e) => warn!(
                    strategy = fallback.name(),
                    tier = index,
                    error = %safe_error_message(&e),
                    "Fallback scoring strategy failed"
                ),
            }
        }

        warn!(
            neutral_score = self.neutral_score,
            "All scoring strategies failed, returning neutral score"
        );
        Ok(ScoreOutcome {
            score: self.neutral_score,
            strategy: "neutral".to_string(),
            tier: ScoreTier::Neutral,
        })
    }
}

async fn attempt(
    strategy: &dyn ScoringStrategy,
    qa_pair: &QaPair,
    context: &ScoringContext,
) -> ScoringResult<f64> {
    let score = strategy.calculate_score(qa_pair, context).await?;
    if !score.is_finite() {
        return Err(ScoringError::NonFinite {
            strategy: strategy.name().to_string(),
        });
    }
    Ok(score.clamp(0.0, 100.0))
}
