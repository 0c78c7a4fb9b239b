use std::env;
use std::str::FromStr;

use crate::analyzer::MAX_TOPIC_CANDIDATES;
use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub analyzer: AnalyzerConfig,
    pub scoring: ScoringConfig,
    pub sessions: SessionConfig,
    pub validation: ValidationConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Thresholds for the keyword topic analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Minimum similarity for a `child_of` classification.
    pub child_threshold: f64,
    /// Minimum similarity for a `sibling_of` classification.
    pub sibling_threshold: f64,
    /// How recently a node must have been touched to be continued.
    pub recency_window_secs: u64,
    /// Maximum number of candidate topics returned by extraction.
    pub max_topics: usize,
}

/// Scoring engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Primary strategy used by the engine.
    pub strategy: ScoringStrategyKind,
    /// Score returned when every strategy in the chain fails.
    pub neutral_score: f64,
}

/// Built-in primary scoring strategies selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategyKind {
    Composite,
    Quality,
    Complexity,
    Context,
    Base,
    Length,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle time after which a session is eligible for cleanup.
    pub max_age_secs: u64,
}

/// Input screening configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationConfig {
    /// Reject Q&A pairs flagged by the security scanner instead of only logging them.
    pub reject_unsafe_input: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let analyzer_defaults = AnalyzerConfig::default();
        let analyzer = AnalyzerConfig {
            child_threshold: parse_env("ANALYZER_CHILD_THRESHOLD")?
                .unwrap_or(analyzer_defaults.child_threshold),
            sibling_threshold: parse_env("ANALYZER_SIBLING_THRESHOLD")?
                .unwrap_or(analyzer_defaults.sibling_threshold),
            recency_window_secs: parse_env("ANALYZER_RECENCY_WINDOW_SECS")?
                .unwrap_or(analyzer_defaults.recency_window_secs),
            max_topics: analyzer_defaults.max_topics,
        };

        let scoring = ScoringConfig {
            strategy: match env::var("SCORING_STRATEGY") {
                Ok(s) => s.parse().map_err(|message| AppError::Config { message })?,
                Err(_) => ScoringStrategyKind::Composite,
            },
            neutral_score: parse_env("SCORING_NEUTRAL_SCORE")?.unwrap_or(50.0),
        };

        let sessions = SessionConfig {
            max_age_secs: parse_env("SESSION_MAX_AGE_SECS")?.unwrap_or(3600),
        };

        let validation = ValidationConfig {
            reject_unsafe_input: env::var("REJECT_UNSAFE_INPUT")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        };

        let config = Config {
            logging,
            analyzer,
            scoring,
            sessions,
            validation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), AppError> {
        let a = &self.analyzer;
        for (name, value) in [
            ("ANALYZER_CHILD_THRESHOLD", a.child_threshold),
            ("ANALYZER_SIBLING_THRESHOLD", a.sibling_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config {
                    message: format!("{} must be within [0, 1], got {}", name, value),
                });
            }
        }
        if a.sibling_threshold >= a.child_threshold {
            return Err(AppError::Config {
                message: format!(
                    "ANALYZER_SIBLING_THRESHOLD ({}) must be below ANALYZER_CHILD_THRESHOLD ({})",
                    a.sibling_threshold, a.child_threshold
                ),
            });
        }
        if a.max_topics == 0 || a.max_topics > MAX_TOPIC_CANDIDATES {
            return Err(AppError::Config {
                message: format!(
                    "max_topics must be between 1 and {}, got {}",
                    MAX_TOPIC_CANDIDATES, a.max_topics
                ),
            });
        }
        let neutral = self.scoring.neutral_score;
        if !neutral.is_finite() || !(0.0..=100.0).contains(&neutral) {
            return Err(AppError::Config {
                message: format!("SCORING_NEUTRAL_SCORE must be within [0, 100], got {}", neutral),
            });
        }
        Ok(())
    }
}

/// Parse an optional environment variable, failing on malformed values.
fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| AppError::Config {
            message: format!("{} has an invalid value: {}", key, raw),
        }),
        Err(_) => Ok(None),
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            child_threshold: 0.5,
            sibling_threshold: 0.2,
            recency_window_secs: 300,
            max_topics: 3,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategyKind::Composite,
            neutral_score: 50.0,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_age_secs: 3600 }
    }
}

impl ScoringStrategyKind {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStrategyKind::Composite => "composite",
            ScoringStrategyKind::Quality => "quality",
            ScoringStrategyKind::Complexity => "complexity",
            ScoringStrategyKind::Context => "context",
            ScoringStrategyKind::Base => "base",
            ScoringStrategyKind::Length => "length",
        }
    }
}

impl std::fmt::Display for ScoringStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScoringStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "composite" => Ok(ScoringStrategyKind::Composite),
            "quality" => Ok(ScoringStrategyKind::Quality),
            "complexity" => Ok(ScoringStrategyKind::Complexity),
            "context" => Ok(ScoringStrategyKind::Context),
            "base" => Ok(ScoringStrategyKind::Base),
            "length" => Ok(ScoringStrategyKind::Length),
            _ => Err(format!("Unknown scoring strategy: {}", s)),
        }
    }
}
