//! Config environment variable tests
//!
//! These tests verify that Config::from_env() reads and validates environment
//! variable overrides. Tests use #[serial] to prevent race conditions with
//! shared env vars.

use conversation_grader::config::{Config, LogFormat, ScoringStrategyKind};
use conversation_grader::AppError;
use serial_test::serial;
use std::env;

const VARS: &[&str] = &[
    "LOG_LEVEL",
    "LOG_FORMAT",
    "ANALYZER_CHILD_THRESHOLD",
    "ANALYZER_SIBLING_THRESHOLD",
    "ANALYZER_RECENCY_WINDOW_SECS",
    "SCORING_STRATEGY",
    "SCORING_NEUTRAL_SCORE",
    "SESSION_MAX_AGE_SECS",
    "REJECT_UNSAFE_INPUT",
];

fn reset_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_config_from_env_defaults() {
    reset_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.analyzer.child_threshold, 0.5);
    assert_eq!(config.analyzer.sibling_threshold, 0.2);
    assert_eq!(config.analyzer.recency_window_secs, 300);
    assert_eq!(config.scoring.strategy, ScoringStrategyKind::Composite);
    assert_eq!(config.scoring.neutral_score, 50.0);
    assert_eq!(config.sessions.max_age_secs, 3600);
    assert!(!config.validation.reject_unsafe_input);
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    reset_env();
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_custom_analyzer() {
    reset_env();
    env::set_var("ANALYZER_CHILD_THRESHOLD", "0.7");
    env::set_var("ANALYZER_SIBLING_THRESHOLD", "0.3");
    env::set_var("ANALYZER_RECENCY_WINDOW_SECS", "60");

    let config = Config::from_env().unwrap();
    assert_eq!(config.analyzer.child_threshold, 0.7);
    assert_eq!(config.analyzer.sibling_threshold, 0.3);
    assert_eq!(config.analyzer.recency_window_secs, 60);

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_scoring_and_sessions() {
    reset_env();
    env::set_var("SCORING_STRATEGY", "Quality");
    env::set_var("SCORING_NEUTRAL_SCORE", "40");
    env::set_var("SESSION_MAX_AGE_SECS", "120");
    env::set_var("REJECT_UNSAFE_INPUT", "true");

    let config = Config::from_env().unwrap();
    assert_eq!(config.scoring.strategy, ScoringStrategyKind::Quality);
    assert_eq!(config.scoring.neutral_score, 40.0);
    assert_eq!(config.sessions.max_age_secs, 120);
    assert!(config.validation.reject_unsafe_input);

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_rejects_unknown_strategy() {
    reset_env();
    env::set_var("SCORING_STRATEGY", "telepathy");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.to_string().contains("telepathy"));

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_rejects_malformed_number() {
    reset_env();
    env::set_var("SESSION_MAX_AGE_SECS", "an hour");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("SESSION_MAX_AGE_SECS"));

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_rejects_inverted_thresholds() {
    reset_env();
    env::set_var("ANALYZER_CHILD_THRESHOLD", "0.2");
    env::set_var("ANALYZER_SIBLING_THRESHOLD", "0.4");

    assert!(Config::from_env().is_err());

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_rejects_out_of_range_neutral_score() {
    reset_env();
    env::set_var("SCORING_NEUTRAL_SCORE", "150");

    assert!(Config::from_env().is_err());

    reset_env();
}
