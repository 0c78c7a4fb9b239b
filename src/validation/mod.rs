//! Input validation, sanitization and log-safe error formatting.
//!
//! Validators fail eagerly with a [`ValidationError`] naming the field, the
//! offending value and the violated constraint. Structural checks over a
//! whole tree live in [`integrity`], and injection heuristics in [`security`].

mod integrity;
mod security;

pub use integrity::validate_tree_integrity;
pub use security::{scan_for_security_issues, SecurityIssue, SecurityIssueKind, SecurityReport};

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::models::{QaPair, TopicNode};
use crate::scoring::ScoringContext;

/// Maximum question length in characters.
pub const MAX_QUESTION_LENGTH: usize = 10_000;
/// Maximum answer length in characters.
pub const MAX_ANSWER_LENGTH: usize = 50_000;
/// Maximum node id length.
pub const MAX_NODE_ID_LENGTH: usize = 128;
/// Maximum topic name length.
pub const MAX_TOPIC_LENGTH: usize = 200;
/// Maximum session id length.
pub const MAX_SESSION_ID_LENGTH: usize = 128;
/// Maximum number of history entries accepted in a scoring context.
pub const MAX_HISTORY_ENTRIES: usize = 10_000;

/// Validate a Q&A pair: both sides non-blank and within length bounds.
pub fn validate_qa_pair(qa: &QaPair) -> Result<(), ValidationError> {
    validate_text("question", &qa.question, MAX_QUESTION_LENGTH)?;
    validate_text("answer", &qa.answer, MAX_ANSWER_LENGTH)
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, value, "cannot be empty"));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            field,
            value,
            format!("exceeds maximum length of {} characters ({})", max_len, len),
        ));
    }
    Ok(())
}

/// Validate a node id: 1-128 characters of `[A-Za-z0-9_-]`.
pub fn validate_node_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier("node_id", id, MAX_NODE_ID_LENGTH)
}

/// Validate a session id: 1-128 characters of `[A-Za-z0-9_-]`.
pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier("session_id", id, MAX_SESSION_ID_LENGTH)
}

fn validate_identifier(field: &str, id: &str, max_len: usize) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new(field, id, "cannot be empty"));
    }
    if id.len() > max_len {
        return Err(ValidationError::new(
            field,
            id,
            format!("exceeds maximum length of {} characters", max_len),
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new(
            field,
            id,
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// Validate a topic name: non-blank and at most 200 characters.
pub fn validate_topic_name(topic: &str) -> Result<(), ValidationError> {
    validate_text("topic", topic, MAX_TOPIC_LENGTH)
}

/// Validate a score: finite and within 0-100.
pub fn validate_score(score: f64) -> Result<(), ValidationError> {
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(ValidationError::new(
            "score",
            score.to_string(),
            "must be a number between 0 and 100",
        ));
    }
    Ok(())
}

/// Validate a topic node's local fields.
pub fn validate_topic_node(node: &TopicNode) -> Result<(), ValidationError> {
    validate_node_id(node.id())?;
    validate_topic_name(&node.topic)?;
    if node.depth == 0 {
        return Err(ValidationError::new("depth", "0", "must be at least 1"));
    }
    if let Some(score) = node.score {
        validate_score(score)?;
    }
    if let Some(parent) = node.parent_topic.as_deref() {
        validate_node_id(parent).map_err(|e| ValidationError::new("parent_topic", parent, e.reason))?;
    }
    Ok(())
}

/// Validate a scoring context.
pub fn validate_scoring_context(ctx: &ScoringContext) -> Result<(), ValidationError> {
    validate_topic_node(&ctx.current_topic)?;
    if ctx.topic_depth == 0 {
        return Err(ValidationError::new("topic_depth", "0", "must be at least 1"));
    }
    if ctx.conversation_history.len() > MAX_HISTORY_ENTRIES {
        return Err(ValidationError::new(
            "conversation_history",
            ctx.conversation_history.len().to_string(),
            format!("exceeds maximum of {} entries", MAX_HISTORY_ENTRIES),
        ));
    }
    for qa in &ctx.conversation_history {
        validate_qa_pair(qa)?;
    }
    Ok(())
}

/// Strip control characters, keeping newlines and tabs.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Sanitize both sides of a Q&A pair and trim surrounding whitespace.
pub fn sanitize_qa_pair(qa: &QaPair) -> QaPair {
    QaPair {
        question: sanitize_string(&qa.question).trim().to_string(),
        answer: sanitize_string(&qa.answer).trim().to_string(),
        timestamp: qa.timestamp,
        metadata: qa.metadata.clone(),
    }
}

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("valid regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"));

static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").expect("valid regex"));

/// Redact timestamps, emails, SSNs and card numbers from a message.
pub fn redact_sensitive(message: &str) -> String {
    let redacted = TIMESTAMP_RE.replace_all(message, "[TIMESTAMP]");
    let redacted = EMAIL_RE.replace_all(&redacted, "[EMAIL]");
    let redacted = SSN_RE.replace_all(&redacted, "[SSN]");
    CARD_RE.replace_all(&redacted, "[CARD]").into_owned()
}

/// Render an error for logging with sensitive values redacted.
pub fn safe_error_message(err: &dyn std::fmt::Display) -> String {
    redact_sensitive(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_qa_pair() {
        assert!(validate_qa_pair(&QaPair::new("What is Rust?", "A language")).is_ok());

        let err = validate_qa_pair(&QaPair::new("   ", "answer")).unwrap_err();
        assert_eq!(err.field, "question");

        let err = validate_qa_pair(&QaPair::new("q", "")).unwrap_err();
        assert_eq!(err.field, "answer");
        assert_eq!(err.reason, "cannot be empty");
    }

    #[test]
    fn test_validate_qa_pair_length_bounds() {
        let long_question = "q".repeat(MAX_QUESTION_LENGTH + 1);
        let err = validate_qa_pair(&QaPair::new(long_question, "a")).unwrap_err();
        assert!(err.reason.contains("maximum length"));

        let exact = "a".repeat(MAX_ANSWER_LENGTH);
        assert!(validate_qa_pair(&QaPair::new("q", exact)).is_ok());
    }

    #[test]
    fn test_validate_identifiers() {
        assert!(validate_node_id("node_1-abc").is_ok());
        assert!(validate_node_id("").is_err());
        assert!(validate_node_id("bad id").is_err());
        assert!(validate_node_id("semi;colon").is_err());
        assert!(validate_node_id(&"x".repeat(MAX_NODE_ID_LENGTH + 1)).is_err());

        assert!(validate_session_id("session-42").is_ok());
        let err = validate_session_id("../etc").unwrap_err();
        assert_eq!(err.field, "session_id");
    }

    #[test]
    fn test_validate_topic_name() {
        assert!(validate_topic_name("machine learning").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name(&"t".repeat(MAX_TOPIC_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(100.0).is_ok());
        assert!(validate_score(-0.1).is_err());
        assert!(validate_score(100.1).is_err());
        assert!(validate_score(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_scoring_context() {
        let node = TopicNode::with_id("n1", "rust");
        let ctx = ScoringContext::new(node.clone(), Vec::new());
        assert!(validate_scoring_context(&ctx).is_ok());

        let mut bad_depth = ctx.clone();
        bad_depth.topic_depth = 0;
        assert!(validate_scoring_context(&bad_depth).is_err());

        let bad_history = ScoringContext::new(node, vec![QaPair::new("", "a")]);
        assert!(validate_scoring_context(&bad_history).is_err());
    }

    #[test]
    fn test_sanitize_string() {
        let input = "line one\nline\ttwo\u{0}\u{7}\u{1b}[31m";
        assert_eq!(sanitize_string(input), "line one\nline\ttwo[31m");
    }

    #[test]
    fn test_sanitize_qa_pair_trims() {
        let qa = QaPair::new("  What?\u{0} ", "\u{8}Because.\n");
        let clean = sanitize_qa_pair(&qa);
        assert_eq!(clean.question, "What?");
        assert_eq!(clean.answer, "Because.");
        assert_eq!(clean.timestamp, qa.timestamp);
    }

    #[test]
    fn test_redact_sensitive() {
        let msg = "user jane.doe@example.com at 2024-03-01T12:30:00Z ssn 123-45-6789 card 4111 1111 1111 1111";
        let redacted = redact_sensitive(msg);
        assert!(!redacted.contains("jane.doe"));
        assert!(!redacted.contains("2024-03-01"));
        assert!(!redacted.contains("123-45-6789"));
        assert!(!redacted.contains("4111"));
        assert!(redacted.contains("[EMAIL]"));
        assert!(redacted.contains("[TIMESTAMP]"));
        assert!(redacted.contains("[SSN]"));
        assert!(redacted.contains("[CARD]"));
    }

    #[test]
    fn test_safe_error_message() {
        let err = ValidationError::new("answer", "mail me at a@b.io", "rejected");
        let msg = safe_error_message(&err);
        assert!(msg.contains("[EMAIL]"));
        assert!(msg.contains("Validation failed: answer"));
    }

    #[test]
    fn test_redact_leaves_plain_text() {
        let msg = "Node abc-123 not found";
        assert_eq!(redact_sensitive(msg), msg);
    }
}
