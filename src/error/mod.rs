use thiserror::Error;

/// Maximum number of characters of an offending value echoed in a validation error.
const MAX_ECHOED_VALUE_CHARS: usize = 64;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("{0}")]
    Integrity(#[from] TreeIntegrityError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transcript error: {message}")]
    Transcript { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Input validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation failed: {field} - {reason} (value: {value:?})")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// The offending value, truncated for display.
    pub value: String,
    /// Human-readable constraint that was violated.
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error, truncating the echoed value.
    pub fn new(field: impl Into<String>, value: impl AsRef<str>, reason: impl Into<String>) -> Self {
        let value = value.as_ref();
        let value = if value.chars().count() > MAX_ECHOED_VALUE_CHARS {
            let mut truncated: String = value.chars().take(MAX_ECHOED_VALUE_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            value.to_string()
        };
        Self {
            field: field.into(),
            value,
            reason: reason.into(),
        }
    }
}

/// Structural corruption detected by the tree-integrity checker.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Tree integrity violation at node {node_id}: {message}")]
pub struct TreeIntegrityError {
    /// Node where the violation was found.
    pub node_id: String,
    /// Description of the violation.
    pub message: String,
}

impl TreeIntegrityError {
    /// Create a new integrity error.
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

/// Tree manager and navigator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Node already exists: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("Parent node {parent_id} not found for node {node_id}")]
    ParentNotFound { node_id: String, parent_id: String },

    #[error("Moving node {node_id} under {parent_id} would create circular reference")]
    CircularReference { node_id: String, parent_id: String },

    #[error("Ancestor {ancestor_id} of node {node_id} not found during traversal")]
    AncestorMissing { node_id: String, ancestor_id: String },

    #[error("Cycle detected during traversal from node {node_id}")]
    CycleDetected { node_id: String },

    #[error("Nodes {from} and {to} belong to different trees")]
    DifferentTrees { from: String, to: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}

/// Scoring strategy errors
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Strategy {strategy} failed: {message}")]
    Strategy { strategy: String, message: String },

    #[error("Strategy {strategy} produced a non-finite score")]
    NonFinite { strategy: String },
}

/// Persistence adapter errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("No persistence adapter configured")]
    NotConfigured,

    #[error("Failed to serialize session {session_id}: {source}")]
    Serialization {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize session {session_id}: {source}")]
    Deserialization {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Persistence backend failed for session {session_id}: {message}")]
    Backend { session_id: String, message: String },
}

/// Session lifecycle errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("Session already exists: {session_id}")]
    AlreadyExists { session_id: String },

    #[error("Cannot delete the active session: {session_id}")]
    ActiveSessionDeletion { session_id: String },

    #[error("No active session")]
    NoActiveSession,
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for scoring strategies
pub type ScoringResult<T> = Result<T, ScoringError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
