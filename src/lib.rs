//! # Conversation Grader
//!
//! Organizes a stream of question/answer exchanges into a hierarchical topic
//! tree, scores each exchange and answers navigation queries over the tree.
//!
//! ## Features
//!
//! - **Topic Trees**: Arena-backed trees keyed by node id with parent/child links
//! - **Topic Analysis**: Pluggable extraction and relationship classification
//! - **Scoring**: Pluggable strategies with an explicit fallback chain
//! - **Navigation**: Read-only queries (paths, leaves, deepest unvisited branch)
//! - **Sessions**: Many independent conversations with expiry and persistence
//! - **Validation**: Input limits, sanitization, injection screening and
//!   tree-integrity checks
//!
//! ## Architecture
//!
//! ```text
//! QaPair → TopicAnalyzer → TopicTreeManager → ScoringEngine
//!                               ↓
//!                 TreeNavigator / SessionManager → PersistenceAdapter
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use conversation_grader::{ConversationGradingSystem, QaPair};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut system = ConversationGradingSystem::new("demo")?;
//!     system
//!         .add_qa_pair(QaPair::new("What is machine learning?", "Learning from data."), None)
//!         .await?;
//!     if let Some(node) = system.get_deepest_unvisited_branch() {
//!         println!("explore next: {}", node.topic);
//!     }
//!     Ok(())
//! }
//! ```

/// Topic extraction and relationship classification.
pub mod analyzer;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Single- and multi-session grading façades.
pub mod grading;
/// Topic node and conversation tree data model.
pub mod models;
/// Answer scoring strategies and the fallback engine.
pub mod scoring;
/// Session lifecycle management.
pub mod session;
/// Persistence adapters for tree snapshots.
pub mod storage;
/// Transcript files for batch replay.
pub mod transcript;
/// Tree mutation and navigation.
pub mod tree;
/// Input validation, sanitization and integrity checks.
pub mod validation;

mod text;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use grading::{ConversationGradingSystem, GradingSystemWithSessions};
pub use models::{ConversationTree, QaPair, TopicNode};
