//! Conversation grading façades.
//!
//! - [`ConversationGradingSystem`]: one conversation; turns Q&A pairs into
//!   scored topic nodes
//! - [`GradingSystemWithSessions`]: many conversations with one active
//!   session, persistence and expiry

mod sessions;
mod system;

pub use sessions::{GradingSystemWithSessions, SessionStats};
pub use system::ConversationGradingSystem;
