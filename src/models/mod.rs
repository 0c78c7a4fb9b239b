//! Data model for conversation topic trees.
//!
//! - [`QaPair`]: one question/answer exchange
//! - [`TopicNode`]: a topic vertex with exploration bookkeeping
//! - [`ConversationTree`]: the id-keyed node arena of one session

mod node;
mod tree;


pub(crate) use node::present_value;
pub use node::{NodeMetadata, QaPair, TopicNode};
pub use tree::ConversationTree;
