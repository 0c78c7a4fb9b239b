//! Tree mutation and navigation.
//!
//! [`TopicTreeManager`] owns a [`ConversationTree`](crate::models::ConversationTree)
//! and performs every structural mutation, re-checking integrity afterwards.
//! [`TreeNavigator`] answers read-only queries over a borrowed tree.

mod manager;
mod navigator;

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tree_tests;

pub use manager::{NodeUpdate, TopicTreeManager, TreeStats};
pub use navigator::{CurrentPosition, TreeNavigator};
