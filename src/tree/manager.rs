//! Structural mutations over a conversation tree.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppResult, TreeError, ValidationError};
use crate::models::{ConversationTree, QaPair, TopicNode};
use crate::validation::{
    validate_node_id, validate_score, validate_session_id, validate_topic_name, validate_topic_node,
    validate_tree_integrity,
};

/// Partial update applied by [`TopicTreeManager::update_node`].
///
/// `score` and `parent_topic` are doubly optional: `None` leaves the field
/// alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub topic: Option<String>,
    pub score: Option<Option<f64>>,
    pub parent_topic: Option<Option<String>>,
}

impl NodeUpdate {
    /// Rename the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(Some(score));
        self
    }

    /// Clear the score.
    pub fn without_score(mut self) -> Self {
        self.score = Some(None);
        self
    }

    /// Move under a new parent.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_topic = Some(Some(parent_id.into()));
        self
    }

    /// Promote to a root.
    pub fn as_root(mut self) -> Self {
        self.parent_topic = Some(None);
        self
    }
}

/// Aggregate tree statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_nodes: usize,
    pub leaf_nodes: usize,
    pub max_depth: u32,
    pub average_depth: f64,
    pub scored_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    pub visited_nodes: usize,
    pub exhausted_nodes: usize,
}

/// Owner of one conversation tree.
///
/// Integrity is verified after every structural mutation. Updates and
/// removals that fail part way are rolled back before the error is returned.
#[derive(Debug, Clone)]
pub struct TopicTreeManager {
    tree: ConversationTree,
}

impl TopicTreeManager {
    /// Create a manager over an empty tree.
    pub fn new(session_id: impl Into<String>) -> AppResult<Self> {
        let session_id = session_id.into();
        validate_session_id(&session_id)?;
        Ok(Self {
            tree: ConversationTree::new(session_id),
        })
    }

    /// Adopt an existing tree after validating it.
    pub fn from_tree(tree: ConversationTree) -> AppResult<Self> {
        validate_session_id(tree.session_id())?;
        for node in tree.nodes_in_order() {
            validate_topic_node(node)?;
        }
        validate_tree_integrity(&tree)?;
        Ok(Self { tree })
    }

    /// The managed tree.
    pub fn tree(&self) -> &ConversationTree {
        &self.tree
    }

    /// Give up ownership of the tree.
    pub fn into_tree(self) -> ConversationTree {
        self.tree
    }

    /// The owning session id.
    pub fn session_id(&self) -> &str {
        self.tree.session_id()
    }

    /// Look up a node.
    pub fn get_node(&self, id: &str) -> Option<&TopicNode> {
        self.tree.get(id)
    }

    /// Insert a node under its declared parent (or as a root) and return its id.
    pub fn add_node(&mut self, mut node: TopicNode) -> AppResult<String> {
        validate_topic_node(&node)?;
        let id = node.id().to_string();

        if self.tree.contains(&id) {
            return Err(TreeError::DuplicateNode { node_id: id }.into());
        }
        if !node.children.is_empty() {
            return Err(ValidationError::new(
                "children",
                node.children.join(","),
                "a new node cannot declare children",
            )
            .into());
        }

        node.depth = match node.parent_topic.as_deref() {
            Some(parent_id) => {
                let parent = self.tree.get(parent_id).ok_or_else(|| TreeError::ParentNotFound {
                    node_id: id.clone(),
                    parent_id: parent_id.to_string(),
                })?;
                parent.depth + 1
            }
            None => 1,
        };

        let parent_id = node.parent_topic.clone();
        self.tree.nodes.insert(id.clone(), node);
        match parent_id.as_deref() {
            Some(parent_id) => {
                self.tree.require_mut(parent_id)?.push_child(&id);
            }
            None => self.tree.root_nodes.push(id.clone()),
        }
        // the new node is the most recent activity, not its parent
        self.tree.require_mut(&id)?.touch();

        self.validate()?;
        debug!(node_id = %id, parent = ?parent_id, "Node added");
        Ok(id)
    }

    /// Apply a partial update. Parent changes detach, reattach and cascade
    /// depth, and truncate the current path at the moved node.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> AppResult<()> {
        self.tree.require(id)?;
        if let Some(topic) = &update.topic {
            validate_topic_name(topic)?;
        }
        if let Some(Some(score)) = update.score {
            validate_score(score)?;
        }
        if let Some(Some(parent_id)) = &update.parent_topic {
            validate_node_id(parent_id)?;
        }

        let snapshot = self.tree.clone();
        if let Err(e) = self.apply_update(id, update) {
            warn!(node_id = %id, error = %e, "Node update rolled back");
            self.tree = snapshot;
            return Err(e);
        }
        debug!(node_id = %id, "Node updated");
        Ok(())
    }

    fn apply_update(&mut self, id: &str, update: NodeUpdate) -> AppResult<()> {
        if let Some(parent) = &update.parent_topic {
            let current = self.tree.require(id)?.parent_topic.as_deref();
            if current != parent.as_deref() {
                self.tree.set_parent(id, parent.as_deref())?;
                self.truncate_current_path(id);
            }
        }

        let node = self.tree.require_mut(id)?;
        if let Some(topic) = update.topic {
            node.topic = topic;
            node.touch();
        }
        match update.score {
            Some(Some(score)) => node.update_score(score)?,
            Some(None) => node.clear_score(),
            None => {}
        }

        self.validate()
    }

    /// Remove a node; its children move to its parent (or become roots) and
    /// the current path is truncated at the removed node.
    pub fn remove_node(&mut self, id: &str) -> AppResult<TopicNode> {
        self.tree.require(id)?;
        let snapshot = self.tree.clone();
        match self.detach_node(id) {
            Ok(removed) => Ok(removed),
            Err(e) => {
                warn!(node_id = %id, error = %e, "Node removal rolled back");
                self.tree = snapshot;
                Err(e)
            }
        }
    }

    fn detach_node(&mut self, id: &str) -> AppResult<TopicNode> {
        let node = self.tree.require(id)?;
        let parent_id = node.parent_topic.clone();
        let children = node.children.clone();

        for child_id in &children {
            self.tree.set_parent(child_id, parent_id.as_deref())?;
        }

        match parent_id.as_deref() {
            Some(parent_id) => {
                self.tree.require_mut(parent_id)?.remove_child_id(id);
            }
            None => self.tree.root_nodes.retain(|r| r != id),
        }
        self.truncate_current_path(id);

        let removed = self
            .tree
            .nodes
            .remove(id)
            .ok_or_else(|| TreeError::NodeNotFound { node_id: id.to_string() })?;

        self.validate()?;
        info!(node_id = %id, reparented = children.len(), "Node removed");
        Ok(removed)
    }

    fn truncate_current_path(&mut self, id: &str) {
        if let Some(pos) = self.tree.current_path.iter().position(|p| p == id) {
            self.tree.current_path.truncate(pos);
        }
    }

    /// Depth of `id` computed from the root.
    pub fn calculate_depth(&self, id: &str) -> AppResult<u32> {
        Ok(self.tree.path_from_root(id)?.len() as u32)
    }

    /// Replace the current path. It must start at a root and follow
    /// parent-to-child links; an empty path is allowed.
    pub fn set_current_path(&mut self, path: Vec<String>) -> AppResult<()> {
        for id in &path {
            self.tree.require(id)?;
        }
        if let Some(first) = path.first() {
            if !self.tree.require(first)?.is_root() {
                return Err(TreeError::InvalidPath {
                    message: format!("path must start at a root, {} has a parent", first),
                }
                .into());
            }
        }
        for pair in path.windows(2) {
            let child = self.tree.require(&pair[1])?;
            if child.parent_topic.as_deref() != Some(pair[0].as_str()) {
                return Err(TreeError::InvalidPath {
                    message: format!("{} is not a child of {}", pair[1], pair[0]),
                }
                .into());
            }
        }
        self.tree.current_path = path;
        Ok(())
    }

    /// Point the current path at `id` (its full root path).
    pub fn focus(&mut self, id: &str) -> AppResult<()> {
        let path = self.tree.path_from_root(id)?;
        self.set_current_path(path)
    }

    /// Aggregate statistics.
    pub fn get_stats(&self) -> TreeStats {
        let nodes = self.tree.nodes_in_order();
        if nodes.is_empty() {
            return TreeStats::default();
        }

        let total = nodes.len();
        let scores: Vec<f64> = nodes.iter().filter_map(|n| n.score).collect();
        TreeStats {
            total_nodes: total,
            root_nodes: self.tree.root_nodes().len(),
            leaf_nodes: nodes.iter().filter(|n| n.is_leaf()).count(),
            max_depth: nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            average_depth: nodes.iter().map(|n| n.depth as f64).sum::<f64>() / total as f64,
            scored_nodes: scores.len(),
            average_score: (!scores.is_empty())
                .then(|| scores.iter().sum::<f64>() / scores.len() as f64),
            visited_nodes: nodes.iter().filter(|n| n.metadata.visit_count > 0).count(),
            exhausted_nodes: nodes.iter().filter(|n| n.metadata.is_exhausted).count(),
        }
    }

    /// Record a visit.
    pub fn mark_visited(&mut self, id: &str) -> AppResult<()> {
        self.tree.require_mut(id)?.mark_as_visited();
        Ok(())
    }

    /// Flag a topic as fully explored.
    pub fn mark_exhausted(&mut self, id: &str) -> AppResult<()> {
        self.tree.require_mut(id)?.mark_as_exhausted();
        Ok(())
    }

    /// Append a Q&A pair to a node.
    pub fn add_qa_pair(&mut self, id: &str, qa_pair: QaPair) -> AppResult<()> {
        self.tree.require_mut(id)?.add_qa_pair(qa_pair);
        Ok(())
    }

    /// Run the full integrity check.
    pub fn validate(&self) -> AppResult<()> {
        validate_tree_integrity(&self.tree)?;
        Ok(())
    }

    /// Drop every node, keeping the session id.
    pub fn clear(&mut self) {
        let session_id = self.tree.session_id().to_string();
        self.tree = ConversationTree::new(session_id);
        info!(session_id = %self.tree.session_id(), "Tree cleared");
    }
}
