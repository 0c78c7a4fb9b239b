//! Read-only queries over a conversation tree.

use serde::Serialize;

use crate::error::{AppError, AppResult, TreeError};
use crate::models::{ConversationTree, TopicNode};

/// Where the conversation currently stands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPosition<'a> {
    pub current_node: Option<&'a TopicNode>,
    pub depth: u32,
    pub path_from_root: Vec<String>,
    pub available_children: Vec<&'a TopicNode>,
    pub siblings: Vec<&'a TopicNode>,
}

/// Borrowing query helper. Never mutates the tree; node lists come back in
/// creation order unless stated otherwise.
#[derive(Debug, Clone, Copy)]
pub struct TreeNavigator<'a> {
    tree: &'a ConversationTree,
}

impl<'a> TreeNavigator<'a> {
    pub fn new(tree: &'a ConversationTree) -> Self {
        Self { tree }
    }

    /// Depth of `id` walking parent links; fails on a missing ancestor or a cycle.
    pub fn get_depth_from_root(&self, id: &str) -> AppResult<u32> {
        Ok(self.tree.path_from_root(id)?.len() as u32)
    }

    /// Ids from `from` up to the lowest common ancestor and down to `to`.
    pub fn find_path(&self, from: &str, to: &str) -> AppResult<Vec<String>> {
        let up = self.tree.path_from_root(from)?;
        let down = self.tree.path_from_root(to)?;

        if up.first() != down.first() {
            return Err(TreeError::DifferentTrees {
                from: from.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        let shared = up.iter().zip(&down).take_while(|(a, b)| a == b).count();
        let mut path: Vec<String> = up[shared - 1..].iter().rev().cloned().collect();
        path.extend(down[shared..].iter().cloned());
        Ok(path)
    }

    /// Nodes without children.
    pub fn get_leaf_nodes(&self) -> Vec<&'a TopicNode> {
        self.tree
            .nodes_in_order()
            .into_iter()
            .filter(|n| n.is_leaf())
            .collect()
    }

    /// Leaves that were never visited and are not exhausted.
    pub fn get_unvisited_branches(&self) -> Vec<&'a TopicNode> {
        self.get_leaf_nodes()
            .into_iter()
            .filter(|n| n.is_unvisited())
            .collect()
    }

    /// The deepest unvisited, non-exhausted node; earliest created on ties.
    pub fn get_deepest_unvisited_branch(&self) -> Option<&'a TopicNode> {
        self.tree
            .nodes_in_order()
            .into_iter()
            .filter(|n| n.is_unvisited())
            .fold(None, |best: Option<&'a TopicNode>, n| match best {
                Some(b) if b.depth >= n.depth => Some(b),
                _ => Some(n),
            })
    }

    pub fn get_nodes_at_depth(&self, depth: u32) -> Vec<&'a TopicNode> {
        self.tree
            .nodes_in_order()
            .into_iter()
            .filter(|n| n.depth == depth)
            .collect()
    }

    /// Greatest stored depth, 0 for an empty tree.
    pub fn get_max_depth(&self) -> u32 {
        self.tree
            .nodes_in_order()
            .iter()
            .map(|n| n.depth)
            .max()
            .unwrap_or(0)
    }

    pub fn get_root_nodes(&self) -> Vec<&'a TopicNode> {
        self.tree
            .root_nodes()
            .iter()
            .filter_map(|id| self.tree.get(id))
            .collect()
    }

    /// Ancestors of `id`, nearest first.
    pub fn get_ancestors(&self, id: &str) -> AppResult<Vec<&'a TopicNode>> {
        let path = self.tree.path_from_root(id)?;
        path.iter()
            .rev()
            .skip(1)
            .map(|a| self.tree.require(a).map_err(AppError::from))
            .collect()
    }

    /// Descendants of `id`, breadth first.
    pub fn get_descendants(&self, id: &str) -> AppResult<Vec<&'a TopicNode>> {
        self.tree.descendants(id)
    }

    pub fn get_children(&self, id: &str) -> AppResult<Vec<&'a TopicNode>> {
        let node = self.tree.require(id)?;
        node.children
            .iter()
            .map(|c| self.tree.require(c).map_err(AppError::from))
            .collect()
    }

    /// Nodes sharing `id`'s parent; for roots, the other roots.
    pub fn get_siblings(&self, id: &str) -> AppResult<Vec<&'a TopicNode>> {
        let node = self.tree.require(id)?;
        let peers = match node.parent_topic.as_deref() {
            Some(parent_id) => self.get_children(parent_id)?,
            None => self.get_root_nodes(),
        };
        Ok(peers.into_iter().filter(|n| n.id() != id).collect())
    }

    /// Whether `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> AppResult<bool> {
        self.tree.require(ancestor)?;
        let path = self.tree.path_from_root(id)?;
        Ok(ancestor != id && path.iter().any(|p| p == ancestor))
    }

    /// Whether `descendant` lies strictly below `id`.
    pub fn is_descendant(&self, descendant: &str, id: &str) -> AppResult<bool> {
        self.is_ancestor(id, descendant)
    }

    /// Number of nodes in the subtree rooted at `id`, itself included.
    pub fn get_subtree_size(&self, id: &str) -> AppResult<usize> {
        Ok(self.tree.descendants(id)?.len() + 1)
    }

    /// Snapshot of the end of the current path.
    pub fn get_current_position(&self) -> AppResult<CurrentPosition<'a>> {
        let Some(current_id) = self.tree.current_path().last() else {
            return Ok(CurrentPosition::default());
        };
        let current = self.tree.require(current_id)?;
        Ok(CurrentPosition {
            current_node: Some(current),
            depth: current.depth,
            path_from_root: self.tree.current_path().to_vec(),
            available_children: self.get_children(current_id)?,
            siblings: self.get_siblings(current_id)?,
        })
    }
}
