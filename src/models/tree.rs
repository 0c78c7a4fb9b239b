//! Arena-backed conversation tree.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::{QaPair, TopicNode};
use crate::error::{AppResult, TreeError};

/// The topic tree of one conversation.
///
/// Nodes live in a map keyed by id; parent and child links are ids into that
/// map. Iteration helpers return nodes in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTree {
    #[serde(with = "node_pairs")]
    pub(crate) nodes: HashMap<String, TopicNode>,
    pub(crate) root_nodes: Vec<String>,
    pub(crate) current_path: Vec<String>,
    pub(crate) session_id: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl ConversationTree {
    /// Create an empty tree for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            root_nodes: Vec::new(),
            current_path: Vec::new(),
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }

    /// The owning session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// When the tree was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Ids of parentless nodes.
    pub fn root_nodes(&self) -> &[String] {
        &self.root_nodes
    }

    /// Root-to-current walk.
    pub fn current_path(&self) -> &[String] {
        &self.current_path
    }

    /// Look up a node.
    pub fn get(&self, id: &str) -> Option<&TopicNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut TopicNode> {
        self.nodes.get_mut(id)
    }

    /// Look up a node, failing when it is missing.
    pub fn require(&self, id: &str) -> Result<&TopicNode, TreeError> {
        self.nodes.get(id).ok_or_else(|| TreeError::NodeNotFound {
            node_id: id.to_string(),
        })
    }

    pub(crate) fn require_mut(&mut self, id: &str) -> Result<&mut TopicNode, TreeError> {
        self.nodes.get_mut(id).ok_or_else(|| TreeError::NodeNotFound {
            node_id: id.to_string(),
        })
    }

    /// Whether a node exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order.
    pub fn nodes_in_order(&self) -> Vec<&TopicNode> {
        let mut nodes: Vec<&TopicNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id().cmp(b.id())));
        nodes
    }

    /// Every recorded Q&A pair, oldest first.
    pub fn all_qa_pairs(&self) -> Vec<QaPair> {
        self.recent_qa_pairs(usize::MAX)
    }

    /// The latest `limit` Q&A pairs, oldest first.
    pub fn recent_qa_pairs(&self, limit: usize) -> Vec<QaPair> {
        let mut pairs: Vec<&QaPair> = self
            .nodes_in_order()
            .into_iter()
            .flat_map(|n| n.metadata.qa_pairs.iter())
            .collect();
        pairs.sort_by_key(|p| p.timestamp);
        let skip = pairs.len().saturating_sub(limit);
        pairs.into_iter().skip(skip).cloned().collect()
    }

    /// The node with the latest `updated_at`.
    pub fn most_recently_updated(&self) -> Option<&TopicNode> {
        self.nodes_in_order()
            .into_iter()
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
    }

    /// Re-parent `id` under `new_parent` (or make it a root).
    ///
    /// Detaches from the previous parent, attaches to the new one and
    /// recalculates depth for the node and all of its descendants.
    pub fn set_parent(&mut self, id: &str, new_parent: Option<&str>) -> AppResult<()> {
        let old_parent = self.require(id)?.parent_topic.clone();

        if let Some(parent_id) = new_parent {
            if !self.contains(parent_id) {
                return Err(TreeError::ParentNotFound {
                    node_id: id.to_string(),
                    parent_id: parent_id.to_string(),
                }
                .into());
            }
            if parent_id == id || self.find_descendant(id, parent_id).is_some() {
                return Err(TreeError::CircularReference {
                    node_id: id.to_string(),
                    parent_id: parent_id.to_string(),
                }
                .into());
            }
        }

        if old_parent.as_deref() == new_parent {
            return Ok(());
        }

        match old_parent.as_deref() {
            Some(old) => {
                if let Some(parent) = self.nodes.get_mut(old) {
                    parent.remove_child_id(id);
                }
            }
            None => self.root_nodes.retain(|r| r != id),
        }

        match new_parent {
            Some(parent_id) => {
                self.require_mut(parent_id)?.push_child(id);
            }
            None => {
                if !self.root_nodes.iter().any(|r| r == id) {
                    self.root_nodes.push(id.to_string());
                }
            }
        }

        let node = self.require_mut(id)?;
        node.parent_topic = new_parent.map(str::to_string);
        node.touch();

        self.recalculate_depths(id)?;
        Ok(())
    }

    /// Attach `child_id` under `parent_id`; a no-op when already attached.
    pub fn add_child(&mut self, parent_id: &str, child_id: &str) -> AppResult<()> {
        let already = self
            .require(child_id)?
            .parent_topic
            .as_deref()
            .is_some_and(|p| p == parent_id);
        if already {
            return Ok(());
        }
        self.set_parent(child_id, Some(parent_id))
    }

    /// Detach `child_id` from `parent_id`, promoting it to a root.
    ///
    /// Returns `false` when `child_id` was not a child of `parent_id`.
    pub fn remove_child(&mut self, parent_id: &str, child_id: &str) -> AppResult<bool> {
        let is_child = self.require(parent_id)?.children.iter().any(|c| c == child_id);
        if !is_child {
            return Ok(false);
        }
        self.set_parent(child_id, None)?;
        Ok(true)
    }

    /// All descendants of `id` in breadth-first order.
    pub fn descendants(&self, id: &str) -> AppResult<Vec<&TopicNode>> {
        let start = self.require(id)?;
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([start.id()]);
        let mut queue: VecDeque<&str> = start.children.iter().map(String::as_str).collect();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            let node = self.require(next)?;
            result.push(node);
            queue.extend(node.children.iter().map(String::as_str));
        }
        Ok(result)
    }

    /// Find `target` among the descendants of `id`.
    pub fn find_descendant(&self, id: &str, target: &str) -> Option<&TopicNode> {
        self.descendants(id)
            .ok()?
            .into_iter()
            .find(|n| n.id() == target)
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: &str) -> AppResult<Vec<String>> {
        let mut path = vec![id.to_string()];
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut current = self.require(id)?;

        while let Some(parent_id) = current.parent_topic.as_deref() {
            if !seen.insert(parent_id.to_string()) {
                return Err(TreeError::CycleDetected {
                    node_id: id.to_string(),
                }
                .into());
            }
            current = self.nodes.get(parent_id).ok_or_else(|| TreeError::AncestorMissing {
                node_id: id.to_string(),
                ancestor_id: parent_id.to_string(),
            })?;
            path.push(parent_id.to_string());
        }

        path.reverse();
        Ok(path)
    }

    /// Recompute depth for `id` from its parent and cascade to descendants.
    pub(crate) fn recalculate_depths(&mut self, id: &str) -> AppResult<()> {
        let depth = match self.require(id)?.parent_topic.as_deref() {
            Some(parent_id) => self.require(parent_id)?.depth + 1,
            None => 1,
        };

        let mut queue: VecDeque<(String, u32)> = VecDeque::from([(id.to_string(), depth)]);
        let mut seen: HashSet<String> = HashSet::new();
        while let Some((node_id, depth)) = queue.pop_front() {
            if !seen.insert(node_id.clone()) {
                return Err(TreeError::CycleDetected { node_id }.into());
            }
            let node = self.require_mut(&node_id)?;
            node.depth = depth;
            queue.extend(node.children.iter().map(|c| (c.clone(), depth + 1)));
        }
        Ok(())
    }
}

/// Serializes the node map as an array of `[id, node]` pairs in creation order.
mod node_pairs {
    use std::collections::HashMap;

    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TopicNode;

    pub fn serialize<S>(nodes: &HashMap<String, TopicNode>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ordered: Vec<(&String, &TopicNode)> = nodes.iter().collect();
        ordered.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(b.0)));

        let mut seq = serializer.serialize_seq(Some(ordered.len()))?;
        for pair in ordered {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, TopicNode>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(String, TopicNode)> = Vec::deserialize(deserializer)?;
        let mut nodes = HashMap::with_capacity(pairs.len());
        for (id, node) in pairs {
            if id != node.id() {
                return Err(D::Error::custom(format!(
                    "node key {} does not match node id {}",
                    id,
                    node.id()
                )));
            }
            if nodes.insert(id.clone(), node).is_some() {
                return Err(D::Error::custom(format!("duplicate node id {}", id)));
            }
        }
        Ok(nodes)
    }
}
