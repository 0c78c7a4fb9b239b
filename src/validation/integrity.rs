//! Structural integrity checks over a whole conversation tree.

use std::collections::HashSet;

use crate::error::TreeIntegrityError;
use crate::models::ConversationTree;

/// Check every structural invariant of `tree`.
///
/// - declared roots exist, are parentless and listed once; every parentless
///   node is declared
/// - parent and child links agree in both directions
/// - stored depth equals the depth computed from the root
/// - no cycles
/// - `current_path` is a consecutive parent-to-child walk
pub fn validate_tree_integrity(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    check_roots(tree)?;
    check_links(tree)?;
    check_acyclic(tree)?;
    check_depths(tree)?;
    check_current_path(tree)
}

fn check_roots(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    let mut declared: HashSet<&str> = HashSet::new();
    for root_id in tree.root_nodes() {
        if !declared.insert(root_id) {
            return Err(TreeIntegrityError::new(root_id, "root listed more than once"));
        }
        let node = tree
            .get(root_id)
            .ok_or_else(|| TreeIntegrityError::new(root_id, "declared root does not exist"))?;
        if let Some(parent) = &node.parent_topic {
            return Err(TreeIntegrityError::new(
                root_id,
                format!("declared root has parent {}", parent),
            ));
        }
    }
    for node in tree.nodes_in_order() {
        if node.is_root() && !declared.contains(node.id()) {
            return Err(TreeIntegrityError::new(
                node.id(),
                "parentless node missing from root list",
            ));
        }
    }
    Ok(())
}

fn check_links(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    for node in tree.nodes_in_order() {
        if let Some(parent_id) = node.parent_topic.as_deref() {
            let parent = tree.get(parent_id).ok_or_else(|| {
                TreeIntegrityError::new(node.id(), format!("parent {} does not exist", parent_id))
            })?;
            if !parent.children.iter().any(|c| c == node.id()) {
                return Err(TreeIntegrityError::new(
                    node.id(),
                    format!("parent {} does not list this node as a child", parent_id),
                ));
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for child_id in &node.children {
            if !seen.insert(child_id) {
                return Err(TreeIntegrityError::new(
                    node.id(),
                    format!("child {} listed more than once", child_id),
                ));
            }
            let child = tree.get(child_id).ok_or_else(|| {
                TreeIntegrityError::new(node.id(), format!("child {} does not exist", child_id))
            })?;
            if child.parent_topic.as_deref() != Some(node.id()) {
                return Err(TreeIntegrityError::new(
                    child_id,
                    format!("listed as child of {} but parent link disagrees", node.id()),
                ));
            }
        }
    }
    Ok(())
}

/// DFS from every root with a per-path stack set, separate from the global
/// visited set, then flag anything unreachable (only possible inside a cycle).
fn check_acyclic(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    let mut visited: HashSet<&str> = HashSet::new();

    for root_id in tree.root_nodes() {
        let mut on_path: HashSet<&str> = HashSet::new();
        dfs(tree, root_id, &mut on_path, &mut visited)?;
    }

    for node in tree.nodes_in_order() {
        if !visited.contains(node.id()) {
            return Err(TreeIntegrityError::new(
                node.id(),
                "node unreachable from any root (cycle)",
            ));
        }
    }
    Ok(())
}

fn dfs<'a>(
    tree: &'a ConversationTree,
    id: &'a str,
    on_path: &mut HashSet<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Result<(), TreeIntegrityError> {
    if !on_path.insert(id) {
        return Err(TreeIntegrityError::new(id, "cycle detected"));
    }
    visited.insert(id);

    if let Some(node) = tree.get(id) {
        for child_id in &node.children {
            if on_path.contains(child_id.as_str()) {
                return Err(TreeIntegrityError::new(child_id, "cycle detected"));
            }
            if !visited.contains(child_id.as_str()) {
                dfs(tree, child_id, on_path, visited)?;
            }
        }
    }

    on_path.remove(id);
    Ok(())
}

fn check_depths(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    for node in tree.nodes_in_order() {
        let expected = tree
            .path_from_root(node.id())
            .map_err(|e| TreeIntegrityError::new(node.id(), e.to_string()))?
            .len() as u32;
        if node.depth != expected {
            return Err(TreeIntegrityError::new(
                node.id(),
                format!("stored depth {} but depth from root is {}", node.depth, expected),
            ));
        }
    }
    Ok(())
}

fn check_current_path(tree: &ConversationTree) -> Result<(), TreeIntegrityError> {
    let path = tree.current_path();
    for id in path {
        if !tree.contains(id) {
            return Err(TreeIntegrityError::new(id, "current path references missing node"));
        }
    }
    if let Some(first) = path.first() {
        if tree.get(first).is_some_and(|n| !n.is_root()) {
            return Err(TreeIntegrityError::new(first, "current path does not start at a root"));
        }
    }
    for pair in path.windows(2) {
        let child = tree.get(&pair[1]);
        if child.and_then(|c| c.parent_topic.as_deref()) != Some(pair[0].as_str()) {
            return Err(TreeIntegrityError::new(
                &pair[1],
                format!("current path step from {} is not a parent-child link", pair[0]),
            ));
        }
    }
    Ok(())
}
