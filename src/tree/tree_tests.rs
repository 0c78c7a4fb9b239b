//! Unit tests for the tree manager and navigator.

use super::*;
use crate::error::{AppError, TreeError};
use crate::models::{QaPair, TopicNode};
use pretty_assertions::assert_eq;

/// rust -> ownership -> borrowing, rust -> traits, plus root cooking
fn sample() -> TopicTreeManager {
    let mut manager = TopicTreeManager::new("sess-1").unwrap();
    manager.add_node(TopicNode::with_id("rust", "rust")).unwrap();
    manager
        .add_node(TopicNode::with_id("own", "ownership").with_parent("rust"))
        .unwrap();
    manager
        .add_node(TopicNode::with_id("borrow", "borrowing").with_parent("own"))
        .unwrap();
    manager
        .add_node(TopicNode::with_id("traits", "traits").with_parent("rust"))
        .unwrap();
    manager.add_node(TopicNode::with_id("cook", "cooking")).unwrap();
    manager
}

fn ids(nodes: &[&TopicNode]) -> Vec<String> {
    nodes.iter().map(|n| n.id().to_string()).collect()
}

// ============================================================================
// Manager: add / update / remove
// ============================================================================

#[test]
fn test_new_rejects_bad_session_id() {
    assert!(TopicTreeManager::new("bad id").is_err());
}

#[test]
fn test_add_node_sets_depth_and_links() {
    let manager = sample();
    let tree = manager.tree();
    assert_eq!(tree.root_nodes(), &["rust".to_string(), "cook".to_string()]);
    assert_eq!(tree.get("borrow").unwrap().depth, 3);
    assert_eq!(tree.get("rust").unwrap().children, vec!["own", "traits"]);
    assert!(manager.validate().is_ok());
}

#[test]
fn test_add_node_rejects_duplicates_and_missing_parent() {
    let mut manager = sample();
    let err = manager.add_node(TopicNode::with_id("rust", "again")).unwrap_err();
    assert!(matches!(err, AppError::Tree(TreeError::DuplicateNode { .. })));

    let err = manager
        .add_node(TopicNode::with_id("orphan", "orphan").with_parent("ghost"))
        .unwrap_err();
    assert!(matches!(err, AppError::Tree(TreeError::ParentNotFound { .. })));
    assert!(manager.get_node("orphan").is_none());
}

#[test]
fn test_add_node_rejects_declared_children_and_bad_topic() {
    let mut manager = sample();
    let mut node = TopicNode::with_id("x", "x");
    node.children.push("rust".to_string());
    assert!(manager.add_node(node).is_err());
    assert!(manager.add_node(TopicNode::with_id("y", "  ")).is_err());
    assert!(manager.add_node(TopicNode::with_id("bad id", "z")).is_err());
}

#[test]
fn test_update_node_moves_subtree() {
    let mut manager = sample();
    manager
        .update_node("own", NodeUpdate::default().with_parent("cook"))
        .unwrap();
    let tree = manager.tree();
    assert_eq!(tree.get("own").unwrap().depth, 2);
    assert_eq!(tree.get("borrow").unwrap().depth, 3);
    assert_eq!(tree.get("rust").unwrap().children, vec!["traits"]);
    assert_eq!(tree.get("cook").unwrap().children, vec!["own"]);

    manager.update_node("own", NodeUpdate::default().as_root()).unwrap();
    assert_eq!(manager.tree().get("borrow").unwrap().depth, 2);
    assert!(manager.tree().root_nodes().contains(&"own".to_string()));
}

#[test]
fn test_update_node_rejects_circular_parent() {
    let mut manager = sample();
    let err = manager
        .update_node("rust", NodeUpdate::default().with_parent("borrow"))
        .unwrap_err();
    assert!(err.to_string().contains("would create circular reference"));

    let err = manager
        .update_node("rust", NodeUpdate::default().with_parent("rust"))
        .unwrap_err();
    assert!(err.to_string().contains("would create circular reference"));
    assert!(manager.validate().is_ok());
}

#[test]
fn test_reparenting_focused_node_truncates_current_path() {
    let mut manager = sample();
    manager.focus("borrow").unwrap();

    manager
        .update_node("own", NodeUpdate::default().with_parent("cook"))
        .unwrap();

    let tree = manager.tree();
    assert_eq!(tree.get("own").unwrap().parent_topic.as_deref(), Some("cook"));
    assert_eq!(tree.current_path(), &["rust".to_string()]);
    assert!(manager.validate().is_ok());

    manager
        .add_node(TopicNode::with_id("later", "later"))
        .unwrap();
    assert!(manager.get_node("later").is_some());
}

#[test]
fn test_failed_update_leaves_tree_unchanged() {
    let mut manager = sample();
    manager.focus("borrow").unwrap();
    let before = manager.tree().clone();

    assert!(manager
        .update_node("rust", NodeUpdate::default().with_parent("borrow").with_topic("renamed"))
        .is_err());

    assert_eq!(manager.tree(), &before);
}

#[test]
fn test_update_node_topic_and_score() {
    let mut manager = sample();
    manager
        .update_node("traits", NodeUpdate::default().with_topic("trait objects").with_score(72.0))
        .unwrap();
    let node = manager.get_node("traits").unwrap();
    assert_eq!(node.topic, "trait objects");
    assert_eq!(node.score, Some(72.0));

    manager
        .update_node("traits", NodeUpdate::default().without_score())
        .unwrap();
    assert!(!manager.get_node("traits").unwrap().has_score());

    assert!(manager
        .update_node("traits", NodeUpdate::default().with_score(150.0))
        .is_err());
    assert!(manager
        .update_node("ghost", NodeUpdate::default().with_topic("x"))
        .is_err());
}

#[test]
fn test_remove_node_reparents_children() {
    let mut manager = sample();
    manager
        .set_current_path(vec!["rust".to_string(), "own".to_string(), "borrow".to_string()])
        .unwrap();

    let removed = manager.remove_node("own").unwrap();
    assert_eq!(removed.id(), "own");

    let tree = manager.tree();
    assert!(!tree.contains("own"));
    let borrow = tree.get("borrow").unwrap();
    assert_eq!(borrow.parent_topic.as_deref(), Some("rust"));
    assert_eq!(borrow.depth, 2);
    assert_eq!(tree.get("rust").unwrap().children, vec!["traits", "borrow"]);
    assert_eq!(tree.current_path(), &["rust".to_string()]);
}

#[test]
fn test_remove_root_promotes_children() {
    let mut manager = sample();
    manager.remove_node("rust").unwrap();
    let tree = manager.tree();
    assert_eq!(
        tree.root_nodes(),
        &["cook".to_string(), "own".to_string(), "traits".to_string()]
    );
    assert_eq!(tree.get("own").unwrap().depth, 1);
    assert_eq!(tree.get("borrow").unwrap().depth, 2);
    assert!(manager.validate().is_ok());
}

// ============================================================================
// Manager: paths, stats, local mutators
// ============================================================================

#[test]
fn test_set_current_path_validation() {
    let mut manager = sample();
    assert!(manager
        .set_current_path(vec!["own".to_string(), "borrow".to_string()])
        .is_err());
    assert!(manager
        .set_current_path(vec!["rust".to_string(), "borrow".to_string()])
        .is_err());
    assert!(manager.set_current_path(vec!["ghost".to_string()]).is_err());
    assert!(manager.set_current_path(Vec::new()).is_ok());

    manager.focus("borrow").unwrap();
    assert_eq!(manager.tree().current_path(), &["rust", "own", "borrow"].map(String::from));
}

#[test]
fn test_calculate_depth() {
    let manager = sample();
    assert_eq!(manager.calculate_depth("borrow").unwrap(), 3);
    assert!(manager.calculate_depth("ghost").is_err());
}

#[test]
fn test_get_stats() {
    let mut manager = sample();
    manager.update_node("own", NodeUpdate::default().with_score(60.0)).unwrap();
    manager.update_node("traits", NodeUpdate::default().with_score(80.0)).unwrap();
    manager.mark_visited("rust").unwrap();
    manager.mark_exhausted("cook").unwrap();

    let stats = manager.get_stats();
    assert_eq!(stats.total_nodes, 5);
    assert_eq!(stats.root_nodes, 2);
    assert_eq!(stats.leaf_nodes, 3);
    assert_eq!(stats.max_depth, 3);
    assert!((stats.average_depth - 9.0 / 5.0).abs() < 1e-9);
    assert_eq!(stats.scored_nodes, 2);
    assert_eq!(stats.average_score, Some(70.0));
    assert_eq!(stats.visited_nodes, 1);
    assert_eq!(stats.exhausted_nodes, 1);
}

#[test]
fn test_empty_stats() {
    let manager = TopicTreeManager::new("empty").unwrap();
    assert_eq!(manager.get_stats(), TreeStats::default());
}

#[test]
fn test_add_qa_pair_and_clear() {
    let mut manager = sample();
    manager
        .add_qa_pair("own", QaPair::new("Who owns it?", "The binding."))
        .unwrap();
    assert_eq!(manager.get_node("own").unwrap().metadata.qa_pairs.len(), 1);
    assert!(manager.add_qa_pair("ghost", QaPair::new("q", "a")).is_err());

    manager.clear();
    assert!(manager.tree().is_empty());
    assert_eq!(manager.session_id(), "sess-1");
}

#[test]
fn test_from_tree_validates() {
    let tree = sample().into_tree();
    assert!(TopicTreeManager::from_tree(tree.clone()).is_ok());

    let mut broken = tree;
    broken.nodes.get_mut("borrow").unwrap().depth = 9;
    assert!(matches!(
        TopicTreeManager::from_tree(broken).unwrap_err(),
        AppError::Integrity(_)
    ));
}

// ============================================================================
// Navigator
// ============================================================================

#[test]
fn test_depth_and_missing_ancestor() {
    let manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(nav.get_depth_from_root("borrow").unwrap(), 3);

    let mut broken = manager.tree().clone();
    broken.nodes.remove("own");
    let err = TreeNavigator::new(&broken)
        .get_depth_from_root("borrow")
        .unwrap_err();
    assert!(err.to_string().contains("during traversal"));
}

#[test]
fn test_find_path() {
    let manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(
        nav.find_path("borrow", "traits").unwrap(),
        vec!["borrow", "own", "rust", "traits"]
    );
    assert_eq!(nav.find_path("rust", "borrow").unwrap(), vec!["rust", "own", "borrow"]);
    assert_eq!(nav.find_path("own", "own").unwrap(), vec!["own"]);

    let err = nav.find_path("borrow", "cook").unwrap_err();
    assert!(err.to_string().contains("different trees"));
}

#[test]
fn test_leaves_and_unvisited() {
    let mut manager = sample();
    manager.mark_visited("traits").unwrap();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(ids(&nav.get_leaf_nodes()), vec!["borrow", "traits", "cook"]);
    assert_eq!(ids(&nav.get_unvisited_branches()), vec!["borrow", "cook"]);
}

#[test]
fn test_deepest_unvisited_branch() {
    let mut manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(nav.get_deepest_unvisited_branch().unwrap().id(), "borrow");

    manager.mark_visited("borrow").unwrap();
    let nav = TreeNavigator::new(manager.tree());
    // own and traits tie at depth 2; own was created first
    assert_eq!(nav.get_deepest_unvisited_branch().unwrap().id(), "own");

    for id in ["own", "traits", "rust"] {
        manager.mark_visited(id).unwrap();
    }
    manager.mark_exhausted("cook").unwrap();
    assert!(TreeNavigator::new(manager.tree())
        .get_deepest_unvisited_branch()
        .is_none());
}

#[test]
fn test_depth_queries() {
    let manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(ids(&nav.get_nodes_at_depth(2)), vec!["own", "traits"]);
    assert_eq!(nav.get_max_depth(), 3);

    let empty = TopicTreeManager::new("e").unwrap();
    assert_eq!(TreeNavigator::new(empty.tree()).get_max_depth(), 0);
}

#[test]
fn test_relatives() {
    let manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(ids(&nav.get_ancestors("borrow").unwrap()), vec!["own", "rust"]);
    assert_eq!(ids(&nav.get_descendants("rust").unwrap()), vec!["own", "traits", "borrow"]);
    assert_eq!(ids(&nav.get_children("rust").unwrap()), vec!["own", "traits"]);
    assert_eq!(ids(&nav.get_siblings("own").unwrap()), vec!["traits"]);
    assert_eq!(ids(&nav.get_siblings("cook").unwrap()), vec!["rust"]);
    assert_eq!(ids(&nav.get_root_nodes()), vec!["rust", "cook"]);
    assert_eq!(nav.get_subtree_size("rust").unwrap(), 4);

    assert!(nav.is_ancestor("rust", "borrow").unwrap());
    assert!(!nav.is_ancestor("borrow", "rust").unwrap());
    assert!(!nav.is_ancestor("rust", "rust").unwrap());
    assert!(nav.is_descendant("borrow", "rust").unwrap());
    assert!(!nav.is_descendant("cook", "rust").unwrap());
}

#[test]
fn test_current_position() {
    let mut manager = sample();
    let nav = TreeNavigator::new(manager.tree());
    assert_eq!(nav.get_current_position().unwrap(), CurrentPosition::default());

    manager.focus("own").unwrap();
    let nav = TreeNavigator::new(manager.tree());
    let position = nav.get_current_position().unwrap();
    assert_eq!(position.current_node.map(|n| n.id()), Some("own"));
    assert_eq!(position.depth, 2);
    assert_eq!(position.path_from_root, vec!["rust", "own"]);
    assert_eq!(ids(&position.available_children), vec!["borrow"]);
    assert_eq!(ids(&position.siblings), vec!["traits"]);
}

#[test]
fn test_navigator_never_mutates() {
    let manager = sample();
    let before = serde_json::to_string(manager.tree()).unwrap();

    let nav = TreeNavigator::new(manager.tree());
    let _ = nav.get_leaf_nodes();
    let _ = nav.get_unvisited_branches();
    let _ = nav.get_deepest_unvisited_branch();
    let _ = nav.find_path("borrow", "traits");
    let _ = nav.get_current_position();
    let _ = nav.get_subtree_size("rust");

    assert_eq!(serde_json::to_string(manager.tree()).unwrap(), before);
}
