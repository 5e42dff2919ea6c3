//! Helpers for self-referential trees (departments, menus).
//!
//! Nodes point at their parent by id; top-level nodes use
//! [`ROOT_PARENT_ID`](crate::types::ROOT_PARENT_ID). The closure functions here
//! are the in-memory counterpart of the recursive SQL queries in the db crate.

use std::collections::{HashSet, VecDeque};

use crate::error::CoreError;
use crate::types::ROOT_PARENT_ID;

/// A node of an adjacency-list tree.
pub trait TreeNode: Clone {
    fn node_id(&self) -> &str;
    fn parent_id(&self) -> &str;
    fn set_children(&mut self, children: Vec<Self>);
}

/// Assemble a flat list into nested trees under `parent_id`.
///
/// Input order is preserved among siblings. Nodes unreachable from
/// `parent_id` are dropped.
pub fn build_tree<T: TreeNode>(items: &[T], parent_id: &str) -> Vec<T> {
    let mut visited = HashSet::new();
    build_level(items, parent_id, &mut visited)
}

fn build_level<'a, T: TreeNode>(
    items: &'a [T],
    parent_id: &str,
    visited: &mut HashSet<&'a str>,
) -> Vec<T> {
    let mut level = Vec::new();
    for item in items.iter().filter(|i| i.parent_id() == parent_id) {
        // Guards against malformed data that already contains a cycle.
        if !visited.insert(item.node_id()) {
            continue;
        }
        let mut node = item.clone();
        let children = build_level(items, item.node_id(), visited);
        if !children.is_empty() {
            node.set_children(children);
        }
        level.push(node);
    }
    level
}

/// The node `id` followed by all of its descendants, breadth first.
pub fn descendants<'a, T: TreeNode>(items: &'a [T], id: &str) -> Vec<&'a T> {
    let Some(start) = items.iter().find(|i| i.node_id() == id) else {
        return Vec::new();
    };
    let mut seen: HashSet<&str> = HashSet::from([start.node_id()]);
    let mut out = vec![start];
    let mut queue = VecDeque::from([start.node_id()]);
    while let Some(current) = queue.pop_front() {
        for child in items.iter().filter(|i| i.parent_id() == current) {
            if seen.insert(child.node_id()) {
                out.push(child);
                queue.push_back(child.node_id());
            }
        }
    }
    out
}

/// All strict ancestors of `id`, root first.
pub fn ancestors<'a, T: TreeNode>(items: &'a [T], id: &str) -> Vec<&'a T> {
    let mut chain = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([id]);
    let mut current = items.iter().find(|i| i.node_id() == id);
    while let Some(node) = current {
        let parent = node.parent_id();
        if parent == ROOT_PARENT_ID || !seen.insert(parent) {
            break;
        }
        current = items.iter().find(|i| i.node_id() == parent);
        if let Some(p) = current {
            chain.push(p);
        }
    }
    chain.reverse();
    chain
}

/// Reject placing `node_id` under `new_parent` when that would form a cycle.
///
/// `subtree_ids` is the closure of `node_id` (itself plus descendants) as
/// currently persisted.
pub fn ensure_acyclic_parent<S: AsRef<str>>(
    node_id: &str,
    new_parent: &str,
    subtree_ids: &[S],
) -> Result<(), CoreError> {
    if new_parent == node_id {
        return Err(CoreError::Validation(
            "A node cannot be its own parent".into(),
        ));
    }
    if subtree_ids.iter().any(|id| id.as_ref() == new_parent) {
        return Err(CoreError::Validation(
            "A node cannot be moved under one of its descendants".into(),
        ));
    }
    Ok(())
}

/// Level of a node placed under a parent with `parent_level` (`None` = root).
pub fn level_under(parent_level: Option<i32>) -> i32 {
    parent_level.map_or(1, |l| l + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        id: String,
        parent: String,
        children: Vec<Node>,
    }

    impl TreeNode for Node {
        fn node_id(&self) -> &str {
            &self.id
        }
        fn parent_id(&self) -> &str {
            &self.parent
        }
        fn set_children(&mut self, children: Vec<Self>) {
            self.children = children;
        }
    }

    fn node(id: &str, parent: &str) -> Node {
        Node {
            id: id.into(),
            parent: parent.into(),
            children: Vec::new(),
        }
    }

    /// A -> B -> C, plus A -> D.
    fn sample() -> Vec<Node> {
        vec![
            node("A", "ROOT"),
            node("B", "A"),
            node("C", "B"),
            node("D", "A"),
        ]
    }

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn descendants_include_self() {
        let items = sample();
        assert_eq!(ids(&descendants(&items, "A")), ["A", "B", "D", "C"]);
        assert_eq!(ids(&descendants(&items, "C")), ["C"]);
        assert!(descendants(&items, "missing").is_empty());
    }

    #[test]
    fn ancestors_are_strict_and_root_first() {
        let items = sample();
        assert_eq!(ids(&ancestors(&items, "C")), ["A", "B"]);
        assert!(ancestors(&items, "A").is_empty());
    }

    #[test]
    fn build_tree_nests_children() {
        let tree = build_tree(&sample(), ROOT_PARENT_ID);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].children[0].id, "C");
    }

    #[test]
    fn build_tree_survives_cyclic_rows() {
        let items = vec![node("X", "Y"), node("Y", "X")];
        let tree = build_tree(&items, "X");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "Y");
        assert_eq!(tree[0].children.len(), 1);
        assert!(tree[0].children[0].children.is_empty());
    }

    #[test]
    fn cycle_checks() {
        let items = sample();
        let subtree: Vec<String> = ids(&descendants(&items, "B"));
        assert!(ensure_acyclic_parent("B", "B", &subtree).is_err());
        assert!(ensure_acyclic_parent("B", "C", &subtree).is_err());
        assert!(ensure_acyclic_parent("B", "D", &subtree).is_ok());
        assert!(ensure_acyclic_parent("B", ROOT_PARENT_ID, &subtree).is_ok());
    }

    #[test]
    fn level_from_parent() {
        assert_eq!(level_under(None), 1);
        assert_eq!(level_under(Some(2)), 3);
    }
}
