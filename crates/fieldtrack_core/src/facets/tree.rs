//! Hierarchical facet forest construction.
//!
//! # Responsibility
//! - Materialize flat parent-linked records into serializable trees for
//!   filter widgets.
//! - Group engineers under their departments as a two-level forest.
//!
//! # Invariants
//! - Every input record appears at most once in the output; a node is never
//!   visited twice even when the input contains a parent loop.
//! - Records whose parent id is unknown are dropped with a warning, never
//!   promoted to roots.
//! - Sibling order follows input order.

use crate::model::{DepartmentId, EngineerId};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Flat input record: one node and its optional parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    pub id: i64,
    pub label: String,
    pub parent: Option<i64>,
}

/// One materialized tree node.
///
/// The id is a string so engineer forests can carry `eng_`/`dep_` composite
/// ids alongside plain numeric object trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    fn leaf(id: String, label: String) -> Self {
        Self {
            id,
            label,
            children: Vec::new(),
        }
    }

    /// Total node count of this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

struct Indexed {
    label: String,
    children: Vec<i64>,
}

/// Builds a forest from flat parent-linked records.
///
/// Two passes: index every record by id and append child links in input
/// order, then materialize each root iteratively. A shared visited set
/// guarantees termination and uniqueness on malformed input.
pub fn build_forest(records: &[TreeRecord]) -> Vec<Node> {
    let mut index: HashMap<i64, Indexed> = HashMap::new();
    let mut roots: Vec<i64> = Vec::new();

    for record in records {
        index.entry(record.id).or_insert_with(|| Indexed {
            label: record.label.clone(),
            children: Vec::new(),
        });
    }

    for record in records {
        match record.parent {
            None => roots.push(record.id),
            Some(parent) if index.contains_key(&parent) => {
                let entry = index.get_mut(&parent);
                if let Some(entry) = entry {
                    if !entry.children.contains(&record.id) {
                        entry.children.push(record.id);
                    }
                }
            }
            Some(parent) => {
                warn!(
                    "event=tree_orphan_dropped module=facets status=skipped node={} parent={parent}",
                    record.id
                );
            }
        }
    }

    let mut visited: HashSet<i64> = HashSet::new();
    let mut forest = Vec::new();
    for root in roots {
        if let Some(node) = materialize(root, &index, &mut visited) {
            forest.push(node);
        }
    }
    forest
}

struct Frame {
    id: i64,
    node: Node,
    next_child: usize,
}

/// Iterative depth-first materialization of one root.
fn materialize(
    root: i64,
    index: &HashMap<i64, Indexed>,
    visited: &mut HashSet<i64>,
) -> Option<Node> {
    if !visited.insert(root) {
        return None;
    }
    let entry = index.get(&root)?;
    let mut stack = vec![Frame {
        id: root,
        node: Node::leaf(root.to_string(), entry.label.clone()),
        next_child: 0,
    }];

    loop {
        let child_id = {
            let frame = stack.last_mut()?;
            let children = &index.get(&frame.id)?.children;
            if frame.next_child < children.len() {
                let child = children[frame.next_child];
                frame.next_child += 1;
                Some(child)
            } else {
                None
            }
        };

        match child_id {
            Some(child) => {
                if !visited.insert(child) {
                    // Loop in the parent links; skip the repeated node.
                    warn!(
                        "event=tree_cycle_skipped module=facets status=skipped node={child}"
                    );
                    continue;
                }
                if let Some(entry) = index.get(&child) {
                    stack.push(Frame {
                        id: child,
                        node: Node::leaf(child.to_string(), entry.label.clone()),
                        next_child: 0,
                    });
                }
            }
            None => {
                let finished = stack.pop()?;
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(finished.node),
                    None => return Some(finished.node),
                }
            }
        }
    }
}

/// Flat engineer record used to build the assignee facet forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineerLeaf {
    pub engineer_id: EngineerId,
    pub label: String,
    pub department: Option<(DepartmentId, String)>,
}

/// Groups engineers under their departments.
///
/// Department nodes carry `dep_<id>` ids and appear in first-seen input
/// order; engineers carry `eng_<id>` ids. Engineers without a department
/// trail the grouped part as flat leaves. Departments with no engineers in
/// the input do not appear at all.
pub fn build_engineer_forest(leaves: &[EngineerLeaf]) -> Vec<Node> {
    let mut department_order: Vec<DepartmentId> = Vec::new();
    let mut departments: HashMap<DepartmentId, Node> = HashMap::new();
    let mut unassigned: Vec<Node> = Vec::new();

    for leaf in leaves {
        let node = Node::leaf(format!("eng_{}", leaf.engineer_id), leaf.label.clone());
        match &leaf.department {
            Some((department_id, department_label)) => {
                let entry = departments.entry(*department_id).or_insert_with(|| {
                    department_order.push(*department_id);
                    Node::leaf(format!("dep_{department_id}"), department_label.clone())
                });
                entry.children.push(node);
            }
            None => unassigned.push(node),
        }
    }

    let mut forest = Vec::new();
    for department_id in department_order {
        if let Some(node) = departments.remove(&department_id) {
            forest.push(node);
        }
    }
    forest.extend(unassigned);
    forest
}
