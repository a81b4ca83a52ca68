//! Structural diff between two resolved widget trees.
//!
//! Applying the returned patches in order to a copy of the previous tree
//! yields a tree equal to the next one. Children of a parent are always
//! matched by id: unkeyed ids come from a per-type ordinal, so list position
//! alone does not identify a child.

use std::collections::BTreeSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::map::HashSet;
use crate::widget::{Props, WidgetNode};
use crate::{Key, NodeId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Patch {
    /// Insert `node` (with its whole subtree) as child `index` of `parent`.
    /// A `None` parent replaces the root.
    Insert {
        parent: Option<NodeId>,
        index: usize,
        node: Rc<WidgetNode>,
    },
    Remove {
        id: NodeId,
    },
    /// Replace the properties and event set of an existing node.
    UpdateProps {
        id: NodeId,
        props: Props,
        events: BTreeSet<String>,
    },
    /// Move an existing child to `index` within its current parent.
    Move {
        id: NodeId,
        index: usize,
    },
}

/// One committed render, as sent to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitMessage {
    pub version: u64,
    pub patches: Vec<Patch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate key {key} among children of {}", describe_parent(.parent))]
pub struct DuplicateKeyError {
    pub parent: Option<NodeId>,
    pub key: Key,
}

fn describe_parent(parent: &Option<NodeId>) -> String {
    match parent {
        Some(id) => format!("node {id:#x}"),
        None => "the root".to_owned(),
    }
}

pub fn diff(
    previous: Option<&Rc<WidgetNode>>,
    next: Option<&Rc<WidgetNode>>,
) -> Result<Vec<Patch>, DuplicateKeyError> {
    let mut patches = Vec::new();
    match (previous, next) {
        (None, None) => {}
        (Some(previous), None) => patches.push(Patch::Remove { id: previous.id }),
        (None, Some(next)) => {
            check_unique_keys(next)?;
            patches.push(Patch::Insert {
                parent: None,
                index: 0,
                node: Rc::clone(next),
            });
        }
        (Some(previous), Some(next)) => {
            if same_node(previous, next) {
                diff_node(previous, next, &mut patches)?;
            } else {
                check_unique_keys(next)?;
                patches.push(Patch::Remove { id: previous.id });
                patches.push(Patch::Insert {
                    parent: None,
                    index: 0,
                    node: Rc::clone(next),
                });
            }
        }
    }
    Ok(patches)
}

fn same_node(previous: &WidgetNode, next: &WidgetNode) -> bool {
    previous.id == next.id && previous.kind == next.kind
}

fn diff_node(
    previous: &Rc<WidgetNode>,
    next: &Rc<WidgetNode>,
    patches: &mut Vec<Patch>,
) -> Result<(), DuplicateKeyError> {
    if Rc::ptr_eq(previous, next) {
        return Ok(());
    }
    if previous.props != next.props || previous.events != next.events {
        patches.push(Patch::UpdateProps {
            id: next.id,
            props: next.props.clone(),
            events: next.events.clone(),
        });
    }
    ensure_unique_keys(next)?;
    diff_children(previous, next, patches)
}

fn diff_children(
    previous: &Rc<WidgetNode>,
    next: &Rc<WidgetNode>,
    patches: &mut Vec<Patch>,
) -> Result<(), DuplicateKeyError> {
    let desired: HashSet<NodeId> = next.children.iter().map(|child| child.id).collect();

    for child in previous.children.iter().rev() {
        if !desired.contains(&child.id) {
            patches.push(Patch::Remove { id: child.id });
        }
    }
    let mut current: Vec<&Rc<WidgetNode>> = previous
        .children
        .iter()
        .filter(|child| desired.contains(&child.id))
        .collect();

    for (target_index, child) in next.children.iter().enumerate() {
        match current.iter().position(|existing| existing.id == child.id) {
            Some(current_index) => {
                let existing = current[current_index];
                if current_index != target_index {
                    current.remove(current_index);
                    let to_index = target_index.min(current.len());
                    current.insert(to_index, existing);
                    patches.push(Patch::Move {
                        id: child.id,
                        index: to_index,
                    });
                }
                if existing.kind == child.kind {
                    diff_node(existing, child, patches)?;
                } else {
                    check_unique_keys(child)?;
                    patches.push(Patch::Remove { id: existing.id });
                    patches.push(Patch::Insert {
                        parent: Some(next.id),
                        index: target_index,
                        node: Rc::clone(child),
                    });
                }
            }
            None => {
                check_unique_keys(child)?;
                let insert_index = target_index.min(current.len());
                current.insert(insert_index, child);
                patches.push(Patch::Insert {
                    parent: Some(next.id),
                    index: insert_index,
                    node: Rc::clone(child),
                });
            }
        }
    }
    Ok(())
}

fn ensure_unique_keys(node: &WidgetNode) -> Result<(), DuplicateKeyError> {
    let mut seen = HashSet::new();
    for key in node.children.iter().filter_map(|child| child.key.as_ref()) {
        if !seen.insert(key) {
            return Err(DuplicateKeyError {
                parent: Some(node.id),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Checks every level of a subtree that is about to be inserted wholesale.
fn check_unique_keys(node: &WidgetNode) -> Result<(), DuplicateKeyError> {
    ensure_unique_keys(node)?;
    node.children
        .iter()
        .try_for_each(|child| check_unique_keys(child))
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
