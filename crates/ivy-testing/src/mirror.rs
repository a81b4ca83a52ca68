//! A stand-in for the presentation client.
//!
//! [`MirrorClient`] holds an owned copy of the widget tree and changes it only
//! by applying patches, exactly as a real client would. Comparing the mirror
//! with the session's committed tree checks that the patch stream is
//! sufficient to reconstruct every commit.

use std::collections::BTreeSet;
use std::rc::Rc;

use ivy_core::{CommitMessage, Key, NodeId, Patch, Props, WidgetNode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("patch targets node {0:#x}, which the mirror does not hold")]
    UnknownNode(NodeId),
    #[error("insert at the root while node {0:#x} is still mounted")]
    RootOccupied(NodeId),
    #[error("index {index} is out of range for {len} children of node {parent:#x}")]
    IndexOutOfRange {
        parent: NodeId,
        index: usize,
        len: usize,
    },
    #[error("node {0:#x} would appear twice")]
    DuplicateId(NodeId),
    #[error("commit {received} arrived after commit {last}")]
    StaleCommit { last: u64, received: u64 },
}

/// One node of the mirrored tree.
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorNode {
    pub id: NodeId,
    pub kind: String,
    pub key: Option<Key>,
    pub props: Props,
    pub events: BTreeSet<String>,
    pub children: Vec<MirrorNode>,
}

impl From<&WidgetNode> for MirrorNode {
    fn from(node: &WidgetNode) -> Self {
        Self {
            id: node.id,
            kind: node.kind.clone(),
            key: node.key.clone(),
            props: node.props.clone(),
            events: node.events.clone(),
            children: node
                .children
                .iter()
                .map(|child| MirrorNode::from(child.as_ref()))
                .collect(),
        }
    }
}

impl MirrorNode {
    pub fn to_widget(&self) -> WidgetNode {
        WidgetNode {
            id: self.id,
            kind: self.kind.clone(),
            key: self.key.clone(),
            props: self.props.clone(),
            events: self.events.clone(),
            children: self
                .children
                .iter()
                .map(|child| Rc::new(child.to_widget()))
                .collect(),
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&MirrorNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut MirrorNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    fn parent_of_mut(&mut self, id: NodeId) -> Option<&mut MirrorNode> {
        if self.children.iter().any(|child| child.id == id) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.parent_of_mut(id))
    }

    fn collect_ids(&self, ids: &mut Vec<NodeId>) {
        ids.push(self.id);
        for child in &self.children {
            child.collect_ids(ids);
        }
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(MirrorNode::count).sum::<usize>()
    }
}

/// Owned replica of the client-side tree.
#[derive(Clone, Debug, Default)]
pub struct MirrorClient {
    root: Option<MirrorNode>,
    version: u64,
    applied: usize,
}

impl MirrorClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&MirrorNode> {
        self.root.as_ref()
    }

    /// Version of the last applied commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of individual patches applied so far.
    pub fn applied_patches(&self) -> usize {
        self.applied
    }

    pub fn node(&self, id: NodeId) -> Option<&MirrorNode> {
        self.root.as_ref().and_then(|root| root.find(id))
    }

    /// The mirrored tree in the session's representation.
    pub fn snapshot(&self) -> Option<WidgetNode> {
        self.root.as_ref().map(MirrorNode::to_widget)
    }

    /// True when the mirror holds exactly `tree`.
    pub fn matches(&self, tree: Option<&WidgetNode>) -> bool {
        match (&self.root, tree) {
            (None, None) => true,
            (Some(root), Some(tree)) => *root == MirrorNode::from(tree),
            _ => false,
        }
    }

    pub fn apply_commit(&mut self, commit: &CommitMessage) -> Result<(), MirrorError> {
        if commit.version <= self.version {
            return Err(MirrorError::StaleCommit {
                last: self.version,
                received: commit.version,
            });
        }
        for patch in &commit.patches {
            self.apply(patch)?;
        }
        self.version = commit.version;
        Ok(())
    }

    pub fn apply(&mut self, patch: &Patch) -> Result<(), MirrorError> {
        match patch {
            Patch::Insert {
                parent: None,
                index: _,
                node,
            } => {
                if let Some(root) = &self.root {
                    return Err(MirrorError::RootOccupied(root.id));
                }
                self.root = Some(MirrorNode::from(node.as_ref()));
            }
            Patch::Insert {
                parent: Some(parent),
                index,
                node,
            } => {
                let inserted = MirrorNode::from(node.as_ref());
                self.ensure_absent(&inserted)?;
                let target = self.node_mut(*parent)?;
                if *index > target.children.len() {
                    return Err(MirrorError::IndexOutOfRange {
                        parent: *parent,
                        index: *index,
                        len: target.children.len(),
                    });
                }
                target.children.insert(*index, inserted);
            }
            Patch::Remove { id } => {
                if self.root.as_ref().is_some_and(|root| root.id == *id) {
                    self.root = None;
                } else {
                    let parent = self.parent_mut(*id)?;
                    parent.children.retain(|child| child.id != *id);
                }
            }
            Patch::UpdateProps { id, props, events } => {
                let target = self.node_mut(*id)?;
                target.props = props.clone();
                target.events = events.clone();
            }
            Patch::Move { id, index } => {
                let parent = self.parent_mut(*id)?;
                let from = parent
                    .children
                    .iter()
                    .position(|child| child.id == *id)
                    .ok_or(MirrorError::UnknownNode(*id))?;
                let moved = parent.children.remove(from);
                if *index > parent.children.len() {
                    let len = parent.children.len();
                    let parent_id = parent.id;
                    parent.children.insert(from, moved);
                    return Err(MirrorError::IndexOutOfRange {
                        parent: parent_id,
                        index: *index,
                        len,
                    });
                }
                parent.children.insert(*index, moved);
            }
        }
        self.applied += 1;
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MirrorNode, MirrorError> {
        self.root
            .as_mut()
            .and_then(|root| root.find_mut(id))
            .ok_or(MirrorError::UnknownNode(id))
    }

    fn parent_mut(&mut self, id: NodeId) -> Result<&mut MirrorNode, MirrorError> {
        self.root
            .as_mut()
            .and_then(|root| root.parent_of_mut(id))
            .ok_or(MirrorError::UnknownNode(id))
    }

    fn ensure_absent(&self, subtree: &MirrorNode) -> Result<(), MirrorError> {
        let mut ids = Vec::new();
        subtree.collect_ids(&mut ids);
        match ids.into_iter().find(|id| self.node(*id).is_some()) {
            Some(id) => Err(MirrorError::DuplicateId(id)),
            None => Ok(()),
        }
    }
}
