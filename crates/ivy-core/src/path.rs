//! Tree paths and the identities derived from them.
//!
//! Each level of the tree contributes one segment: the element's type plus
//! either its key or its position among same-type siblings. Hashing the
//! chain of segments yields the id of the view or widget at that path, so
//! the same element in the same place gets the same id on every render.

use std::fmt;

use crate::hash::map::{HashMap, HashSet};
use crate::hash;
use crate::reconcile::DuplicateKeyError;
use crate::{Key, NodeId};

/// Ids are truncated to 53 bits so they survive a round trip through an
/// IEEE double on the client.
const ID_MASK: u64 = (1 << 53) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    View,
    Widget,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentSlot {
    Keyed(Key),
    Index(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub kind: SegmentKind,
    pub type_name: &'static str,
    pub slot: SegmentSlot,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            SegmentSlot::Keyed(key) => write!(f, "{}:{}", self.type_name, key),
            SegmentSlot::Index(index) => write!(f, "{}#{}", self.type_name, index),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    hash: u64,
    depth: usize,
}

impl Path {
    pub fn root() -> Self {
        Self {
            hash: hash::hash_one("ivy-root"),
            depth: 0,
        }
    }

    pub fn child(&self, segment: &PathSegment) -> Self {
        Self {
            hash: hash::combine(self.hash, segment),
            depth: self.depth + 1,
        }
    }

    pub fn id(&self) -> NodeId {
        self.hash & ID_MASK
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Assigns segments to the children of one parent, in order.
pub struct SiblingCounter {
    parent: Option<NodeId>,
    by_type: HashMap<(SegmentKind, &'static str), usize>,
    keys: HashSet<Key>,
}

impl SiblingCounter {
    pub fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            by_type: HashMap::new(),
            keys: HashSet::new(),
        }
    }

    pub fn next(
        &mut self,
        kind: SegmentKind,
        type_name: &'static str,
        key: Option<&Key>,
    ) -> Result<PathSegment, DuplicateKeyError> {
        let slot = match key {
            Some(key) => {
                if !self.keys.insert(key.clone()) {
                    return Err(DuplicateKeyError {
                        parent: self.parent,
                        key: key.clone(),
                    });
                }
                SegmentSlot::Keyed(key.clone())
            }
            None => {
                let count = self.by_type.entry((kind, type_name)).or_insert(0);
                let index = *count;
                *count += 1;
                SegmentSlot::Index(index)
            }
        };
        Ok(PathSegment {
            kind,
            type_name,
            slot,
        })
    }
}
