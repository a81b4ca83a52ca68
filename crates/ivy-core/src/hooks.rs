//! Per-view hook storage.
//!
//! Hooks are matched to slots purely by call order, so every render of a
//! view must call the same hooks in the same order. The store detects when
//! that contract is broken and reports it instead of handing out a slot of
//! the wrong kind.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::deps::Deps;
use crate::effects::EffectHandle;
use crate::ViewId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Effect,
    Memo,
    Ref,
    Context,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::State => "state",
            HookKind::Effect => "effect",
            HookKind::Memo => "memo",
            HookKind::Ref => "ref",
            HookKind::Context => "context",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookSequenceError {
    #[error("hook {index} changed kind from {expected} to {found} between renders")]
    KindMismatch {
        index: usize,
        expected: HookKind,
        found: HookKind,
    },
    #[error("{kind} hook {index} changed its value type between renders")]
    TypeMismatch { index: usize, kind: HookKind },
    #[error("render called more hooks than the previous render ({expected}); extra {kind} hook at {index}")]
    TooMany {
        index: usize,
        expected: usize,
        kind: HookKind,
    },
    #[error("render called {found} hooks but the previous render called {expected}")]
    TooFew { expected: usize, found: usize },
}

pub struct EffectSlot {
    pub(crate) deps: Option<Deps>,
    pub(crate) handle: Option<Rc<EffectHandle>>,
}

pub struct MemoSlot {
    pub(crate) deps: Deps,
    pub(crate) value: Box<dyn Any>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContextRole {
    Provide,
    Consume,
}

pub struct ContextSlot {
    pub(crate) type_id: TypeId,
    pub(crate) role: ContextRole,
}

pub enum HookSlot {
    State(Box<dyn Any>),
    Effect(EffectSlot),
    Memo(MemoSlot),
    Ref(Box<dyn Any>),
    Context(ContextSlot),
}

impl HookSlot {
    pub fn kind(&self) -> HookKind {
        match self {
            HookSlot::State(_) => HookKind::State,
            HookSlot::Effect(_) => HookKind::Effect,
            HookSlot::Memo(_) => HookKind::Memo,
            HookSlot::Ref(_) => HookKind::Ref,
            HookSlot::Context(_) => HookKind::Context,
        }
    }
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookSlot").field(&self.kind()).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotClaim {
    /// First render: the caller allocates the slot.
    Vacant(usize),
    Occupied(usize),
}

/// Ordered hook slots of one view instance.
#[derive(Default)]
pub struct HookStore {
    slots: Vec<HookSlot>,
    cursor: usize,
    committed: bool,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn begin_render(&mut self) {
        self.cursor = 0;
    }

    /// Claims the next slot. A vacant claim must be followed by [`fill`]
    /// before the next claim.
    ///
    /// [`fill`]: HookStore::fill
    pub fn claim(&mut self, kind: HookKind) -> Result<SlotClaim, HookSequenceError> {
        let index = self.cursor;
        let claim = if let Some(existing) = self.slots.get(index) {
            let expected = existing.kind();
            if expected != kind {
                return Err(HookSequenceError::KindMismatch {
                    index,
                    expected,
                    found: kind,
                });
            }
            SlotClaim::Occupied(index)
        } else if self.committed {
            return Err(HookSequenceError::TooMany {
                index,
                expected: self.slots.len(),
                kind,
            });
        } else {
            SlotClaim::Vacant(index)
        };
        self.cursor += 1;
        Ok(claim)
    }

    pub fn fill(&mut self, slot: HookSlot) {
        debug_assert_eq!(self.slots.len() + 1, self.cursor, "fill without a vacant claim");
        self.slots.push(slot);
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut HookSlot> {
        self.slots.get_mut(index)
    }

    /// Checks that this render claimed exactly as many slots as the last.
    pub fn end_render(&mut self) -> Result<(), HookSequenceError> {
        if self.committed && self.cursor != self.slots.len() {
            return Err(HookSequenceError::TooFew {
                expected: self.slots.len(),
                found: self.cursor,
            });
        }
        self.committed = true;
        Ok(())
    }

    /// Cancels every live effect in declaration order, running cleanups.
    pub(crate) fn dispose(&mut self, view: ViewId) -> usize {
        let mut cleaned = 0;
        for slot in &mut self.slots {
            if let HookSlot::Effect(effect) = slot {
                if let Some(handle) = effect.handle.take() {
                    log::trace!("cleaning up effect of view {view:#x}");
                    handle.cancel();
                    cleaned += 1;
                }
            }
        }
        cleaned
    }
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
