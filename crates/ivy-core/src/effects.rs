use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use thiserror::Error;

use crate::runtime::RuntimeHandle;
use crate::ViewId;

/// One invocation of an effect: its cancellation flag and cleanup.
pub(crate) struct EffectHandle {
    active: Cell<bool>,
    cleanup: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl EffectHandle {
    pub(crate) fn new() -> Self {
        Self {
            active: Cell::new(true),
            cleanup: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Marks the invocation cancelled and runs its cleanups once, in
    /// registration order.
    pub(crate) fn cancel(&self) {
        if !self.active.replace(false) {
            return;
        }
        let cleanups: Vec<Box<dyn FnOnce()>> = self.cleanup.borrow_mut().drain(..).collect();
        for cleanup in cleanups {
            cleanup();
        }
    }
}

/// Passed to effect bodies.
#[derive(Clone)]
pub struct EffectScope {
    handle: Rc<EffectHandle>,
    runtime: RuntimeHandle,
    view: ViewId,
}

impl EffectScope {
    pub(crate) fn new(handle: Rc<EffectHandle>, runtime: RuntimeHandle, view: ViewId) -> Self {
        Self {
            handle,
            runtime,
            view,
        }
    }

    /// False once the effect's dependencies changed or its view was removed.
    /// Async bodies should check this before publishing results.
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Registers teardown work. Runs immediately if the scope is already
    /// cancelled.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        if self.handle.is_active() {
            self.handle.cleanup.borrow_mut().push(Box::new(cleanup));
        } else {
            cleanup();
        }
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub fn view_id(&self) -> ViewId {
        self.view
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("view", &self.view)
            .field("active", &self.is_active())
            .finish()
    }
}

pub(crate) type SyncEffect = Box<dyn FnOnce(&EffectScope) -> anyhow::Result<()>>;
pub(crate) type AsyncEffect =
    Box<dyn FnOnce(EffectScope) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

pub(crate) enum EffectBody {
    Sync(SyncEffect),
    Async(AsyncEffect),
}

/// An effect registered during render, waiting for commit.
pub(crate) struct PendingEffect {
    pub(crate) view: ViewId,
    pub(crate) slot: usize,
    pub(crate) body: EffectBody,
}

/// An effect body returned an error or its future resolved to one.
#[derive(Debug, Error)]
#[error("effect {slot} of view {view:#x} failed: {error}")]
pub struct EffectException {
    pub view: ViewId,
    pub slot: usize,
    pub error: anyhow::Error,
}

/// Keeps the last registration for each (view, slot), preserving the order
/// in which those last registrations were made.
pub(crate) fn dedup_pending(effects: Vec<PendingEffect>) -> Vec<PendingEffect> {
    let mut seen = crate::hash::map::HashSet::new();
    let mut kept: Vec<PendingEffect> = effects
        .into_iter()
        .rev()
        .filter(|effect| seen.insert((effect.view, effect.slot)))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
#[path = "tests/effects_tests.rs"]
mod tests;
