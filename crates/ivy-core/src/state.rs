use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::runtime::RuntimeHandle;
use crate::ViewId;

/// A queued state write, applied by the runtime at the start of a turn.
pub(crate) trait PendingState {
    /// Applies queued updates in order. Returns whether the value changed.
    fn apply(&self) -> bool;
    fn owner(&self) -> Option<ViewId>;
}

type Update<T> = Box<dyn FnOnce(&T) -> Option<T>>;

struct StateInner<T: 'static> {
    value: RefCell<T>,
    pending: RefCell<Vec<Update<T>>>,
    version: Cell<u64>,
    queued: Cell<bool>,
    owner: Option<ViewId>,
    runtime: RuntimeHandle,
}

impl<T: 'static> StateInner<T> {
    fn apply_updates(&self) -> bool {
        self.queued.set(false);
        let updates: Vec<Update<T>> = self.pending.borrow_mut().drain(..).collect();
        let mut changed = false;
        for update in updates {
            let next = update(&self.value.borrow());
            if let Some(next) = next {
                *self.value.borrow_mut() = next;
                changed = true;
            }
        }
        if changed {
            self.version.set(self.version.get() + 1);
        }
        changed
    }
}

impl<T: 'static> PendingState for StateInner<T> {
    fn apply(&self) -> bool {
        self.apply_updates()
    }

    fn owner(&self) -> Option<ViewId> {
        self.owner
    }
}

/// Handle to a value owned by a view's hook store.
///
/// Writes never take effect immediately: they are queued on the runtime and
/// applied together at the start of the next turn, after which the owning
/// view re-renders if the value changed. Reads observe the value as of the
/// last applied turn.
pub struct StateCell<T: 'static> {
    inner: Rc<StateInner<T>>,
}

impl<T: 'static> StateCell<T> {
    pub(crate) fn new(value: T, owner: ViewId, runtime: RuntimeHandle) -> Self {
        Self::build(value, Some(owner), runtime)
    }

    /// State that belongs to no view. Writes still go through `runtime`, and
    /// are applied immediately when the runtime is gone or detached.
    pub fn with_runtime(value: T, runtime: RuntimeHandle) -> Self {
        Self::build(value, None, runtime)
    }

    fn build(value: T, owner: Option<ViewId>, runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(StateInner {
                value: RefCell::new(value),
                pending: RefCell::new(Vec::new()),
                version: Cell::new(0),
                queued: Cell::new(false),
                owner,
                runtime,
            }),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of applied writes that changed the value.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn owner(&self) -> Option<ViewId> {
        self.inner.owner
    }

    /// Queues a write that may decline by returning `None`.
    pub fn try_update(&self, f: impl FnOnce(&T) -> Option<T> + 'static) {
        self.inner.pending.borrow_mut().push(Box::new(f));
        if self.inner.queued.replace(true) {
            return;
        }
        let pending: Rc<dyn PendingState> = self.inner.clone();
        if !self.inner.runtime.enqueue_state(pending) {
            self.inner.apply_updates();
        }
    }

    /// Queues an unconditional write.
    pub fn replace(&self, value: T) {
        self.try_update(move |_| Some(value));
    }
}

impl<T: PartialEq + 'static> StateCell<T> {
    /// Queues a write. A value equal to the current one is dropped and does
    /// not invalidate the owner.
    pub fn set(&self, value: T) {
        self.try_update(move |current| (*current != value).then_some(value));
    }

    /// Queues a write computed from the value current at apply time.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.try_update(move |current| {
            let next = f(current);
            (*current != next).then_some(next)
        });
    }
}

impl<T: Clone + 'static> StateCell<T> {
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: 'static> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> PartialEq for StateCell<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Eq for StateCell<T> {}

impl<T: fmt::Debug + 'static> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
