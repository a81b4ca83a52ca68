use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexSet;

use crate::events::InboundEvent;
use crate::platform::{Clock, FrozenClock, ManualScheduler, RuntimeScheduler};
use crate::state::PendingState;
use crate::ViewId;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    clock: Arc<dyn Clock>,
    needs_turn: Cell<bool>,
    pending_states: RefCell<Vec<Rc<dyn PendingState>>>,
    invalid_views: RefCell<IndexSet<ViewId>>,
    inbound: RefCell<VecDeque<InboundEvent>>,
    last_refresh_token: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler,
            clock,
            needs_turn: Cell::new(false),
            pending_states: RefCell::new(Vec::new()),
            invalid_views: RefCell::new(IndexSet::new()),
            inbound: RefCell::new(VecDeque::new()),
            last_refresh_token: Cell::new(0),
        }
    }

    fn schedule(&self) {
        self.needs_turn.set(true);
        self.scheduler.schedule_turn();
    }

    fn enqueue_state(&self, state: Rc<dyn PendingState>) {
        self.pending_states.borrow_mut().push(state);
        self.schedule();
    }

    fn invalidate_view(&self, id: ViewId) {
        if self.invalid_views.borrow_mut().insert(id) {
            self.schedule();
        }
    }

    fn enqueue_event(&self, event: InboundEvent) {
        self.inbound.borrow_mut().push_back(event);
        self.schedule();
    }

    fn apply_pending_states(&self) -> IndexSet<ViewId> {
        let pending: Vec<Rc<dyn PendingState>> =
            self.pending_states.borrow_mut().drain(..).collect();
        for state in pending {
            if state.apply() {
                if let Some(owner) = state.owner() {
                    self.invalid_views.borrow_mut().insert(owner);
                }
            }
        }
        std::mem::take(&mut *self.invalid_views.borrow_mut())
    }

    fn next_refresh_token(&self) -> u64 {
        let token = self
            .clock
            .now_ticks()
            .max(self.last_refresh_token.get().saturating_add(1));
        self.last_refresh_token.set(token);
        token
    }
}

/// Owns the queues a session drains on each turn.
///
/// State cells, effect scopes and task wakers only ever hold a
/// [`RuntimeHandle`], so dropping the runtime makes every outstanding handle
/// inert.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, clock)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn scheduler(&self) -> Arc<dyn RuntimeScheduler> {
        Arc::clone(&self.inner.scheduler)
    }

    pub fn needs_turn(&self) -> bool {
        self.inner.needs_turn.get()
    }

    pub fn set_needs_turn(&self, value: bool) {
        self.inner.needs_turn.set(value);
    }

    pub fn has_pending_states(&self) -> bool {
        !self.inner.pending_states.borrow().is_empty()
            || !self.inner.invalid_views.borrow().is_empty()
    }

    pub fn has_inbound_events(&self) -> bool {
        !self.inner.inbound.borrow().is_empty()
    }

    pub(crate) fn pop_event(&self) -> Option<InboundEvent> {
        self.inner.inbound.borrow_mut().pop_front()
    }

    pub(crate) fn apply_pending_states(&self) -> IndexSet<ViewId> {
        self.inner.apply_pending_states()
    }

    pub(crate) fn clear_pending(&self) {
        self.inner.pending_states.borrow_mut().clear();
        self.inner.invalid_views.borrow_mut().clear();
        self.inner.inbound.borrow_mut().clear();
        self.inner.needs_turn.set(false);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(ManualScheduler), Arc::new(FrozenClock))
    }
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    /// Handle that is never attached to a runtime. Updates through it are
    /// dropped.
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    pub fn enqueue_event(&self, event: InboundEvent) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_event(event);
        } else {
            log::debug!(
                "dropping event {} for widget {:#x}: runtime is gone",
                event.event_name,
                event.widget_id
            );
        }
    }

    pub(crate) fn enqueue_state(&self, state: Rc<dyn PendingState>) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                inner.enqueue_state(state);
                true
            }
            None => false,
        }
    }

    pub fn invalidate_view(&self, id: ViewId) {
        if let Some(inner) = self.0.upgrade() {
            inner.invalidate_view(id);
        }
    }

    /// Strictly increasing token, at least the clock's current tick count.
    pub fn next_refresh_token(&self) -> u64 {
        self.0
            .upgrade()
            .map(|inner| inner.next_refresh_token())
            .unwrap_or_default()
    }

    pub fn now_ticks(&self) -> u64 {
        self.0
            .upgrade()
            .map(|inner| inner.clock.now_ticks())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
