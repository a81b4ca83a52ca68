//! The hook API available to a view while it builds.

use std::any::TypeId;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures_util::FutureExt;

use crate::deps::Deps;
use crate::effects::{EffectBody, EffectScope, PendingEffect};
use crate::hooks::{
    ContextRole, ContextSlot, EffectSlot, HookKind, HookSequenceError, HookSlot, HookStore,
    MemoSlot, SlotClaim,
};
use crate::runtime::RuntimeHandle;
use crate::state::StateCell;
use crate::tree::{RenderPass, Tree};
use crate::ViewId;

/// Dispatches an action to a reducer hook.
pub type Dispatch<A> = Rc<dyn Fn(A)>;

enum Cached<T> {
    Hit(T),
    Stale,
    Mismatch,
}

/// Token from [`RenderContext::use_refresh_token`].
#[derive(Clone)]
pub struct RefreshHandle {
    token: u64,
    state: StateCell<u64>,
    runtime: RuntimeHandle,
}

impl RefreshHandle {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Replaces the token with a new, strictly larger one.
    pub fn refresh(&self) {
        self.state.set(self.runtime.next_refresh_token());
    }
}

impl PartialEq for RefreshHandle {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.state == other.state
    }
}

impl std::fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("token", &self.token)
            .finish()
    }
}

/// Render-time handle passed to [`crate::View::build`].
///
/// Hooks must be called unconditionally and in the same order on every
/// render. A violation is reported once the build returns and aborts the
/// render; until then the offending hook hands out a detached value so the
/// build can finish.
pub struct RenderContext<'a> {
    view: ViewId,
    parent: Option<ViewId>,
    hooks: &'a mut HookStore,
    tree: &'a mut Tree,
    pass: &'a mut RenderPass,
    effects: Vec<PendingEffect>,
    fault: Option<HookSequenceError>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        view: ViewId,
        parent: Option<ViewId>,
        hooks: &'a mut HookStore,
        tree: &'a mut Tree,
        pass: &'a mut RenderPass,
    ) -> Self {
        Self {
            view,
            parent,
            hooks,
            tree,
            pass,
            effects: Vec::new(),
            fault: None,
        }
    }

    pub(crate) fn finish(self) -> (Vec<PendingEffect>, Option<HookSequenceError>) {
        (self.effects, self.fault)
    }

    pub fn view_id(&self) -> ViewId {
        self.view
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.pass.runtime
    }

    /// Commit version this render will produce.
    pub fn version(&self) -> u64 {
        self.pass.version
    }

    fn claim(&mut self, kind: HookKind) -> Option<SlotClaim> {
        if self.fault.is_some() {
            return None;
        }
        match self.hooks.claim(kind) {
            Ok(claim) => Some(claim),
            Err(error) => {
                self.fail(error);
                None
            }
        }
    }

    fn fail(&mut self, error: HookSequenceError) {
        log::error!("view {:#x}: {error}", self.view);
        self.fault.get_or_insert(error);
    }

    pub fn use_state<T: 'static>(&mut self, init: impl FnOnce() -> T) -> StateCell<T> {
        match self.claim(HookKind::State) {
            Some(SlotClaim::Vacant(_)) => {
                let cell = StateCell::new(init(), self.view, self.pass.runtime.clone());
                self.hooks.fill(HookSlot::State(Box::new(cell.clone())));
                cell
            }
            Some(SlotClaim::Occupied(index)) => {
                let existing = match self.hooks.get_mut(index) {
                    Some(HookSlot::State(value)) => value.downcast_ref::<StateCell<T>>().cloned(),
                    _ => None,
                };
                match existing {
                    Some(cell) => cell,
                    None => {
                        self.fail(HookSequenceError::TypeMismatch {
                            index,
                            kind: HookKind::State,
                        });
                        StateCell::with_runtime(init(), RuntimeHandle::detached())
                    }
                }
            }
            None => StateCell::with_runtime(init(), RuntimeHandle::detached()),
        }
    }

    pub fn use_state_with<T: 'static>(&mut self, value: T) -> StateCell<T> {
        self.use_state(move || value)
    }

    /// State driven by a reducer. The reducer captured on the first render
    /// is the one used for the lifetime of the view.
    pub fn use_reducer<T, A>(
        &mut self,
        reducer: impl Fn(&T, A) -> T + 'static,
        init: impl FnOnce() -> T,
    ) -> (T, Dispatch<A>)
    where
        T: Clone + PartialEq + 'static,
        A: 'static,
    {
        let state = self.use_state(init);
        let dispatch = self.use_memo(state.clone(), {
            let state = state.clone();
            move || {
                let reducer = Rc::new(reducer);
                let dispatch: Dispatch<A> = Rc::new(move |action: A| {
                    let reducer = Rc::clone(&reducer);
                    state.update(move |current| reducer(current, action));
                });
                dispatch
            }
        });
        (state.get(), dispatch)
    }

    /// Runs `body` after commit whenever `deps` changed since the last run.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        body: impl FnOnce(&EffectScope) -> anyhow::Result<()> + 'static,
    ) {
        self.register_effect(Some(Deps::new(deps)), EffectBody::Sync(Box::new(body)));
    }

    /// Runs `body` after every commit that rebuilt this view.
    pub fn use_effect_always(
        &mut self,
        body: impl FnOnce(&EffectScope) -> anyhow::Result<()> + 'static,
    ) {
        self.register_effect(None, EffectBody::Sync(Box::new(body)));
    }

    /// Async variant of [`use_effect`]. The future is dropped if the effect
    /// is cancelled before it completes.
    ///
    /// [`use_effect`]: RenderContext::use_effect
    pub fn use_effect_async<D, F, Fut>(&mut self, deps: D, body: F)
    where
        D: PartialEq + 'static,
        F: FnOnce(EffectScope) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.register_effect(
            Some(Deps::new(deps)),
            EffectBody::Async(Box::new(move |scope| body(scope).boxed_local())),
        );
    }

    fn register_effect(&mut self, deps: Option<Deps>, body: EffectBody) {
        let index = match self.claim(HookKind::Effect) {
            Some(SlotClaim::Vacant(index)) => {
                self.hooks
                    .fill(HookSlot::Effect(EffectSlot { deps, handle: None }));
                index
            }
            Some(SlotClaim::Occupied(index)) => {
                let Some(HookSlot::Effect(slot)) = self.hooks.get_mut(index) else {
                    return;
                };
                let changed = match (&slot.deps, &deps) {
                    (Some(previous), Some(next)) => !previous.matches(next),
                    _ => true,
                };
                if !changed {
                    return;
                }
                slot.deps = deps;
                index
            }
            None => return,
        };
        self.effects.push(PendingEffect {
            view: self.view,
            slot: index,
            body,
        });
    }

    /// Caches `factory()` until `deps` changes.
    pub fn use_memo<D, T>(&mut self, deps: D, factory: impl FnOnce() -> T) -> T
    where
        D: PartialEq + 'static,
        T: Clone + 'static,
    {
        let deps = Deps::new(deps);
        let index = match self.claim(HookKind::Memo) {
            Some(SlotClaim::Vacant(_)) => {
                let value = factory();
                self.hooks.fill(HookSlot::Memo(MemoSlot {
                    deps,
                    value: Box::new(value.clone()),
                }));
                return value;
            }
            Some(SlotClaim::Occupied(index)) => index,
            None => return factory(),
        };

        let cached = match self.hooks.get_mut(index) {
            Some(HookSlot::Memo(slot)) if slot.deps.matches(&deps) => {
                match slot.value.downcast_ref::<T>() {
                    Some(value) => Cached::Hit(value.clone()),
                    None => Cached::Mismatch,
                }
            }
            Some(HookSlot::Memo(_)) => Cached::Stale,
            _ => Cached::Mismatch,
        };
        match cached {
            Cached::Hit(value) => value,
            Cached::Stale => {
                let value = factory();
                if let Some(HookSlot::Memo(slot)) = self.hooks.get_mut(index) {
                    slot.deps = deps;
                    slot.value = Box::new(value.clone());
                }
                value
            }
            Cached::Mismatch => {
                self.fail(HookSequenceError::TypeMismatch {
                    index,
                    kind: HookKind::Memo,
                });
                factory()
            }
        }
    }

    /// A stable callback, replaced only when `deps` changes.
    pub fn use_callback<D, F>(&mut self, deps: D, callback: F) -> Rc<F>
    where
        D: PartialEq + 'static,
        F: 'static,
    {
        self.use_memo(deps, move || Rc::new(callback))
    }

    /// A mutable cell that survives re-renders and never triggers one.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        match self.claim(HookKind::Ref) {
            Some(SlotClaim::Vacant(_)) => {
                let cell = Rc::new(RefCell::new(init()));
                self.hooks.fill(HookSlot::Ref(Box::new(Rc::clone(&cell))));
                cell
            }
            Some(SlotClaim::Occupied(index)) => {
                let existing = match self.hooks.get_mut(index) {
                    Some(HookSlot::Ref(value)) => value.downcast_ref::<Rc<RefCell<T>>>().cloned(),
                    _ => None,
                };
                match existing {
                    Some(cell) => cell,
                    None => {
                        self.fail(HookSequenceError::TypeMismatch {
                            index,
                            kind: HookKind::Ref,
                        });
                        Rc::new(RefCell::new(init()))
                    }
                }
            }
            None => Rc::new(RefCell::new(init())),
        }
    }

    /// A value computed on the first render and returned unchanged after.
    pub fn use_static<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> T {
        let cell = self.use_ref(init);
        let value = cell.borrow().clone();
        value
    }

    /// A token that changes whenever [`RefreshHandle::refresh`] is called.
    pub fn use_refresh_token(&mut self) -> RefreshHandle {
        let runtime = self.pass.runtime.clone();
        let state = self.use_state({
            let runtime = runtime.clone();
            move || runtime.next_refresh_token()
        });
        RefreshHandle {
            token: state.get(),
            state,
            runtime,
        }
    }

    /// Makes `value` visible to descendants through [`use_context`]. When the
    /// value changes, descendants that read it re-render even if memoized.
    ///
    /// [`use_context`]: RenderContext::use_context
    pub fn provide_context<T: Clone + PartialEq + 'static>(&mut self, value: T) {
        if self.context_slot::<T>(ContextRole::Provide) {
            self.tree.publish_context(self.view, value, self.pass);
        }
    }

    /// Nearest value of type `T` provided by an ancestor.
    pub fn use_context<T: Clone + 'static>(&mut self) -> Option<T> {
        if self.context_slot::<T>(ContextRole::Consume) {
            self.tree.consume_context::<T>(self.view, self.parent)
        } else {
            None
        }
    }

    fn context_slot<T: 'static>(&mut self, role: ContextRole) -> bool {
        let type_id = TypeId::of::<T>();
        match self.claim(HookKind::Context) {
            Some(SlotClaim::Vacant(_)) => {
                self.hooks
                    .fill(HookSlot::Context(ContextSlot { type_id, role }));
                true
            }
            Some(SlotClaim::Occupied(index)) => {
                let matches = matches!(
                    self.hooks.get_mut(index),
                    Some(HookSlot::Context(slot)) if slot.type_id == type_id && slot.role == role
                );
                if !matches {
                    self.fail(HookSequenceError::TypeMismatch {
                        index,
                        kind: HookKind::Context,
                    });
                }
                matches
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
