//! A session owns one view tree and drives it turn by turn.
//!
//! A turn runs these steps in order:
//!
//! 1. poll async tasks that were woken since the last turn,
//! 2. dispatch queued client events, stopping at a pending async handler,
//! 3. apply queued state updates,
//! 4. if any live view is dirty (or nothing was rendered yet), render from
//!    the root, diff against the committed tree and commit,
//! 5. destroy views the render no longer produced,
//! 6. run effects registered by the render, in post-order.

use std::env;
use std::rc::Rc;

use indexmap::IndexSet;
use thiserror::Error;

use crate::effects::{dedup_pending, EffectBody, EffectException, EffectHandle, EffectScope, PendingEffect};
use crate::events::{DispatchOutcome, EventException, EventHandler, InboundEvent};
use crate::exceptions::{ExceptionHandler, ExceptionPipeline, RuntimeException};
use crate::hooks::HookSlot;
use crate::reconcile::{self, CommitMessage};
use crate::runtime::{Runtime, RuntimeHandle};
use crate::tasks::{TaskId, TaskOrigin, TaskSet};
use crate::tree::{RenderPass, Tree};
use crate::view::{View, ViewRef};
use crate::widget::{WidgetNode, WidgetRegistry};
use crate::ViewId;

const DEFAULT_MAX_TURNS: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on turns run by [`Session::run_until_idle`].
    pub max_turns_per_drain: usize,
    /// Log the committed tree as JSON after every commit.
    pub debug_tree: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns_per_drain: DEFAULT_MAX_TURNS,
            debug_tree: false,
        }
    }
}

impl SessionConfig {
    /// Reads `IVY_MAX_TURNS` and `IVY_DEBUG_TREE`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("IVY_MAX_TURNS") {
            match value.parse::<usize>() {
                Ok(turns) if turns > 0 => config.max_turns_per_drain = turns,
                _ => log::warn!("ignoring invalid IVY_MAX_TURNS={value}"),
            }
        }
        if let Ok(value) = env::var("IVY_DEBUG_TREE") {
            match parse_flag(&value) {
                Some(flag) => config.debug_tree = flag,
                None => log::warn!("ignoring invalid IVY_DEBUG_TREE={value}"),
            }
        }
        config
    }
}

/// Reads a boolean environment setting. `None` for anything unrecognised.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// What a turn did.
#[derive(Debug, Default)]
pub struct TurnReport {
    /// Present when the turn rendered.
    pub commit: Option<CommitMessage>,
    pub rendered_views: usize,
    pub destroyed_views: usize,
    pub effects_run: usize,
    pub dispatched: Vec<DispatchOutcome>,
    pub exceptions_handled: usize,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session was poisoned by an earlier integrity failure")]
    Poisoned,
    #[error("session has been disposed")]
    Disposed,
    #[error("render failed: {0}")]
    Integrity(#[source] RuntimeException),
    /// No handler accepted an exception. The turn otherwise completed; its
    /// report (including any commit) is attached.
    #[error("unhandled exception: {exception}")]
    Unhandled {
        #[source]
        exception: RuntimeException,
        report: Box<TurnReport>,
    },
    #[error("session did not settle within {0} turns")]
    TurnLimit(usize),
}

pub struct Session {
    root: ViewRef,
    runtime: Runtime,
    tree: Tree,
    tasks: TaskSet,
    exceptions: Rc<dyn ExceptionHandler>,
    registry: Option<Rc<WidgetRegistry>>,
    config: SessionConfig,
    version: u64,
    mounted: bool,
    poisoned: bool,
    disposed: bool,
    /// Async handler that later events wait behind.
    blocking: Option<TaskId>,
}

struct TurnState {
    report: TurnReport,
    unhandled: Option<RuntimeException>,
}

impl Session {
    pub fn new(root: impl View) -> Self {
        Self::with_runtime(root, Runtime::default())
    }

    pub fn with_runtime(root: impl View, runtime: Runtime) -> Self {
        let tasks = TaskSet::new(runtime.scheduler());
        runtime.handle().schedule();
        Self {
            root: ViewRef::new(root),
            runtime,
            tree: Tree::default(),
            tasks,
            exceptions: Rc::new(ExceptionPipeline::new().build()),
            registry: None,
            config: SessionConfig::default(),
            version: 0,
            mounted: false,
            poisoned: false,
            disposed: false,
            blocking: None,
        }
    }

    pub fn with_exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.exceptions = Rc::new(handler);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Events whose name the widget's kind does not declare are dropped.
    pub fn with_registry(mut self, registry: WidgetRegistry) -> Self {
        self.registry = Some(Rc::new(registry));
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Version of the last commit. Zero before the first render.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn committed_tree(&self) -> Option<&Rc<WidgetNode>> {
        self.tree.committed.as_ref()
    }

    pub fn view_count(&self) -> usize {
        self.tree.view_count()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Queues a client event for the next turn.
    pub fn enqueue_event(&self, event: InboundEvent) {
        self.runtime.handle().enqueue_event(event);
    }

    pub fn needs_turn(&self) -> bool {
        if self.disposed || self.poisoned {
            return false;
        }
        !self.mounted
            || self.runtime.has_pending_states()
            || self.tasks.has_ready()
            || (self.blocking.is_none() && self.runtime.has_inbound_events())
    }

    /// Queues `event` and dispatches queued events now, without rendering.
    /// State written by handlers is applied by the next turn.
    pub fn dispatch(&mut self, event: InboundEvent) -> Result<DispatchOutcome, TurnError> {
        self.ensure_usable()?;
        self.enqueue_event(event);
        let mut turn = TurnState::new();
        self.drain_events(&mut turn);
        let outcome = if self.runtime.has_inbound_events() {
            DispatchOutcome::Pending
        } else {
            turn.report
                .dispatched
                .last()
                .copied()
                .unwrap_or(DispatchOutcome::NotFound)
        };
        turn.finish().map(|_| outcome)
    }

    pub fn run_turn(&mut self) -> Result<TurnReport, TurnError> {
        self.ensure_usable()?;
        self.runtime.set_needs_turn(false);
        let mut turn = TurnState::new();

        self.complete_tasks(&mut turn);
        self.drain_events(&mut turn);

        let invalid: IndexSet<ViewId> = self
            .runtime
            .apply_pending_states()
            .into_iter()
            .filter(|id| self.tree.contains_view(*id))
            .collect();
        if !self.mounted || !invalid.is_empty() {
            self.render(invalid, &mut turn)?;
        }

        self.complete_tasks(&mut turn);
        turn.finish()
    }

    /// Runs turns until nothing is queued.
    pub fn run_until_idle(&mut self) -> Result<Vec<TurnReport>, TurnError> {
        let mut reports = Vec::new();
        while self.needs_turn() {
            if reports.len() >= self.config.max_turns_per_drain {
                return Err(TurnError::TurnLimit(self.config.max_turns_per_drain));
            }
            reports.push(self.run_turn()?);
        }
        Ok(reports)
    }

    /// Tears down every view, running all outstanding cleanups, and drops
    /// pending work. Further turns fail with [`TurnError::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let destroyed = self.tree.destroy_all();
        self.tasks.clear();
        self.blocking = None;
        self.runtime.clear_pending();
        log::debug!("session disposed: {destroyed} views destroyed");
    }

    fn ensure_usable(&self) -> Result<(), TurnError> {
        if self.disposed {
            return Err(TurnError::Disposed);
        }
        if self.poisoned {
            return Err(TurnError::Poisoned);
        }
        Ok(())
    }

    fn route(&self, exception: RuntimeException, turn: &mut TurnState) {
        if self.exceptions.handle_exception(&exception) {
            turn.report.exceptions_handled += 1;
            return;
        }
        log::error!("unhandled exception: {exception}");
        match turn.unhandled {
            None => turn.unhandled = Some(exception),
            Some(_) => log::warn!("dropping additional unhandled exception in the same turn"),
        }
    }

    fn poison(&mut self, exception: RuntimeException) -> TurnError {
        log::error!("integrity failure, session is poisoned: {exception}");
        self.poisoned = true;
        self.exceptions.handle_exception(&exception);
        TurnError::Integrity(exception)
    }

    /// Polls woken tasks. Returns completed handler tasks with whether they
    /// succeeded.
    fn complete_tasks(&mut self, turn: &mut TurnState) -> Vec<(TaskId, bool)> {
        let mut handlers = Vec::new();
        for (id, origin, result) in self.tasks.poll_ready() {
            if self.blocking == Some(id) {
                self.blocking = None;
            }
            match origin {
                TaskOrigin::Effect { view, slot, handle } => {
                    if !handle.is_active() {
                        log::debug!("discarding result of cancelled effect {slot} of view {view:#x}");
                        continue;
                    }
                    if let Err(error) = result {
                        self.route(EffectException { view, slot, error }.into(), turn);
                    }
                }
                TaskOrigin::Handler { widget, event } => {
                    let succeeded = result.is_ok();
                    if let Err(error) = result {
                        let exception = EventException {
                            widget_id: widget,
                            event_name: event,
                            error,
                        };
                        self.route(exception.into(), turn);
                    }
                    handlers.push((id, succeeded));
                }
            }
        }
        handlers
    }

    fn drain_events(&mut self, turn: &mut TurnState) {
        while self.blocking.is_none() {
            let Some(event) = self.runtime.pop_event() else {
                break;
            };
            let outcome = self.dispatch_event(event, turn);
            turn.report.dispatched.push(outcome);
        }
    }

    fn dispatch_event(&mut self, event: InboundEvent, turn: &mut TurnState) -> DispatchOutcome {
        let lookup = self.tree.events.lookup(
            event.widget_id,
            &event.event_name,
            self.registry.as_deref(),
        );
        let handler = match lookup {
            Ok(binding) => binding.handler.clone(),
            Err(reason) => {
                log::warn!(
                    "dropping event {} for widget {:#x}: {reason}",
                    event.event_name,
                    event.widget_id
                );
                return DispatchOutcome::NotFound;
            }
        };

        match handler {
            EventHandler::Sync(handler) => match handler(&event.args) {
                Ok(()) => DispatchOutcome::Handled,
                Err(error) => {
                    let exception = EventException {
                        widget_id: event.widget_id,
                        event_name: event.event_name,
                        error,
                    };
                    self.route(exception.into(), turn);
                    DispatchOutcome::Failed
                }
            },
            EventHandler::Async(handler) => {
                let future = handler(event.args);
                let id = self.tasks.spawn(
                    future,
                    TaskOrigin::Handler {
                        widget: event.widget_id,
                        event: event.event_name,
                    },
                );
                let completed = self.complete_tasks(turn);
                if self.tasks.contains(id) {
                    self.blocking = Some(id);
                    DispatchOutcome::Pending
                } else if completed.contains(&(id, false)) {
                    DispatchOutcome::Failed
                } else {
                    DispatchOutcome::Handled
                }
            }
        }
    }

    fn render(&mut self, invalid: IndexSet<ViewId>, turn: &mut TurnState) -> Result<(), TurnError> {
        let version = self.version + 1;
        let mut pass = RenderPass::new(version, self.runtime.handle());
        for id in invalid {
            self.tree.mark_dirty(&mut pass, id);
        }

        let root = self.root.clone();
        let output = match self.tree.render_root(&root, &mut pass) {
            Ok(output) => output,
            Err(exception) => return Err(self.poison(exception)),
        };
        let patches = match reconcile::diff(self.tree.committed.as_ref(), output.as_ref()) {
            Ok(patches) => patches,
            Err(error) => return Err(self.poison(error.into())),
        };

        self.tree.committed = output;
        self.version = version;
        self.mounted = true;
        log::debug!(
            "committed version {version}: {} patches, {} views rendered",
            patches.len(),
            pass.rendered
        );
        if self.config.debug_tree {
            match serde_json::to_string(&self.tree.committed) {
                Ok(json) => log::debug!("tree at version {version}: {json}"),
                Err(err) => log::warn!("could not serialize tree: {err}"),
            }
        }
        turn.report.rendered_views = pass.rendered;
        turn.report.commit = Some(CommitMessage { version, patches });

        for removed in std::mem::take(&mut pass.removed) {
            turn.report.destroyed_views += self.tree.destroy_view(removed);
        }
        self.tasks.purge_cancelled();
        self.run_effects(std::mem::take(&mut pass.effects), turn);
        Ok(())
    }

    fn run_effects(&mut self, effects: Vec<PendingEffect>, turn: &mut TurnState) {
        for PendingEffect { view, slot, body } in dedup_pending(effects) {
            let Some(HookSlot::Effect(effect)) = self
                .tree
                .hooks_mut(view)
                .and_then(|hooks| hooks.get_mut(slot))
            else {
                continue;
            };
            let handle = Rc::new(EffectHandle::new());
            let previous = effect.handle.replace(Rc::clone(&handle));
            if let Some(previous) = previous {
                previous.cancel();
            }

            let scope = EffectScope::new(Rc::clone(&handle), self.runtime.handle(), view);
            turn.report.effects_run += 1;
            match body {
                EffectBody::Sync(body) => {
                    if let Err(error) = body(&scope) {
                        self.route(EffectException { view, slot, error }.into(), turn);
                    }
                }
                EffectBody::Async(body) => {
                    self.tasks
                        .spawn(body(scope), TaskOrigin::Effect { view, slot, handle });
                }
            }
        }
        self.tasks.purge_cancelled();
    }
}

impl TurnState {
    fn new() -> Self {
        Self {
            report: TurnReport::default(),
            unhandled: None,
        }
    }

    fn finish(self) -> Result<TurnReport, TurnError> {
        match self.unhandled {
            None => Ok(self.report),
            Some(exception) => Err(TurnError::Unhandled {
                exception,
                report: Box::new(self.report),
            }),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}
