//! Single-threaded executor for async effects and event handlers.
//!
//! Futures stay on the session's thread. Their wakers only push the task id
//! onto a shared ready queue and ask the scheduler for a turn, so they are
//! safe to fire from anywhere.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use futures_task::{waker, ArcWake};
use futures_util::future::LocalBoxFuture;

use crate::hash::map::HashMap;
use crate::effects::EffectHandle;
use crate::platform::RuntimeScheduler;
use crate::{NodeId, ViewId};

pub(crate) type TaskId = u64;

pub(crate) enum TaskOrigin {
    Effect {
        view: ViewId,
        slot: usize,
        handle: Rc<EffectHandle>,
    },
    Handler {
        widget: NodeId,
        event: String,
    },
}

impl TaskOrigin {
    fn is_cancelled(&self) -> bool {
        match self {
            TaskOrigin::Effect { handle, .. } => !handle.is_active(),
            TaskOrigin::Handler { .. } => false,
        }
    }
}

struct Task {
    future: LocalBoxFuture<'static, anyhow::Result<()>>,
    origin: TaskOrigin,
    waker: Waker,
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<Mutex<VecDeque<TaskId>>>,
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        lock(&arc_self.ready).push_back(arc_self.id);
        arc_self.scheduler.schedule_turn();
    }
}

fn lock(queue: &Mutex<VecDeque<TaskId>>) -> MutexGuard<'_, VecDeque<TaskId>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct TaskSet {
    tasks: HashMap<TaskId, Task>,
    next_id: TaskId,
    ready: Arc<Mutex<VecDeque<TaskId>>>,
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl TaskSet {
    pub(crate) fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            tasks: HashMap::new(),
            next_id: 1,
            ready: Arc::new(Mutex::new(VecDeque::new())),
            scheduler,
        }
    }

    /// Registers a future. It is first polled by the next [`poll_ready`].
    ///
    /// [`poll_ready`]: TaskSet::poll_ready
    pub(crate) fn spawn(
        &mut self,
        future: LocalBoxFuture<'static, anyhow::Result<()>>,
        origin: TaskOrigin,
    ) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        let waker = waker(Arc::new(TaskWaker {
            id,
            ready: Arc::clone(&self.ready),
            scheduler: Arc::clone(&self.scheduler),
        }));
        self.tasks.insert(
            id,
            Task {
                future,
                origin,
                waker,
            },
        );
        lock(&self.ready).push_back(id);
        id
    }

    pub(crate) fn has_ready(&self) -> bool {
        !lock(&self.ready).is_empty()
    }

    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Polls every woken task once. Returns the tasks that completed, in
    /// the order they were woken. Cancelled effect tasks are dropped
    /// without being polled.
    pub(crate) fn poll_ready(&mut self) -> Vec<(TaskId, TaskOrigin, anyhow::Result<()>)> {
        let woken: Vec<TaskId> = lock(&self.ready).drain(..).collect();
        let mut completed = Vec::new();
        for id in woken {
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            if task.origin.is_cancelled() {
                self.tasks.remove(&id);
                continue;
            }
            let mut cx = Context::from_waker(&task.waker);
            if let Poll::Ready(result) = task.future.as_mut().poll(&mut cx) {
                if let Some(task) = self.tasks.remove(&id) {
                    completed.push((id, task.origin, result));
                }
            }
        }
        completed
    }

    /// Drops futures whose effect was cancelled.
    pub(crate) fn purge_cancelled(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !task.origin.is_cancelled());
        before - self.tasks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
        lock(&self.ready).clear();
    }
}
