//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `ivy-core`. Hosts construct a
//! [`StdRuntime`] and pass its [`Runtime`] to
//! [`ivy_core::Session::with_runtime`], then poll
//! [`StdRuntime::take_turn_request`] or register a waker to learn when the
//! session has work.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use ivy_core::{Clock, Runtime, RuntimeHandle, RuntimeScheduler};

type TurnWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records turn requests in an atomic flag and optionally
/// pokes a host-supplied waker.
pub struct StdScheduler {
    turn_requested: AtomicBool,
    turn_waker: RwLock<Option<TurnWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            turn_requested: AtomicBool::new(false),
            turn_waker: RwLock::new(None),
        }
    }

    /// Returns whether a turn has been requested since the last call.
    pub fn take_turn_request(&self) -> bool {
        self.turn_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a new turn is scheduled.
    pub fn set_turn_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .turn_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered turn waker.
    pub fn clear_turn_waker(&self) {
        *self
            .turn_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .turn_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("turn_requested", &self.turn_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_turn(&self) {
        self.turn_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Wall clock in 100ns ticks since the Unix epoch.
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    fn now_ticks(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => u64::try_from(elapsed.as_nanos() / 100).unwrap_or(u64::MAX),
            Err(err) => {
                log::warn!("system clock is before the Unix epoch: {err}");
                0
            }
        }
    }
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let clock = Arc::new(StdClock);
        let runtime = Runtime::new(scheduler.clone(), clock.clone());
        Self {
            scheduler,
            clock,
            runtime,
        }
    }

    /// Returns an [`ivy_core::Runtime`] configured with the standard
    /// scheduler and clock.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    /// Returns whether a turn was requested since the last poll.
    pub fn take_turn_request(&self) -> bool {
        self.scheduler.take_turn_request()
    }

    pub fn set_turn_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_turn_waker(waker);
    }

    pub fn clear_turn_waker(&self) {
        self.scheduler.clear_turn_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
