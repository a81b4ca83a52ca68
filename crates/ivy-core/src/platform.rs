//! Platform abstraction traits for the runtime.
//!
//! These traits let a host decide how turns get scheduled and where time
//! comes from, so the core never reaches for threads or system clocks
//! itself.

/// Schedules work for a session's runtime.
///
/// Implementations are told whenever the session has queued input (an
/// inbound event, a state update, a woken task) and should arrange for
/// `Session::run_turn` to be called on the session's thread. They must be
/// safe to call from any thread because task wakers may fire off-thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run another turn.
    fn schedule_turn(&self);
}

/// Provides timing information for the runtime.
pub trait Clock: Send + Sync {
    /// Current time in 100ns ticks. Only ordering matters to the runtime.
    fn now_ticks(&self) -> u64;
}

/// Scheduler that ignores requests; callers poll `Session::needs_turn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualScheduler;

impl RuntimeScheduler for ManualScheduler {
    fn schedule_turn(&self) {}
}

/// Clock that always reports zero. Refresh tokens still advance because the
/// runtime never hands out the same token twice.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrozenClock;

impl Clock for FrozenClock {
    fn now_ticks(&self) -> u64 {
        0
    }
}
