//! Error routing for failures raised while a session runs.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::effects::EffectException;
use crate::events::EventException;
use crate::hooks::HookSequenceError;
use crate::reconcile::DuplicateKeyError;
use crate::ViewId;

#[derive(Debug, Error)]
pub enum RuntimeException {
    #[error("view {view:#x} broke the hook call order: {source}")]
    HookSequence {
        view: ViewId,
        #[source]
        source: HookSequenceError,
    },
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),
    #[error(transparent)]
    Effect(#[from] EffectException),
    #[error(transparent)]
    Event(#[from] EventException),
}

impl RuntimeException {
    /// Integrity failures leave the view tree in an unknown state. The
    /// session refuses further turns after one, whether or not a handler
    /// reported it as handled.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            RuntimeException::HookSequence { .. } | RuntimeException::DuplicateKey(_)
        )
    }
}

/// Receives runtime exceptions. Returns true when the exception is handled
/// and should not propagate further.
pub trait ExceptionHandler {
    fn handle_exception(&self, exception: &RuntimeException) -> bool;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&RuntimeException) -> bool,
{
    fn handle_exception(&self, exception: &RuntimeException) -> bool {
        self(exception)
    }
}

/// Ordered list of handlers, consulted first to last.
#[derive(Clone, Default)]
pub struct ExceptionPipeline {
    handlers: Vec<Rc<dyn ExceptionHandler>>,
}

impl ExceptionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.handlers.push(Rc::new(handler));
        self
    }

    pub fn with_fn(self, handler: impl Fn(&RuntimeException) -> bool + 'static) -> Self {
        self.with(handler)
    }

    pub fn push(&mut self, handler: impl ExceptionHandler + 'static) {
        self.handlers.push(Rc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn build(self) -> CompositeExceptionHandler {
        CompositeExceptionHandler {
            handlers: self.handlers.into(),
        }
    }
}

/// Handler that tries each member in order and stops at the first that
/// reports the exception handled.
#[derive(Clone)]
pub struct CompositeExceptionHandler {
    handlers: Rc<[Rc<dyn ExceptionHandler>]>,
}

impl ExceptionHandler for CompositeExceptionHandler {
    fn handle_exception(&self, exception: &RuntimeException) -> bool {
        self.handlers
            .iter()
            .any(|handler| handler.handle_exception(exception))
    }
}

impl fmt::Debug for CompositeExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeExceptionHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/exceptions_tests.rs"]
mod tests;
