//! Dependency snapshots for effects, memos and memoized views.
//!
//! A snapshot boxes any `PartialEq` value. Tuples compare element-wise, so
//! `(a, b)` behaves like a dependency list of two entries.

use std::any::Any;
use std::fmt;

trait DepValue: Any {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
}

impl<T: PartialEq + 'static> DepValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }
}

/// Snapshot of a dependency list taken during render.
pub struct Deps {
    value: Box<dyn DepValue>,
}

/// Snapshot returned by [`crate::View::memo`]. Matching snapshots skip a
/// rebuild.
pub type Memo = Deps;

impl Deps {
    pub fn new<D: PartialEq + 'static>(deps: D) -> Self {
        Self {
            value: Box::new(deps),
        }
    }

    /// True when both snapshots hold the same type and compare equal.
    pub fn matches(&self, other: &Deps) -> bool {
        self.value.dyn_eq(other.value.as_any())
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deps").finish_non_exhaustive()
    }
}
