#![doc = r"Core runtime pieces for the Ivy server-resident UI runtime."]

extern crate self as ivy_core;

pub mod deps;
pub mod effects;
pub mod events;
pub mod exceptions;
pub mod hash;
pub mod hooks;
pub mod path;
pub mod platform;
pub mod reconcile;
pub mod render;
pub mod runtime;
pub mod session;
pub mod state;
mod tasks;
mod tree;
pub mod view;
pub mod widget;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use deps::{Deps, Memo};
pub use effects::{EffectException, EffectScope};
pub use events::{
    DispatchOutcome, EventArgs, EventBinding, EventException, EventHandler, EventTable,
    InboundEvent, StaleEvent,
};
pub use exceptions::{
    CompositeExceptionHandler, ExceptionHandler, ExceptionPipeline, RuntimeException,
};
pub use hooks::{HookKind, HookSequenceError, HookSlot, HookStore, SlotClaim};
pub use path::{Path, PathSegment, SegmentKind, SegmentSlot, SiblingCounter};
pub use platform::{Clock, FrozenClock, ManualScheduler, RuntimeScheduler};
pub use reconcile::{diff, CommitMessage, DuplicateKeyError, Patch};
pub use render::{Dispatch, RefreshHandle, RenderContext};
pub use runtime::{Runtime, RuntimeHandle};
pub use session::{Session, SessionConfig, TurnError, TurnReport};
pub use state::StateCell;
pub use view::{Element, View, ViewElement, ViewRef};
pub use widget::{
    widget, Category, CategoryKind, Container, Leaf, Props, RegistryError, Widget, WidgetKind,
    WidgetNode, WidgetRegistry, WidgetSchema, WidgetSpec,
};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a resolved widget node. Derived from its tree path.
pub type NodeId = u64;

/// Stable identity of a view instance. Derived from its tree path.
pub type ViewId = u64;

/// Explicit identity token used to match siblings across renders.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

macro_rules! key_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

key_from_integer!(u32, u64, usize, i32, i64);
