//! Testing utilities and harness for Ivy

pub mod mirror;
pub mod testing;

pub use mirror::*;
pub use testing::*;

pub mod prelude {
    pub use crate::mirror::{MirrorClient, MirrorError, MirrorNode};
    pub use crate::testing::*;
}
