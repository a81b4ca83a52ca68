//! Stacked "blade" navigation for Ivy.
//!
//! The stack is ordinary view state: a `StateCell<Vec<BladeItem>>` owned by
//! the view that calls [`use_blades`], published to descendants as a
//! [`BladeController`] context. Each entry renders through a memoized slot
//! keyed on its index and refresh token, so pushing or popping leaves the
//! other blades untouched.

mod controller;
mod view;

pub use controller::{BladeController, BladeError, BladeItem, BladeSpec};
pub use view::{
    register_widgets, use_blade_controller, use_blades, use_current_blade, Blade, BladeContainer,
    BladesView, CurrentBlade,
};
