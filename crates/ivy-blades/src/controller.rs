use std::fmt;

use ivy_core::{Key, RuntimeHandle, StateCell, View, ViewRef};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BladeError {
    #[error("view is not on the blade stack")]
    NotFound,
}

/// What to open in a new blade.
#[derive(Clone, Debug)]
pub struct BladeSpec {
    view: ViewRef,
    title: Option<String>,
    width: Option<u32>,
}

impl BladeSpec {
    pub fn new(view: impl View) -> Self {
        Self::from_ref(ViewRef::new(view))
    }

    /// Opens an existing view object. Keep a clone of `view` to look the
    /// blade up later with [`BladeController::get_index`].
    pub fn from_ref(view: ViewRef) -> Self {
        Self {
            view,
            title: None,
            width: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Width in layout units.
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn view(&self) -> &ViewRef {
        &self.view
    }
}

/// One entry of the blade stack.
#[derive(Clone, Debug, PartialEq)]
pub struct BladeItem {
    pub key: Key,
    pub view: ViewRef,
    pub index: usize,
    pub title: Option<String>,
    pub width: Option<u32>,
    pub refresh_token: u64,
}

impl BladeItem {
    pub fn new(spec: BladeSpec, index: usize, refresh_token: u64) -> Self {
        Self {
            key: Key::new(Uuid::new_v4().to_string()),
            view: spec.view,
            index,
            title: spec.title,
            width: spec.width,
            refresh_token,
        }
    }
}

/// Push/pop access to a blade stack held in view state.
///
/// Every operation is a queued update of the stack cell, evaluated against
/// the value left by earlier updates in the same turn, so several operations
/// issued from one handler compose. An index outside the stack declines the
/// update: the stack stays as it was and nothing re-renders.
#[derive(Clone)]
pub struct BladeController {
    blades: StateCell<Vec<BladeItem>>,
    runtime: RuntimeHandle,
}

impl BladeController {
    pub fn new(blades: StateCell<Vec<BladeItem>>, runtime: RuntimeHandle) -> Self {
        Self { blades, runtime }
    }

    /// The stack as of the last applied turn.
    pub fn blades(&self) -> Vec<BladeItem> {
        self.blades.get()
    }

    pub fn len(&self) -> usize {
        self.blades.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> &StateCell<Vec<BladeItem>> {
        &self.blades
    }

    /// Keeps blades `0..=to_index` and opens `spec` after them. `to_index`
    /// defaults to the current top.
    pub fn push(&self, spec: BladeSpec, to_index: Option<usize>) {
        let refresh_token = self.runtime.next_refresh_token();
        self.blades.try_update(move |stack| {
            let Some(to_index) = to_index.or_else(|| stack.len().checked_sub(1)) else {
                log::debug!("push ignored: blade stack is empty");
                return None;
            };
            if to_index >= stack.len() {
                log::debug!("push ignored: index {to_index} outside {} blades", stack.len());
                return None;
            }
            let mut next = stack[..=to_index].to_vec();
            next.push(BladeItem::new(spec, to_index + 1, refresh_token));
            Some(next)
        });
    }

    /// Opens `spec` directly after the blade showing `current`.
    pub fn push_after(&self, current: &ViewRef, spec: BladeSpec) -> Result<(), BladeError> {
        let index = self.get_index(current)?;
        self.push(spec, Some(index));
        Ok(())
    }

    /// Keeps blades `0..=to_index`, dropping the rest. `to_index` defaults to
    /// the blade below the top. With `refresh`, the blade at `to_index` gets
    /// a new refresh token, which remounts its content from scratch.
    pub fn pop(&self, to_index: Option<usize>, refresh: bool) {
        let refresh_token = refresh.then(|| self.runtime.next_refresh_token());
        self.blades.try_update(move |stack| {
            let Some(to_index) = to_index.or_else(|| stack.len().checked_sub(2)) else {
                log::debug!("pop ignored: fewer than two blades");
                return None;
            };
            if to_index >= stack.len() {
                log::debug!("pop ignored: index {to_index} outside {} blades", stack.len());
                return None;
            }
            let mut next = stack[..=to_index].to_vec();
            if let Some(token) = refresh_token {
                next[to_index].refresh_token = token;
            }
            (next != *stack).then_some(next)
        });
    }

    /// Pops back to the blade showing `current`.
    pub fn pop_to(&self, current: &ViewRef, refresh: bool) -> Result<(), BladeError> {
        let index = self.get_index(current)?;
        self.pop(Some(index), refresh);
        Ok(())
    }

    /// Position of the blade showing `view`, compared by identity.
    pub fn get_index(&self, view: &ViewRef) -> Result<usize, BladeError> {
        self.blades.with(|stack| {
            stack
                .iter()
                .find(|item| item.view.ptr_eq(view))
                .map(|item| item.index)
                .ok_or(BladeError::NotFound)
        })
    }
}

impl PartialEq for BladeController {
    fn eq(&self, other: &Self) -> bool {
        self.blades == other.blades
    }
}

impl fmt::Debug for BladeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BladeController")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivy_core::{Element, RenderContext};

    struct Page;

    impl View for Page {
        fn build(&self, _cx: &mut RenderContext<'_>) -> Element {
            Element::Empty
        }
    }

    /// Controller over a detached cell, where updates apply immediately.
    fn controller_with(pages: &[&ViewRef]) -> BladeController {
        let stack = pages
            .iter()
            .enumerate()
            .map(|(index, view)| BladeItem::new(BladeSpec::from_ref((*view).clone()), index, 0))
            .collect();
        BladeController::new(
            StateCell::with_runtime(stack, RuntimeHandle::detached()),
            RuntimeHandle::detached(),
        )
    }

    fn page() -> ViewRef {
        ViewRef::new(Page)
    }

    fn views(controller: &BladeController) -> Vec<ViewRef> {
        controller.blades().into_iter().map(|item| item.view).collect()
    }

    #[test]
    fn push_and_pop_follow_the_stack_discipline() {
        let (b0, b1, b2) = (page(), page(), page());
        let controller = controller_with(&[&b0]);
        assert_eq!(controller.get_index(&b0), Ok(0));

        controller.push(BladeSpec::from_ref(b1.clone()), Some(0));
        assert_eq!(views(&controller), vec![b0.clone(), b1.clone()]);
        assert_eq!(controller.get_index(&b0), Ok(0));

        controller.push(BladeSpec::from_ref(b2.clone()), Some(1));
        assert_eq!(views(&controller), vec![b0.clone(), b1.clone(), b2.clone()]);
        assert_eq!(controller.get_index(&b2), Ok(2));
        assert_eq!(controller.get_index(&b0), Ok(0));

        controller.pop(Some(0), false);
        assert_eq!(views(&controller), vec![b0.clone()]);
        assert_eq!(controller.get_index(&b0), Ok(0));
        assert_eq!(controller.get_index(&b1), Err(BladeError::NotFound));
    }

    #[test]
    fn push_truncates_everything_after_the_target() {
        let (b0, b1, b2, b3) = (page(), page(), page(), page());
        let controller = controller_with(&[&b0, &b1, &b2]);
        controller.push(BladeSpec::from_ref(b3.clone()).title("Details"), Some(0));

        let blades = controller.blades();
        assert_eq!(blades.len(), 2);
        assert_eq!(blades[1].index, 1);
        assert_eq!(blades[1].title.as_deref(), Some("Details"));
        assert!(blades[1].view.ptr_eq(&b3));
    }

    #[test]
    fn defaults_push_on_top_and_pop_the_top() {
        let (b0, b1) = (page(), page());
        let controller = controller_with(&[&b0]);
        controller.push(BladeSpec::from_ref(b1.clone()), None);
        assert_eq!(views(&controller), vec![b0.clone(), b1.clone()]);

        controller.pop(None, false);
        assert_eq!(views(&controller), vec![b0.clone()]);
    }

    #[test]
    fn out_of_range_operations_leave_the_stack_untouched() {
        let (b0, b1) = (page(), page());
        let controller = controller_with(&[&b0, &b1]);
        let before = controller.blades();
        let version = controller.state().version();

        controller.push(BladeSpec::new(Page), Some(2));
        controller.pop(Some(7), true);
        controller.pop(Some(1), false);

        assert_eq!(controller.blades(), before);
        assert_eq!(controller.state().version(), version);

        let single = controller_with(&[&b0]);
        single.pop(None, false);
        assert_eq!(views(&single), vec![b0.clone()]);

        let empty = controller_with(&[]);
        empty.push(BladeSpec::new(Page), None);
        assert!(empty.is_empty());
    }

    #[test]
    fn relative_operations_resolve_the_current_view() {
        let (b0, b1, b2) = (page(), page(), page());
        let controller = controller_with(&[&b0, &b1]);

        controller
            .push_after(&b0, BladeSpec::from_ref(b2.clone()))
            .unwrap();
        assert_eq!(views(&controller), vec![b0.clone(), b2.clone()]);

        controller.pop_to(&b0, false).unwrap();
        assert_eq!(views(&controller), vec![b0.clone()]);

        assert_eq!(
            controller.push_after(&b1, BladeSpec::new(Page)),
            Err(BladeError::NotFound)
        );
        assert_eq!(controller.pop_to(&b2, true), Err(BladeError::NotFound));
    }

    #[test]
    fn every_blade_gets_a_distinct_key() {
        let b0 = page();
        let controller = controller_with(&[&b0]);
        controller.push(BladeSpec::new(Page), None);
        controller.push(BladeSpec::new(Page), None);
        let blades = controller.blades();
        assert_ne!(blades[0].key, blades[1].key);
        assert_ne!(blades[1].key, blades[2].key);
    }
}
