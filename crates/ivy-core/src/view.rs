use std::fmt;
use std::rc::Rc;

use crate::deps::Memo;
use crate::path::SegmentKind;
use crate::render::RenderContext;
use crate::widget::WidgetSpec;
use crate::Key;

/// A user-defined component. `build` runs during render and describes the
/// view's output; hooks called on `cx` give it state and effects.
pub trait View: 'static {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element;

    /// Dependency snapshot for skipping rebuilds. When the parent re-renders
    /// and the new snapshot matches the previous one, the previous output is
    /// reused.
    fn memo(&self) -> Option<Memo> {
        None
    }
}

trait AnyView {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element;
    fn memo(&self) -> Option<Memo>;
    fn type_name(&self) -> &'static str;
}

impl<V: View> AnyView for V {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        View::build(self, cx)
    }

    fn memo(&self) -> Option<Memo> {
        View::memo(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<V>()
    }
}

/// Shared handle to a view object. Two handles are equal only when they
/// point at the same object.
#[derive(Clone)]
pub struct ViewRef(Rc<dyn AnyView>);

impl ViewRef {
    pub fn new(view: impl View) -> Self {
        Self(Rc::new(view))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn ptr_eq(&self, other: &ViewRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        self.0.build(cx)
    }

    pub(crate) fn memo(&self) -> Option<Memo> {
        self.0.memo()
    }
}

impl PartialEq for ViewRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewRef").field(&self.type_name()).finish()
    }
}

#[derive(Clone, Debug)]
pub struct ViewElement {
    pub view: ViewRef,
    pub key: Option<Key>,
}

/// Output of a view's build: nothing, a widget, or another view.
#[derive(Clone, Debug, Default)]
pub enum Element {
    #[default]
    Empty,
    Widget(WidgetSpec),
    View(ViewElement),
}

impl Element {
    pub fn view(view: impl View) -> Self {
        Element::View(ViewElement {
            view: ViewRef::new(view),
            key: None,
        })
    }

    pub fn keyed_view(key: impl Into<Key>, view: impl View) -> Self {
        Element::View(ViewElement {
            view: ViewRef::new(view),
            key: Some(key.into()),
        })
    }

    /// Replaces the key of a widget or view element. No effect on `Empty`.
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        match &mut self {
            Element::Empty => {}
            Element::Widget(spec) => spec.key = Some(key.into()),
            Element::View(view) => view.key = Some(key.into()),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Element::Empty)
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Element::Empty => None,
            Element::Widget(spec) => spec.key.as_ref(),
            Element::View(view) => view.key.as_ref(),
        }
    }

    pub(crate) fn identity(&self) -> Option<(SegmentKind, &'static str, Option<&Key>)> {
        match self {
            Element::Empty => None,
            Element::Widget(spec) => Some((SegmentKind::Widget, spec.kind, spec.key.as_ref())),
            Element::View(view) => Some((
                SegmentKind::View,
                view.view.type_name(),
                view.key.as_ref(),
            )),
        }
    }
}

impl From<ViewRef> for Element {
    fn from(view: ViewRef) -> Self {
        Element::View(ViewElement { view, key: None })
    }
}

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map_or(Element::Empty, Into::into)
    }
}
