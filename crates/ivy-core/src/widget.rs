//! Widget descriptions, their resolved form, and the kind registry.

use std::any::TypeId;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;

use futures_util::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::events::{EventArgs, EventHandler};
use crate::view::Element;
use crate::{Key, NodeId};

/// Property bag of a widget. Equality ignores insertion order.
pub type Props = IndexMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryKind {
    Leaf,
    Container,
}

mod sealed {
    pub trait Sealed {}
}

/// Marker for whether a widget kind may hold children.
pub trait Category: sealed::Sealed + 'static {
    const KIND: CategoryKind;
}

pub enum Leaf {}
pub enum Container {}

impl sealed::Sealed for Leaf {}
impl sealed::Sealed for Container {}

impl Category for Leaf {
    const KIND: CategoryKind = CategoryKind::Leaf;
}

impl Category for Container {
    const KIND: CategoryKind = CategoryKind::Container;
}

/// A concrete widget type the client knows how to draw.
pub trait WidgetKind: 'static {
    const NAME: &'static str;
    const EVENTS: &'static [&'static str] = &[];
    type Category: Category;
}

/// Unresolved widget as produced by a view's build.
#[derive(Clone)]
pub struct WidgetSpec {
    pub(crate) kind: &'static str,
    pub(crate) declared_events: &'static [&'static str],
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) handlers: IndexMap<&'static str, EventHandler>,
    pub(crate) children: Vec<Element>,
}

impl WidgetSpec {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn handler(&self, event: &str) -> Option<&EventHandler> {
        self.handlers.get(event)
    }
}

impl fmt::Debug for WidgetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetSpec")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("children", &self.children.len())
            .finish()
    }
}

/// Builder for a widget of some kind. Only containers expose `child`.
#[derive(Clone)]
pub struct Widget<C> {
    spec: WidgetSpec,
    _category: PhantomData<C>,
}

/// Starts building a widget of kind `K`.
pub fn widget<K: WidgetKind>() -> Widget<K::Category> {
    Widget {
        spec: WidgetSpec {
            kind: K::NAME,
            declared_events: K::EVENTS,
            key: None,
            props: Props::new(),
            handlers: IndexMap::new(),
            children: Vec::new(),
        },
        _category: PhantomData,
    }
}

impl<C> Widget<C> {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.spec.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec.props.insert(name.into(), value.into());
        self
    }

    /// Sets a property from any serializable value. Values that fail to
    /// serialize are stored as `null`.
    pub fn prop_serde(mut self, name: impl Into<String>, value: &impl Serialize) -> Self {
        let name = name.into();
        let value = serde_json::to_value(value).unwrap_or_else(|err| {
            log::warn!("property {name} of {} is not serializable: {err}", self.spec.kind);
            Value::Null
        });
        self.spec.props.insert(name, value);
        self
    }

    pub fn on(
        mut self,
        event: &'static str,
        handler: impl Fn(&EventArgs) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.check_declared(event);
        self.spec
            .handlers
            .insert(event, EventHandler::Sync(Rc::new(handler)));
        self
    }

    pub fn on_async<F, Fut>(mut self, event: &'static str, handler: F) -> Self
    where
        F: Fn(EventArgs) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.check_declared(event);
        self.spec.handlers.insert(
            event,
            EventHandler::Async(Rc::new(move |args| handler(args).boxed_local())),
        );
        self
    }

    fn check_declared(&self, event: &str) {
        debug_assert!(
            self.spec.declared_events.iter().any(|declared| *declared == event),
            "{} does not declare event {event}",
            self.spec.kind
        );
    }

    pub fn into_spec(self) -> WidgetSpec {
        self.spec
    }
}

impl Widget<Container> {
    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.spec.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.spec
            .children
            .extend(children.into_iter().map(Into::into));
        self
    }
}

impl<C> From<Widget<C>> for Element {
    fn from(widget: Widget<C>) -> Self {
        Element::Widget(widget.spec)
    }
}

/// A widget after resolution: identity assigned, views flattened away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub events: BTreeSet<String>,
    #[serde(default)]
    pub children: Vec<Rc<WidgetNode>>,
}

impl WidgetNode {
    /// Depth-first search for a node by id.
    pub fn find(&self, id: NodeId) -> Option<&WidgetNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Depth-first, pre-order walk.
    pub fn walk(&self, visit: &mut impl FnMut(&WidgetNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|child| child.count()).sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WidgetSchema {
    pub name: &'static str,
    pub category: CategoryKind,
    pub events: &'static [&'static str],
}

impl WidgetSchema {
    pub fn declares(&self, event: &str) -> bool {
        self.events.iter().any(|declared| *declared == event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("widget kind {0} is already registered by another type")]
    DuplicateKind(&'static str),
    #[error("widget kind {kind} declares event {event} twice")]
    DuplicateEvent {
        kind: &'static str,
        event: &'static str,
    },
}

/// Known widget kinds, checked when registered.
#[derive(Debug, Default, Clone)]
pub struct WidgetRegistry {
    kinds: IndexMap<&'static str, (TypeId, WidgetSchema)>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `K`. Registering the same type twice is a no-op.
    pub fn register<K: WidgetKind>(&mut self) -> Result<&mut Self, RegistryError> {
        let type_id = TypeId::of::<K>();
        if let Some((existing, _)) = self.kinds.get(K::NAME) {
            if *existing != type_id {
                return Err(RegistryError::DuplicateKind(K::NAME));
            }
            return Ok(self);
        }
        for (index, event) in K::EVENTS.iter().enumerate() {
            if K::EVENTS[..index].contains(event) {
                return Err(RegistryError::DuplicateEvent {
                    kind: K::NAME,
                    event: *event,
                });
            }
        }
        let schema = WidgetSchema {
            name: K::NAME,
            category: <K::Category as Category>::KIND,
            events: K::EVENTS,
        };
        self.kinds.insert(K::NAME, (type_id, schema));
        Ok(self)
    }

    pub fn schema(&self, name: &str) -> Option<&WidgetSchema> {
        self.kinds.get(name).map(|(_, schema)| schema)
    }

    pub fn declares_event(&self, kind: &str, event: &str) -> bool {
        self.schema(kind).is_some_and(|schema| schema.declares(event))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &WidgetSchema> {
        self.kinds.values().map(|(_, schema)| schema)
    }
}

#[cfg(test)]
#[path = "tests/widget_tests.rs"]
mod tests;
