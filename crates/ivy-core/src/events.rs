//! Inbound client events and the table of live handler bindings.

use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hash::map::HashMap;
use crate::widget::WidgetRegistry;
use crate::NodeId;

pub type SyncHandler = Rc<dyn Fn(&EventArgs) -> anyhow::Result<()>>;
pub type AsyncHandler = Rc<dyn Fn(EventArgs) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

#[derive(Clone)]
pub enum EventHandler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventHandler::Sync(_) => f.write_str("EventHandler::Sync"),
            EventHandler::Async(_) => f.write_str("EventHandler::Async"),
        }
    }
}

/// Positional arguments sent with an event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventArgs(pub Vec<Value>);

impl EventArgs {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self(values.into_iter().collect())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserializes argument `index` into `T`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("missing event argument {index}"))?;
        Ok(T::deserialize(value)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub widget_id: NodeId,
    pub event_name: String,
    #[serde(default)]
    pub args: EventArgs,
}

impl InboundEvent {
    pub fn new(widget_id: NodeId, event_name: impl Into<String>, args: EventArgs) -> Self {
        Self {
            widget_id,
            event_name: event_name.into(),
            args,
        }
    }
}

/// Result of dispatching one inbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchOutcome {
    Handled,
    /// An async handler is still running; later events wait for it.
    Pending,
    /// No live binding. The event was dropped.
    NotFound,
    /// The handler returned an error, routed to the exception pipeline.
    Failed,
}

/// Why an event did not match a live binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleEvent {
    /// The widget is not in the committed tree.
    UnknownWidget,
    /// The widget's kind does not declare the event.
    Undeclared,
    /// The widget has no handler for the event.
    Unbound,
    /// The handler was replaced by a newer render.
    Superseded,
}

impl fmt::Display for StaleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StaleEvent::UnknownWidget => "widget is not mounted",
            StaleEvent::Undeclared => "event is not declared by the widget kind",
            StaleEvent::Unbound => "widget has no handler for the event",
            StaleEvent::Superseded => "handler belongs to an older render",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
#[error("handler for {event_name} on widget {widget_id:#x} failed: {error}")]
pub struct EventException {
    pub widget_id: NodeId,
    pub event_name: String,
    pub error: anyhow::Error,
}

#[derive(Clone)]
pub struct EventBinding {
    pub handler: EventHandler,
    /// Commit version of the render that created this binding.
    pub version: u64,
}

struct LiveNode {
    kind: &'static str,
    version: u64,
}

/// Handlers bound to nodes of the committed tree.
///
/// A binding is only valid while its version equals the version at which
/// its node was last produced, so a handler captured by an older render can
/// never fire after a newer render replaced it.
#[derive(Default)]
pub struct EventTable {
    live: HashMap<NodeId, LiveNode>,
    bindings: HashMap<NodeId, HashMap<&'static str, EventBinding>>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `node` was produced at `version` with `handlers`.
    pub fn bind_node(
        &mut self,
        node: NodeId,
        kind: &'static str,
        version: u64,
        handlers: &IndexMap<&'static str, EventHandler>,
    ) {
        self.live.insert(node, LiveNode { kind, version });
        let bindings = self.bindings.entry(node).or_default();
        bindings.retain(|event, _| handlers.contains_key(event));
        for (event, handler) in handlers {
            bindings.insert(
                event,
                EventBinding {
                    handler: handler.clone(),
                    version,
                },
            );
        }
    }

    pub fn unbind_node(&mut self, node: NodeId) {
        self.live.remove(&node);
        self.bindings.remove(&node);
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.live.contains_key(&node)
    }

    pub fn live_nodes(&self) -> usize {
        self.live.len()
    }

    pub fn lookup(
        &self,
        node: NodeId,
        event: &str,
        registry: Option<&WidgetRegistry>,
    ) -> Result<&EventBinding, StaleEvent> {
        let live = self.live.get(&node).ok_or(StaleEvent::UnknownWidget)?;
        if let Some(registry) = registry {
            if !registry.declares_event(live.kind, event) {
                return Err(StaleEvent::Undeclared);
            }
        }
        let binding = self
            .bindings
            .get(&node)
            .and_then(|bindings| bindings.get(event))
            .ok_or(StaleEvent::Unbound)?;
        if binding.version != live.version {
            return Err(StaleEvent::Superseded);
        }
        Ok(binding)
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.bindings.clear();
    }
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
