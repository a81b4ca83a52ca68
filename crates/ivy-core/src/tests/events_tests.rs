use super::*;
use crate::test_support::{Button, Text};
use serde_json::json;

fn handlers(events: &[&'static str]) -> IndexMap<&'static str, EventHandler> {
    events
        .iter()
        .map(|event| {
            let handler: SyncHandler = Rc::new(|_: &EventArgs| Ok(()));
            (*event, EventHandler::Sync(handler))
        })
        .collect()
}

#[test]
fn unknown_widgets_are_stale() {
    let table = EventTable::new();
    assert_eq!(
        table.lookup(1, "click", None).err(),
        Some(StaleEvent::UnknownWidget)
    );
}

#[test]
fn bound_handlers_are_found_at_the_live_version() {
    let mut table = EventTable::new();
    table.bind_node(7, "Button", 3, &handlers(&["click"]));

    let binding = table.lookup(7, "click", None).ok().map(|binding| binding.version);
    assert_eq!(binding, Some(3));
    assert_eq!(table.lookup(7, "hover", None).err(), Some(StaleEvent::Unbound));
}

#[test]
fn rebinding_drops_handlers_the_new_render_omits() {
    let mut table = EventTable::new();
    table.bind_node(7, "Button", 1, &handlers(&["click", "focus"]));
    table.bind_node(7, "Button", 2, &handlers(&["click"]));

    assert!(table.lookup(7, "click", None).is_ok());
    assert_eq!(table.lookup(7, "focus", None).err(), Some(StaleEvent::Unbound));
}

#[test]
fn bindings_older_than_the_node_are_superseded() {
    let mut table = EventTable::new();
    table.bind_node(7, "Button", 1, &handlers(&["click"]));
    if let Some(live) = table.live.get_mut(&7) {
        live.version = 2;
    }
    assert_eq!(
        table.lookup(7, "click", None).err(),
        Some(StaleEvent::Superseded)
    );
}

#[test]
fn registry_rejects_undeclared_events() {
    let mut registry = WidgetRegistry::new();
    registry.register::<Button>().unwrap();
    registry.register::<Text>().unwrap();

    let mut table = EventTable::new();
    table.bind_node(1, "Button", 1, &handlers(&["click"]));
    table.bind_node(2, "Text", 1, &handlers(&["click"]));

    assert!(table.lookup(1, "click", Some(&registry)).is_ok());
    assert_eq!(
        table.lookup(2, "click", Some(&registry)).err(),
        Some(StaleEvent::Undeclared)
    );
}

#[test]
fn unbinding_forgets_the_node() {
    let mut table = EventTable::new();
    table.bind_node(7, "Button", 1, &handlers(&["click"]));
    table.unbind_node(7);
    assert!(!table.is_live(7));
    assert_eq!(table.live_nodes(), 0);
    assert_eq!(
        table.lookup(7, "click", None).err(),
        Some(StaleEvent::UnknownWidget)
    );
}

#[test]
fn arguments_deserialize_by_position() {
    let args = EventArgs::new([json!("hello"), json!({ "x": 1, "y": 2 })]);

    assert_eq!(args.parse::<String>(0).unwrap(), "hello");
    let point: std::collections::HashMap<String, i32> = args.parse(1).unwrap();
    assert_eq!(point["y"], 2);
    assert!(args.parse::<i32>(0).is_err());
    assert!(args.parse::<String>(5).is_err());
}

#[test]
fn inbound_events_use_camel_case_and_default_args() {
    let event: InboundEvent =
        serde_json::from_value(json!({ "widgetId": 12, "eventName": "click" })).unwrap();
    assert_eq!(event, InboundEvent::new(12, "click", EventArgs::default()));

    let event: InboundEvent =
        serde_json::from_value(json!({ "widgetId": 12, "eventName": "change", "args": ["x"] }))
            .unwrap();
    assert_eq!(event.args.get(0), Some(&json!("x")));
}
