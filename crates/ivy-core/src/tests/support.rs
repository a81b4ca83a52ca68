use std::rc::Rc;

use crate::{widget, Container, Leaf, Session, Widget, WidgetKind, WidgetNode};

pub(crate) struct Text;

impl WidgetKind for Text {
    const NAME: &'static str = "Text";
    type Category = Leaf;
}

pub(crate) struct Button;

impl WidgetKind for Button {
    const NAME: &'static str = "Button";
    const EVENTS: &'static [&'static str] = &["click"];
    type Category = Leaf;
}

pub(crate) struct Column;

impl WidgetKind for Column {
    const NAME: &'static str = "Column";
    type Category = Container;
}

pub(crate) fn text(value: impl Into<String>) -> Widget<Leaf> {
    widget::<Text>().prop("text", value.into())
}

pub(crate) fn column() -> Widget<Container> {
    widget::<Column>()
}

pub(crate) fn tree(session: &Session) -> Rc<WidgetNode> {
    Rc::clone(session.committed_tree().expect("session has rendered"))
}

pub(crate) fn find_kind<'a>(root: &'a WidgetNode, kind: &str) -> Option<&'a WidgetNode> {
    if root.kind == kind {
        return Some(root);
    }
    root.children
        .iter()
        .find_map(|child| find_kind(child, kind))
}

pub(crate) fn texts(root: &WidgetNode) -> Vec<String> {
    let mut out = Vec::new();
    root.walk(&mut |node| {
        if node.kind == "Text" {
            if let Some(value) = node.props.get("text").and_then(|value| value.as_str()) {
                out.push(value.to_owned());
            }
        }
    });
    out
}
