use super::*;
use crate::path::{Path, SegmentKind, SiblingCounter};
use serde_json::json;

fn node(id: NodeId, key: Option<&str>, children: Vec<Rc<WidgetNode>>) -> Rc<WidgetNode> {
    Rc::new(WidgetNode {
        id,
        kind: if children.is_empty() { "Text" } else { "Column" }.to_owned(),
        key: key.map(Key::from),
        props: Props::new(),
        events: BTreeSet::new(),
        children,
    })
}

fn keyed(id: NodeId) -> Rc<WidgetNode> {
    node(id, Some(id.to_string().as_str()), Vec::new())
}

fn list(ids: &[NodeId]) -> Rc<WidgetNode> {
    Rc::new(WidgetNode {
        id: 1,
        kind: "Column".to_owned(),
        key: None,
        props: Props::new(),
        events: BTreeSet::new(),
        children: ids.iter().map(|id| keyed(*id)).collect(),
    })
}

/// Applies patches to a plain list of child ids.
fn apply_to_children(mut children: Vec<NodeId>, patches: &[Patch]) -> Vec<NodeId> {
    for patch in patches {
        match patch {
            Patch::Remove { id } => children.retain(|child| child != id),
            Patch::Move { id, index } => {
                children.retain(|child| child != id);
                children.insert(*index, *id);
            }
            Patch::Insert { node, index, .. } => children.insert(*index, node.id),
            Patch::UpdateProps { .. } => {}
        }
    }
    children
}

#[test]
fn mounting_inserts_the_root() {
    let root = list(&[10, 11]);
    let patches = diff(None, Some(&root)).unwrap();
    assert_eq!(
        patches,
        vec![Patch::Insert {
            parent: None,
            index: 0,
            node: Rc::clone(&root),
        }]
    );
}

#[test]
fn unmounting_removes_the_root() {
    let root = list(&[10]);
    assert_eq!(diff(Some(&root), None).unwrap(), vec![Patch::Remove { id: 1 }]);
}

#[test]
fn shared_subtrees_produce_no_patches() {
    let root = list(&[10, 11, 12]);
    assert!(diff(Some(&root), Some(&root)).unwrap().is_empty());

    let copy = list(&[10, 11, 12]);
    assert!(diff(Some(&root), Some(&copy)).unwrap().is_empty());
}

#[test]
fn changed_props_emit_update_props() {
    let before = node(5, None, Vec::new());
    let mut after = (*before).clone();
    after.props.insert("text".to_owned(), json!("hi"));
    after.events.insert("click".to_owned());

    let patches = diff(Some(&before), Some(&Rc::new(after))).unwrap();
    assert_eq!(
        patches,
        vec![Patch::UpdateProps {
            id: 5,
            props: [("text".to_owned(), json!("hi"))].into_iter().collect(),
            events: ["click".to_owned()].into_iter().collect(),
        }]
    );
}

#[test]
fn keyed_reorder_moves_existing_children() {
    let before = list(&[10, 11, 12]);
    let after = list(&[12, 10, 11]);
    let patches = diff(Some(&before), Some(&after)).unwrap();

    assert!(patches
        .iter()
        .all(|patch| matches!(patch, Patch::Move { .. })));
    assert_eq!(apply_to_children(vec![10, 11, 12], &patches), vec![12, 10, 11]);
}

#[test]
fn keyed_changes_remove_then_insert() {
    let before = list(&[10, 11, 12, 13]);
    let after = list(&[13, 14, 11]);
    let patches = diff(Some(&before), Some(&after)).unwrap();

    let removed: Vec<NodeId> = patches
        .iter()
        .filter_map(|patch| match patch {
            Patch::Remove { id } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(removed, vec![12, 10], "removals run from the back");
    assert_eq!(
        apply_to_children(vec![10, 11, 12, 13], &patches),
        vec![13, 14, 11]
    );
}

/// Unkeyed children of `kinds`, with ids assigned the way the tree does.
fn unkeyed(kinds: &[&'static str]) -> Rc<WidgetNode> {
    let parent = Path::root();
    let mut counter = SiblingCounter::new(Some(parent.id()));
    let children = kinds
        .iter()
        .map(|kind| {
            let segment = counter.next(SegmentKind::Widget, *kind, None).unwrap();
            Rc::new(WidgetNode {
                id: parent.child(&segment).id(),
                kind: (*kind).to_owned(),
                key: None,
                props: Props::new(),
                events: BTreeSet::new(),
                children: Vec::new(),
            })
        })
        .collect();
    Rc::new(WidgetNode {
        id: parent.id(),
        kind: "Column".to_owned(),
        key: None,
        props: Props::new(),
        events: BTreeSet::new(),
        children,
    })
}

fn child_ids(node: &WidgetNode) -> Vec<NodeId> {
    node.children.iter().map(|child| child.id).collect()
}

/// Diffs `before` against `after`, replays the patches onto the previous
/// children and checks that no id is ever inserted while still mounted.
fn replay(before: &[&'static str], after: &[&'static str]) -> Vec<Patch> {
    let (before, after) = (unkeyed(before), unkeyed(after));
    let patches = diff(Some(&before), Some(&after)).unwrap();
    let mut mounted = child_ids(&before);
    for patch in &patches {
        if let Patch::Insert { node, .. } = patch {
            assert!(!mounted.contains(&node.id), "{:#x} inserted twice", node.id);
        }
        mounted = apply_to_children(mounted, std::slice::from_ref(patch));
    }
    assert_eq!(mounted, child_ids(&after));
    patches
}

#[test]
fn unkeyed_children_are_matched_by_id() {
    let patches = replay(&["Text", "Button"], &["Button"]);
    assert_eq!(patches.len(), 1);
    assert!(matches!(patches[0], Patch::Remove { .. }));

    let patches = replay(&["Button"], &["Text", "Button"]);
    assert_eq!(patches.len(), 1);
    assert!(matches!(patches[0], Patch::Insert { index: 0, .. }));
}

#[test]
fn unkeyed_mixed_types_reorder_and_resize() {
    replay(&["Text", "Button", "Text"], &["Button", "Text", "Text", "Image"]);
    replay(&["Image", "Text", "Text"], &["Text"]);
    replay(&["Text"], &["Button", "Text", "Button", "Text"]);
    replay(&["Button", "Text"], &["Text", "Button"]);
}

#[test]
fn unkeyed_shrink_removes_from_the_back() {
    let three = unkeyed(&["Text", "Text", "Text"]);
    let one = unkeyed(&["Text"]);

    let shrink = diff(Some(&three), Some(&one)).unwrap();
    assert_eq!(
        shrink,
        vec![
            Patch::Remove { id: three.children[2].id },
            Patch::Remove { id: three.children[1].id },
        ]
    );
    let grow = diff(Some(&one), Some(&three)).unwrap();
    assert_eq!(apply_to_children(child_ids(&one), &grow), child_ids(&three));
}

#[test]
fn duplicate_keys_are_rejected() {
    let before = list(&[10]);
    let after = Rc::new(WidgetNode {
        children: vec![
            node(20, Some("dup"), Vec::new()),
            node(21, Some("dup"), Vec::new()),
        ],
        ..(*before).clone()
    });

    let err = diff(Some(&before), Some(&after)).unwrap_err();
    assert_eq!(err.parent, Some(1));
    assert_eq!(err.key, Key::from("dup"));
}

#[test]
fn duplicate_keys_inside_inserted_subtrees_are_rejected() {
    let nested = node(
        30,
        None,
        vec![node(31, Some("x"), Vec::new()), node(32, Some("x"), Vec::new())],
    );
    let err = diff(None, Some(&node(1, None, vec![nested]))).unwrap_err();
    assert_eq!(err.parent, Some(30));
}

#[test]
fn patches_serialize_with_an_op_tag() {
    let value = serde_json::to_value(Patch::Move { id: 3, index: 1 }).unwrap();
    assert_eq!(value, json!({ "op": "move", "id": 3, "index": 1 }));

    let value = serde_json::to_value(Patch::UpdateProps {
        id: 3,
        props: Props::new(),
        events: BTreeSet::new(),
    })
    .unwrap();
    assert_eq!(value["op"], json!("updateProps"));
}
