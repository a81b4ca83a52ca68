use super::*;
use crate::runtime::Runtime;

#[test]
fn writes_are_deferred_until_applied() {
    let runtime = Runtime::default();
    let cell = StateCell::new(1, 10, runtime.handle());

    cell.set(2);
    assert_eq!(cell.get(), 1, "reads see the last applied value");

    runtime.apply_pending_states();
    assert_eq!(cell.get(), 2);
    assert_eq!(cell.version(), 1);
}

#[test]
fn equal_writes_do_not_bump_the_version() {
    let runtime = Runtime::default();
    let cell = StateCell::new("a".to_owned(), 10, runtime.handle());

    cell.set("a".to_owned());
    let invalid = runtime.apply_pending_states();

    assert!(invalid.is_empty());
    assert_eq!(cell.version(), 0);
}

#[test]
fn queued_updates_chain_in_order() {
    let runtime = Runtime::default();
    let cell = StateCell::new(1, 10, runtime.handle());

    cell.update(|value| value + 1);
    cell.update(|value| value * 10);
    cell.set(7);
    cell.update(|value| value - 2);
    runtime.apply_pending_states();

    assert_eq!(cell.get(), 5);
    assert_eq!(cell.version(), 1, "one apply bumps the version once");
}

#[test]
fn an_update_that_returns_to_the_start_still_counts_as_a_change() {
    let runtime = Runtime::default();
    let cell = StateCell::new(1, 10, runtime.handle());

    cell.set(2);
    cell.set(1);
    let invalid = runtime.apply_pending_states();

    assert_eq!(cell.get(), 1);
    assert!(invalid.contains(&10));
}

#[test]
fn try_update_can_decline() {
    let runtime = Runtime::default();
    let cell = StateCell::new(vec![1, 2], 10, runtime.handle());

    cell.try_update(|items| (items.len() < 2).then(|| vec![0]));
    runtime.apply_pending_states();
    assert_eq!(cell.get(), vec![1, 2]);

    cell.try_update(|items| Some(items.iter().map(|item| item * 2).collect()));
    runtime.apply_pending_states();
    assert_eq!(cell.get(), vec![2, 4]);
}

#[test]
fn cells_without_a_runtime_apply_immediately() {
    let cell = StateCell::with_runtime(3, RuntimeHandle::detached());
    cell.set(4);
    assert_eq!(cell.get(), 4);
    assert_eq!(cell.owner(), None);

    let runtime = Runtime::default();
    let orphan = StateCell::new(0, 1, runtime.handle());
    drop(runtime);
    orphan.replace(9);
    assert_eq!(orphan.get(), 9);
}

#[test]
fn clones_share_the_same_cell() {
    let runtime = Runtime::default();
    let cell = StateCell::new(0, 1, runtime.handle());
    let other = cell.clone();
    assert_eq!(cell, other);
    assert_ne!(cell, StateCell::new(0, 1, runtime.handle()));

    other.set(5);
    runtime.apply_pending_states();
    assert_eq!(cell.with(|value| *value), 5);
}
