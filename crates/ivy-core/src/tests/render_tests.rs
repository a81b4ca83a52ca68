use super::*;
use std::cell::Cell;

use futures::channel::oneshot;

use crate::test_support::{column, find_kind, text, texts, tree, Button};
use crate::{
    widget, DispatchOutcome, Element, EventArgs, InboundEvent, Patch, RuntimeException, Session,
    TurnError, View,
};

type Slot<T> = Rc<RefCell<Option<T>>>;
type Log = Rc<RefCell<Vec<String>>>;

fn slot<T>() -> Slot<T> {
    Rc::new(RefCell::new(None))
}

fn taken<T: Clone>(slot: &Slot<T>) -> T {
    slot.borrow().clone().expect("view has rendered")
}

fn click(session: &mut Session, kind: &str) -> DispatchOutcome {
    let id = find_kind(&tree(session), kind).expect("widget is mounted").id;
    session
        .dispatch(InboundEvent::new(id, "click", EventArgs::default()))
        .unwrap()
}

struct ClickCounter;

impl View for ClickCounter {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let count = cx.use_state(|| 0);
        let label = format!("count {}", count.get());
        column()
            .child(text(label))
            .child(widget::<Button>().on("click", move |_| {
                count.update(|n| n + 1);
                Ok(())
            }))
            .into()
    }
}

#[test]
fn state_written_by_a_handler_renders_on_the_next_turn() {
    let mut session = Session::new(ClickCounter);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["count 0"]);

    assert_eq!(click(&mut session, "Button"), DispatchOutcome::Handled);
    assert_eq!(click(&mut session, "Button"), DispatchOutcome::Handled);
    assert!(session.needs_turn());

    let reports = session.run_until_idle().unwrap();
    assert_eq!(reports.len(), 1, "both writes land in one turn");
    assert_eq!(texts(&tree(&session)), vec!["count 2"]);

    let commit = reports[0].commit.as_ref().unwrap();
    assert_eq!(commit.version, 2);
    assert_eq!(commit.patches.len(), 1);
    assert!(matches!(commit.patches[0], Patch::UpdateProps { .. }));
}

struct Memoized {
    calls: Rc<Cell<usize>>,
    count: Slot<StateCell<i32>>,
    other: Slot<StateCell<i32>>,
}

impl View for Memoized {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let count = cx.use_state(|| 1);
        let other = cx.use_state(|| 0);
        *self.count.borrow_mut() = Some(count.clone());
        *self.other.borrow_mut() = Some(other.clone());

        let calls = Rc::clone(&self.calls);
        let value = count.get();
        let doubled = cx.use_memo(value, move || {
            calls.set(calls.get() + 1);
            value * 2
        });
        text(format!("{doubled}/{}", other.get())).into()
    }
}

#[test]
fn memo_recomputes_only_when_its_deps_change() {
    let view = Memoized {
        calls: Rc::new(Cell::new(0)),
        count: slot(),
        other: slot(),
    };
    let calls = Rc::clone(&view.calls);
    let (count, other) = (Rc::clone(&view.count), Rc::clone(&view.other));
    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    assert_eq!(calls.get(), 1);

    taken(&other).set(5);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["2/5"]);
    assert_eq!(calls.get(), 1);

    taken(&count).set(4);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["8/5"]);
    assert_eq!(calls.get(), 2);
}

struct Effectful {
    log: Log,
    dep: Slot<StateCell<i32>>,
}

impl View for Effectful {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let dep = cx.use_state(|| 0);
        *self.dep.borrow_mut() = Some(dep.clone());
        let value = dep.get();
        let log = Rc::clone(&self.log);
        cx.use_effect(value, move |scope| {
            log.borrow_mut().push(format!("run {value}"));
            let log = Rc::clone(&log);
            scope.on_cleanup(move || log.borrow_mut().push(format!("cleanup {value}")));
            Ok(())
        });
        text(value.to_string()).into()
    }
}

#[test]
fn effects_clean_up_before_rerunning_and_on_dispose() {
    let view = Effectful {
        log: Rc::default(),
        dep: slot(),
    };
    let (log, dep) = (Rc::clone(&view.log), Rc::clone(&view.dep));
    let mut session = Session::new(view);
    let reports = session.run_until_idle().unwrap();
    assert_eq!(reports[0].effects_run, 1);
    assert_eq!(*log.borrow(), vec!["run 0"]);

    taken(&dep).set(1);
    session.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1"]);

    taken(&dep).update(|value| value + 1);
    taken(&dep).update(|value| value - 1);
    let reports = session.run_until_idle().unwrap();
    assert!(reports.is_empty() || reports[0].effects_run == 0);

    session.dispose();
    assert_eq!(
        *log.borrow(),
        vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
    );
    assert!(matches!(session.run_turn(), Err(TurnError::Disposed)));
}

struct Reducer {
    dispatch: Slot<Dispatch<i32>>,
}

impl View for Reducer {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let (total, dispatch) = cx.use_reducer(|total: &i32, delta: i32| total + delta, || 10);
        *self.dispatch.borrow_mut() = Some(dispatch);
        text(total.to_string()).into()
    }
}

#[test]
fn reducer_actions_fold_in_order_and_dispatch_is_stable() {
    let view = Reducer { dispatch: slot() };
    let dispatch = Rc::clone(&view.dispatch);
    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    let first = taken(&dispatch);

    first(5);
    first(-2);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["13"]);
    assert!(Rc::ptr_eq(&first, &taken(&dispatch)));
}

struct Refreshing {
    handle: Slot<RefreshHandle>,
    renders: Rc<Cell<usize>>,
    cell: Slot<Rc<RefCell<Vec<u64>>>>,
}

impl View for Refreshing {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        self.renders.set(self.renders.get() + 1);
        let handle = cx.use_refresh_token();
        let seen = cx.use_ref(Vec::new);
        seen.borrow_mut().push(handle.token());
        *self.cell.borrow_mut() = Some(seen);
        *self.handle.borrow_mut() = Some(handle);
        Element::Empty
    }
}

#[test]
fn refresh_tokens_force_a_rerender_with_a_larger_token() {
    let view = Refreshing {
        handle: slot(),
        renders: Rc::default(),
        cell: slot(),
    };
    let (handle, renders, cell) = (
        Rc::clone(&view.handle),
        Rc::clone(&view.renders),
        Rc::clone(&view.cell),
    );
    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    assert!(session.committed_tree().is_none());

    taken(&handle).refresh();
    session.run_until_idle().unwrap();
    taken(&handle).refresh();
    session.run_until_idle().unwrap();

    assert_eq!(renders.get(), 3);
    let seen = taken(&cell).borrow().clone();
    assert_eq!(seen.len(), 3, "the ref survives every render");
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

struct Unstable {
    flip: Slot<StateCell<bool>>,
}

impl View for Unstable {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let flip = cx.use_state(|| false);
        *self.flip.borrow_mut() = Some(flip.clone());
        if flip.get() {
            cx.use_ref(|| 0);
        }
        text("unstable").into()
    }
}

#[test]
fn conditional_hooks_poison_the_session() {
    let reported = Rc::new(Cell::new(0));
    let view = Unstable { flip: slot() };
    let flip = Rc::clone(&view.flip);
    let mut session = Session::new(view).with_exception_handler({
        let reported = Rc::clone(&reported);
        move |exception: &RuntimeException| {
            reported.set(reported.get() + 1);
            assert!(exception.is_integrity_failure());
            true
        }
    });
    session.run_until_idle().unwrap();

    taken(&flip).set(true);
    let err = session.run_turn().unwrap_err();
    assert!(matches!(
        err,
        TurnError::Integrity(RuntimeException::HookSequence {
            source: HookSequenceError::TooMany { index: 1, .. },
            ..
        })
    ));
    assert_eq!(reported.get(), 1);
    assert!(session.is_poisoned());
    assert!(!session.needs_turn());
    assert!(matches!(session.run_turn(), Err(TurnError::Poisoned)));
    assert_eq!(texts(&tree(&session)), vec!["unstable"], "last commit is kept");
}

struct Failing;

impl View for Failing {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        cx.use_effect((), |_| Err(anyhow::anyhow!("could not subscribe")));
        text("still rendered").into()
    }
}

#[test]
fn unhandled_effect_errors_carry_the_turn_report() {
    let mut session = Session::new(Failing);
    let err = session.run_turn().unwrap_err();
    match err {
        TurnError::Unhandled { exception, report } => {
            assert!(matches!(exception, RuntimeException::Effect(_)));
            assert!(report.commit.is_some());
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(!session.is_poisoned());
    assert_eq!(texts(&tree(&session)), vec!["still rendered"]);

    let mut handled = Session::new(Failing).with_exception_handler(|_: &RuntimeException| true);
    let report = handled.run_turn().unwrap();
    assert_eq!(report.exceptions_handled, 1);
}

struct Loader {
    receiver: Slot<oneshot::Receiver<String>>,
}

impl View for Loader {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let data = cx.use_state(|| None::<String>);
        let receiver = Rc::clone(&self.receiver);
        let target = data.clone();
        cx.use_effect_async((), move |scope| async move {
            let pending = receiver.borrow_mut().take();
            if let Some(pending) = pending {
                let value = pending.await?;
                if scope.is_active() {
                    target.set(Some(value));
                }
            }
            anyhow::Ok(())
        });
        text(data.get().unwrap_or_else(|| "loading".to_owned())).into()
    }
}

#[test]
fn async_effects_resume_on_wake_and_write_state() {
    let (tx, rx) = oneshot::channel();
    let view = Loader {
        receiver: Rc::new(RefCell::new(Some(rx))),
    };
    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["loading"]);
    assert_eq!(session.pending_tasks(), 1);
    assert!(!session.needs_turn());

    tx.send("ready".to_owned()).unwrap();
    assert!(session.needs_turn());
    session.run_until_idle().unwrap();
    assert_eq!(texts(&tree(&session)), vec!["ready"]);
    assert_eq!(session.pending_tasks(), 0);
}

struct Slow {
    gate: Slot<oneshot::Receiver<()>>,
    log: Log,
}

impl View for Slow {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let gate = Rc::clone(&self.gate);
        let slow_log = Rc::clone(&self.log);
        let fast_log = Rc::clone(&self.log);
        column()
            .child(
                widget::<Button>()
                    .key("slow")
                    .on_async("click", move |_| {
                        let pending = gate.borrow_mut().take();
                        let log = Rc::clone(&slow_log);
                        async move {
                            if let Some(pending) = pending {
                                pending.await?;
                            }
                            log.borrow_mut().push("slow".to_owned());
                            anyhow::Ok(())
                        }
                    }),
            )
            .child(
                widget::<Button>()
                    .key("fast")
                    .on("click", move |_| {
                        fast_log.borrow_mut().push("fast".to_owned());
                        Ok(())
                    }),
            )
            .into()
    }
}

#[test]
fn pending_async_handlers_hold_back_later_events() {
    let (tx, rx) = oneshot::channel();
    let view = Slow {
        gate: Rc::new(RefCell::new(Some(rx))),
        log: Rc::default(),
    };
    let log = Rc::clone(&view.log);
    let mut session = Session::new(view);
    session.run_until_idle().unwrap();

    let root = tree(&session);
    let slow = root.children[0].id;
    let fast = root.children[1].id;
    let event = |id| InboundEvent::new(id, "click", EventArgs::default());

    assert_eq!(session.dispatch(event(slow)).unwrap(), DispatchOutcome::Pending);
    assert_eq!(session.dispatch(event(fast)).unwrap(), DispatchOutcome::Pending);
    assert!(log.borrow().is_empty());

    tx.send(()).unwrap();
    let report = session.run_turn().unwrap();
    assert_eq!(report.dispatched, vec![DispatchOutcome::Handled]);
    assert_eq!(*log.borrow(), vec!["slow", "fast"]);
}
