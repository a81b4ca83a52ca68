use super::*;
use crate::effects::EffectException;
use crate::Key;
use std::cell::RefCell;

fn effect_failure() -> RuntimeException {
    EffectException {
        view: 1,
        slot: 0,
        error: anyhow::anyhow!("effect failed"),
    }
    .into()
}

#[test]
fn handlers_are_consulted_in_order_until_one_accepts() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let record = |name: &'static str, accept: bool| {
        let calls = Rc::clone(&calls);
        move |_: &RuntimeException| {
            calls.borrow_mut().push(name);
            accept
        }
    };
    let composite = ExceptionPipeline::new()
        .with_fn(record("log", false))
        .with_fn(record("notify", true))
        .with_fn(record("never", true))
        .build();

    assert!(composite.handle_exception(&effect_failure()));
    assert_eq!(*calls.borrow(), vec!["log", "notify"]);
}

#[test]
fn an_empty_pipeline_handles_nothing() {
    let pipeline = ExceptionPipeline::new();
    assert!(pipeline.is_empty());
    assert!(!pipeline.build().handle_exception(&effect_failure()));
}

#[test]
fn pipelines_can_nest() {
    let inner = ExceptionPipeline::new()
        .with_fn(|exception: &RuntimeException| matches!(exception, RuntimeException::Effect(_)))
        .build();
    let mut outer = ExceptionPipeline::new();
    outer.push(inner);
    assert_eq!(outer.len(), 1);
    assert!(outer.build().handle_exception(&effect_failure()));
}

#[test]
fn integrity_failures_are_classified() {
    let duplicate: RuntimeException = DuplicateKeyError {
        parent: None,
        key: Key::from("a"),
    }
    .into();
    let hooks = RuntimeException::HookSequence {
        view: 2,
        source: HookSequenceError::TooFew {
            expected: 2,
            found: 1,
        },
    };

    assert!(duplicate.is_integrity_failure());
    assert!(hooks.is_integrity_failure());
    assert!(!effect_failure().is_integrity_failure());
    assert_eq!(duplicate.to_string(), "duplicate key a among children of the root");
}
