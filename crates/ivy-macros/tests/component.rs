use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ivy_core::{
    widget, Container, DispatchOutcome, Element, EventArgs, InboundEvent, Leaf, RenderContext,
    Session, StateCell, View, Widget, WidgetKind, WidgetNode,
};
use ivy_macros::component;

struct Text;

impl WidgetKind for Text {
    const NAME: &'static str = "Text";
    type Category = Leaf;
}

struct Button;

impl WidgetKind for Button {
    const NAME: &'static str = "Button";
    const EVENTS: &'static [&'static str] = &["click"];
    type Category = Leaf;
}

struct Column;

impl WidgetKind for Column {
    const NAME: &'static str = "Column";
    type Category = Container;
}

fn texts(session: &Session) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(root) = session.committed_tree() {
        root.walk(&mut |node: &WidgetNode| {
            if let Some(value) = node.props.get("text").and_then(|value| value.as_str()) {
                out.push(value.to_owned());
            }
        });
    }
    out
}

thread_local! {
    static LABEL_RENDERS: Cell<usize> = const { Cell::new(0) };
}

/// A memoized text label.
#[component(memo)]
fn label(text: String) -> Widget<Leaf> {
    LABEL_RENDERS.with(|renders| renders.set(renders.get() + 1));
    widget::<Text>().prop("text", text)
}

#[component]
fn host(cx: &mut RenderContext<'_>, tick: Rc<RefCell<Option<StateCell<u32>>>>) -> Element {
    let counter = cx.use_state(|| 0u32);
    *tick.borrow_mut() = Some(counter.clone());
    widget::<Column>()
        .child(widget::<Text>().prop("text", counter.get().to_string()))
        .child(label("fixed".to_owned()))
        .into()
}

#[test]
fn generates_a_view_struct_and_a_constructor() {
    let view = Label {
        text: "hello".to_owned(),
    };
    assert_eq!(view.text, "hello");
    assert!(View::memo(&view).is_some());
    assert!(matches!(label("hi".to_owned()), Element::View(_)));
}

#[test]
fn memoized_components_skip_rebuilds_with_equal_params() {
    let tick = Rc::new(RefCell::new(None));
    let mut session = Session::new(Host {
        tick: Rc::clone(&tick),
    });
    session.run_until_idle().unwrap();
    assert_eq!(texts(&session), vec!["0", "fixed"]);
    assert_eq!(LABEL_RENDERS.with(Cell::get), 1);

    tick.borrow().as_ref().unwrap().set(1);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&session), vec!["1", "fixed"]);
    assert_eq!(LABEL_RENDERS.with(Cell::get), 1);
}

#[component(memo)]
fn action(name: String, compute: Box<dyn Fn() -> u32>) -> Element {
    widget::<Text>()
        .prop("text", format!("{name}:{}", compute()))
        .into()
}

#[test]
fn boxed_closures_are_borrowed_and_disable_memo() {
    let view = Action {
        name: "sum".to_owned(),
        compute: Box::new(|| 2 + 2),
    };
    assert!(View::memo(&view).is_none());

    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    assert_eq!(texts(&session), vec!["sum:4"]);
}

#[component(memo)]
fn clicker(on_click: Rc<dyn Fn()>) -> Element {
    widget::<Button>()
        .on("click", move |_| {
            on_click();
            Ok(())
        })
        .into()
}

#[test]
fn shared_closures_are_cloned_into_handlers() {
    let clicks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&clicks);
    let view = Clicker {
        on_click: Rc::new(move || counter.set(counter.get() + 1)),
    };
    assert!(View::memo(&view).is_none());

    let mut session = Session::new(view);
    session.run_until_idle().unwrap();
    let button = session.committed_tree().unwrap().id;
    let outcome = session
        .dispatch(InboundEvent::new(button, "click", EventArgs::default()))
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(clicks.get(), 1);
}

#[component]
fn shown<T: std::fmt::Display + Clone>(value: T) -> Element {
    widget::<Text>().prop("text", value.to_string()).into()
}

#[test]
fn generic_components_render_their_params() {
    let mut session = Session::new(Shown { value: 42 });
    session.run_until_idle().unwrap();
    assert_eq!(texts(&session), vec!["42"]);
    assert!(View::memo(&Shown { value: 'x' }).is_none());
}

#[component]
fn greeting_card(mut name: String) -> Element {
    name.make_ascii_uppercase();
    widget::<Text>().prop("text", name).into()
}

#[test]
fn multi_word_names_become_upper_camel_case() {
    let mut session = Session::new(GreetingCard {
        name: "ivy".to_owned(),
    });
    session.run_until_idle().unwrap();
    assert_eq!(texts(&session), vec!["IVY"]);
    assert!(matches!(greeting_card("a".to_owned()), Element::View(_)));
}
