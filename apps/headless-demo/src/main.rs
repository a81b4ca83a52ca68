//! Line-oriented Ivy host. Each stdin line is one inbound event, e.g.
//! `{"widgetId": 123, "eventName": "click"}`; each stdout line is one
//! outbound message. Logs go to stderr, filtered by `RUST_LOG`.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use ivy_app_shell::{AppShell, ClientConnection, OutboundMessage, ShellConfig, WireError};
use ivy_blades::{use_blade_controller, use_blades, BladeSpec};
use ivy_core::{widget, Container, Element, Leaf, RenderContext, WidgetKind};
use ivy_macros::component;

struct Column;

impl WidgetKind for Column {
    const NAME: &'static str = "Column";
    type Category = Container;
}

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

struct TextInput;

impl WidgetKind for TextInput {
    const NAME: &'static str = "TextInput";
    const EVENTS: &'static [&'static str] = &["submit"];
    type Category = Leaf;
}

struct StdoutConnection {
    out: RefCell<io::Stdout>,
}

impl ClientConnection for StdoutConnection {
    fn send(&self, message: OutboundMessage) -> Result<(), WireError> {
        let json = message.to_json()?;
        let mut out = self.out.borrow_mut();
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }
}

#[component]
fn app(cx: &mut RenderContext<'_>) -> Element {
    use_blades(cx, || BladeSpec::new(Inbox {}).title("Inbox"))
}

/// Item list with an input that appends to it. Clicking an item opens it in
/// the next blade.
#[component]
fn inbox(cx: &mut RenderContext<'_>) -> Element {
    let items = cx.use_state(|| vec!["Welcome".to_owned(), "Release notes".to_owned()]);
    let controller = use_blade_controller(cx);

    let add = items.clone();
    let input = widget::<TextInput>()
        .prop("placeholder", "New item")
        .on("submit", move |args| {
            let text: String = args.parse(0)?;
            add.update(move |items| {
                let mut next = items.clone();
                next.push(text);
                next
            });
            Ok(())
        });

    let rows = items.get().into_iter().enumerate().map(|(index, title)| {
        let controller = controller.clone();
        let opened = title.clone();
        widget::<Button>()
            .key(index)
            .prop("text", title)
            .on("click", move |_| {
                if let Some(controller) = &controller {
                    let spec = BladeSpec::new(Details {
                        title: opened.clone(),
                    });
                    controller.push(spec.title(opened.clone()).width(320), Some(0));
                }
                Ok(())
            })
    });

    widget::<Column>().child(input).children(rows).into()
}

#[component(memo)]
fn details(title: String) -> Element {
    widget::<Column>()
        .child(widget::<Text>().prop("text", title))
        .child(widget::<Text>().prop("text", "Close the blade to go back."))
        .into()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let connection = StdoutConnection {
        out: RefCell::new(io::stdout()),
    };
    let mut shell = AppShell::new(App {}, connection, ShellConfig::from_env());
    shell.pump().map_err(|err| anyhow::anyhow!("{err}"))?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(err) = shell.receive(&line) {
            log::warn!("{err}");
            continue;
        }
        if let Err(err) = shell.pump() {
            log::error!("turn failed: {err}");
            if shell.session().is_poisoned() {
                break;
            }
        }
    }

    shell.dispose();
    Ok(())
}
