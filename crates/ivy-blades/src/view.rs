use ivy_core::{
    widget, Container, Element, Memo, RegistryError, RenderContext, View, ViewRef, WidgetKind,
    WidgetRegistry,
};

use crate::controller::{BladeController, BladeItem, BladeSpec};

/// One panel of the stack. Pops to the previous blade on `close` and
/// remounts itself on `refresh`.
pub struct Blade;

impl WidgetKind for Blade {
    const NAME: &'static str = "Blade";
    const EVENTS: &'static [&'static str] = &["close", "refresh"];
    type Category = Container;
}

pub struct BladeContainer;

impl WidgetKind for BladeContainer {
    const NAME: &'static str = "BladeContainer";
    type Category = Container;
}

pub fn register_widgets(registry: &mut WidgetRegistry) -> Result<(), RegistryError> {
    registry.register::<Blade>()?.register::<BladeContainer>()?;
    Ok(())
}

/// The blade a view is rendered in, as seen from inside its content.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentBlade {
    pub view: ViewRef,
    pub index: usize,
}

/// Sets up a blade stack with `root` as its first blade and returns the view
/// that renders it. Descendants reach the stack through
/// [`use_blade_controller`].
pub fn use_blades(cx: &mut RenderContext<'_>, root: impl FnOnce() -> BladeSpec) -> Element {
    let runtime = cx.runtime().clone();
    let blades = cx.use_state(|| vec![BladeItem::new(root(), 0, runtime.next_refresh_token())]);
    cx.provide_context(BladeController::new(blades, runtime));
    Element::view(BladesView)
}

pub fn use_blade_controller(cx: &mut RenderContext<'_>) -> Option<BladeController> {
    cx.use_context::<BladeController>()
}

pub fn use_current_blade(cx: &mut RenderContext<'_>) -> Option<CurrentBlade> {
    cx.use_context::<CurrentBlade>()
}

/// Renders every blade of the nearest stack inside a [`BladeContainer`].
pub struct BladesView;

impl View for BladesView {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let Some(controller) = use_blade_controller(cx) else {
            log::warn!("BladesView rendered outside of use_blades");
            return Element::Empty;
        };
        let slots = controller.blades().into_iter().map(|item| {
            Element::keyed_view(
                item.key.clone(),
                BladeSlot {
                    item,
                    controller: controller.clone(),
                },
            )
        });
        widget::<BladeContainer>().children(slots).into()
    }
}

/// Wraps one stack entry. Rebuilt only when its index or refresh token
/// changes, and a new token also changes the widget key, so a refreshed
/// blade replaces its whole subtree.
struct BladeSlot {
    item: BladeItem,
    controller: BladeController,
}

impl View for BladeSlot {
    fn build(&self, cx: &mut RenderContext<'_>) -> Element {
        let item = &self.item;
        let index = item.index;
        cx.provide_context(CurrentBlade {
            view: item.view.clone(),
            index,
        });

        let close = self.controller.clone();
        let refresh = self.controller.clone();
        let mut blade = widget::<Blade>()
            .key(format!("{index}:{}", item.refresh_token))
            .prop("index", index)
            .on("close", move |_| {
                match index.checked_sub(1) {
                    Some(previous) => close.pop(Some(previous), false),
                    None => log::debug!("the root blade cannot be closed"),
                }
                Ok(())
            })
            .on("refresh", move |_| {
                refresh.pop(Some(index), true);
                Ok(())
            });
        if let Some(title) = &item.title {
            blade = blade.prop("title", title.as_str());
        }
        if let Some(width) = item.width {
            blade = blade.prop("width", width);
        }
        blade.child(item.view.clone()).into()
    }

    fn memo(&self) -> Option<Memo> {
        Some(Memo::new((self.item.index, self.item.refresh_token)))
    }
}
