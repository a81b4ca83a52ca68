//! View instances and their resolution into a widget tree.
//!
//! A render pass walks the view tree from the root. Each view is either
//! rebuilt, re-resolved from its stored element (when a descendant must be
//! rebuilt), or reused wholesale (the previous `Rc<WidgetNode>` output is
//! returned, which the reconciler recognises by pointer).

use std::any::{Any, TypeId};
use std::rc::Rc;

use indexmap::IndexSet;

use crate::hash::map::{HashMap, HashSet};
use crate::deps::Memo;
use crate::effects::PendingEffect;
use crate::events::EventTable;
use crate::exceptions::RuntimeException;
use crate::hooks::HookStore;
use crate::path::{Path, PathSegment, SegmentKind, SiblingCounter};
use crate::render::RenderContext;
use crate::runtime::RuntimeHandle;
use crate::view::{Element, ViewElement, ViewRef};
use crate::widget::{WidgetNode, WidgetSpec};
use crate::{Key, NodeId, ViewId};

pub(crate) struct ProvidedContext {
    value: Rc<dyn Any>,
    subscribers: IndexSet<ViewId>,
}

pub(crate) struct ViewRecord {
    view: ViewRef,
    parent: Option<ViewId>,
    hooks: HookStore,
    memo: Option<Memo>,
    element: Rc<Element>,
    output: Option<Rc<WidgetNode>>,
    child_views: Vec<ViewId>,
    nodes: Vec<NodeId>,
    provided: HashMap<TypeId, ProvidedContext>,
}

impl ViewRecord {
    fn new(view: ViewRef, parent: Option<ViewId>) -> Self {
        Self {
            view,
            parent,
            hooks: HookStore::new(),
            memo: None,
            element: Rc::new(Element::Empty),
            output: None,
            child_views: Vec::new(),
            nodes: Vec::new(),
            provided: HashMap::new(),
        }
    }
}

/// Bookkeeping for one render pass.
pub(crate) struct RenderPass {
    pub(crate) version: u64,
    pub(crate) runtime: RuntimeHandle,
    /// Views that must rebuild.
    dirty: HashSet<ViewId>,
    /// Dirty views and all of their ancestors.
    dirty_paths: HashSet<ViewId>,
    /// Effects in post-order: descendants before ancestors, siblings in
    /// child order.
    pub(crate) effects: Vec<PendingEffect>,
    /// Roots of subtrees no longer produced.
    pub(crate) removed: Vec<ViewId>,
    pub(crate) rendered: usize,
}

impl RenderPass {
    pub(crate) fn new(version: u64, runtime: RuntimeHandle) -> Self {
        Self {
            version,
            runtime,
            dirty: HashSet::new(),
            dirty_paths: HashSet::new(),
            effects: Vec::new(),
            removed: Vec::new(),
            rendered: 0,
        }
    }
}

enum Plan {
    Build,
    Reresolve,
    Reuse(Option<Rc<WidgetNode>>),
}

#[derive(Clone, Copy)]
struct Scope<'k> {
    /// The parent rebuilt and handed us a new element.
    fresh: bool,
    /// Key of the enclosing view, applied to an unkeyed output widget.
    key: Option<&'k Key>,
}

/// Views and widgets produced directly by one view's output.
struct Frame {
    owner: ViewId,
    child_views: Vec<ViewId>,
    nodes: Vec<NodeId>,
}

impl Frame {
    fn new(owner: ViewId) -> Self {
        Self {
            owner,
            child_views: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct Tree {
    records: HashMap<ViewId, ViewRecord>,
    pub(crate) events: EventTable,
    pub(crate) committed: Option<Rc<WidgetNode>>,
    root: Option<ViewId>,
}

impl Tree {
    pub(crate) fn view_count(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn contains_view(&self, id: ViewId) -> bool {
        self.records.contains_key(&id)
    }

    /// Marks `id` for rebuild and its ancestors for re-resolution.
    pub(crate) fn mark_dirty(&self, pass: &mut RenderPass, id: ViewId) {
        if !self.records.contains_key(&id) {
            return;
        }
        pass.dirty.insert(id);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !pass.dirty_paths.insert(current) {
                break;
            }
            cursor = self.records.get(&current).and_then(|record| record.parent);
        }
    }

    pub(crate) fn render_root(
        &mut self,
        root: &ViewRef,
        pass: &mut RenderPass,
    ) -> Result<Option<Rc<WidgetNode>>, RuntimeException> {
        let mut counter = SiblingCounter::new(None);
        let segment = counter.next(SegmentKind::View, root.type_name(), None)?;
        let path = Path::root().child(&segment);
        self.root = Some(path.id());
        let element = ViewElement {
            view: root.clone(),
            key: None,
        };
        let scope = Scope {
            fresh: false,
            key: None,
        };
        self.resolve_view(&element, path, None, scope, pass)
    }

    fn resolve_view(
        &mut self,
        element: &ViewElement,
        path: Path,
        parent: Option<ViewId>,
        scope: Scope<'_>,
        pass: &mut RenderPass,
    ) -> Result<Option<Rc<WidgetNode>>, RuntimeException> {
        let id = path.id();
        let inherited = element.key.as_ref().or(scope.key);
        let memo = if scope.fresh {
            element.view.memo()
        } else {
            None
        };
        let plan = match self.records.get(&id) {
            None => Plan::Build,
            Some(_) if pass.dirty.contains(&id) => Plan::Build,
            Some(record) if scope.fresh && !memo_matches(record.memo.as_ref(), memo.as_ref()) => {
                Plan::Build
            }
            Some(_) if pass.dirty_paths.contains(&id) => Plan::Reresolve,
            Some(record) => Plan::Reuse(record.output.clone()),
        };

        match plan {
            Plan::Reuse(output) => Ok(output),
            Plan::Reresolve => self.resolve_output(id, &path, inherited, false, pass),
            Plan::Build => {
                let effects = self.build_view(id, element, parent, memo, pass)?;
                let output = self.resolve_output(id, &path, inherited, true, pass)?;
                pass.effects.extend(effects);
                Ok(output)
            }
        }
    }

    fn build_view(
        &mut self,
        id: ViewId,
        element: &ViewElement,
        parent: Option<ViewId>,
        memo: Option<Memo>,
        pass: &mut RenderPass,
    ) -> Result<Vec<PendingEffect>, RuntimeException> {
        let record = self
            .records
            .entry(id)
            .or_insert_with(|| ViewRecord::new(element.view.clone(), parent));
        if memo.is_some() || !record.view.ptr_eq(&element.view) {
            record.view = element.view.clone();
            record.memo = memo;
        }
        let view = record.view.clone();
        let mut hooks = std::mem::take(&mut record.hooks);

        hooks.begin_render();
        let (output, effects, fault) = {
            let mut cx = RenderContext::new(id, parent, &mut hooks, self, pass);
            let output = view.build(&mut cx);
            let (effects, fault) = cx.finish();
            (output, effects, fault)
        };
        let sequence = match fault {
            Some(error) => Err(error),
            None => hooks.end_render(),
        };
        if let Some(record) = self.records.get_mut(&id) {
            record.hooks = hooks;
            record.element = Rc::new(output);
        }
        sequence.map_err(|source| RuntimeException::HookSequence { view: id, source })?;
        pass.rendered += 1;
        log::trace!("built view {} ({id:#x})", view.type_name());
        Ok(effects)
    }

    fn resolve_output(
        &mut self,
        id: ViewId,
        path: &Path,
        inherited: Option<&Key>,
        fresh: bool,
        pass: &mut RenderPass,
    ) -> Result<Option<Rc<WidgetNode>>, RuntimeException> {
        let Some(element) = self.records.get(&id).map(|record| Rc::clone(&record.element)) else {
            return Ok(None);
        };
        let mut frame = Frame::new(id);
        let output = match element.identity() {
            None => None,
            Some((kind, type_name, key)) => {
                let mut counter = SiblingCounter::new(None);
                let segment = counter.next(kind, type_name, key)?;
                let scope = Scope {
                    fresh,
                    key: inherited,
                };
                self.resolve_element(&element, segment, path, scope, &mut frame, pass)?
            }
        };

        let Some(record) = self.records.get_mut(&id) else {
            return Ok(output);
        };
        let old_views = std::mem::replace(&mut record.child_views, frame.child_views);
        let old_nodes = std::mem::replace(&mut record.nodes, frame.nodes);
        record.output = output.clone();
        let live_views: HashSet<ViewId> = record.child_views.iter().copied().collect();
        let live_nodes: HashSet<NodeId> = record.nodes.iter().copied().collect();

        pass.removed
            .extend(old_views.into_iter().filter(|view| !live_views.contains(view)));
        for node in old_nodes {
            if !live_nodes.contains(&node) {
                self.events.unbind_node(node);
            }
        }
        Ok(output)
    }

    fn resolve_element(
        &mut self,
        element: &Element,
        segment: PathSegment,
        parent_path: &Path,
        scope: Scope<'_>,
        frame: &mut Frame,
        pass: &mut RenderPass,
    ) -> Result<Option<Rc<WidgetNode>>, RuntimeException> {
        let path = parent_path.child(&segment);
        match element {
            Element::Empty => Ok(None),
            Element::Widget(spec) => self.resolve_widget(spec, path, scope, frame, pass),
            Element::View(view) => {
                frame.child_views.push(path.id());
                self.resolve_view(view, path, Some(frame.owner), scope, pass)
            }
        }
    }

    fn resolve_widget(
        &mut self,
        spec: &WidgetSpec,
        path: Path,
        scope: Scope<'_>,
        frame: &mut Frame,
        pass: &mut RenderPass,
    ) -> Result<Option<Rc<WidgetNode>>, RuntimeException> {
        let id = path.id();
        frame.nodes.push(id);
        self.events
            .bind_node(id, spec.kind, pass.version, &spec.handlers);

        let mut counter = SiblingCounter::new(Some(id));
        let mut children = Vec::with_capacity(spec.children.len());
        let child_scope = Scope {
            fresh: scope.fresh,
            key: None,
        };
        for child in &spec.children {
            let Some((kind, type_name, key)) = child.identity() else {
                continue;
            };
            let segment = counter.next(kind, type_name, key)?;
            if let Some(node) = self.resolve_element(child, segment, &path, child_scope, frame, pass)? {
                children.push(node);
            }
        }

        Ok(Some(Rc::new(WidgetNode {
            id,
            kind: spec.kind.to_owned(),
            key: spec.key.clone().or_else(|| scope.key.cloned()),
            props: spec.props.clone(),
            events: spec.handlers.keys().map(|event| (*event).to_owned()).collect(),
            children,
        })))
    }

    /// Stores `value` as the context of type `T` provided by `view`. A
    /// changed value marks every live consumer dirty.
    pub(crate) fn publish_context<T: PartialEq + 'static>(
        &mut self,
        view: ViewId,
        value: T,
        pass: &mut RenderPass,
    ) {
        let type_id = TypeId::of::<T>();
        let Some(record) = self.records.get_mut(&view) else {
            return;
        };
        let subscribers = match record.provided.get_mut(&type_id) {
            Some(existing) => {
                if existing
                    .value
                    .downcast_ref::<T>()
                    .is_some_and(|previous| *previous == value)
                {
                    return;
                }
                existing.value = Rc::new(value);
                existing.subscribers.clone()
            }
            None => {
                record.provided.insert(
                    type_id,
                    ProvidedContext {
                        value: Rc::new(value),
                        subscribers: IndexSet::new(),
                    },
                );
                return;
            }
        };

        let live: IndexSet<ViewId> = subscribers
            .into_iter()
            .filter(|subscriber| self.records.contains_key(subscriber))
            .collect();
        for subscriber in &live {
            self.mark_dirty(pass, *subscriber);
        }
        if let Some(existing) = self
            .records
            .get_mut(&view)
            .and_then(|record| record.provided.get_mut(&type_id))
        {
            existing.subscribers = live;
        }
    }

    /// Finds the nearest context of type `T` above `consumer`, starting at
    /// `start`, and subscribes `consumer` to it.
    pub(crate) fn consume_context<T: Clone + 'static>(
        &mut self,
        consumer: ViewId,
        start: Option<ViewId>,
    ) -> Option<T> {
        let type_id = TypeId::of::<T>();
        let mut cursor = start;
        while let Some(id) = cursor {
            let record = self.records.get_mut(&id)?;
            if let Some(provided) = record.provided.get_mut(&type_id) {
                provided.subscribers.insert(consumer);
                return provided.value.downcast_ref::<T>().cloned();
            }
            cursor = record.parent;
        }
        None
    }

    /// Destroys `id` and its descendants, children before parents. Returns
    /// how many views were destroyed.
    pub(crate) fn destroy_view(&mut self, id: ViewId) -> usize {
        let Some(mut record) = self.records.remove(&id) else {
            return 0;
        };
        let mut destroyed = 0;
        for child in &record.child_views {
            destroyed += self.destroy_view(*child);
        }
        for node in &record.nodes {
            self.events.unbind_node(*node);
        }
        record.hooks.dispose(id);
        log::trace!("destroyed view {} ({id:#x})", record.view.type_name());
        destroyed + 1
    }

    pub(crate) fn destroy_all(&mut self) -> usize {
        let destroyed = self.root.take().map_or(0, |root| self.destroy_view(root));
        for (id, mut record) in self.records.drain() {
            record.hooks.dispose(id);
        }
        self.events.clear();
        self.committed = None;
        destroyed
    }

    pub(crate) fn hooks_mut(&mut self, view: ViewId) -> Option<&mut HookStore> {
        self.records.get_mut(&view).map(|record| &mut record.hooks)
    }
}

fn memo_matches(previous: Option<&Memo>, next: Option<&Memo>) -> bool {
    match (previous, next) {
        (Some(previous), Some(next)) => previous.matches(next),
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/tree_tests.rs"]
mod tests;
