#![forbid(unsafe_code)]

//! Component model for the demo host.
//!
//! A [`Component`] is mounted once and rendered one or more times. Mounting
//! is where a component grabs long-lived resources (intervals, an
//! [`Invalidator`] for its own local state). Rendering describes the output
//! through a [`RenderCx`]: static text, [`Memo`] bindings, buttons, child
//! components and ambient context for those children.
//!
//! Everything a render produces is owned by the host and torn down on the
//! next render of the same component: memos unsubscribe, children unmount,
//! provided context is withdrawn.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use finegrain_state::{Computed, Context, ContextGuard, Node, StateError, Value};

use crate::memo::Memo;
use crate::scheduler::{IntervalHandle, Scheduler};
use crate::surface::{Line, Slot};

/// Button callback.
pub type Action = Rc<dyn Fn() -> Result<(), StateError>>;

/// Re-pushes one provided context value.
pub(crate) type Provision = Rc<dyn Fn() -> ContextGuard>;

/// Identifier of a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Set of components waiting to be re-rendered.
pub(crate) type DirtySet = Rc<RefCell<BTreeSet<ComponentId>>>;

/// Schedules a re-render of one component.
///
/// This is the component-local-state path: whoever holds it can force the
/// whole component to run again on the next host flush.
#[derive(Clone)]
pub struct Invalidator {
    id: ComponentId,
    dirty: DirtySet,
}

impl Invalidator {
    /// Mark the component for re-render.
    pub fn invalidate(&self) {
        self.dirty.borrow_mut().insert(self.id);
    }
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator").field("id", &self.id).finish()
    }
}

/// A unit of UI that the host mounts and renders.
pub trait Component {
    /// Name used in logs, frame output and lookups.
    fn name(&self) -> &'static str;

    /// Called once, before the first render.
    fn mount(&mut self, _cx: &mut MountCx) {}

    /// Describe the current output.
    ///
    /// # Errors
    ///
    /// Store errors, most notably [`StateError::MissingContext`], abort the
    /// render and are reported by the host.
    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError>;
}

impl<C: Component + ?Sized> Component for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn mount(&mut self, cx: &mut MountCx) {
        (**self).mount(cx);
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        (**self).render(cx)
    }
}

/// Mount-time services.
pub struct MountCx {
    id: ComponentId,
    dirty: DirtySet,
    scheduler: Scheduler,
    pub(crate) intervals: Vec<IntervalHandle>,
}

impl MountCx {
    pub(crate) fn new(id: ComponentId, dirty: DirtySet, scheduler: Scheduler) -> Self {
        Self {
            id,
            dirty,
            scheduler,
            intervals: Vec::new(),
        }
    }

    /// The id assigned to the component being mounted.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Handle that re-renders this component when invalidated.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            id: self.id,
            dirty: Rc::clone(&self.dirty),
        }
    }

    /// The host clock.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run `callback` every `every` ticks while the component is mounted.
    pub fn set_interval(&mut self, every: u64, callback: impl FnMut() + 'static) {
        let handle = self.scheduler.set_interval(every, callback);
        self.intervals.push(handle);
    }
}

/// Output collected from one render.
pub(crate) struct RenderOutput {
    pub lines: Vec<Line>,
    pub memos: Vec<Memo>,
    pub buttons: Vec<(String, Action)>,
    pub children: Vec<Box<dyn Component>>,
    pub provisions: Vec<Provision>,
}

/// Render-time builder.
pub struct RenderCx {
    render_count: u64,
    out: RenderOutput,
}

impl RenderCx {
    pub(crate) fn new(render_count: u64) -> Self {
        Self {
            render_count,
            out: RenderOutput {
                lines: Vec::new(),
                memos: Vec::new(),
                buttons: Vec::new(),
                children: Vec::new(),
                provisions: Vec::new(),
            },
        }
    }

    pub(crate) fn finish(self) -> RenderOutput {
        self.out
    }

    /// How many times this component has rendered, including this render.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn heading(&mut self, level: u8, text: impl Into<String>) {
        self.out.lines.push(Line::Heading {
            level,
            text: text.into(),
        });
    }

    pub fn text(&mut self, text: impl Into<String>) {
        self.out.lines.push(Line::Text(text.into()));
    }

    pub fn rule(&mut self) {
        self.out.lines.push(Line::Rule);
    }

    /// `label: <value>` kept in sync with `node` without re-rendering.
    pub fn memo(&mut self, label: impl Into<String>, node: &Node) {
        let slot = Slot::new();
        self.out.memos.push(Memo::bind(node, slot.clone()));
        self.out.lines.push(Line::Slot {
            label: label.into(),
            slot,
        });
    }

    /// `label: <text>` where `text` is computed from `sources` and kept in
    /// sync without re-rendering.
    pub fn derived(
        &mut self,
        label: impl Into<String>,
        sources: &[Node],
        compute: impl Fn(&[Value]) -> String + 'static,
    ) {
        let slot = Slot::new();
        let computed = Computed::from_nodes(sources, compute);
        self.out
            .memos
            .push(Memo::derived(sources, computed, slot.clone()));
        self.out.lines.push(Line::Slot {
            label: label.into(),
            slot,
        });
    }

    /// A button the host can click by label.
    pub fn button(
        &mut self,
        label: impl Into<String>,
        action: impl Fn() -> Result<(), StateError> + 'static,
    ) {
        let label = label.into();
        let action: Action = Rc::new(action);
        self.out.lines.push(Line::Button(label.clone()));
        self.out.buttons.push((label, action));
    }

    /// Mount `component` as a child at this position.
    pub fn child(&mut self, component: impl Component + 'static) {
        self.out
            .lines
            .push(Line::Outlet(self.out.children.len()));
        self.out.children.push(Box::new(component));
    }

    /// Mount an already boxed child, see [`child`](Self::child).
    pub fn child_boxed(&mut self, component: Box<dyn Component>) {
        self.out
            .lines
            .push(Line::Outlet(self.out.children.len()));
        self.out.children.push(component);
    }

    /// Provide `value` for `context` to every child of this render.
    pub fn provide<T: Clone + 'static>(&mut self, context: &'static Context<T>, value: T) {
        self.out
            .provisions
            .push(Rc::new(move || context.push(value.clone())));
    }
}

impl fmt::Debug for RenderCx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCx")
            .field("render_count", &self.render_count)
            .field("lines", &self.out.lines.len())
            .field("children", &self.out.children.len())
            .finish()
    }
}
