#![forbid(unsafe_code)]

//! The demo host: owns the mounted component tree and drives it.
//!
//! # Update paths
//!
//! - **Coarse**: a component calls [`Invalidator::invalidate`]; the next
//!   [`Host::flush`] re-runs that component's `render`, tears down its old
//!   output and remounts its children.
//! - **Fine-grained**: a store write patches [`Memo`] slots directly from
//!   the store's notification pass. No component runs.
//!
//! Provided context is re-established along the ancestor chain whenever a
//! nested component re-renders on its own, so descendants always read the
//! provider's value.
//!
//! [`Invalidator::invalidate`]: crate::component::Invalidator::invalidate

use std::collections::BTreeSet;

use finegrain_state::ContextGuard;
use tracing::{debug, info, warn};

use crate::component::{
    Action, Component, ComponentId, DirtySet, MountCx, Provision, RenderCx, RenderOutput,
};
use crate::error::{DemoError, Result};
use crate::memo::Memo;
use crate::scheduler::{IntervalHandle, Scheduler};
use crate::surface::Line;

/// Upper bound on re-render passes per flush.
const MAX_FLUSH_PASSES: usize = 8;

struct Mounted {
    id: ComponentId,
    name: &'static str,
    component: Box<dyn Component>,
    renders: u64,
    lines: Vec<Line>,
    memos: Vec<Memo>,
    buttons: Vec<(String, Action)>,
    provisions: Vec<Provision>,
    children: Vec<Mounted>,
    _intervals: Vec<IntervalHandle>,
}

impl Mounted {
    fn find(&self, name: &str) -> Option<&Mounted> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn find_button(&self, label: &str) -> Option<Action> {
        self.buttons
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, action)| action.clone())
            .or_else(|| self.children.iter().find_map(|c| c.find_button(label)))
    }

    fn collect_ids(&self, out: &mut BTreeSet<ComponentId>) {
        out.insert(self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }

    fn collect_buttons(&self, out: &mut Vec<String>) {
        for line in &self.lines {
            match line {
                Line::Button(label) => out.push(label.clone()),
                Line::Outlet(i) => {
                    if let Some(child) = self.children.get(*i) {
                        child.collect_buttons(out);
                    }
                }
                _ => {}
            }
        }
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        for line in &self.lines {
            match line {
                Line::Outlet(i) => {
                    if let Some(child) = self.children.get(*i) {
                        child.write_to(out, depth + 1);
                    }
                }
                other => other.write_to(out, depth),
            }
        }
    }

    fn push_provisions(&self) -> Vec<ContextGuard> {
        self.provisions.iter().map(|provide| provide()).collect()
    }
}

/// Services shared by every mounted component.
struct Env {
    scheduler: Scheduler,
    dirty: DirtySet,
    next_id: u64,
}

impl Env {
    fn mount(&mut self, mut component: Box<dyn Component>) -> Result<Mounted> {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        let mut cx = MountCx::new(id, DirtySet::clone(&self.dirty), self.scheduler.clone());
        component.mount(&mut cx);
        let name = component.name();
        debug!(component = name, id = %id, "mount");
        let mut node = Mounted {
            id,
            name,
            component,
            renders: 0,
            lines: Vec::new(),
            memos: Vec::new(),
            buttons: Vec::new(),
            provisions: Vec::new(),
            children: Vec::new(),
            _intervals: cx.intervals,
        };
        self.render(&mut node)?;
        Ok(node)
    }

    fn render(&mut self, node: &mut Mounted) -> Result<()> {
        // Old output goes first so its bindings stop listening.
        node.memos.clear();
        node.children.clear();
        node.buttons.clear();
        node.lines.clear();
        node.provisions.clear();
        self.dirty.borrow_mut().remove(&node.id);

        node.renders += 1;
        info!(component = node.name, renders = node.renders, "render");
        let mut cx = RenderCx::new(node.renders);
        node.component
            .render(&mut cx)
            .map_err(|source| DemoError::Render {
                component: node.name,
                source,
            })?;
        let RenderOutput {
            lines,
            memos,
            buttons,
            children,
            provisions,
        } = cx.finish();
        node.lines = lines;
        node.memos = memos;
        node.buttons = buttons;
        node.provisions = provisions;

        let _guards = node.push_provisions();
        for child in children {
            let mounted = self.mount(child)?;
            node.children.push(mounted);
        }
        Ok(())
    }

    fn refresh(&mut self, node: &mut Mounted) -> Result<usize> {
        if self.dirty.borrow().contains(&node.id) {
            self.render(node)?;
            return Ok(1);
        }
        let _guards = node.push_provisions();
        let mut rendered = 0;
        for child in &mut node.children {
            rendered += self.refresh(child)?;
        }
        Ok(rendered)
    }
}

/// Owns the component tree, the clock and the re-render queue.
pub struct Host {
    env: Env,
    roots: Vec<Mounted>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("roots", &self.roots.iter().map(|r| r.name).collect::<Vec<_>>())
            .field("now", &self.env.scheduler.now())
            .finish()
    }
}

impl Host {
    /// Create a host driven by `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            env: Env {
                scheduler,
                dirty: DirtySet::default(),
                next_id: 0,
            },
            roots: Vec::new(),
        }
    }

    /// The host clock.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.env.scheduler
    }

    /// Mount a top-level component and render it.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Render`] if the component (or a descendant)
    /// fails to render; nothing is mounted in that case.
    pub fn mount(&mut self, component: impl Component + 'static) -> Result<ComponentId> {
        let node = self.env.mount(Box::new(component))?;
        let id = node.id;
        self.roots.push(node);
        Ok(id)
    }

    /// Re-render every invalidated component.
    ///
    /// Returns how many components rendered.
    ///
    /// # Errors
    ///
    /// Returns the first render failure.
    pub fn flush(&mut self) -> Result<usize> {
        let mut rendered = 0;
        for _ in 0..MAX_FLUSH_PASSES {
            if self.env.dirty.borrow().is_empty() {
                return Ok(rendered);
            }
            for root in &mut self.roots {
                rendered += self.env.refresh(root)?;
            }
            // Ids of components that were unmounted meanwhile never render.
            let mut live = BTreeSet::new();
            for root in &self.roots {
                root.collect_ids(&mut live);
            }
            self.env.dirty.borrow_mut().retain(|id| live.contains(id));
        }
        if !self.env.dirty.borrow().is_empty() {
            warn!(
                pending = self.env.dirty.borrow().len(),
                "re-render did not settle"
            );
        }
        Ok(rendered)
    }

    /// Advance the clock one tick, then flush.
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush).
    pub fn tick(&mut self) -> Result<usize> {
        self.env.scheduler.tick();
        self.flush()
    }

    /// Press the first button labelled `label`, then flush.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::UnknownButton`] if no such button is on screen,
    /// [`DemoError::State`] if the action fails.
    pub fn click(&mut self, label: &str) -> Result<usize> {
        let action = self
            .roots
            .iter()
            .find_map(|r| r.find_button(label))
            .ok_or_else(|| DemoError::UnknownButton(label.to_string()))?;
        debug!(button = label, "click");
        action()?;
        self.flush()
    }

    /// Labels of every button, in screen order.
    #[must_use]
    pub fn buttons(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.collect_buttons(&mut out);
        }
        out
    }

    /// How many times the first component called `name` has rendered.
    #[must_use]
    pub fn render_count(&self, name: &str) -> Option<u64> {
        self.find(name).map(|m| m.renders)
    }

    /// `(component, renders)` for every mounted component, in tree order.
    #[must_use]
    pub fn render_counts(&self) -> Vec<(&'static str, u64)> {
        fn walk(node: &Mounted, out: &mut Vec<(&'static str, u64)>) {
            out.push((node.name, node.renders));
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }

    /// Text of the slot labelled `label` inside component `name`.
    #[must_use]
    pub fn slot_text(&self, name: &str, label: &str) -> Option<String> {
        self.find_slot(name, label).map(|slot| slot.text())
    }

    /// Patch count of the slot labelled `label` inside component `name`.
    #[must_use]
    pub fn slot_patches(&self, name: &str, label: &str) -> Option<u64> {
        self.find_slot(name, label).map(|slot| slot.patches())
    }

    /// Plain text rendering of the whole tree.
    #[must_use]
    pub fn frame(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            root.write_to(&mut out, 0);
        }
        out
    }

    fn find(&self, name: &str) -> Option<&Mounted> {
        self.roots.iter().find_map(|r| r.find(name))
    }

    fn find_slot(&self, name: &str, label: &str) -> Option<&crate::surface::Slot> {
        self.find(name)?.lines.iter().find_map(|line| match line {
            Line::Slot { label: l, slot } if l == label => Some(slot),
            _ => None,
        })
    }
}
