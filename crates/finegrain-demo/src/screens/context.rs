#![forbid(unsafe_code)]

//! Third example: a store shared through ambient context.
//!
//! `Provider` owns `{profile: {name}}` and provides it under
//! [`STATE_CONTEXT`]. `ContextChild` binds `profile.name` and
//! `ContextTrigger` rewrites `profile`. Neither receives the store as a prop.
//! Reading the context outside a provider fails with
//! [`StateError::MissingContext`].

use finegrain_state::{Context, Observable, StateError, Value, ValueMap};

use super::compare::increment;
use super::{Section, Stores};
use crate::component::{Component, MountCx, RenderCx};
use crate::scheduler::Scheduler;

pub const TITLE: &str = "Third Example: with context";

pub const INCREMENT: &str = "Increment Count";
pub const CHANGE_NAME: &str = "Change Name";

/// Ambient shared state for this example.
pub static STATE_CONTEXT: Context<Observable> = Context::new("StateContext");

/// Seed value of the shared store.
#[must_use]
pub fn initial_state() -> Value {
    Value::map([("profile", Value::map([("name", "")]))])
}

type ChildFactory = Box<dyn Fn() -> Box<dyn Component>>;

/// Provides `state` to the children it wraps.
pub struct Provider {
    state: Observable,
    children: Vec<ChildFactory>,
}

impl Provider {
    #[must_use]
    pub fn new(state: Observable) -> Self {
        Self {
            state,
            children: Vec::new(),
        }
    }

    /// Wrap a child built by `factory`.
    #[must_use]
    pub fn with<C: Component + 'static>(mut self, factory: impl Fn() -> C + 'static) -> Self {
        self.children.push(Box::new(move || Box::new(factory())));
        self
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("state", &self.state)
            .field("children", &self.children.len())
            .finish()
    }
}

impl Component for Provider {
    fn name(&self) -> &'static str {
        "Provider"
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.provide(&STATE_CONTEXT, self.state.clone());
        for child in &self.children {
            cx.child_boxed(child());
        }
        Ok(())
    }
}

/// Shows the shared profile name next to a count of its own.
#[derive(Debug)]
pub struct ContextChild {
    count: Observable,
}

impl ContextChild {
    #[must_use]
    pub fn new(count: Observable) -> Self {
        Self { count }
    }
}

impl Component for ContextChild {
    fn name(&self) -> &'static str {
        "ContextChild"
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        let state = STATE_CONTEXT.get()?;
        cx.heading(5, "ContextChild");
        cx.text(format!("Renders: {}", cx.render_count()));
        cx.memo("Name", &state.at("profile.name")?);
        cx.memo("Count", &self.count.root());
        let count = self.count.clone();
        cx.button(INCREMENT, move || count.set_with("", increment).map(drop));
        Ok(())
    }
}

/// Rewrites the shared profile name.
#[derive(Debug, Default)]
pub struct ContextTrigger {
    clock: Option<Scheduler>,
}

impl ContextTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for ContextTrigger {
    fn name(&self) -> &'static str {
        "ContextTrigger"
    }

    fn mount(&mut self, cx: &mut MountCx) {
        self.clock = Some(cx.scheduler().clone());
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        let profile = STATE_CONTEXT.get()?.at("profile")?;
        let clock = self.clock.clone();
        cx.button(CHANGE_NAME, move || {
            let name = format!("Updated at tick {}", clock.as_ref().map_or(0, Scheduler::now));
            profile
                .set_with(move |current| {
                    // Keep sibling fields, replace the name.
                    let mut fields: ValueMap = current.as_map().cloned().unwrap_or_default();
                    fields.insert("name".into(), Value::from(name));
                    Value::from(fields)
                })
                .map(drop)
        });
        Ok(())
    }
}

pub(crate) fn section(stores: &mut Stores) -> Section {
    let state = stores.create("context.state", initial_state());
    let count = stores.create("context_child.count", 0);
    Section::new(TITLE).with(move || {
        let count = count.clone();
        Provider::new(state.clone())
            .with(move || ContextChild::new(count.clone()))
            .with(ContextTrigger::new)
    })
}
