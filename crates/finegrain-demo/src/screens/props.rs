#![forbid(unsafe_code)]

//! Second example: store nodes passed down as props.
//!
//! `Parent` owns two stores and hands nodes of them to its children. Each
//! child binds its own memo, so clicking either button patches the slots
//! that read the changed path and nothing renders again. The parent's
//! summary line is derived from both stores.

use finegrain_state::{Node, Observable, StateError, Value};

use super::compare::increment;
use super::{Section, Stores};
use crate::component::{Component, MountCx, RenderCx};
use crate::scheduler::Scheduler;

pub const TITLE: &str = "Second Example: Props Drilling";

pub const INCREMENT: &str = "Increment Count 1";
pub const CHANGE_NAME: &str = "Change Name to Jane";

/// Owns `count` and `state`, renders both children.
#[derive(Debug)]
pub struct Parent {
    count: Observable,
    state: Observable,
    clock: Option<Scheduler>,
}

impl Parent {
    #[must_use]
    pub fn new(count: Observable, state: Observable) -> Self {
        Self {
            count,
            state,
            clock: None,
        }
    }
}

impl Component for Parent {
    fn name(&self) -> &'static str {
        "Parent"
    }

    fn mount(&mut self, cx: &mut MountCx) {
        self.clock = Some(cx.scheduler().clone());
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(5, "Parent");
        cx.memo("Count", &self.count.root());
        let sources = [self.state.at("name")?, self.count.root()];
        cx.derived("Summary", &sources, summary);
        cx.child(CountChild::new(self.count.root()));

        let count = self.count.clone();
        cx.button(INCREMENT, move || count.set_with("", increment).map(drop));

        cx.child(NameChild::new(self.state.root()));

        let state = self.state.clone();
        let clock = self.clock.clone();
        cx.button(CHANGE_NAME, move || {
            let now = clock.as_ref().map_or(0, Scheduler::now);
            state
                .set("", Value::map([("name", format!("Updated at tick {now}"))]))
                .map(drop)
        });
        Ok(())
    }
}

fn summary(values: &[Value]) -> String {
    match values {
        [name, count] => format!("{name} at count {count}"),
        _ => String::new(),
    }
}

/// Shows a count node it was handed.
#[derive(Debug)]
pub struct CountChild {
    count: Node,
}

impl CountChild {
    #[must_use]
    pub fn new(count: Node) -> Self {
        Self { count }
    }
}

impl Component for CountChild {
    fn name(&self) -> &'static str {
        "CountChild"
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(5, "Child");
        cx.memo("Count", &self.count);
        Ok(())
    }
}

/// Shows `name` under the state node it was handed.
#[derive(Debug)]
pub struct NameChild {
    state: Node,
}

impl NameChild {
    #[must_use]
    pub fn new(state: Node) -> Self {
        Self { state }
    }
}

impl Component for NameChild {
    fn name(&self) -> &'static str {
        "NameChild"
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(5, "Child2");
        cx.memo("Name", &self.state.child("name")?);
        Ok(())
    }
}

pub(crate) fn section(stores: &mut Stores) -> Section {
    let count = stores.create("parent.count", 1);
    let state = stores.create("parent.state", Value::map([("name", "John")]));
    Section::new(TITLE).with(move || Parent::new(count.clone(), state.clone()))
}
