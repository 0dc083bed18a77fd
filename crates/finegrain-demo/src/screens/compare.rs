#![forbid(unsafe_code)]

//! First example: a counter that re-renders vs. one that patches a slot.
//!
//! Both counters advance once per tick. `NormalCounter` keeps its count in
//! component-local state and re-runs on every change, so its render count
//! climbs with the count. `FineGrainedCounter` keeps its count in a store and
//! binds it through a memo; it renders once and only the slot is patched.

use std::cell::Cell;
use std::rc::Rc;

use finegrain_state::{Observable, StateError, Value};
use tracing::warn;

use super::{Section, Stores};
use crate::component::{Component, MountCx, RenderCx};

pub const TITLE: &str = "First Example: Compare vs useState";

/// Ticks between counter increments.
const PERIOD: u64 = 1;

/// Counter held in component-local state.
#[derive(Debug)]
pub struct NormalCounter {
    count: Rc<Cell<i64>>,
}

impl NormalCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: Rc::new(Cell::new(1)),
        }
    }
}

impl Default for NormalCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for NormalCounter {
    fn name(&self) -> &'static str {
        "NormalCounter"
    }

    fn mount(&mut self, cx: &mut MountCx) {
        let count = Rc::clone(&self.count);
        let invalidator = cx.invalidator();
        cx.set_interval(PERIOD, move || {
            count.set(count.get() + 1);
            invalidator.invalidate();
        });
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(5, "Normal");
        cx.text(format!("Renders: {}", cx.render_count()));
        cx.text(format!("Count: {}", self.count.get()));
        Ok(())
    }
}

/// Counter held in a store and shown through a memo.
#[derive(Debug)]
pub struct FineGrainedCounter {
    count: Observable,
}

impl FineGrainedCounter {
    #[must_use]
    pub fn new(count: Observable) -> Self {
        Self { count }
    }
}

impl Component for FineGrainedCounter {
    fn name(&self) -> &'static str {
        "FineGrainedCounter"
    }

    fn mount(&mut self, cx: &mut MountCx) {
        let count = self.count.clone();
        cx.set_interval(PERIOD, move || {
            if let Err(err) = count.set_with("", increment) {
                warn!(error = %err, "counter update failed");
            }
        });
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(5, "Fine-grained");
        cx.text(format!("Renders: {}", cx.render_count()));
        cx.memo("Count", &self.count.root());
        Ok(())
    }
}

/// `n -> n + 1`; anything that is not a number restarts at 1.
pub(crate) fn increment(value: &Value) -> Value {
    Value::Int(value.as_i64().unwrap_or(0) + 1)
}

pub(crate) fn section(stores: &mut Stores) -> Section {
    let count = stores.create("fine_grained.count", 1);
    Section::new(TITLE)
        .with(NormalCounter::new)
        .rule()
        .with(move || FineGrainedCounter::new(count.clone()))
        .ruled()
}
