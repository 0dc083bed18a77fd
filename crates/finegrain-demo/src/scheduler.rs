#![forbid(unsafe_code)]

//! Tick-driven interval scheduler.
//!
//! The demo counters mutate state on a fixed cadence. [`Scheduler`] models
//! that with a logical clock: [`tick`](Scheduler::tick) advances the clock
//! by one and fires every interval that is due. The binary drives ticks with
//! a wall-clock sleep; tests drive them directly, so runs are deterministic.
//!
//! # Invariants
//!
//! 1. An interval registered with period `n` fires on ticks `n, 2n, ...`
//!    counted from its registration.
//! 2. Intervals fire in registration order within one tick.
//! 3. A cancelled interval never fires again, even later in the same tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;
use web_time::{Duration, Instant};

type Callback = Rc<RefCell<dyn FnMut()>>;

struct Interval {
    id: u64,
    every: u64,
    next_due: u64,
    cancelled: Rc<Cell<bool>>,
    callback: Callback,
}

#[derive(Default)]
struct SchedulerInner {
    now: u64,
    next_id: u64,
    intervals: Vec<Interval>,
}

/// Shared logical clock with periodic callbacks.
///
/// Cloning produces another handle to the same clock.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("intervals", &inner.intervals.len())
            .finish()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks elapsed so far.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Run `callback` every `every` ticks (a period of 0 is treated as 1).
    ///
    /// The interval stays registered until the returned handle is dropped
    /// or cancelled.
    pub fn set_interval(&self, every: u64, callback: impl FnMut() + 'static) -> IntervalHandle {
        let every = every.max(1);
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let cancelled = Rc::new(Cell::new(false));
        let next_due = inner.now + every;
        inner.intervals.push(Interval {
            id,
            every,
            next_due,
            cancelled: Rc::clone(&cancelled),
            callback: Rc::new(RefCell::new(callback)),
        });
        trace!(interval = id, every, "interval registered");
        IntervalHandle { id, cancelled }
    }

    /// Number of live intervals.
    #[must_use]
    pub fn active_intervals(&self) -> usize {
        self.inner
            .borrow()
            .intervals
            .iter()
            .filter(|i| !i.cancelled.get())
            .count()
    }

    /// Advance the clock by one tick and fire due intervals.
    ///
    /// Returns the number of callbacks fired.
    pub fn tick(&self) -> usize {
        let due: Vec<(Rc<Cell<bool>>, Callback)> = {
            let mut inner = self.inner.borrow_mut();
            inner.now += 1;
            let now = inner.now;
            inner.intervals.retain(|i| !i.cancelled.get());
            inner
                .intervals
                .iter_mut()
                .filter(|i| i.next_due <= now)
                .map(|i| {
                    i.next_due += i.every;
                    (Rc::clone(&i.cancelled), Rc::clone(&i.callback))
                })
                .collect()
        };
        let mut fired = 0;
        for (cancelled, callback) in due {
            if cancelled.get() {
                continue;
            }
            (&mut *callback.borrow_mut())();
            fired += 1;
        }
        fired
    }

    /// Drive `ticks` ticks, sleeping `period` between them.
    ///
    /// `on_tick` runs after each tick with the tick number; returning
    /// `false` stops early. Returns the number of ticks driven.
    pub fn run_for(
        &self,
        ticks: u64,
        period: Duration,
        mut on_tick: impl FnMut(u64) -> bool,
    ) -> u64 {
        let start = Instant::now();
        for n in 1..=ticks {
            if !period.is_zero() {
                // Sleep until the scheduled instant so drift does not accumulate.
                let target = start + period * u32::try_from(n).unwrap_or(u32::MAX);
                let now = Instant::now();
                if target > now {
                    std::thread::sleep(target - now);
                }
            }
            self.tick();
            if !on_tick(n) {
                return n;
            }
        }
        ticks
    }
}

/// Handle to a registered interval. Dropping it cancels the interval.
#[must_use = "dropping an IntervalHandle cancels the interval"]
#[derive(Debug)]
pub struct IntervalHandle {
    id: u64,
    cancelled: Rc<Cell<bool>>,
}

impl IntervalHandle {
    /// Identifier of the interval.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the interval.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.cancelled.set(true);
    }
}
