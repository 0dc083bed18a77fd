#![forbid(unsafe_code)]

//! Lazy derived values that track one or more store paths.
//!
//! # Design
//!
//! [`Computed<T>`] holds a compute function and its cached result. It keeps
//! a [`Subscription`] on every dependency node; any related write marks the
//! cache dirty. The next [`get()`](Computed::get) recomputes.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value older than the last committed write to
//!    a dependency.
//! 2. The compute function runs at most once per dirty cycle.
//! 3. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the previous cached value stays and the
//!   dirty flag stays set, so the next `get()` retries.
//! - **Store dropped**: nodes keep their store alive, so dependencies never
//!   dangle; dropping the `Computed` releases its subscriptions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::node::Node;
use crate::store::Subscription;
use crate::value::Value;

struct ComputedInner<T> {
    cached: Option<T>,
    version: u64,
}

/// A memoized value derived from store nodes.
///
/// Cloning a `Computed` creates a new handle to the same cache.
pub struct Computed<T> {
    compute: Rc<dyn Fn() -> T>,
    inner: Rc<RefCell<ComputedInner<T>>>,
    dirty: Rc<Cell<bool>>,
    _subscriptions: Rc<Vec<Subscription>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            compute: Rc::clone(&self.compute),
            inner: Rc::clone(&self.inner),
            dirty: Rc::clone(&self.dirty),
            _subscriptions: Rc::clone(&self._subscriptions),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &self.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Derive a value from a single node.
    pub fn from_node(source: &Node, map: impl Fn(&Value) -> T + 'static) -> Self {
        let node = source.clone();
        Self::build(std::slice::from_ref(source), move || map(&node.get()))
    }

    /// Derive a value from several nodes, possibly in different stores.
    ///
    /// `compute` receives the current values in the order of `sources`.
    pub fn from_nodes(sources: &[Node], compute: impl Fn(&[Value]) -> T + 'static) -> Self {
        let nodes = sources.to_vec();
        Self::build(sources, move || {
            let values: Vec<Value> = nodes.iter().map(Node::get).collect();
            compute(&values)
        })
    }

    fn build(sources: &[Node], compute: impl Fn() -> T + 'static) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let subscriptions = sources
            .iter()
            .map(|node| {
                let dirty = Rc::clone(&dirty);
                node.subscribe(move |_| dirty.set(true))
            })
            .collect();
        Self {
            compute: Rc::new(compute),
            inner: Rc::new(RefCell::new(ComputedInner {
                cached: None,
                version: 0,
            })),
            dirty,
            _subscriptions: Rc::new(subscriptions),
        }
    }

    /// Current derived value, recomputing if a dependency changed.
    #[must_use]
    pub fn get(&self) -> T {
        if self.dirty.get() {
            let value = (self.compute)();
            let mut inner = self.inner.borrow_mut();
            inner.cached = Some(value);
            inner.version += 1;
            self.dirty.set(false);
        }
        self.inner
            .borrow()
            .cached
            .clone()
            .unwrap_or_else(|| (self.compute)())
    }

    /// Whether the next `get()` will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Force recomputation on the next `get()`.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Observable;

    #[test]
    fn lazy_until_first_get() {
        let store = Observable::new(Value::map([("count", 2)]));
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let doubled = Computed::from_node(&store.at("count").unwrap(), move |v| {
            calls_clone.set(calls_clone.get() + 1);
            v.as_i64().unwrap_or(0) * 2
        });
        assert_eq!(calls.get(), 0);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(calls.get(), 1);
        assert_eq!(doubled.version(), 1);
    }

    #[test]
    fn recomputes_after_related_write() {
        let store = Observable::new(Value::map([("profile", Value::map([("name", "ann")]))]));
        let upper = Computed::from_node(&store.at("profile.name").unwrap(), |v| {
            v.as_str().unwrap_or_default().to_uppercase()
        });
        assert_eq!(upper.get(), "ANN");

        store.set("profile", Value::map([("name", "bob")])).unwrap();
        assert!(upper.is_dirty());
        assert_eq!(upper.get(), "BOB");
        assert_eq!(upper.version(), 2);
    }

    #[test]
    fn unrelated_write_keeps_cache() {
        let store = Observable::new(Value::map([("a", 1), ("b", 1)]));
        let a = Computed::from_node(&store.at("a").unwrap(), |v| v.as_i64());
        assert_eq!(a.get(), Some(1));
        store.set("b", 2).unwrap();
        assert!(!a.is_dirty());
    }

    #[test]
    fn from_nodes_across_stores() {
        let first = Observable::new(1);
        let second = Observable::new(Value::map([("n", 10)]));
        let sum = Computed::from_nodes(
            &[first.root(), second.at("n").unwrap()],
            |values| values.iter().filter_map(Value::as_i64).sum::<i64>(),
        );
        assert_eq!(sum.get(), 11);
        second.set("n", 20).unwrap();
        assert_eq!(sum.get(), 21);
        first.set("", 5).unwrap();
        assert_eq!(sum.get(), 25);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let store = Observable::new(3);
        let c = Computed::from_node(&store.root(), |v| v.as_i64());
        let _ = c.get();
        c.invalidate();
        let _ = c.get();
        assert_eq!(c.version(), 2);
    }

    #[test]
    fn dropping_computed_releases_subscriptions() {
        let store = Observable::new(0);
        let c = Computed::from_node(&store.root(), |v| v.clone());
        let c2 = c.clone();
        assert_eq!(store.subscriber_count(), 1);
        drop(c);
        assert_eq!(store.subscriber_count(), 1);
        drop(c2);
        assert_eq!(store.subscriber_count(), 0);
    }
}
