#![forbid(unsafe_code)]

//! Path-scoped observable store with fine-grained change notification.
//!
//! # Design
//!
//! [`Observable`] wraps a [`Value`] tree in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Readers subscribe to a [`Path`] inside the tree. A
//! write at path `w` reaches every subscription registered on `w`, on an
//! ancestor of `w`, or on a descendant of `w`; subscriptions on unrelated
//! sibling paths are never called.
//!
//! Subscribers are stored as `Weak` references. The strong `Rc` lives in the
//! [`Subscription`] handle owned by the reader, so the registry never keeps
//! a reader alive. Dead entries are pruned on the next committed write.
//!
//! # Notification pass
//!
//! 1. The updater runs against the current value at the path.
//! 2. A result equal to the current value (or the same allocation) ends the
//!    write with [`WriteOutcome::Unchanged`].
//! 3. Otherwise the subtree is replaced, the version bumps, and the related
//!    subscriptions are collected in registration order.
//! 4. Each collected subscription still alive is called once with the value
//!    at its own path.
//!
//! Writes issued while a pass (or an updater) is running are queued and
//! applied FIFO once the outermost pass is over, so every callback in a pass
//! sees the same snapshot.
//!
//! # Performance
//!
//! | Operation     | Complexity                              |
//! |---------------|-----------------------------------------|
//! | `get()`       | O(depth)                                |
//! | `set()`       | O(depth · fanout + S) where S = subscribers |
//! | `subscribe()` | O(depth) amortized                      |
//!
//! # Failure Modes
//!
//! - **Listener error**: a fallible listener returning `Err` is logged and
//!   recorded as a [`NotifyFailure`]; the rest of the pass still runs.
//! - **Listener panic**: the pass unwinds; the store resets its busy flag so
//!   later writes are not stuck in the queue.
//! - **Borrow inside `with`**: the closure given to
//!   [`Observable::with`] must not write to the same store.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::error::{ListenerError, NotifyFailure, Result, StateError};
use crate::node::Node;
use crate::path::{IntoPath, Path};
use crate::value::Value;

type ListenerFn = dyn Fn(&Value) -> std::result::Result<(), ListenerError>;
type Updater = Box<dyn FnOnce(&Value) -> Value>;

/// Identifier of one subscription, unique within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Listener {
    id: SubscriptionId,
    path: Path,
    callback: Box<ListenerFn>,
    active: Cell<bool>,
}

impl Listener {
    fn is_live(weak: &Weak<Listener>) -> bool {
        weak.upgrade().is_some_and(|l| l.active.get())
    }
}

enum Update {
    Replace(Value),
    Apply(Updater),
}

impl Update {
    fn resolve(self, previous: &Value) -> Value {
        match self {
            Self::Replace(value) => value,
            Self::Apply(f) => f(previous),
        }
    }
}

struct PendingWrite {
    path: Path,
    update: Update,
}

struct StoreInner {
    value: Value,
    version: u64,
    next_id: u64,
    listeners: Vec<Weak<Listener>>,
    /// Registry length after the last prune.
    pruned_len: usize,
    /// True while an updater or a notification pass is running.
    busy: bool,
    pending: VecDeque<PendingWrite>,
    failures: Vec<NotifyFailure>,
}

/// Ephemeral description of one committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Where the write happened.
    pub path: Path,
    /// Value at `path` before the write.
    pub previous: Value,
    /// Value at `path` after the write.
    pub current: Value,
}

/// What a write did.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The value changed and `notified` listeners were called.
    Committed {
        change: Change,
        version: u64,
        notified: usize,
    },
    /// The new value equals the current one; nothing was notified.
    Unchanged,
    /// Issued during a notification pass; applied after the pass ends.
    Deferred,
}

impl WriteOutcome {
    /// Whether the write changed the stored value.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Number of listeners called by this write (0 unless committed).
    #[must_use]
    pub fn notified(&self) -> usize {
        match self {
            Self::Committed { notified, .. } => *notified,
            _ => 0,
        }
    }
}

/// A shared value tree with path-scoped change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** store; both
/// handles see the same value and share subscribers.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 per committed write.
/// 2. A write equal to the current value is a no-op.
/// 3. Each related subscription is called at most once per write, in
///    registration order.
/// 4. After [`Subscription::unsubscribe`] (or drop) the callback is never
///    called again, even by a pass already in progress.
pub struct Observable {
    inner: Rc<RefCell<StoreInner>>,
}

impl Clone for Observable {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Registry length below which `register` never sweeps.
const MIN_PRUNE_LEN: usize = 16;

impl StoreInner {
    fn prune(&mut self) {
        self.listeners.retain(Listener::is_live);
        self.pruned_len = self.listeners.len();
    }

    fn live_count(&self) -> usize {
        self.listeners.iter().filter(|w| Listener::is_live(w)).count()
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.live_count())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Resets the busy flag when a pass ends, including by unwinding.
struct PassGuard<'a> {
    inner: &'a RefCell<StoreInner>,
}

impl<'a> PassGuard<'a> {
    fn enter(inner: &'a RefCell<StoreInner>) -> Self {
        inner.borrow_mut().busy = true;
        Self { inner }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.busy = false;
        }
    }
}

impl Observable {
    /// Create a store holding `value`. Version starts at 0.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                value: value.into(),
                version: 0,
                next_id: 0,
                listeners: Vec::new(),
                pruned_len: 0,
                busy: false,
                pending: VecDeque::new(),
                failures: Vec::new(),
            })),
        }
    }

    /// Whether two handles point at the same store.
    #[must_use]
    pub fn same_store(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Handle bound to `path` inside this store.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths.
    pub fn at(&self, path: impl IntoPath) -> Result<Node> {
        Ok(Node::new(self.clone(), path.into_path()?))
    }

    /// Handle bound to the root of this store.
    #[must_use]
    pub fn root(&self) -> Node {
        Node::new(self.clone(), Path::root())
    }

    /// Current value at `path`; `Value::Undefined` when nothing lives there.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths.
    pub fn get(&self, path: impl IntoPath) -> Result<Value> {
        let path = path.into_path()?;
        Ok(self.get_at(&path))
    }

    pub(crate) fn get_at(&self, path: &Path) -> Value {
        self.inner
            .borrow()
            .value
            .lookup(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Borrow the value at `path` without cloning it.
    ///
    /// `f` must not write to this store.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths.
    pub fn with<R>(&self, path: impl IntoPath, f: impl FnOnce(&Value) -> R) -> Result<R> {
        let path = path.into_path()?;
        let inner = self.inner.borrow();
        Ok(match inner.value.lookup(&path) {
            Some(value) => f(value),
            None => f(&Value::Undefined),
        })
    }

    /// Replace the subtree at `path` with `value`.
    ///
    /// Missing locations along `path` are created.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths or a key used
    /// to index into a list.
    pub fn set(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<WriteOutcome> {
        let path = path.into_path()?;
        self.write(path, Update::Replace(value.into()))
    }

    /// Replace the subtree at `path` with `f(current)`.
    ///
    /// `f` receives `Value::Undefined` when nothing lives at `path`. When the
    /// write is deferred, `f` runs later against the value current at that
    /// time.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn set_with(
        &self,
        path: impl IntoPath,
        f: impl FnOnce(&Value) -> Value + 'static,
    ) -> Result<WriteOutcome> {
        let path = path.into_path()?;
        self.write(path, Update::Apply(Box::new(f)))
    }

    /// Delete whatever lives at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn remove(&self, path: impl IntoPath) -> Result<WriteOutcome> {
        let path = path.into_path()?;
        self.write(path, Update::Replace(Value::Undefined))
    }

    /// Register `callback` for changes affecting `path`.
    ///
    /// The callback is not called with the current value. It receives the
    /// value at `path` after each related write. Dropping the returned
    /// [`Subscription`] unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths.
    pub fn subscribe(
        &self,
        path: impl IntoPath,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<Subscription> {
        let path = path.into_path()?;
        Ok(self.register(
            path,
            Box::new(move |value| {
                callback(value);
                Ok(())
            }),
        ))
    }

    /// Register a fallible callback for changes affecting `path`.
    ///
    /// An `Err` from the callback does not stop the pass; it is logged and
    /// recorded for [`take_failures`](Self::take_failures).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed paths.
    pub fn try_subscribe(
        &self,
        path: impl IntoPath,
        callback: impl Fn(&Value) -> std::result::Result<(), ListenerError> + 'static,
    ) -> Result<Subscription> {
        let path = path.into_path()?;
        Ok(self.register(path, Box::new(callback)))
    }

    pub(crate) fn register(&self, path: Path, callback: Box<ListenerFn>) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        trace!(subscription = %id, path = %path, "subscribe");
        // Drops happen without a write, so the registry is also swept here
        // once it has doubled since the last sweep.
        if inner.listeners.len() >= (inner.pruned_len * 2).max(MIN_PRUNE_LEN) {
            inner.prune();
        }
        let listener = Rc::new(Listener {
            id,
            path,
            callback,
            active: Cell::new(true),
        });
        inner.listeners.push(Rc::downgrade(&listener));
        Subscription { listener }
    }

    /// Current version. Increments by 1 on each committed write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().live_count()
    }

    /// Drain failures recorded by past notification passes.
    pub fn take_failures(&self) -> Vec<NotifyFailure> {
        std::mem::take(&mut self.inner.borrow_mut().failures)
    }

    fn write(&self, path: Path, update: Update) -> Result<WriteOutcome> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.busy {
                debug!(path = %path, queued = inner.pending.len() + 1, "write deferred");
                inner.pending.push_back(PendingWrite { path, update });
                return Ok(WriteOutcome::Deferred);
            }
        }
        let outcome = self.commit(path, update);
        self.drain_pending();
        outcome
    }

    fn drain_pending(&self) {
        loop {
            let next = self.inner.borrow_mut().pending.pop_front();
            let Some(PendingWrite { path, update }) = next else {
                break;
            };
            if let Err(error) = self.commit(path.clone(), update) {
                warn!(path = %path, %error, "deferred write rejected");
                self.inner
                    .borrow_mut()
                    .failures
                    .push(NotifyFailure::DeferredWrite { path, error });
            }
        }
    }

    fn commit(&self, path: Path, update: Update) -> Result<WriteOutcome> {
        let guard = PassGuard::enter(&self.inner);
        let previous = self.get_at(&path);
        let current = update.resolve(&previous);

        let (selected, version) = {
            let mut inner = self.inner.borrow_mut();
            if current.ptr_eq(&previous) || current == previous {
                trace!(path = %path, "write unchanged");
                return Ok(WriteOutcome::Unchanged);
            }
            let next = inner
                .value
                .with_replaced(path.keys(), current.clone())
                .map_err(|reason| StateError::invalid_path(path.to_string(), reason))?;
            inner.value = next;
            inner.version += 1;
            inner.prune();
            let selected: Vec<Rc<Listener>> = inner
                .listeners
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|l| l.path.is_related(&path))
                .collect();
            (selected, inner.version)
        };

        let mut notified = 0;
        for listener in &selected {
            // Unsubscribed by an earlier callback in this pass.
            if !listener.active.get() {
                continue;
            }
            let value = self.get_at(&listener.path);
            notified += 1;
            if let Err(error) = (listener.callback)(&value) {
                warn!(
                    subscription = %listener.id,
                    path = %listener.path,
                    %error,
                    "listener failed"
                );
                self.inner
                    .borrow_mut()
                    .failures
                    .push(NotifyFailure::Listener {
                        subscription: listener.id,
                        path: listener.path.clone(),
                        error,
                    });
            }
        }
        drop(guard);

        debug!(path = %path, version, notified, "write committed");
        Ok(WriteOutcome::Committed {
            change: Change {
                path,
                previous,
                current,
            },
            version,
            notified,
        })
    }
}

/// Handle for one registered listener.
///
/// Dropping the `Subscription` (or calling [`unsubscribe`](Self::unsubscribe))
/// deactivates the listener immediately; the store's weak entry is pruned on
/// the next committed write.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    listener: Rc<Listener>,
}

impl Subscription {
    /// Identifier of this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.listener.id
    }

    /// Path the listener is registered on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.listener.path
    }

    /// Whether the listener will still be called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.active.get()
    }

    /// Remove the registration.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listener.active.set(false);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.listener.id)
            .field("path", &self.listener.path)
            .field("active", &self.listener.active.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&Value) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |v: &Value| sink.borrow_mut().push(v.clone()))
    }

    fn incr(v: &Value) -> Value {
        Value::from(v.as_i64().unwrap_or(0) + 1)
    }

    fn profile_store() -> Observable {
        Observable::new(Value::map([(
            "profile",
            Value::map([("name", "A"), ("city", "Oslo")]),
        )]))
    }

    #[test]
    fn get_set_basic() {
        let obs = Observable::new(Value::map([("name", "John")]));
        assert_eq!(obs.get("name").unwrap(), Value::from("John"));
        assert_eq!(obs.version(), 0);

        obs.set("name", "Jane").unwrap();
        assert_eq!(obs.get("name").unwrap(), Value::from("Jane"));
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn get_missing_is_undefined() {
        let obs = profile_store();
        assert!(obs.get("profile.age").unwrap().is_undefined());
        assert!(obs.get("nowhere.at.all").unwrap().is_undefined());
    }

    #[test]
    fn malformed_paths_fail_fast() {
        let obs = profile_store();
        assert!(matches!(
            obs.get("profile..name"),
            Err(StateError::InvalidPath { .. })
        ));
        assert!(obs.set("a.", 1).is_err());
        assert!(obs.subscribe(".a", |_| {}).is_err());
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn primitive_root() {
        let obs = Observable::new(1);
        let (log, cb) = recorder();
        let _sub = obs.subscribe("", cb).unwrap();
        obs.set_with("", incr).unwrap();
        assert_eq!(obs.get("").unwrap(), Value::from(2));
        assert_eq!(*log.borrow(), vec![Value::from(2)]);
    }

    #[test]
    fn subscribe_does_not_replay() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile.name", cb).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn scenario_single_field() {
        let obs = Observable::new(Value::map([("name", "John")]));
        let (log, cb) = recorder();
        let _sub = obs.subscribe("name", cb).unwrap();
        obs.set("name", "Jane").unwrap();
        assert_eq!(*log.borrow(), vec![Value::from("Jane")]);
    }

    #[test]
    fn scenario_five_increments() {
        let obs = Observable::new(Value::map([("count", 1)]));
        let (log, cb) = recorder();
        let _sub = obs.subscribe("count", cb).unwrap();
        for _ in 0..5 {
            obs.set_with("count", incr).unwrap();
        }
        let seen: Vec<i64> = log.borrow().iter().filter_map(Value::as_i64).collect();
        assert_eq!(seen, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn scenario_parent_and_child_fire_once() {
        let obs = profile_store();
        let (parent_log, parent_cb) = recorder();
        let (child_log, child_cb) = recorder();
        let _p = obs.subscribe("profile", parent_cb).unwrap();
        let _c = obs.subscribe("profile.name", child_cb).unwrap();

        let outcome = obs.set("profile.name", "B").unwrap();
        assert_eq!(outcome.notified(), 2);
        assert_eq!(parent_log.borrow().len(), 1);
        assert_eq!(*child_log.borrow(), vec![Value::from("B")]);
        // The parent receives the value at its own path.
        assert_eq!(
            parent_log.borrow()[0].child("name"),
            Some(&Value::from("B"))
        );
    }

    #[test]
    fn descendant_notified_on_subtree_replace() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile.name", cb).unwrap();
        obs.set("profile", Value::map([("name", "Z")])).unwrap();
        assert_eq!(*log.borrow(), vec![Value::from("Z")]);
    }

    #[test]
    fn sibling_not_notified() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile.name", cb).unwrap();
        obs.set("profile.city", "Bergen").unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn same_value_is_noop() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile.name", cb).unwrap();

        assert!(obs.set("profile.name", "B").unwrap().is_committed());
        assert_eq!(obs.set("profile.name", "B").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn deep_equal_subtree_is_noop() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile", cb).unwrap();
        let copy = Value::map([("name", "A"), ("city", "Oslo")]);
        assert_eq!(obs.set("profile", copy).unwrap(), WriteOutcome::Unchanged);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let sub = obs.subscribe("profile.name", cb).unwrap();
        obs.set("profile.name", "B").unwrap();
        sub.unsubscribe();
        obs.set("profile.name", "C").unwrap();
        obs.set("profile", Value::Null).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn churn_without_writes_keeps_registry_small() {
        let obs = Observable::new(0);
        let (log, cb) = recorder();
        let keep = obs.subscribe("", cb).unwrap();
        for _ in 0..10_000 {
            drop(obs.subscribe("", |_| {}).unwrap());
        }
        assert!(obs.inner.borrow().listeners.len() < 64);
        assert_eq!(obs.subscriber_count(), 1);

        obs.set("", 1).unwrap();
        assert!(keep.is_active());
        assert_eq!(*log.borrow(), vec![Value::from(1)]);
    }

    #[test]
    fn debug_counts_live_subscribers() {
        let obs = Observable::new(0);
        let a = obs.subscribe("", |_| {}).unwrap();
        let b = obs.subscribe("", |_| {}).unwrap();
        drop(b);
        let text = format!("{obs:?}");
        assert!(text.contains("subscriber_count: 1"), "{text}");
        drop(a);
        assert!(format!("{obs:?}").contains("subscriber_count: 0"));
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let obs = Observable::new(0);
        assert_eq!(obs.subscriber_count(), 0);
        let a = obs.subscribe("", |_| {}).unwrap();
        let b = obs.subscribe("", |_| {}).unwrap();
        assert_eq!(obs.subscriber_count(), 2);
        drop(b);
        assert_eq!(obs.subscriber_count(), 1);
        assert!(a.is_active());
    }

    #[test]
    fn tolerant_write_creates_path() {
        let obs = Observable::new(Value::Undefined);
        let (log, cb) = recorder();
        let _sub = obs.subscribe("settings.theme.name", cb).unwrap();
        obs.set("settings.theme.name", "dark").unwrap();
        assert_eq!(obs.get("settings.theme.name").unwrap(), Value::from("dark"));
        assert_eq!(*log.borrow(), vec![Value::from("dark")]);
    }

    #[test]
    fn write_into_list_by_index() {
        let obs = Observable::new(Value::map([("items", Value::list(["a", "b"]))]));
        obs.set("items.1", "B").unwrap();
        assert_eq!(obs.get("items.1").unwrap(), Value::from("B"));
        let err = obs.set("items.first", "x").unwrap_err();
        assert_eq!(
            err,
            StateError::invalid_path("items.first", "list elements are addressed by index")
        );
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn non_canonical_list_index_is_rejected() {
        let obs = Observable::new(Value::map([("items", Value::list(["a", "b"]))]));
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let _sub = obs
            .subscribe("items.1", move |_| seen.set(seen.get() + 1))
            .unwrap();

        for alias in ["items.+1", "items.01", "items.001"] {
            assert!(
                matches!(obs.set(alias, "X"), Err(StateError::InvalidPath { .. })),
                "{alias}"
            );
            assert!(obs.get(alias).unwrap().is_undefined(), "{alias}");
        }
        assert_eq!(obs.get("items.1").unwrap(), Value::from("b"));
        assert_eq!(obs.version(), 0);
        assert_eq!(calls.get(), 0);

        obs.set("items.1", "Z").unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn remove_deletes_and_notifies() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let _sub = obs.subscribe("profile.city", cb).unwrap();
        assert!(obs.remove("profile.city").unwrap().is_committed());
        assert!(obs.get("profile.city").unwrap().is_undefined());
        assert_eq!(*log.borrow(), vec![Value::Undefined]);
        // Removing again changes nothing.
        assert_eq!(obs.remove("profile.city").unwrap(), WriteOutcome::Unchanged);
    }

    #[test]
    fn structural_sharing_keeps_sibling_identity() {
        let obs = Observable::new(Value::map([(
            "a",
            Value::map([("b", Value::from(1)), ("c", Value::list([1, 2, 3]))]),
        )]));
        let root_before = obs.get("").unwrap();
        let a_before = obs.get("a").unwrap();
        let c_before = obs.get("a.c").unwrap();

        obs.set("a.b", 2).unwrap();

        assert!(c_before.ptr_eq(&obs.get("a.c").unwrap()));
        assert!(!a_before.ptr_eq(&obs.get("a").unwrap()));
        assert!(!root_before.ptr_eq(&obs.get("").unwrap()));
    }

    #[test]
    fn change_record_describes_write() {
        let obs = profile_store();
        let outcome = obs.set("profile.name", "B").unwrap();
        let WriteOutcome::Committed {
            change, version, ..
        } = outcome
        else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(change.path.to_string(), "profile.name");
        assert_eq!(change.previous, Value::from("A"));
        assert_eq!(change.current, Value::from("B"));
        assert_eq!(version, 1);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = profile_store();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = Rc::clone(&log);
        let _s1 = obs
            .subscribe("profile.name", move |_| log1.borrow_mut().push('A'))
            .unwrap();
        let log2 = Rc::clone(&log);
        let _s2 = obs.subscribe("", move |_| log2.borrow_mut().push('B')).unwrap();
        let log3 = Rc::clone(&log);
        let _s3 = obs
            .subscribe("profile", move |_| log3.borrow_mut().push('C'))
            .unwrap();

        obs.set("profile.name", "B").unwrap();
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn reentrant_write_runs_after_pass() {
        let obs = Observable::new(Value::map([("a", 0), ("b", 0)]));
        let log = Rc::new(RefCell::new(Vec::new()));

        let writer = obs.clone();
        let log1 = Rc::clone(&log);
        let _first = obs
            .subscribe("a", move |v| {
                log1.borrow_mut().push(format!("first a={v}"));
                let outcome = writer.set("b", 1).unwrap();
                assert_eq!(outcome, WriteOutcome::Deferred);
            })
            .unwrap();

        let reader = obs.clone();
        let log2 = Rc::clone(&log);
        let _second = obs
            .subscribe("a", move |_| {
                // Same snapshot as the first callback: b not yet written.
                let b = reader.get("b").unwrap();
                log2.borrow_mut().push(format!("second b={b}"));
            })
            .unwrap();

        let log3 = Rc::clone(&log);
        let _on_b = obs
            .subscribe("b", move |v| log3.borrow_mut().push(format!("b={v}")))
            .unwrap();

        obs.set("a", 1).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["first a=1", "second b=0", "b=1"]
        );
        assert_eq!(obs.version(), 2);
    }

    #[test]
    fn deferred_updater_sees_latest_value() {
        let obs = Observable::new(Value::map([("n", 0)]));
        let writer = obs.clone();
        let _sub = obs
            .subscribe("n", move |v| {
                if v.as_i64() == Some(1) {
                    writer.set_with("n", incr).unwrap();
                    writer.set_with("n", incr).unwrap();
                }
            })
            .unwrap();
        obs.set("n", 1).unwrap();
        assert_eq!(obs.get("n").unwrap(), Value::from(3));
    }

    #[test]
    fn updater_writing_same_store_is_deferred() {
        let obs = Observable::new(Value::map([("a", 0), ("b", 0)]));
        let inner = obs.clone();
        obs.set_with("a", move |v| {
            let outcome = inner.set("b", 5).unwrap();
            assert_eq!(outcome, WriteOutcome::Deferred);
            incr(v)
        })
        .unwrap();
        assert_eq!(obs.get("a").unwrap(), Value::from(1));
        assert_eq!(obs.get("b").unwrap(), Value::from(5));
    }

    #[test]
    fn unsubscribe_during_pass_skips_listener() {
        let obs = Observable::new(0);
        let victim_calls = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot_clone = Rc::clone(&slot);
        let _killer = obs
            .subscribe("", move |_| {
                slot_clone.borrow_mut().take();
            })
            .unwrap();

        let calls = Rc::clone(&victim_calls);
        let victim = obs
            .subscribe("", move |_| calls.set(calls.get() + 1))
            .unwrap();
        *slot.borrow_mut() = Some(victim);

        let outcome = obs.set("", 1).unwrap();
        assert_eq!(victim_calls.get(), 0);
        assert_eq!(outcome.notified(), 1);
    }

    #[test]
    fn subscribe_during_pass_waits_for_next_write() {
        let obs = Observable::new(0);
        let late_calls = Rc::new(Cell::new(0u32));
        let holder: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let store = obs.clone();
        let calls = Rc::clone(&late_calls);
        let holder_clone = Rc::clone(&holder);
        let _sub = obs
            .subscribe("", move |_| {
                let calls = Rc::clone(&calls);
                let sub = store
                    .subscribe("", move |_| calls.set(calls.get() + 1))
                    .unwrap();
                holder_clone.borrow_mut().push(sub);
            })
            .unwrap();

        obs.set("", 1).unwrap();
        assert_eq!(late_calls.get(), 0);
        obs.set("", 2).unwrap();
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn failing_listener_is_isolated() {
        let obs = profile_store();
        let (log, cb) = recorder();
        let failing = obs
            .try_subscribe("profile.name", |_| Err(ListenerError::new("render failed")))
            .unwrap();
        let _ok = obs.subscribe("profile.name", cb).unwrap();

        let outcome = obs.set("profile.name", "B").unwrap();
        assert_eq!(outcome.notified(), 2);
        assert_eq!(log.borrow().len(), 1);

        let failures = obs.take_failures();
        assert_eq!(
            failures,
            vec![NotifyFailure::Listener {
                subscription: failing.id(),
                path: Path::parse("profile.name").unwrap(),
                error: ListenerError::new("render failed"),
            }]
        );
        assert!(obs.take_failures().is_empty());
    }

    #[test]
    fn deferred_write_error_is_recorded() {
        let obs = Observable::new(Value::map([("items", Value::list([1])), ("x", Value::from(0))]));
        let writer = obs.clone();
        let _sub = obs
            .subscribe("x", move |_| {
                writer.set("items.name", 1).unwrap();
            })
            .unwrap();
        obs.set("x", 1).unwrap();
        let failures = obs.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            NotifyFailure::DeferredWrite { path, .. } if path.to_string() == "items.name"
        ));
    }

    #[test]
    fn panic_in_listener_does_not_wedge_store() {
        let obs = Observable::new(0);
        let sub = obs
            .subscribe("", |v| {
                if v.as_i64() == Some(1) {
                    panic!("listener blew up");
                }
            })
            .unwrap();
        let store = obs.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.set("", 1).unwrap();
        }));
        assert!(result.is_err());
        drop(sub);
        assert!(obs.set("", 2).unwrap().is_committed());
        assert_eq!(obs.get("").unwrap(), Value::from(2));
    }

    #[test]
    fn clone_shares_state() {
        let a = Observable::new(0);
        let b = a.clone();
        a.set("", 42).unwrap();
        assert_eq!(b.get("").unwrap(), Value::from(42));
        assert!(Observable::same_store(&a, &b));
        assert!(!Observable::same_store(&a, &Observable::new(0)));
    }

    #[test]
    fn with_borrows_value() {
        let obs = Observable::new(Value::map([("items", Value::list([1, 2, 3]))]));
        let len = obs
            .with("items", |v| v.as_list().map_or(0, <[Value]>::len))
            .unwrap();
        assert_eq!(len, 3);
        let missing = obs.with("nope", Value::is_undefined).unwrap();
        assert!(missing);
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
