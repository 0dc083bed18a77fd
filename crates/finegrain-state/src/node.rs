#![forbid(unsafe_code)]

//! Path-bound handles into an [`Observable`].
//!
//! A [`Node`] is what a component receives when it is handed a slice of
//! shared state: the store plus a validated path. Nodes are cheap to clone
//! and all of them observe the same underlying store.

use std::fmt;

use crate::error::{ListenerError, Result};
use crate::path::Path;
use crate::store::{Observable, Subscription, WriteOutcome};
use crate::value::Value;

/// A store handle bound to one path.
#[derive(Clone)]
pub struct Node {
    store: Observable,
    path: Path,
}

impl Node {
    pub(crate) fn new(store: Observable, path: Path) -> Self {
        Self { store, path }
    }

    /// The path this node reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The store this node belongs to.
    #[must_use]
    pub fn store(&self) -> &Observable {
        &self.store
    }

    /// Node for `key` below this one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`](crate::StateError::InvalidPath)
    /// if `key` is not a valid segment.
    pub fn child(&self, key: &str) -> Result<Node> {
        Ok(Self::new(self.store.clone(), self.path.child(key)?))
    }

    /// Current value at this node.
    #[must_use]
    pub fn get(&self) -> Value {
        self.store.get_at(&self.path)
    }

    /// Replace the value at this node.
    ///
    /// # Errors
    ///
    /// See [`Observable::set`].
    pub fn set(&self, value: impl Into<Value>) -> Result<WriteOutcome> {
        self.store.set(&self.path, value)
    }

    /// Replace the value at this node with `f(current)`.
    ///
    /// # Errors
    ///
    /// See [`Observable::set`].
    pub fn set_with(&self, f: impl FnOnce(&Value) -> Value + 'static) -> Result<WriteOutcome> {
        self.store.set_with(&self.path, f)
    }

    /// Delete the value at this node.
    ///
    /// # Errors
    ///
    /// See [`Observable::set`].
    pub fn remove(&self) -> Result<WriteOutcome> {
        self.store.remove(&self.path)
    }

    /// Subscribe to changes affecting this node.
    pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.store.register(
            self.path.clone(),
            Box::new(move |value| {
                callback(value);
                Ok(())
            }),
        )
    }

    /// Subscribe with a fallible callback.
    pub fn try_subscribe(
        &self,
        callback: impl Fn(&Value) -> std::result::Result<(), ListenerError> + 'static,
    ) -> Subscription {
        self.store.register(self.path.clone(), Box::new(callback))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.path)
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn state() -> Observable {
        Observable::new(Value::map([("profile", Value::map([("name", "")]))]))
    }

    #[test]
    fn child_nodes_address_nested_values() {
        let store = state();
        let name = store.at("profile").unwrap().child("name").unwrap();
        assert_eq!(name.path().to_string(), "profile.name");
        name.set("Jane").unwrap();
        assert_eq!(store.get("profile.name").unwrap(), Value::from("Jane"));
        assert_eq!(name.get(), Value::from("Jane"));
    }

    #[test]
    fn node_subscription_sees_parent_writes() {
        let store = state();
        let name = store.at("profile.name").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = name.subscribe(move |v| sink.borrow_mut().push(v.to_string()));

        store
            .at("profile")
            .unwrap()
            .set_with(|_| Value::map([("name", "Updated")]))
            .unwrap();
        assert_eq!(*seen.borrow(), vec!["Updated"]);
    }

    #[test]
    fn nodes_share_store() {
        let store = state();
        let a = store.root();
        let b = a.child("profile").unwrap();
        assert!(Observable::same_store(a.store(), b.store()));
        b.remove().unwrap();
        assert!(a.get().as_map().unwrap().is_empty());
    }

    #[test]
    fn invalid_child_key() {
        let store = state();
        assert!(store.root().child("a b").is_err());
    }

    #[test]
    fn debug_shows_path_and_value() {
        let store = state();
        let dbg = format!("{:?}", store.at("profile.name").unwrap());
        assert!(dbg.contains("profile.name"));
    }
}
