#![forbid(unsafe_code)]

//! Ambient context: hand a value down a call tree without threading it
//! through every signature.
//!
//! # Overview
//!
//! - **Thread-local**: provided values are visible only on the providing
//!   thread, so parallel tests stay isolated.
//! - **Stackable**: nested providers of the same token shadow outer ones;
//!   leaving a scope restores the outer value.
//! - **RAII-based**: [`ContextGuard`] pops the value when dropped, even on
//!   panic.
//!
//! A [`Context<T>`] token is identified by its name together with `T`.
//! Declare tokens as statics:
//!
//! ```
//! use finegrain_state::{Context, Observable, StateError, Value};
//!
//! static STATE: Context<Observable> = Context::new("StateContext");
//!
//! let store = Observable::new(Value::map([("name", "John")]));
//! STATE.provide(store, || {
//!     let state = STATE.get().unwrap();
//!     assert_eq!(state.get("name").unwrap(), Value::from("John"));
//! });
//!
//! assert_eq!(
//!     STATE.get().unwrap_err(),
//!     StateError::MissingContext { context: "StateContext" },
//! );
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Result, StateError};

type ContextKey = (TypeId, &'static str);

thread_local! {
    /// Provided values per token for this thread, innermost last.
    static CONTEXT_STACKS: RefCell<HashMap<ContextKey, Vec<Rc<dyn Any>>>> =
        RefCell::new(HashMap::new());
}

/// Typed token naming one kind of ambient value.
pub struct Context<T: 'static> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Context<T> {
    /// Declare a token. Usable in `static` items.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Name given at declaration.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> ContextKey {
        (TypeId::of::<T>(), self.name)
    }

    /// Make `value` visible to [`get`](Self::get) until the guard drops.
    #[must_use = "the value is withdrawn when the guard is dropped"]
    pub fn push(&self, value: T) -> ContextGuard {
        let key = self.key();
        trace!(context = self.name, "context provided");
        CONTEXT_STACKS.with(|stacks| {
            stacks
                .borrow_mut()
                .entry(key)
                .or_default()
                .push(Rc::new(value));
        });
        ContextGuard {
            key,
            _marker: PhantomData,
        }
    }

    /// Run `f` with `value` provided.
    pub fn provide<R>(&self, value: T, f: impl FnOnce() -> R) -> R {
        let _guard = self.push(value);
        f()
    }

    /// Number of nested providers currently active for this token.
    #[must_use]
    pub fn depth(&self) -> usize {
        let key = self.key();
        CONTEXT_STACKS.with(|stacks| stacks.borrow().get(&key).map_or(0, Vec::len))
    }
}

impl<T: Clone + 'static> Context<T> {
    /// The innermost provided value, if any.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        let key = self.key();
        CONTEXT_STACKS.with(|stacks| {
            stacks
                .borrow()
                .get(&key)
                .and_then(|stack| stack.last())
                .and_then(|value| (**value).downcast_ref::<T>())
                .cloned()
        })
    }

    /// The innermost provided value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingContext`] when nothing is provided.
    pub fn get(&self) -> Result<T> {
        self.try_get()
            .ok_or(StateError::MissingContext { context: self.name })
    }
}

impl<T> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("name", &self.name).finish()
    }
}

/// RAII guard that withdraws a provided value when dropped.
#[must_use = "the value is withdrawn when the guard is dropped"]
pub struct ContextGuard {
    key: ContextKey,
    /// Thread-local data: keep the guard on its thread.
    _marker: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // Tolerate TLS teardown on thread exit.
        let _ = CONTEXT_STACKS.try_with(|stacks| {
            let popped = {
                let mut stacks = stacks.borrow_mut();
                let Some(stack) = stacks.get_mut(&self.key) else {
                    return;
                };
                let popped = stack.pop();
                if stack.is_empty() {
                    stacks.remove(&self.key);
                }
                popped
            };
            // The value's own destructor may touch context again.
            drop(popped);
        });
    }
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard")
            .field("context", &self.key.1)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Observable;
    use crate::value::Value;

    static NUMBER: Context<u32> = Context::new("Number");
    static LABEL: Context<&'static str> = Context::new("Label");

    #[test]
    fn missing_context_fails_fast() {
        assert_eq!(
            NUMBER.get(),
            Err(StateError::MissingContext { context: "Number" })
        );
        assert_eq!(NUMBER.try_get(), None);
        assert_eq!(NUMBER.depth(), 0);
    }

    #[test]
    fn provide_scopes_value() {
        let seen = NUMBER.provide(7, || NUMBER.get().unwrap());
        assert_eq!(seen, 7);
        assert!(NUMBER.get().is_err());
    }

    #[test]
    fn nested_providers_shadow() {
        NUMBER.provide(1, || {
            assert_eq!(NUMBER.get().unwrap(), 1);
            NUMBER.provide(2, || {
                assert_eq!(NUMBER.get().unwrap(), 2);
                assert_eq!(NUMBER.depth(), 2);
            });
            assert_eq!(NUMBER.get().unwrap(), 1);
        });
    }

    #[test]
    fn tokens_are_independent() {
        NUMBER.provide(3, || {
            assert!(LABEL.get().is_err());
            LABEL.provide("x", || {
                assert_eq!(NUMBER.get().unwrap(), 3);
                assert_eq!(LABEL.get().unwrap(), "x");
            });
        });
    }

    #[test]
    fn same_name_different_type_do_not_collide() {
        let text: Context<String> = Context::new("Number");
        NUMBER.provide(9, || {
            assert!(text.get().is_err());
        });
    }

    #[test]
    fn guard_pops_on_drop() {
        let guard = NUMBER.push(5);
        assert_eq!(NUMBER.get().unwrap(), 5);
        drop(guard);
        assert!(NUMBER.get().is_err());
    }

    #[test]
    fn guard_pops_on_panic() {
        let result = std::panic::catch_unwind(|| {
            NUMBER.provide(11, || -> u32 { panic!("boom") });
        });
        assert!(result.is_err());
        assert_eq!(NUMBER.depth(), 0);
    }

    #[test]
    fn shared_store_through_context() {
        let state: Context<Observable> = Context::new("State");
        let store = Observable::new(Value::map([("profile", Value::map([("name", "")]))]));
        state.provide(store.clone(), || {
            let writer = state.get().unwrap();
            writer.set("profile.name", "Updated").unwrap();
        });
        assert_eq!(store.get("profile.name").unwrap(), Value::from("Updated"));
    }

    #[test]
    fn other_threads_see_nothing() {
        NUMBER.provide(1, || {
            let handle = std::thread::spawn(|| NUMBER.get().is_err());
            assert!(handle.join().unwrap());
        });
    }
}
