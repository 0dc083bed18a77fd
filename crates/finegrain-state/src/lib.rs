#![forbid(unsafe_code)]

//! Path-scoped observable state with fine-grained change notification.
//!
//! # Role
//! `finegrain-state` is the state layer a UI host binds to. Readers
//! subscribe to a key path inside a shared value tree; a write notifies only
//! the readers whose path is equal to, above, or below the written path, so
//! a host can patch one output location instead of re-running a whole
//! component.
//!
//! # Primary pieces
//! - [`Observable`]: the store. `get`, `set`, `set_with`, `remove`,
//!   `subscribe`.
//! - [`Node`]: a store handle bound to one path, for handing slices of state
//!   to child components.
//! - [`Computed`]: lazily recomputed value derived from one or more nodes.
//! - [`Context`]: thread-local ambient values, for handing a store down a
//!   deep tree without explicit parameters.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use finegrain_state::{Observable, Value};
//!
//! let state = Observable::new(Value::map([("profile", Value::map([("name", "A")]))]));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _sub = state
//!     .subscribe("profile.name", move |v| sink.borrow_mut().push(v.to_string()))
//!     .unwrap();
//!
//! state.set("profile.name", "B").unwrap();
//! state.set("profile.name", "B").unwrap(); // unchanged: no notification
//! assert_eq!(*seen.borrow(), vec!["B"]);
//! ```

pub mod computed;
pub mod context;
pub mod error;
#[cfg(feature = "serde")]
mod json;
pub mod node;
pub mod path;
pub mod store;
pub mod value;

pub use computed::Computed;
pub use context::{Context, ContextGuard};
pub use error::{ListenerError, NotifyFailure, Result, StateError};
pub use node::Node;
pub use path::{IntoPath, Path};
pub use store::{Change, Observable, Subscription, SubscriptionId, WriteOutcome};
pub use value::{Value, ValueMap};
