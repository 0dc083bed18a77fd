#![forbid(unsafe_code)]

//! finegrain demo library.
//!
//! Exposes the demo host and the three examples so integration tests can
//! mount them, drive the clock, press buttons and inspect frames.
//!
//! # Role
//! `finegrain-demo` shows what `finegrain-state` buys a UI: a counter held in
//! component-local state re-runs its component on every change, while a
//! counter held in a store patches one text slot and its component renders
//! exactly once.
//!
//! # How it fits together
//! - [`host`] mounts [`component`]s, re-renders the ones that invalidate
//!   themselves and renders a plain-text frame.
//! - [`memo`] binds a store node to one [`surface::Slot`].
//! - [`scheduler`] is the tick clock standing in for timers.
//! - [`screens`] holds the examples; [`app`] drives them for the binary.

pub mod app;
pub mod cli;
pub mod component;
pub mod error;
pub mod host;
pub mod logging;
pub mod memo;
pub mod scheduler;
pub mod screens;
pub mod surface;

pub use component::{Component, ComponentId, Invalidator, MountCx, RenderCx};
pub use error::{DemoError, Result};
pub use host::Host;
pub use scheduler::Scheduler;
