#![forbid(unsafe_code)]

//! Error types for observable state operations.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Malformed path | Empty segment, stray dot, whitespace | `InvalidPath` returned before any mutation |
//! | List written with a key | Non-index segment under a list | `InvalidPath` returned, value untouched |
//! | No provider | `Context::get` outside `provide` | `MissingContext` returned |
//! | Listener failure | Fallible listener returned `Err` | Recorded as [`NotifyFailure`], pass continues |
//! | Deferred write failure | Queued write hit `InvalidPath` | Recorded as [`NotifyFailure`] |

use crate::path::Path;
use crate::store::SubscriptionId;

/// Convenience alias used across the crate.
pub type Result<T, E = StateError> = std::result::Result<T, E>;

/// Errors from observable state operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A reader expected an ambient observable and none was provided.
    MissingContext {
        /// Name of the context token that was looked up.
        context: &'static str,
    },
    /// A path descriptor was malformed or cannot address the value tree.
    InvalidPath {
        /// The offending path as written by the caller.
        path: String,
        /// Short description of what is wrong with it.
        reason: &'static str,
    },
}

impl StateError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingContext { context } => {
                write!(f, "no value provided for context '{context}'")
            }
            Self::InvalidPath { path, reason } => write!(f, "invalid path '{path}': {reason}"),
        }
    }
}

impl std::error::Error for StateError {}

/// Error returned by a fallible listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    /// Create a listener error with a human-readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message supplied by the listener.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ListenerError {}

/// A failure that happened while notifying, reported out of band.
///
/// These never abort a notification pass. They accumulate on the store
/// until drained with [`Observable::take_failures`](crate::Observable::take_failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyFailure {
    /// A listener returned an error for a change on `path`.
    Listener {
        /// The failing subscription.
        subscription: SubscriptionId,
        /// The path the subscription is registered on.
        path: Path,
        /// What the listener reported.
        error: ListenerError,
    },
    /// A write queued from inside a notification pass could not be applied.
    DeferredWrite {
        /// Target path of the queued write.
        path: Path,
        /// Why it was rejected.
        error: StateError,
    },
}

impl std::fmt::Display for NotifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listener {
                subscription,
                path,
                error,
            } => write!(f, "listener {subscription} on '{path}' failed: {error}"),
            Self::DeferredWrite { path, error } => {
                write!(f, "deferred write to '{path}' failed: {error}")
            }
        }
    }
}

impl std::error::Error for NotifyFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_context() {
        let err = StateError::MissingContext {
            context: "StateContext",
        };
        assert_eq!(
            err.to_string(),
            "no value provided for context 'StateContext'"
        );
    }

    #[test]
    fn display_invalid_path() {
        let err = StateError::invalid_path("a..b", "empty segment");
        assert_eq!(err.to_string(), "invalid path 'a..b': empty segment");
    }

    #[test]
    fn listener_error_conversions() {
        let a: ListenerError = "boom".into();
        let b: ListenerError = String::from("boom").into();
        assert_eq!(a, b);
        assert_eq!(a.message(), "boom");
    }
}
