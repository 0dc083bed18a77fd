#![forbid(unsafe_code)]

//! Errors surfaced by the demo host.

use finegrain_state::StateError;

/// Convenience alias for host operations.
pub type Result<T, E = DemoError> = std::result::Result<T, E>;

/// Errors from mounting, rendering or driving components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoError {
    /// A store operation failed (bad path, missing context).
    State(StateError),
    /// `click` named a button that is not on screen.
    UnknownButton(String),
    /// A component failed while rendering.
    Render {
        component: &'static str,
        source: StateError,
    },
}

impl std::fmt::Display for DemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(err) => write!(f, "state error: {err}"),
            Self::UnknownButton(label) => write!(f, "no button labelled '{label}'"),
            Self::Render { component, source } => {
                write!(f, "{component} failed to render: {source}")
            }
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::State(err) | Self::Render { source: err, .. } => Some(err),
            Self::UnknownButton(_) => None,
        }
    }
}

impl From<StateError> for DemoError {
    fn from(err: StateError) -> Self {
        Self::State(err)
    }
}
