//! Error types for the window engine.
//!
//! None of these ever reach the end user: callers degrade to "nothing
//! happens" and log. They exist so internal plumbing can propagate with `?`.

use thiserror::Error;

use crate::fsm::{FsmEvent, WindowState};
use crate::window::WindowId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no state machine registered for window `{0}`")]
    UnknownWindow(WindowId),
    #[error("window `{0}` is already open")]
    AlreadyOpen(WindowId),
    #[error("event `{event}` is not accepted in state `{from}`")]
    Illegal { event: FsmEvent, from: WindowState },
    #[error("window is not resizable")]
    NotResizable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("window `{0}` is not in the store")]
    UnknownWindow(WindowId),
    #[error("window `{0}` is already in the store")]
    Duplicate(WindowId),
    #[error("non-finite value for `{field}` on window `{id}`")]
    NonFinite { id: WindowId, field: &'static str },
}

/// Failure raised by an event bus subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast payload could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("broadcast channel is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DesktopError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
