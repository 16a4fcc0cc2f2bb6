//! Engine failure reporting.

use thiserror::Error;

/// Errors returned by an [`crate::Engine`] call.
///
/// The session never aborts on these. Each failure is logged, counted and
/// shown to the user, and the room carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A command arrived before the session was opened.
    #[error("engine session is not open")]
    NotOpen,

    /// The session is already open.
    #[error("engine session is already open")]
    AlreadyOpen,

    /// The engine refused the operation in its current state.
    #[error("engine rejected {operation}: {reason}")]
    Rejected {
        /// Operation label.
        operation: &'static str,
        /// Engine-provided reason.
        reason: String,
    },

    /// Received data could not be decoded.
    #[error("malformed payload from {sender}: {reason}")]
    Malformed {
        /// Transport-level sender.
        sender: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The underlying transport is unavailable.
    #[error("transport unavailable: {0}")]
    Transport(String),
}

impl EngineError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the error was caused by data from a remote peer.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
