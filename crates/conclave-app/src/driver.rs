//! Driver trait for abstracting host I/O.
//!
//! The [`Driver`] decouples the [`crate::Runtime`] from where input comes
//! from and where transport data goes. A terminal frontend reads lines from
//! stdin; a simulation feeds scripted events.

use std::{future::Future, ops::Sub, time::Duration};

use conclave_core::ChannelId;

/// Input from the host chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The local user typed a line into the focused view.
    Line(String),

    /// Raw data arrived over the transport.
    Received {
        /// Transport-level sender.
        sender: String,
        /// Undecoded payload.
        payload: String,
    },

    /// The local user joined the underlying chat.
    ChatJoined,

    /// The local user left the underlying chat.
    ChatLeft,

    /// Another user left the underlying chat.
    UserLeft {
        /// Username.
        name: String,
    },

    /// Direct input to a channel.
    Focus(ChannelId),

    /// Direct input to the room.
    Unfocus,

    /// Shut down.
    Quit,
}

/// Platform-specific I/O for the runtime.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait briefly for the next host event.
    ///
    /// Returns `None` when nothing arrived within the driver's poll window,
    /// so the runtime can deliver clock ticks.
    fn poll_event(&mut self) -> impl Future<Output = Result<Option<HostEvent>, Self::Error>> + Send;

    /// Send a payload over the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed.
    fn transmit(&mut self, payload: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Release resources.
    fn stop(&mut self);
}
