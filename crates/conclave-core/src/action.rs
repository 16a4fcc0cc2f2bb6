//! Outputs of the room state machine.
//!
//! The room never performs I/O. Every effect is returned as a
//! [`RoomAction`] for the session to execute: commands for the engine, data
//! for the transport, and notifications for the presentation layer.

use crate::{
    identity::PublicKey,
    ids::{ChannelId, TimerToken},
};

/// Severity of an informational message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Normal status output.
    Info,
    /// Something the user should notice.
    Warning,
    /// A failure.
    Error,
}

/// What a [`RoomAction::Changed`] notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Room-wide state: connection, roster, channel list.
    Room,
    /// A channel's own state.
    Channel(ChannelId),
    /// One participant, in the roster (`channel: None`) or in a channel.
    Participant {
        /// Owning channel, or `None` for the roster.
        channel: Option<ChannelId>,
        /// Username.
        name: String,
    },
}

/// Requests to the secure-messaging engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Open a session for the local identity.
    Open {
        /// Sanitized local username.
        username: String,
        /// Local public key.
        public_key: PublicKey,
    },
    /// Connect the session to the room.
    Connect,
    /// Tear the session down.
    Disconnect,
    /// Decode data received from the transport.
    Receive {
        /// Transport-level sender.
        sender: String,
        /// Undecoded payload.
        payload: String,
    },
    /// The host saw a user leave the underlying chat.
    UserLeft {
        /// Username.
        name: String,
    },
    /// Create a new channel.
    CreateChannel,
    /// Enumerate existing channels.
    SearchChannels,
    /// Join a channel.
    JoinChannel {
        /// Target channel.
        channel: ChannelId,
    },
    /// Invite a user into a channel.
    Invite {
        /// Target channel.
        channel: ChannelId,
        /// Invitee.
        name: String,
        /// Invitee's key as known to the room.
        public_key: PublicKey,
    },
    /// Send an encrypted chat message.
    SendChat {
        /// Target channel, or `None` for the room.
        channel: Option<ChannelId>,
        /// Plaintext.
        text: String,
    },
    /// Vouch for a user.
    Authorize {
        /// Target channel, or `None` for the room.
        channel: Option<ChannelId>,
        /// Username.
        name: String,
    },
    /// Leave a channel.
    Leave {
        /// Target channel.
        channel: ChannelId,
        /// Skip the `Left` callback; set during teardown.
        suppress_callback: bool,
    },
    /// A requested timer is due.
    FireTimer {
        /// Timer handle.
        token: TimerToken,
    },
}

impl EngineCommand {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Receive { .. } => "receive",
            Self::UserLeft { .. } => "user_left",
            Self::CreateChannel => "create_channel",
            Self::SearchChannels => "search_channels",
            Self::JoinChannel { .. } => "join_channel",
            Self::Invite { .. } => "invite",
            Self::SendChat { .. } => "send_chat",
            Self::Authorize { .. } => "authorize",
            Self::Leave { .. } => "leave",
            Self::FireTimer { .. } => "fire_timer",
        }
    }
}

/// Effects produced by [`crate::Room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Forward a command to the engine.
    Engine(EngineCommand),

    /// Send raw data over the transport.
    Transmit {
        /// Data to send.
        payload: String,
    },

    /// Show a chat message.
    Display {
        /// Channel view, or `None` for the room view.
        channel: Option<ChannelId>,
        /// Author.
        sender: String,
        /// Message text.
        text: String,
    },

    /// Show a status line.
    Inform {
        /// Channel view, or `None` for the room view.
        channel: Option<ChannelId>,
        /// Severity.
        level: Level,
        /// Message text.
        message: String,
    },

    /// Some displayed state changed and should be re-rendered.
    Changed(Scope),

    /// A channel was added; the presentation may open a view for it.
    ChannelOpened {
        /// New channel.
        channel: ChannelId,
    },

    /// A channel was removed from the room.
    ChannelRemoved {
        /// Removed channel.
        channel: ChannelId,
    },

    /// Close the view of a channel the local user never joined.
    CloseView {
        /// Channel whose view should close.
        channel: ChannelId,
    },
}

impl RoomAction {
    /// Status line at [`Level::Info`].
    pub fn info(channel: Option<ChannelId>, message: impl Into<String>) -> Self {
        Self::Inform { channel, level: Level::Info, message: message.into() }
    }

    /// Status line at [`Level::Warning`].
    pub fn warning(channel: Option<ChannelId>, message: impl Into<String>) -> Self {
        Self::Inform { channel, level: Level::Warning, message: message.into() }
    }

    /// Status line at [`Level::Error`].
    pub fn error(channel: Option<ChannelId>, message: impl Into<String>) -> Self {
        Self::Inform { channel, level: Level::Error, message: message.into() }
    }

    /// Re-render a participant.
    pub fn participant_changed(channel: Option<ChannelId>, name: impl Into<String>) -> Self {
        Self::Changed(Scope::Participant { channel, name: name.into() })
    }
}
