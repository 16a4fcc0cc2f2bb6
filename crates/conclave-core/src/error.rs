//! Error types for the room state machine.
//!
//! Three families with different handling:
//!
//! - [`ProtocolViolation`]: the engine reported impossible state (a channel
//!   that already exists, a user that is not present). Logged and dropped, the
//!   session continues.
//! - [`CommandError`]: the local user asked for something the current state
//!   does not allow. Rejected with an informational message, no mutation.
//! - [`ParseError`]: malformed local command text.
//!
//! None of them cross the Room boundary as a failure: [`crate::Room`] turns
//! each into a [`crate::RoomAction::Inform`] at the point of detection.

use thiserror::Error;

use crate::ids::{ChannelId, TimerToken};

/// Engine callback describing state that cannot exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Channel handle is already mapped.
    #[error("channel {channel} already exists")]
    ChannelExists {
        /// Duplicated handle.
        channel: ChannelId,
    },

    /// Channel handle is not mapped.
    #[error("unknown channel {channel}")]
    UnknownChannel {
        /// Unknown handle.
        channel: ChannelId,
    },

    /// User is not a member of the channel.
    #[error("user {name:?} is not in channel {channel}")]
    UnknownParticipant {
        /// Channel the event was addressed to.
        channel: ChannelId,
        /// Missing user.
        name: String,
    },

    /// User is already a live member of the channel.
    #[error("user {name:?} is already in channel {channel}")]
    ParticipantExists {
        /// Channel the event was addressed to.
        channel: ChannelId,
        /// Duplicated user.
        name: String,
    },

    /// User is not in the room roster.
    #[error("user {name:?} is not in the room")]
    UnknownUser {
        /// Missing user.
        name: String,
    },

    /// User is already in the room roster.
    #[error("user {name:?} is already in the room")]
    UserExists {
        /// Duplicated user.
        name: String,
    },

    /// A second, different public key was reported for a user.
    ///
    /// The first key is retained.
    #[error("user {name:?} presented a public key different from the one on record")]
    KeyMismatch {
        /// User whose key changed.
        name: String,
    },

    /// Timer handle is not registered.
    #[error("unknown timer {token}")]
    UnknownTimer {
        /// Unknown handle.
        token: TimerToken,
    },
}

/// Local command rejected against the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No engine session exists yet.
    #[error("the secure session has not been started")]
    NotStarted,

    /// The room was configured with the protocol disabled.
    #[error("secure messaging is disabled for this conversation")]
    ProtocolDisabled,

    /// Local user is not a joined participant of the channel.
    #[error("you have not joined the conversation yet")]
    NotJoined,

    /// Local user is already a joined participant of the channel.
    #[error("you have already joined channel {channel}")]
    AlreadyJoined {
        /// Channel in question.
        channel: ChannelId,
    },

    /// Name is not known in the current scope.
    #[error("no such user {name:?}")]
    UnknownUser {
        /// Requested name.
        name: String,
    },

    /// Channel id does not name a live channel.
    #[error("channel id {id:?} not found")]
    UnknownChannel {
        /// Requested id, as typed.
        id: String,
    },

    /// Invitee is already a joined participant.
    #[error("{name:?} is already a participant")]
    AlreadyParticipant {
        /// Invitee.
        name: String,
    },

    /// Operation cannot target the local user.
    #[error("you cannot {operation} yourself")]
    SelfTarget {
        /// Operation name.
        operation: &'static str,
    },

    /// Command exists but is meaningless in this context.
    #[error("{command} is not available {context}")]
    NotAvailable {
        /// Command name.
        command: &'static str,
        /// Where it was attempted.
        context: &'static str,
    },

    /// Too many invitations are waiting for channels to be created.
    #[error("too many pending invitations (limit {limit})")]
    InviteQueueFull {
        /// Queue capacity.
        limit: usize,
    },

    /// Command text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Malformed local command text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing after the command prefix.
    #[error("empty command")]
    Empty,

    /// First word is not a command.
    #[error("{0:?} is not a valid command")]
    UnknownCommand(String),

    /// Required argument missing.
    #[error("{command} requires <{argument}>")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// Argument name.
        argument: &'static str,
    },

    /// Channel id is not a number.
    #[error("{0:?} is not a valid channel id")]
    InvalidChannelId(String),

    /// Extra input after the last expected argument.
    #[error("unexpected argument {argument:?} to {command}")]
    UnexpectedArgument {
        /// Command name.
        command: &'static str,
        /// First extra word.
        argument: String,
    },
}

impl ProtocolViolation {
    /// Channel the violation was reported against, if any.
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::ChannelExists { channel }
            | Self::UnknownChannel { channel }
            | Self::UnknownParticipant { channel, .. }
            | Self::ParticipantExists { channel, .. } => Some(*channel),
            Self::UnknownUser { .. } | Self::UserExists { .. } | Self::KeyMismatch { .. } | Self::UnknownTimer { .. } => {
                None
            },
        }
    }
}

impl CommandError {
    /// Returns true if the command text itself was malformed.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
