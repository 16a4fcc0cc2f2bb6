//! Inputs to the room state machine.
//!
//! The engine reports everything it learns as an [`EngineEvent`]. Events for
//! a single channel are wrapped in [`EngineEvent::Channel`] and routed by
//! handle. The host contributes raw transport data and clock ticks.

use std::time::Duration;

use crate::{
    identity::PublicKey,
    ids::{ChannelId, TimerToken},
};

/// Events processed by [`crate::Room::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent<I> {
    /// Callback from the secure-messaging engine.
    Engine(EngineEvent),

    /// Raw data received from the transport for the engine to decode.
    ReceivedData {
        /// Transport-level sender.
        sender: String,
        /// Undecoded payload.
        payload: String,
    },

    /// Clock tick. Fires engine timers that are due.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Room-scoped engine callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine finished connecting.
    Connected,

    /// The engine lost its session.
    Disconnected,

    /// A user appeared in the room.
    UserJoined {
        /// Username.
        name: String,
        /// Key the user presented.
        public_key: PublicKey,
    },

    /// A user left the room.
    UserLeft {
        /// Username.
        name: String,
    },

    /// A channel became visible, e.g. as a result of `SearchChannels`.
    NewChannel {
        /// Engine handle.
        channel: ChannelId,
        /// Current members.
        members: Vec<String>,
    },

    /// A channel requested with `CreateChannel` now exists.
    CreatedConversation {
        /// Engine handle.
        channel: ChannelId,
    },

    /// Someone invited the local user into a channel.
    InvitedToConversation {
        /// Engine handle.
        channel: ChannelId,
        /// Who sent the invitation.
        inviter: String,
    },

    /// A channel disappeared.
    ChannelRemoved {
        /// Engine handle.
        channel: ChannelId,
    },

    /// The local user's join of a channel completed.
    JoinedChannel {
        /// Engine handle.
        channel: ChannelId,
    },

    /// A message addressed to the whole room rather than a channel.
    RoomMessage {
        /// Author.
        sender: String,
        /// Message text.
        text: String,
    },

    /// The engine wants data sent over the transport.
    SendMessage {
        /// Encoded payload.
        payload: String,
    },

    /// The engine wants a callback after `interval`.
    SetTimer {
        /// Handle identifying the timer.
        token: TimerToken,
        /// Delay from now.
        interval: Duration,
    },

    /// The engine cancels a pending timer.
    UnsetTimer {
        /// Handle identifying the timer.
        token: TimerToken,
    },

    /// Callback scoped to a single channel.
    Channel {
        /// Engine handle.
        channel: ChannelId,
        /// What happened.
        event: ChannelEvent,
    },
}

impl EngineEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::NewChannel { .. } => "new_channel",
            Self::CreatedConversation { .. } => "created_conversation",
            Self::InvitedToConversation { .. } => "invited_to_conversation",
            Self::ChannelRemoved { .. } => "channel_removed",
            Self::JoinedChannel { .. } => "joined_channel",
            Self::RoomMessage { .. } => "room_message",
            Self::SendMessage { .. } => "send_message",
            Self::SetTimer { .. } => "set_timer",
            Self::UnsetTimer { .. } => "unset_timer",
            Self::Channel { event, .. } => event.kind(),
        }
    }
}

/// Channel-scoped engine callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A user became a member.
    UserJoined {
        /// Username.
        name: String,
    },

    /// A user left the channel.
    UserLeft {
        /// Username.
        name: String,
    },

    /// A user's key was authenticated.
    UserAuthenticated {
        /// Username.
        name: String,
        /// Authenticated key.
        public_key: PublicKey,
    },

    /// Authentication of a user's key failed.
    UserAuthenticationFailed {
        /// Username.
        name: String,
    },

    /// `authorizer` vouched for `target`.
    UserAuthorizedBy {
        /// Who vouched.
        authorizer: String,
        /// Who was vouched for.
        target: String,
    },

    /// A user was promoted to full participant.
    UserPromoted {
        /// Username.
        name: String,
    },

    /// `inviter` invited `invitee`.
    UserInvited {
        /// Who invited.
        inviter: String,
        /// Who was invited.
        invitee: String,
    },

    /// An invitation was withdrawn.
    InvitationCancelled {
        /// Who had invited.
        inviter: String,
        /// Who had been invited.
        invitee: String,
        /// Whether another invitation for `invitee` is still outstanding.
        still_invited: bool,
    },

    /// A decrypted chat message.
    MessageReceived {
        /// Author.
        sender: String,
        /// Plaintext.
        text: String,
    },

    /// The local user became a member.
    Joined,

    /// The local user was promoted.
    Authorized,

    /// The local user entered the chat.
    JoinedChat,

    /// A user entered the chat.
    UserJoinedChat {
        /// Username.
        name: String,
    },

    /// The local user left the channel.
    Left,

    /// `kicker` voted for or against removing `victim`.
    VotekickRegistered {
        /// Voter.
        kicker: String,
        /// Target of the vote.
        victim: String,
        /// True to add the vote, false to withdraw it.
        kicked: bool,
    },
}

impl ChannelEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::UserAuthenticated { .. } => "user_authenticated",
            Self::UserAuthenticationFailed { .. } => "user_authentication_failed",
            Self::UserAuthorizedBy { .. } => "user_authorized_by",
            Self::UserPromoted { .. } => "user_promoted",
            Self::UserInvited { .. } => "user_invited",
            Self::InvitationCancelled { .. } => "invitation_cancelled",
            Self::MessageReceived { .. } => "message_received",
            Self::Joined => "joined",
            Self::Authorized => "authorized",
            Self::JoinedChat => "joined_chat",
            Self::UserJoinedChat { .. } => "user_joined_chat",
            Self::Left => "left",
            Self::VotekickRegistered { .. } => "votekick_registered",
        }
    }
}
