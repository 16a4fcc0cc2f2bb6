//! Operations that can be applied to a simulated room.

use std::time::Duration;

use arbitrary::Arbitrary;
use conclave_core::ChannelId;

use crate::SimNetwork;

/// Usernames operations draw from.
pub const USERS: &[&str] = &["alice", "bob", "carol", "dave"];

/// Index into [`USERS`], taken modulo its length.
pub type UserId = u8;

/// Operations that can be applied to the system.
///
/// Each operation targets one user. Operations on users who are not in the
/// chat are ignored, so any sequence is valid.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// User enters the host chat.
    Join {
        /// Acting user.
        user: UserId,
    },
    /// User leaves the host chat.
    Leave {
        /// Acting user.
        user: UserId,
    },
    /// User creates a channel.
    CreateChannel {
        /// Acting user.
        user: UserId,
    },
    /// User searches for channels.
    SearchChannels {
        /// Acting user.
        user: UserId,
    },
    /// User invites another user.
    Invite {
        /// Acting user.
        user: UserId,
        /// Invited user.
        invitee: UserId,
    },
    /// User joins one of the channels it knows.
    JoinChannel {
        /// Acting user.
        user: UserId,
        /// Which known channel, modulo the number known.
        slot: u8,
    },
    /// User focuses one of the channels it knows.
    Focus {
        /// Acting user.
        user: UserId,
        /// Which known channel, modulo the number known.
        slot: u8,
    },
    /// User returns to the room view.
    Unfocus {
        /// Acting user.
        user: UserId,
    },
    /// User types a chat line.
    Chat {
        /// Acting user.
        user: UserId,
        /// Line content.
        text: SmallText,
    },
    /// User vouches for another user.
    Authorize {
        /// Acting user.
        user: UserId,
        /// User vouched for.
        target: UserId,
    },
    /// A malformed protocol line reaches a user.
    Garbage {
        /// Receiving user.
        user: UserId,
        /// Selects the payload.
        seed: u8,
    },
    /// Advance simulation time.
    AdvanceTime {
        /// Seconds to advance.
        seconds: u8,
    },
}

/// Small chat line for testing.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallText {
    /// Content seed.
    pub seed: u8,
    /// Whether the line is a local command.
    pub command: bool,
}

impl SmallText {
    /// Expand to a chat line.
    pub fn to_line(&self) -> String {
        const COMMANDS: &[&str] =
            &["help", "whoami", "list-users", "list-participants", "join", "bogus", "invite", ""];
        if self.command {
            format!(".{}", COMMANDS[usize::from(self.seed) % COMMANDS.len()])
        } else {
            format!("message {}", self.seed)
        }
    }
}

const GARBAGE: &[&str] = &[
    "#np1sec dance",
    "#np1sec hello",
    "#np1sec join nowhere",
    "#np1sec invite 1",
    "#np1sec channels x:y",
];

/// Resolve a [`UserId`] to a username.
pub fn user(id: UserId) -> &'static str {
    USERS[usize::from(id) % USERS.len()]
}

fn known_channel(network: &SimNetwork, name: &str, slot: u8) -> Option<ChannelId> {
    let session = network.session(name)?;
    let count = session.room().channel_count();
    if count == 0 {
        return None;
    }
    session.room().channels().nth(usize::from(slot) % count).map(|channel| channel.id())
}

impl Operation {
    /// Apply to `network`, delivering all resulting traffic.
    pub fn apply(&self, network: &mut SimNetwork) {
        match *self {
            Self::Join { user: id } => {
                network.join(user(id));
            },
            Self::Leave { user: id } => {
                network.leave(user(id));
            },
            Self::CreateChannel { user: id } => {
                network.type_line(user(id), ".create-channel");
            },
            Self::SearchChannels { user: id } => {
                network.type_line(user(id), ".search-channels");
            },
            Self::Invite { user: id, invitee } => {
                network.with_session(user(id), |session| {
                    session.with_room(|room| room.invite(user(invitee)));
                });
            },
            Self::JoinChannel { user: id, slot } => {
                if let Some(channel) = known_channel(network, user(id), slot) {
                    network.with_session(user(id), |session| {
                        session.with_room(|room| room.join_channel(channel));
                    });
                }
            },
            Self::Focus { user: id, slot } => {
                if let Some(channel) = known_channel(network, user(id), slot) {
                    network.with_session(user(id), |session| session.focus(channel));
                }
            },
            Self::Unfocus { user: id } => {
                network.with_session(user(id), |session| session.unfocus());
            },
            Self::Chat { user: id, ref text } => {
                network.type_line(user(id), &text.to_line());
            },
            Self::Authorize { user: id, target } => {
                network.with_session(user(id), |session| {
                    session.with_room(|room| room.authorize(user(target)));
                });
            },
            Self::Garbage { user: id, seed } => {
                let payload = GARBAGE[usize::from(seed) % GARBAGE.len()];
                network.with_session(user(id), |session| session.received("mallory", payload));
            },
            Self::AdvanceTime { seconds } => {
                network.advance(Duration::from_secs(u64::from(seconds)));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_wrap() {
        assert_eq!(user(0), "alice");
        assert_eq!(user(4), "alice");
        assert_eq!(user(255), USERS[255 % USERS.len()]);
    }

    #[test]
    fn small_text_commands_use_prefix() {
        assert_eq!(SmallText { seed: 0, command: true }.to_line(), ".help");
        assert_eq!(SmallText { seed: 3, command: false }.to_line(), "message 3");
    }

    #[test]
    fn operations_on_absent_users_are_ignored() {
        let mut network = SimNetwork::new(1);
        Operation::CreateChannel { user: 0 }.apply(&mut network);
        Operation::Focus { user: 1, slot: 3 }.apply(&mut network);
        assert_eq!(network.users().count(), 0);
    }
}
