//! Local command mini-language.
//!
//! Chat lines that start with the configured prefix (default `.`) are
//! commands rather than messages. The first word selects the command, the
//! rest are whitespace-separated arguments. Which commands are valid depends
//! on where the line was typed: [`CommandScope::Room`] or [`CommandScope::Channel`].

use std::{fmt, str::SplitWhitespace};

use crate::{error::ParseError, ids::ChannelId};

/// A parsed local command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the commands available here.
    Help,
    /// Print own username and key fingerprint.
    Whoami,
    /// List users in the room roster.
    ListUsers,
    /// List participants of the current channel.
    ListParticipants,
    /// Ask the engine to enumerate channels.
    SearchChannels,
    /// Create a new channel.
    CreateChannel,
    /// Join a channel by id.
    JoinChannel {
        /// Target channel.
        channel: ChannelId,
    },
    /// Join the current channel.
    Join,
    /// Invite a user.
    Invite {
        /// Invitee username.
        name: String,
    },
    /// Vouch for a user.
    Authorize {
        /// Target username.
        name: String,
    },
}

/// Where a command line was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    /// The room-wide conversation.
    Room,
    /// A channel conversation.
    Channel,
}

const ROOM_HELP: &[(&str, &str)] = &[
    ("help", "show this list"),
    ("whoami", "show your username and key fingerprint"),
    ("list-users", "list users in the room"),
    ("search-channels", "ask for the list of channels"),
    ("create-channel", "create a new channel"),
    ("join-channel <id>", "join an existing channel"),
    ("invite <user>", "create a channel and invite a user to it"),
    ("authorize <user>", "vouch for a user"),
];

const CHANNEL_HELP: &[(&str, &str)] = &[
    ("help", "show this list"),
    ("whoami", "show your username and key fingerprint"),
    ("list-users", "list users in the room"),
    ("list-participants", "list participants of this channel"),
    ("invite <user>", "invite a user to this channel"),
    ("join", "join this channel"),
    ("authorize <user>", "vouch for a user in this channel"),
];

impl Command {
    /// Parse command text with the prefix already stripped.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut words = text.split_whitespace();
        let Some(word) = words.next() else {
            return Err(ParseError::Empty);
        };

        let command = match word {
            "help" => Self::Help,
            "whoami" => Self::Whoami,
            "list-users" => Self::ListUsers,
            "list-participants" => Self::ListParticipants,
            "search-channels" => Self::SearchChannels,
            "create-channel" => Self::CreateChannel,
            "join" => Self::Join,
            "join-channel" => {
                let raw = required(&mut words, "join-channel", "id")?;
                let channel = raw.parse().map_err(|_| ParseError::InvalidChannelId(raw.to_owned()))?;
                Self::JoinChannel { channel }
            },
            "invite" => Self::Invite { name: required(&mut words, "invite", "user")?.to_owned() },
            "authorize" => {
                Self::Authorize { name: required(&mut words, "authorize", "user")?.to_owned() }
            },
            other => return Err(ParseError::UnknownCommand(other.to_owned())),
        };

        if let Some(extra) = words.next() {
            return Err(ParseError::UnexpectedArgument {
                command: command.name(),
                argument: extra.to_owned(),
            });
        }

        Ok(command)
    }

    /// Keyword that selects this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Whoami => "whoami",
            Self::ListUsers => "list-users",
            Self::ListParticipants => "list-participants",
            Self::SearchChannels => "search-channels",
            Self::CreateChannel => "create-channel",
            Self::JoinChannel { .. } => "join-channel",
            Self::Join => "join",
            Self::Invite { .. } => "invite",
            Self::Authorize { .. } => "authorize",
        }
    }

    /// True if the command makes sense in `scope`.
    pub fn is_available_in(&self, scope: CommandScope) -> bool {
        match self {
            Self::Help | Self::Whoami | Self::ListUsers | Self::Invite { .. } | Self::Authorize { .. } => true,
            Self::SearchChannels | Self::CreateChannel | Self::JoinChannel { .. } => scope == CommandScope::Room,
            Self::ListParticipants | Self::Join => scope == CommandScope::Channel,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinChannel { channel } => write!(f, "join-channel {channel}"),
            Self::Invite { name } => write!(f, "invite {name}"),
            Self::Authorize { name } => write!(f, "authorize {name}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Help text for `scope`, one command per line.
pub fn help_lines(prefix: char, scope: CommandScope) -> Vec<String> {
    let table = match scope {
        CommandScope::Room => ROOM_HELP,
        CommandScope::Channel => CHANNEL_HELP,
    };
    table.iter().map(|(usage, about)| format!("{prefix}{usage}: {about}")).collect()
}

fn required<'a>(
    words: &mut SplitWhitespace<'a>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, ParseError> {
    words.next().ok_or(ParseError::MissingArgument { command, argument })
}
