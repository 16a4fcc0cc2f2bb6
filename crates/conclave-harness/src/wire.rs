//! Plain-text wire format spoken by the loopback engine.
//!
//! Every protocol line starts with `#np1sec ` followed by a verb and
//! space-separated arguments. Anything else on the transport is ordinary
//! room chat. Nothing is encrypted; the format exists so that several
//! sessions can be wired together through a shared text transport.
//!
//! ```text
//! #np1sec hello <key-hex>
//! #np1sec welcome <key-hex>
//! #np1sec bye
//! #np1sec list-channels
//! #np1sec channels 1000001:alice,bob 2000001:carol
//! #np1sec created <channel>
//! #np1sec invite <channel> <user>
//! #np1sec join <channel>
//! #np1sec leave <channel>
//! #np1sec chat <channel> <text...>
//! #np1sec say <text...>
//! #np1sec authorize <channel> <user>
//! ```

use std::fmt;

use conclave_core::{ChannelId, PublicKey};

/// Marker that distinguishes protocol lines from chat.
pub const WIRE_PREFIX: &str = "#np1sec ";

/// A decoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Announce presence with a public key.
    Hello {
        /// Sender's key.
        key: PublicKey,
    },
    /// Answer to a hello, so late joiners learn existing users.
    Welcome {
        /// Sender's key.
        key: PublicKey,
    },
    /// The sender is leaving.
    Bye,
    /// Ask every peer for the channels it belongs to.
    ListChannels,
    /// Channels the sender belongs to, with their members.
    Channels(Vec<(ChannelId, Vec<String>)>),
    /// The sender created a channel.
    Created {
        /// New channel.
        channel: ChannelId,
    },
    /// The sender invited `invitee`.
    Invite {
        /// Target channel.
        channel: ChannelId,
        /// Invited user.
        invitee: String,
    },
    /// The sender joined a channel.
    Join {
        /// Joined channel.
        channel: ChannelId,
    },
    /// The sender left a channel.
    Leave {
        /// Departed channel.
        channel: ChannelId,
    },
    /// Chat inside a channel.
    Chat {
        /// Target channel.
        channel: ChannelId,
        /// Message text.
        text: String,
    },
    /// Chat addressed to the whole room.
    Say {
        /// Message text.
        text: String,
    },
    /// The sender vouches for `target`.
    Authorize {
        /// Target channel.
        channel: ChannelId,
        /// User vouched for.
        target: String,
    },
}

/// Why a protocol line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError(String);

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl WireMessage {
    /// Decode a transport payload.
    ///
    /// Returns `Ok(None)` for payloads that are not protocol lines.
    pub fn parse(payload: &str) -> Result<Option<Self>, WireError> {
        let Some(body) = payload.strip_prefix(WIRE_PREFIX) else {
            return Ok(None);
        };
        let (verb, rest) = body.split_once(' ').unwrap_or((body, ""));

        let message = match verb {
            "hello" => Self::Hello { key: key(rest)? },
            "welcome" => Self::Welcome { key: key(rest)? },
            "bye" => Self::Bye,
            "list-channels" => Self::ListChannels,
            "channels" => Self::Channels(
                rest.split_whitespace().map(channel_entry).collect::<Result<_, _>>()?,
            ),
            "created" => Self::Created { channel: channel(rest)? },
            "invite" => {
                let (id, invitee) = pair(rest)?;
                Self::Invite { channel: channel(id)?, invitee: invitee.to_owned() }
            },
            "join" => Self::Join { channel: channel(rest)? },
            "leave" => Self::Leave { channel: channel(rest)? },
            "chat" => {
                let (id, text) = rest.split_once(' ').unwrap_or((rest, ""));
                Self::Chat { channel: channel(id)?, text: text.to_owned() }
            },
            "say" => Self::Say { text: rest.to_owned() },
            "authorize" => {
                let (id, target) = pair(rest)?;
                Self::Authorize { channel: channel(id)?, target: target.to_owned() }
            },
            other => return Err(WireError(format!("unknown verb {other:?}"))),
        };
        Ok(Some(message))
    }

    /// Encode as a transport payload.
    pub fn encode(&self) -> String {
        let body = match self {
            Self::Hello { key } => format!("hello {}", hex::encode(key.as_bytes())),
            Self::Welcome { key } => format!("welcome {}", hex::encode(key.as_bytes())),
            Self::Bye => "bye".to_owned(),
            Self::ListChannels => "list-channels".to_owned(),
            Self::Channels(channels) => {
                let mut line = "channels".to_owned();
                for (id, members) in channels {
                    line.push_str(&format!(" {id}:{}", members.join(",")));
                }
                line
            },
            Self::Created { channel } => format!("created {channel}"),
            Self::Invite { channel, invitee } => format!("invite {channel} {invitee}"),
            Self::Join { channel } => format!("join {channel}"),
            Self::Leave { channel } => format!("leave {channel}"),
            Self::Chat { channel, text } => format!("chat {channel} {text}"),
            Self::Say { text } => format!("say {text}"),
            Self::Authorize { channel, target } => format!("authorize {channel} {target}"),
        };
        format!("{WIRE_PREFIX}{body}")
    }
}

fn key(text: &str) -> Result<PublicKey, WireError> {
    let bytes = hex::decode(text.trim()).map_err(|err| WireError(format!("bad key: {err}")))?;
    if bytes.is_empty() {
        return Err(WireError("empty key".to_owned()));
    }
    Ok(PublicKey::from_bytes(bytes))
}

fn channel(text: &str) -> Result<ChannelId, WireError> {
    text.trim().parse().map_err(|_| WireError(format!("bad channel id {text:?}")))
}

fn pair(text: &str) -> Result<(&str, &str), WireError> {
    let mut words = text.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(first), Some(second), None) => Ok((first, second)),
        _ => Err(WireError(format!("expected two arguments, got {text:?}"))),
    }
}

fn channel_entry(text: &str) -> Result<(ChannelId, Vec<String>), WireError> {
    let (id, members) =
        text.split_once(':').ok_or_else(|| WireError(format!("bad channel entry {text:?}")))?;
    let members = members.split(',').filter(|name| !name.is_empty()).map(str::to_owned).collect();
    Ok((channel(id)?, members))
}
