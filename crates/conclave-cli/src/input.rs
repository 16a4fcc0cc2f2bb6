//! Console input parsing.
//!
//! Lines starting with [`HOST_PREFIX`] play the role of the host chat
//! client: they move focus, inject transport data, or report users leaving.
//! Every other line is typed chat and goes to the room unchanged, where
//! room commands (`.help`, `.invite bob`, ...) are recognized.

use conclave_app::HostEvent;
use conclave_core::ChannelId;
use thiserror::Error;

/// Marks a line as a host directive.
pub const HOST_PREFIX: char = ':';

/// A host directive could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Unrecognized directive name.
    #[error("unknown directive :{0}; try :help")]
    Unknown(String),

    /// A required argument is missing.
    #[error(":{directive} needs {argument}")]
    Missing {
        /// Directive name.
        directive: &'static str,
        /// Missing argument.
        argument: &'static str,
    },

    /// A channel id is not a number.
    #[error("invalid channel id {0:?}")]
    BadChannel(String),
}

/// What a console line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the runtime.
    Host(HostEvent),
    /// Print the directive summary.
    Help,
}

/// Directive summary shown by `:help`.
pub const HELP: &[(&str, &str)] = &[
    (":focus <id>", "send chat to a channel"),
    (":unfocus", "send chat to the room"),
    (":recv <sender> <payload>", "inject transport data"),
    (":left <name>", "report a user leaving the chat"),
    (":part", "leave the chat"),
    (":rejoin", "rejoin the chat"),
    (":quit", "exit"),
];

/// Parse one console line.
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let Some(directive) = line.strip_prefix(HOST_PREFIX) else {
        return Ok(Input::Host(HostEvent::Line(line.to_owned())));
    };
    let (name, rest) = directive.split_once(' ').unwrap_or((directive, ""));
    let rest = rest.trim();

    let event = match name {
        "help" => return Ok(Input::Help),
        "focus" => HostEvent::Focus(channel(rest)?),
        "unfocus" => HostEvent::Unfocus,
        "recv" => {
            let (sender, payload) = rest
                .split_once(' ')
                .ok_or(InputError::Missing { directive: "recv", argument: "a sender and a payload" })?;
            HostEvent::Received { sender: sender.to_owned(), payload: payload.to_owned() }
        },
        "left" => {
            if rest.is_empty() {
                return Err(InputError::Missing { directive: "left", argument: "a name" });
            }
            HostEvent::UserLeft { name: rest.to_owned() }
        },
        "part" => HostEvent::ChatLeft,
        "rejoin" => HostEvent::ChatJoined,
        "quit" => HostEvent::Quit,
        other => return Err(InputError::Unknown(other.to_owned())),
    };
    Ok(Input::Host(event))
}

fn channel(text: &str) -> Result<ChannelId, InputError> {
    if text.is_empty() {
        return Err(InputError::Missing { directive: "focus", argument: "a channel id" });
    }
    text.parse().map_err(|_| InputError::BadChannel(text.to_owned()))
}
