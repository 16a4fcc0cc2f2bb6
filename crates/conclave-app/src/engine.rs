//! Boundary to the secure-messaging engine.
//!
//! The engine owns all cryptography and wire encoding. It is driven
//! synchronously: every call returns the callbacks it produced, in order,
//! and the session feeds them back into the room before executing the next
//! action. Sans-IO engines (the loopback engine in the harness, the mock
//! wire format) and real protocol bindings implement the same trait.

use conclave_core::{ChannelId, EngineCommand, EngineEvent, PublicKey, TimerToken};

use crate::EngineError;

/// Result of a single engine call: the callbacks it produced.
pub type EngineResult = Result<Vec<EngineEvent>, EngineError>;

/// An open engine session for one local identity.
pub trait Engine {
    /// Connect the session to the room.
    fn connect(&mut self) -> EngineResult;

    /// Tear the session down. Must be safe to call when not connected.
    fn disconnect(&mut self) -> EngineResult;

    /// Decode data received from the transport.
    fn receive(&mut self, sender: &str, payload: &str) -> EngineResult;

    /// The host saw `name` leave the underlying chat.
    fn user_left(&mut self, name: &str) -> EngineResult;

    /// Create a new channel. Completion is reported as
    /// [`EngineEvent::CreatedConversation`].
    fn create_channel(&mut self) -> EngineResult;

    /// Enumerate channels. Each is reported as [`EngineEvent::NewChannel`].
    fn search_channels(&mut self) -> EngineResult;

    /// Join an existing channel.
    fn join_channel(&mut self, channel: ChannelId) -> EngineResult;

    /// Invite `name` into `channel`.
    fn invite(&mut self, channel: ChannelId, name: &str, public_key: &PublicKey) -> EngineResult;

    /// Send a chat message to a channel, or to the room when `channel` is `None`.
    fn send_chat(&mut self, channel: Option<ChannelId>, text: &str) -> EngineResult;

    /// Vouch for `name`.
    fn authorize(&mut self, channel: Option<ChannelId>, name: &str) -> EngineResult;

    /// Leave a channel. With `suppress_callback` the engine must not report
    /// [`conclave_core::ChannelEvent::Left`].
    fn leave(&mut self, channel: ChannelId, suppress_callback: bool) -> EngineResult;

    /// A timer requested through [`EngineEvent::SetTimer`] is due.
    fn fire_timer(&mut self, token: TimerToken) -> EngineResult;
}

/// Opens engine sessions.
pub trait EngineFactory {
    /// Session type produced.
    type Engine: Engine;

    /// Open a session for `username` presenting `public_key`.
    fn open(&mut self, username: &str, public_key: &PublicKey) -> Result<Self::Engine, EngineError>;
}

/// Route an [`EngineCommand`] to the matching [`Engine`] method.
///
/// [`EngineCommand::Open`] is handled by the [`EngineFactory`]; passing it
/// here yields [`EngineError::AlreadyOpen`].
pub fn execute<En: Engine + ?Sized>(engine: &mut En, command: &EngineCommand) -> EngineResult {
    match command {
        EngineCommand::Open { .. } => Err(EngineError::AlreadyOpen),
        EngineCommand::Connect => engine.connect(),
        EngineCommand::Disconnect => engine.disconnect(),
        EngineCommand::Receive { sender, payload } => engine.receive(sender, payload),
        EngineCommand::UserLeft { name } => engine.user_left(name),
        EngineCommand::CreateChannel => engine.create_channel(),
        EngineCommand::SearchChannels => engine.search_channels(),
        EngineCommand::JoinChannel { channel } => engine.join_channel(*channel),
        EngineCommand::Invite { channel, name, public_key } => {
            engine.invite(*channel, name, public_key)
        },
        EngineCommand::SendChat { channel, text } => engine.send_chat(*channel, text),
        EngineCommand::Authorize { channel, name } => engine.authorize(*channel, name),
        EngineCommand::Leave { channel, suppress_callback } => {
            engine.leave(*channel, *suppress_callback)
        },
        EngineCommand::FireTimer { token } => engine.fire_timer(*token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Recorder {
        fn record(&mut self, call: String) -> EngineResult {
            self.calls.push(call);
            Ok(Vec::new())
        }
    }

    impl Engine for Recorder {
        fn connect(&mut self) -> EngineResult {
            self.record("connect".into())
        }

        fn disconnect(&mut self) -> EngineResult {
            self.record("disconnect".into())
        }

        fn receive(&mut self, sender: &str, payload: &str) -> EngineResult {
            self.record(format!("receive {sender} {payload}"))
        }

        fn user_left(&mut self, name: &str) -> EngineResult {
            self.record(format!("user_left {name}"))
        }

        fn create_channel(&mut self) -> EngineResult {
            self.record("create_channel".into())
        }

        fn search_channels(&mut self) -> EngineResult {
            self.record("search_channels".into())
        }

        fn join_channel(&mut self, channel: ChannelId) -> EngineResult {
            self.record(format!("join_channel {channel}"))
        }

        fn invite(&mut self, channel: ChannelId, name: &str, _: &PublicKey) -> EngineResult {
            self.record(format!("invite {channel} {name}"))
        }

        fn send_chat(&mut self, channel: Option<ChannelId>, text: &str) -> EngineResult {
            self.record(format!("send_chat {channel:?} {text}"))
        }

        fn authorize(&mut self, channel: Option<ChannelId>, name: &str) -> EngineResult {
            self.record(format!("authorize {channel:?} {name}"))
        }

        fn leave(&mut self, channel: ChannelId, suppress_callback: bool) -> EngineResult {
            self.record(format!("leave {channel} {suppress_callback}"))
        }

        fn fire_timer(&mut self, token: TimerToken) -> EngineResult {
            self.record(format!("fire_timer {token}"))
        }
    }

    #[test]
    fn execute_routes_commands() {
        let mut engine = Recorder::default();
        let channel = ChannelId::new(7);
        let commands = [
            EngineCommand::Connect,
            EngineCommand::JoinChannel { channel },
            EngineCommand::Invite {
                channel,
                name: "bob".into(),
                public_key: PublicKey::from_bytes(vec![1; 32]),
            },
            EngineCommand::Leave { channel, suppress_callback: true },
            EngineCommand::FireTimer { token: TimerToken::new(3) },
        ];
        for command in &commands {
            execute(&mut engine, command).unwrap();
        }

        assert_eq!(
            engine.calls,
            ["connect", "join_channel 7", "invite 7 bob", "leave 7 true", "fire_timer timer#3"]
        );
    }

    #[test]
    fn open_is_not_routed() {
        let mut engine = Recorder::default();
        let open = EngineCommand::Open {
            username: "alice".into(),
            public_key: PublicKey::from_bytes(vec![2; 32]),
        };
        assert_eq!(execute(&mut engine, &open), Err(EngineError::AlreadyOpen));
        assert!(engine.calls.is_empty());
    }
}
