//! Property-based tests for session action execution.
//!
//! Follow-up commands produced by an engine callback run before any action
//! that was already queued, so a batch of invitations always pairs each new
//! channel with its own invitee, and room chat leaves in typing order.

use std::{
    collections::BTreeSet,
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use conclave_app::{Engine, EngineError, EngineFactory, EngineResult, Presentation, Session};
use conclave_core::{
    ChannelEvent, ChannelId, EngineEvent, Environment, Level, PublicKey, Room, RoomAction, RoomConfig,
    TimerToken,
};
use proptest::prelude::*;

#[derive(Clone)]
struct FixedEnv {
    base: Instant,
}

impl Environment for FixedEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}

type CallLog = Arc<Mutex<Vec<String>>>;

/// Engine that answers invitations and room chat the way a cooperative
/// engine would, and records the calls that matter here.
struct EchoEngine {
    user: String,
    next_channel: u64,
    log: CallLog,
}

impl Engine for EchoEngine {
    fn connect(&mut self) -> EngineResult {
        Ok(vec![EngineEvent::Connected])
    }

    fn disconnect(&mut self) -> EngineResult {
        Ok(Vec::new())
    }

    fn receive(&mut self, sender: &str, _payload: &str) -> EngineResult {
        Ok(vec![EngineEvent::UserJoined { name: sender.into(), public_key: PublicKey::from_bytes(vec![7; 32]) }])
    }

    fn user_left(&mut self, name: &str) -> EngineResult {
        Ok(vec![EngineEvent::UserLeft { name: name.into() }])
    }

    fn create_channel(&mut self) -> EngineResult {
        self.next_channel += 1;
        self.log.lock().unwrap().push(format!("create {}", self.next_channel));
        Ok(vec![EngineEvent::CreatedConversation { channel: ChannelId::new(self.next_channel) }])
    }

    fn search_channels(&mut self) -> EngineResult {
        Ok(Vec::new())
    }

    fn join_channel(&mut self, channel: ChannelId) -> EngineResult {
        Ok(vec![EngineEvent::JoinedChannel { channel }])
    }

    fn invite(&mut self, channel: ChannelId, name: &str, _: &PublicKey) -> EngineResult {
        self.log.lock().unwrap().push(format!("invite {channel} {name}"));
        Ok(vec![EngineEvent::Channel {
            channel,
            event: ChannelEvent::UserInvited { inviter: self.user.clone(), invitee: name.into() },
        }])
    }

    fn send_chat(&mut self, channel: Option<ChannelId>, text: &str) -> EngineResult {
        Ok(match channel {
            Some(_) => Vec::new(),
            None => vec![EngineEvent::SendMessage { payload: text.into() }],
        })
    }

    fn authorize(&mut self, _channel: Option<ChannelId>, _name: &str) -> EngineResult {
        Ok(Vec::new())
    }

    fn leave(&mut self, _channel: ChannelId, _suppress_callback: bool) -> EngineResult {
        Ok(Vec::new())
    }

    fn fire_timer(&mut self, _token: TimerToken) -> EngineResult {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct EchoFactory {
    log: CallLog,
}

impl EngineFactory for EchoFactory {
    type Engine = EchoEngine;

    fn open(&mut self, username: &str, _: &PublicKey) -> Result<EchoEngine, EngineError> {
        Ok(EchoEngine { user: username.into(), next_channel: 0, log: Arc::clone(&self.log) })
    }
}

struct Quiet;

impl Presentation for Quiet {
    fn display(&mut self, _channel: Option<ChannelId>, _sender: &str, _text: &str) {}

    fn inform(&mut self, _channel: Option<ChannelId>, _level: Level, _message: &str) {}
}

#[derive(Debug, Clone)]
enum Step {
    Arrive(String),
    Say(String),
    /// Invitations issued together, before any of them is executed.
    Invite(Vec<String>),
}

const NAMES: &[&str] = &["alice", "bob", "carol", "dave", "erin"];

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES).prop_map(str::to_owned)
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => name().prop_map(Step::Arrive),
        2 => "[a-z]{1,8}".prop_map(Step::Say),
        3 => prop::collection::vec(name(), 1..5).prop_map(Step::Invite),
    ]
}

proptest! {
    #[test]
    fn prop_follow_ups_run_before_queued_actions(steps in prop::collection::vec(step(), 0..24)) {
        let factory = EchoFactory::default();
        let log = Arc::clone(&factory.log);
        let room = Room::new(FixedEnv { base: Instant::now() }, "alice", RoomConfig::default());
        let mut session = Session::new(room, factory, Quiet);
        session.chat_joined();
        session.start();

        let mut roster = BTreeSet::new();
        let mut expected_invites = Vec::new();
        let mut expected_chat = Vec::new();
        for step in steps {
            match step {
                Step::Arrive(name) => {
                    session.received(name.as_str(), "hello");
                    roster.insert(name);
                },
                Step::Say(text) => {
                    session.send_line(text.as_str());
                    expected_chat.push(text);
                },
                Step::Invite(names) => {
                    expected_invites
                        .extend(names.iter().filter(|name| *name != "alice" && roster.contains(*name)).cloned());
                    session.with_room(|room| {
                        names.iter().flat_map(|name| room.invite(name)).collect::<Vec<RoomAction>>()
                    });
                },
            }
        }

        let expected_log: Vec<String> = expected_invites
            .iter()
            .zip(1u64..)
            .flat_map(|(name, channel)| [format!("create {channel}"), format!("invite {channel} {name}")])
            .collect();
        prop_assert_eq!(log.lock().unwrap().clone(), expected_log);
        prop_assert_eq!(session.take_outgoing(), expected_chat);
        prop_assert_eq!(session.room().pending_invites().count(), 0);
        prop_assert_eq!(session.room().channel_count(), expected_invites.len());
    }
}
