//! Room integration tests.
//!
//! Drives a [`Room`] with scripted engine callbacks and presentation calls,
//! asserting on returned actions and observable state.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use conclave_core::{
    ChannelEvent, ChannelId, ConnectionState, EngineCommand, EngineEvent, Environment, Level, PublicKey,
    Room, RoomAction, RoomConfig, RoomEvent, TimerToken,
};

#[derive(Clone)]
struct TestEnv {
    base: Instant,
    counter: Arc<AtomicU64>,
}

impl TestEnv {
    fn new() -> Self {
        Self { base: Instant::now(), counter: Arc::new(AtomicU64::new(1)) }
    }
}

impl Environment for TestEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.counter.fetch_add(1, Ordering::Relaxed) as u8;
        }
    }
}

fn key(byte: u8) -> PublicKey {
    PublicKey::from_bytes(vec![byte; 32])
}

fn id(raw: u64) -> ChannelId {
    ChannelId::new(raw)
}

fn new_room(config: RoomConfig) -> Room<TestEnv> {
    Room::new(TestEnv::new(), "alice@example.org", config)
}

fn started_room() -> Room<TestEnv> {
    let mut room = new_room(RoomConfig::default());
    room.chat_joined();
    room.start();
    engine(&mut room, EngineEvent::Connected);
    room
}

fn engine(room: &mut Room<TestEnv>, event: EngineEvent) -> Vec<RoomAction> {
    room.handle(RoomEvent::Engine(event))
}

fn channel_event(room: &mut Room<TestEnv>, channel: u64, event: ChannelEvent) -> Vec<RoomAction> {
    engine(room, EngineEvent::Channel { channel: id(channel), event })
}

fn join_room(room: &mut Room<TestEnv>, name: &str, byte: u8) {
    engine(room, EngineEvent::UserJoined { name: name.into(), public_key: key(byte) });
}

fn commands(actions: &[RoomAction]) -> Vec<EngineCommand> {
    actions
        .iter()
        .filter_map(|action| match action {
            RoomAction::Engine(command) => Some(command.clone()),
            _ => None,
        })
        .collect()
}

fn messages(actions: &[RoomAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|action| match action {
            RoomAction::Inform { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn has_warning(actions: &[RoomAction]) -> bool {
    actions.iter().any(|action| matches!(action, RoomAction::Inform { level: Level::Warning, .. }))
}

#[test]
fn username_is_sanitized() {
    let room = new_room(RoomConfig::default());
    assert_eq!(room.username(), "alice");
}

#[test]
fn start_is_idempotent() {
    let mut room = new_room(RoomConfig::default());

    let first = room.start();
    let second = room.start();

    let opens = commands(&first)
        .into_iter()
        .chain(commands(&second))
        .filter(|command| matches!(command, EngineCommand::Open { .. }))
        .count();
    assert_eq!(opens, 1);
    assert!(second.is_empty());
    assert!(room.is_started());
    assert_eq!(room.connection_state(), ConnectionState::Connecting);
}

#[test]
fn start_opens_session_for_local_identity() {
    let mut room = new_room(RoomConfig::default());
    let actions = room.start();

    assert_eq!(
        commands(&actions),
        vec![
            EngineCommand::Open { username: "alice".into(), public_key: room.identity().public_key() },
            EngineCommand::Connect,
        ]
    );
}

#[test]
fn connect_without_auto_connect() {
    let mut room = new_room(RoomConfig { auto_connect: false, ..RoomConfig::default() });

    let actions = room.start();
    assert_eq!(commands(&actions).len(), 1);
    assert_eq!(room.connection_state(), ConnectionState::Disconnected);

    let actions = room.connect();
    assert_eq!(commands(&actions), vec![EngineCommand::Connect]);
    assert!(room.connect().is_empty());
}

#[test]
fn disabled_protocol_relays_plain_text() {
    let mut room = new_room(RoomConfig { protocol_enabled: false, ..RoomConfig::default() });

    let actions = room.start();
    assert!(!room.is_started());
    assert_eq!(messages(&actions), vec!["secure messaging is disabled for this conversation"]);

    let actions = room.send_chat_message(".help".into());
    assert_eq!(actions, vec![RoomAction::Transmit { payload: ".help".into() }]);
}

#[test]
fn channel_self_destructs_when_last_participant_leaves() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::CreatedConversation { channel: id(1) });
    engine(&mut room, EngineEvent::NewChannel { channel: id(2), members: vec!["bob".into(), "carol".into()] });
    assert_eq!(room.channel_count(), 2);

    let actions = channel_event(&mut room, 1, ChannelEvent::UserLeft { name: "alice".into() });

    assert!(room.channel(id(1)).is_none());
    assert_eq!(room.channel_count(), 1);
    assert_eq!(room.channel(id(2)).map(|channel| channel.len()), Some(2));
    assert!(actions.contains(&RoomAction::ChannelRemoved { channel: id(1) }));
}

#[test]
fn departure_purges_authorizations() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::NewChannel {
        channel: id(3),
        members: vec!["alice".into(), "bob".into(), "carol".into()],
    });
    channel_event(&mut room, 3, ChannelEvent::UserAuthorizedBy { authorizer: "bob".into(), target: "alice".into() });
    channel_event(&mut room, 3, ChannelEvent::UserAuthorizedBy { authorizer: "carol".into(), target: "alice".into() });

    channel_event(&mut room, 3, ChannelEvent::UserLeft { name: "carol".into() });

    let channel = room.channel(id(3)).unwrap();
    let alice = channel.participant("alice").unwrap();
    assert!(alice.was_authorized_by("bob"));
    assert!(!alice.was_authorized_by("carol"));
    assert_eq!(alice.authorizers().len(), 2);
}

#[test]
fn queued_invites_pair_with_created_channels_in_order() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);
    join_room(&mut room, "carol", 3);

    let first = room.invite("bob");
    let second = room.invite("carol");
    assert_eq!(commands(&first), vec![EngineCommand::CreateChannel]);
    assert_eq!(commands(&second), vec![EngineCommand::CreateChannel]);
    assert_eq!(room.pending_invites().count(), 2);

    let created_first = engine(&mut room, EngineEvent::CreatedConversation { channel: id(10) });
    let created_second = engine(&mut room, EngineEvent::CreatedConversation { channel: id(11) });

    assert_eq!(
        commands(&created_first),
        vec![EngineCommand::Invite { channel: id(10), name: "bob".into(), public_key: key(2) }]
    );
    assert_eq!(
        commands(&created_second),
        vec![EngineCommand::Invite { channel: id(11), name: "carol".into(), public_key: key(3) }]
    );
    assert_eq!(room.pending_invites().count(), 0);
}

#[test]
fn created_channel_without_queued_invites_issues_nothing() {
    let mut room = started_room();
    let actions = engine(&mut room, EngineEvent::CreatedConversation { channel: id(4) });

    assert!(commands(&actions).is_empty());
    assert!(actions.contains(&RoomAction::ChannelOpened { channel: id(4) }));
    assert!(room.channel(id(4)).unwrap().is_joined());
}

#[test]
fn invite_join_leave_scenario() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);

    engine(&mut room, EngineEvent::CreatedConversation { channel: id(1) });
    room.focus(id(1));
    let actions = room.invite("bob");
    assert_eq!(
        commands(&actions),
        vec![EngineCommand::Invite { channel: id(1), name: "bob".into(), public_key: key(2) }]
    );

    channel_event(&mut room, 1, ChannelEvent::UserInvited { inviter: "alice".into(), invitee: "bob".into() });
    assert!(room.channel(id(1)).unwrap().participant("bob").unwrap().is_invited());

    channel_event(&mut room, 1, ChannelEvent::UserPromoted { name: "alice".into() });
    channel_event(&mut room, 1, ChannelEvent::UserAuthorizedBy { authorizer: "alice".into(), target: "bob".into() });
    channel_event(&mut room, 1, ChannelEvent::UserJoined { name: "bob".into() });
    {
        let channel = room.channel(id(1)).unwrap();
        assert!(!channel.participant("alice").unwrap().is_promoted());
        let bob = channel.participant("bob").unwrap();
        assert!(bob.is_joined());
        assert!(!bob.is_promoted());
    }

    channel_event(&mut room, 1, ChannelEvent::UserLeft { name: "alice".into() });

    let channel = room.channel(id(1)).unwrap();
    assert_eq!(channel.len(), 1);
    assert!(!channel.participant("bob").unwrap().was_authorized_by("alice"));
}

#[test]
fn invitation_received_then_joined() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);

    let actions = engine(&mut room, EngineEvent::InvitedToConversation { channel: id(5), inviter: "bob".into() });
    assert!(actions.contains(&RoomAction::ChannelOpened { channel: id(5) }));
    assert!(messages(&actions).iter().any(|m| m.contains("bob invited you")));

    room.focus(id(5));
    let rejected = room.send_chat_message("hello".into());
    assert_eq!(messages(&rejected), vec!["you have not joined the conversation yet"]);

    let actions = room.send_chat_message(".join".into());
    assert_eq!(commands(&actions), vec![EngineCommand::JoinChannel { channel: id(5) }]);

    engine(&mut room, EngineEvent::JoinedChannel { channel: id(5) });
    let actions = room.send_chat_message("hello".into());
    assert_eq!(
        commands(&actions),
        vec![EngineCommand::SendChat { channel: Some(id(5)), text: "hello".into() }]
    );

    let again = room.join();
    assert_eq!(messages(&again), vec!["you have already joined channel 5"]);
}

#[test]
fn leaving_before_joining_closes_view() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);
    engine(&mut room, EngineEvent::InvitedToConversation { channel: id(6), inviter: "bob".into() });
    room.focus(id(6));

    let actions = channel_event(&mut room, 6, ChannelEvent::Left);

    assert!(actions.contains(&RoomAction::CloseView { channel: id(6) }));
    assert!(actions.contains(&RoomAction::ChannelRemoved { channel: id(6) }));
    assert_eq!(room.focused(), None);
}

#[test]
fn duplicate_channel_is_dropped() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::NewChannel { channel: id(7), members: vec!["bob".into()] });

    let actions = engine(&mut room, EngineEvent::CreatedConversation { channel: id(7) });

    assert!(has_warning(&actions));
    let channel = room.channel(id(7)).unwrap();
    assert!(!channel.contains("alice"));
    assert_eq!(channel.len(), 1);
}

#[test]
fn events_for_unknown_channel_are_dropped() {
    let mut room = started_room();
    let actions = channel_event(&mut room, 99, ChannelEvent::UserJoined { name: "bob".into() });
    assert_eq!(messages(&actions), vec!["protocol violation: unknown channel 99"]);
    assert_eq!(room.channel_count(), 0);
}

#[test]
fn authorization_by_absent_user_is_dropped() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::NewChannel { channel: id(8), members: vec!["alice".into(), "bob".into()] });

    let actions = channel_event(
        &mut room,
        8,
        ChannelEvent::UserAuthorizedBy { authorizer: "mallory".into(), target: "bob".into() },
    );

    assert!(has_warning(&actions));
    assert!(!room.channel(id(8)).unwrap().participant("bob").unwrap().was_authorized_by("mallory"));
}

#[test]
fn room_departure_fans_out_to_channels() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);
    engine(&mut room, EngineEvent::NewChannel { channel: id(1), members: vec!["alice".into(), "bob".into()] });
    engine(&mut room, EngineEvent::NewChannel { channel: id(2), members: vec!["bob".into()] });

    let actions = engine(&mut room, EngineEvent::UserLeft { name: "bob".into() });

    assert!(!room.roster().contains("bob"));
    assert!(!room.channel(id(1)).unwrap().contains("bob"));
    assert!(room.channel(id(2)).is_none());
    assert!(actions.contains(&RoomAction::ChannelRemoved { channel: id(2) }));
}

#[test]
fn unknown_roster_departure_is_dropped() {
    let mut room = started_room();
    let actions = engine(&mut room, EngineEvent::UserLeft { name: "ghost".into() });
    assert!(has_warning(&actions));
}

#[test]
fn departure_reaches_channel_members_missing_from_roster() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);
    engine(&mut room, EngineEvent::NewChannel { channel: id(4), members: vec!["bob".into(), "dave".into()] });
    engine(&mut room, EngineEvent::NewChannel { channel: id(5), members: vec!["dave".into()] });
    channel_event(&mut room, 4, ChannelEvent::UserAuthorizedBy { authorizer: "dave".into(), target: "bob".into() });

    let actions = engine(&mut room, EngineEvent::UserLeft { name: "dave".into() });

    let channel = room.channel(id(4)).unwrap();
    assert!(!channel.contains("dave"));
    assert!(!channel.participant("bob").unwrap().was_authorized_by("dave"));
    assert!(room.channel(id(5)).is_none());
    assert!(actions.contains(&RoomAction::ChannelRemoved { channel: id(5) }));
    assert_eq!(
        actions
            .iter()
            .filter(|action| matches!(action, RoomAction::Inform { channel: None, level: Level::Warning, .. }))
            .count(),
        1
    );
    assert!(room.roster().contains("bob"));
}

#[test]
fn removed_channel_loses_focus() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::CreatedConversation { channel: id(3) });
    room.focus(id(3));
    assert_eq!(room.focused(), Some(id(3)));

    engine(&mut room, EngineEvent::ChannelRemoved { channel: id(3) });

    assert_eq!(room.focused(), None);
    let actions = engine(&mut room, EngineEvent::ChannelRemoved { channel: id(3) });
    assert!(has_warning(&actions));
}

#[test]
fn focusing_unknown_channel_is_rejected() {
    let mut room = started_room();
    let actions = room.focus(id(42));
    assert_eq!(messages(&actions), vec!["channel id \"42\" not found"]);
    assert_eq!(room.focused(), None);
}

#[test]
fn local_commands_are_echoed_and_interpreted() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);

    let actions = room.send_chat_message(".list-users".into());
    let lines = messages(&actions);
    assert_eq!(lines[0], "$ .list-users");
    assert_eq!(lines[1], format!("bob ({})", key(2)));

    let actions = room.send_chat_message(".whoami".into());
    assert_eq!(messages(&actions)[1], format!("alice ({})", room.identity().public_key()));

    let actions = room.send_chat_message(".search-channels".into());
    assert_eq!(commands(&actions), vec![EngineCommand::SearchChannels]);
}

#[test]
fn malformed_commands_are_reported_without_mutation() {
    let mut room = started_room();

    let actions = room.send_chat_message(".dance".into());
    assert_eq!(messages(&actions), vec!["$ .dance", "\"dance\" is not a valid command"]);

    let actions = room.send_chat_message(".join-channel nine".into());
    assert_eq!(messages(&actions)[1], "\"nine\" is not a valid channel id");

    let actions = room.send_chat_message(".join-channel 9".into());
    assert_eq!(messages(&actions)[1], "channel id \"9\" not found");

    let actions = room.send_chat_message(".list-participants".into());
    assert_eq!(messages(&actions)[1], "list-participants is not available outside a channel");

    assert_eq!(room.channel_count(), 0);
    assert_eq!(room.pending_invites().count(), 0);
}

#[test]
fn inviting_unknown_user_is_rejected() {
    let mut room = started_room();
    let actions = room.send_chat_message(".invite zed".into());
    assert_eq!(messages(&actions)[1], "no such user \"zed\"");
    assert!(commands(&actions).is_empty());
    assert_eq!(room.pending_invites().count(), 0);
}

#[test]
fn commands_before_start_are_rejected() {
    let mut room = new_room(RoomConfig::default());
    let actions = room.create_channel();
    assert_eq!(messages(&actions), vec!["the secure session has not been started"]);

    let actions = room.send_chat_message("hi".into());
    assert_eq!(messages(&actions), vec!["the secure session has not been started"]);
}

#[test]
fn room_chat_goes_to_engine_without_focus() {
    let mut room = started_room();
    let actions = room.send_chat_message("hello all".into());
    assert_eq!(commands(&actions), vec![EngineCommand::SendChat { channel: None, text: "hello all".into() }]);
}

#[test]
fn engine_output_is_transmitted() {
    let mut room = started_room();
    let actions = engine(&mut room, EngineEvent::SendMessage { payload: "ciphertext".into() });
    assert_eq!(actions, vec![RoomAction::Transmit { payload: "ciphertext".into() }]);
}

#[test]
fn room_messages_are_displayed_in_room_view() {
    let mut room = started_room();
    let actions = engine(&mut room, EngineEvent::RoomMessage { sender: "bob".into(), text: "hi".into() });
    assert_eq!(actions, vec![RoomAction::Display { channel: None, sender: "bob".into(), text: "hi".into() }]);
}

#[test]
fn received_data_is_forwarded_once_started() {
    let mut room = new_room(RoomConfig::default());
    let event = RoomEvent::ReceivedData { sender: "bob".into(), payload: "blob".into() };
    assert!(room.handle(event.clone()).is_empty());

    room.start();
    assert_eq!(
        commands(&room.handle(event)),
        vec![EngineCommand::Receive { sender: "bob".into(), payload: "blob".into() }]
    );
}

#[test]
fn timers_fire_once_at_deadline() {
    let mut room = started_room();
    let base = room.timers().next_deadline();
    assert!(base.is_none());

    engine(&mut room, EngineEvent::SetTimer { token: TimerToken::new(1), interval: Duration::from_secs(5) });
    engine(&mut room, EngineEvent::SetTimer { token: TimerToken::new(2), interval: Duration::from_secs(2) });
    let deadline = room.timers().deadline(TimerToken::new(1)).unwrap();
    let start = deadline - Duration::from_secs(5);

    assert!(room.handle(RoomEvent::Tick { now: start + Duration::from_secs(1) }).is_empty());

    let fired = room.handle(RoomEvent::Tick { now: start + Duration::from_secs(5) });
    assert_eq!(
        commands(&fired),
        vec![
            EngineCommand::FireTimer { token: TimerToken::new(2) },
            EngineCommand::FireTimer { token: TimerToken::new(1) },
        ]
    );
    assert!(room.handle(RoomEvent::Tick { now: start + Duration::from_secs(60) }).is_empty());
}

#[test]
fn unset_unknown_timer_is_violation() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::SetTimer { token: TimerToken::new(1), interval: Duration::from_secs(1) });
    assert!(engine(&mut room, EngineEvent::UnsetTimer { token: TimerToken::new(1) }).is_empty());

    let actions = engine(&mut room, EngineEvent::UnsetTimer { token: TimerToken::new(1) });
    assert!(has_warning(&actions));
}

#[test]
fn disconnection_clears_session_state() {
    let mut room = started_room();
    join_room(&mut room, "bob", 2);
    engine(&mut room, EngineEvent::CreatedConversation { channel: id(1) });
    engine(&mut room, EngineEvent::SetTimer { token: TimerToken::new(1), interval: Duration::from_secs(1) });
    room.invite_by_creating_channel("bob", key(2));

    let actions = engine(&mut room, EngineEvent::Disconnected);

    assert_eq!(room.connection_state(), ConnectionState::Disconnected);
    assert_eq!(room.channel_count(), 0);
    assert!(room.roster().is_empty());
    assert!(room.timers().is_empty());
    assert_eq!(room.pending_invites().count(), 0);
    assert!(actions.contains(&RoomAction::ChannelRemoved { channel: id(1) }));
}

#[test]
fn chat_left_disconnects_and_chat_joined_reconnects() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::CreatedConversation { channel: id(1) });

    let actions = room.chat_left();
    assert_eq!(commands(&actions), vec![EngineCommand::Disconnect]);
    assert_eq!(room.channel_count(), 0);

    let actions = room.chat_joined();
    assert_eq!(commands(&actions), vec![EngineCommand::Connect]);
}

#[test]
fn close_leaves_joined_channels_silently() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::CreatedConversation { channel: id(1) });
    engine(&mut room, EngineEvent::NewChannel { channel: id(2), members: vec!["bob".into()] });

    let actions = room.close();

    assert_eq!(
        commands(&actions),
        vec![
            EngineCommand::Leave { channel: id(1), suppress_callback: true },
            EngineCommand::Disconnect,
        ]
    );
    assert!(!room.is_started());
    assert_eq!(room.channel_count(), 0);
}

#[test]
fn host_departure_is_forwarded_to_engine() {
    let mut room = new_room(RoomConfig::default());
    assert!(room.host_user_left("bob").is_empty());

    room.start();
    assert_eq!(commands(&room.host_user_left("bob")), vec![EngineCommand::UserLeft { name: "bob".into() }]);
}

#[test]
fn authentication_failure_is_reported_as_error() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::NewChannel { channel: id(1), members: vec!["alice".into(), "bob".into()] });

    let actions = channel_event(&mut room, 1, ChannelEvent::UserAuthenticationFailed { name: "bob".into() });

    assert!(actions.iter().any(|action| matches!(action, RoomAction::Inform { level: Level::Error, .. })));
    assert!(room.channel(id(1)).unwrap().participant("bob").unwrap().authentication_failed());
}

#[test]
fn messages_are_displayed_in_channel_view() {
    let mut room = started_room();
    engine(&mut room, EngineEvent::NewChannel { channel: id(1), members: vec!["bob".into()] });

    let actions = channel_event(
        &mut room,
        1,
        ChannelEvent::MessageReceived { sender: "bob".into(), text: "hi".into() },
    );

    assert_eq!(
        actions,
        vec![RoomAction::Display { channel: Some(id(1)), sender: "bob".into(), text: "hi".into() }]
    );
}
