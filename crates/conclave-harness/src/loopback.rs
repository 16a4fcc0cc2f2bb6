//! In-memory engine speaking the plain-text [`crate::wire`] format.
//!
//! `LoopbackEngine` behaves like a cooperative secure-messaging engine
//! without any cryptography: local commands are confirmed immediately and
//! announced on the transport, and announcements from peers are turned into
//! the callbacks a real engine would produce. Connecting several sessions
//! through a shared transport ([`crate::SimNetwork`]) gives a working
//! multi-user room.
//!
//! Promotion is unanimous: a participant is promoted once every other
//! member of the channel has vouched for it.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use conclave_app::{Engine, EngineError, EngineFactory, EngineResult};
use conclave_core::{ChannelEvent, ChannelId, EngineEvent, PublicKey, TimerToken};

use crate::wire::WireMessage;

/// Timer used to re-announce presence.
pub const HEARTBEAT_TIMER: TimerToken = TimerToken::new(1);

/// Default interval between presence announcements.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Channel handles are `origin * CHANNELS_PER_ORIGIN + sequence`.
pub const CHANNELS_PER_ORIGIN: u64 = 1_000_000;

#[derive(Debug, Default)]
struct LoopbackChannel {
    members: BTreeSet<String>,
    votes: BTreeMap<String, BTreeSet<String>>,
    promoted: BTreeSet<String>,
    /// Whether the room has been told about this channel.
    reported: bool,
}

impl LoopbackChannel {
    fn with_member(name: &str) -> Self {
        Self { members: BTreeSet::from([name.to_owned()]), ..Self::default() }
    }

    fn remove_member(&mut self, name: &str) -> bool {
        self.votes.remove(name);
        self.promoted.remove(name);
        for authorizers in self.votes.values_mut() {
            authorizers.remove(name);
        }
        self.members.remove(name)
    }
}

/// Loopback engine session for one user.
#[derive(Debug)]
pub struct LoopbackEngine {
    username: String,
    public_key: PublicKey,
    origin: u64,
    heartbeat: Duration,
    connected: bool,
    users: BTreeMap<String, PublicKey>,
    channels: BTreeMap<ChannelId, LoopbackChannel>,
    created: u64,
}

impl LoopbackEngine {
    /// Open a session. Channels created by it are numbered from
    /// `origin * CHANNELS_PER_ORIGIN + 1`.
    pub fn new(username: &str, public_key: PublicKey, origin: u64, heartbeat: Duration) -> Self {
        Self {
            username: username.to_owned(),
            public_key,
            origin,
            heartbeat,
            connected: false,
            users: BTreeMap::new(),
            channels: BTreeMap::new(),
            created: 0,
        }
    }

    /// Local username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether `connect` has completed.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Remote users seen so far.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Members of `channel` as the engine sees them.
    pub fn members(&self, channel: ChannelId) -> Option<&BTreeSet<String>> {
        self.channels.get(&channel).map(|state| &state.members)
    }

    fn require_connected(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.connected {
            Ok(())
        } else {
            Err(EngineError::Rejected { operation, reason: "not connected".to_owned() })
        }
    }

    fn require_member(&self, operation: &'static str, channel: ChannelId) -> Result<(), EngineError> {
        self.require_connected(operation)?;
        match self.channels.get(&channel) {
            Some(state) if state.members.contains(&self.username) => Ok(()),
            Some(_) => Err(EngineError::Rejected {
                operation,
                reason: format!("not a member of channel {channel}"),
            }),
            None => {
                Err(EngineError::Rejected { operation, reason: format!("unknown channel {channel}") })
            },
        }
    }

    fn send(message: &WireMessage) -> EngineEvent {
        EngineEvent::SendMessage { payload: message.encode() }
    }

    fn reported(&self, channel: ChannelId) -> bool {
        self.channels.get(&channel).is_some_and(|state| state.reported)
    }

    fn channel_event(channel: ChannelId, event: ChannelEvent) -> EngineEvent {
        EngineEvent::Channel { channel, event }
    }

    /// Record `authorizer` vouching for `target` and report promotion once
    /// every other member agrees.
    fn vote(&mut self, channel: ChannelId, authorizer: &str, target: &str) -> Vec<EngineEvent> {
        let local = self.username.clone();
        let Some(state) = self.channels.get_mut(&channel) else {
            return Vec::new();
        };
        if !state.members.contains(authorizer) || !state.members.contains(target) {
            return Vec::new();
        }
        let votes = state.votes.entry(target.to_owned()).or_default();
        votes.insert(authorizer.to_owned());

        let mut events = Vec::new();
        if state.reported {
            events.push(Self::channel_event(
                channel,
                ChannelEvent::UserAuthorizedBy {
                    authorizer: authorizer.to_owned(),
                    target: target.to_owned(),
                },
            ));
        }

        let unanimous =
            state.members.iter().filter(|member| member.as_str() != target).all(|m| votes.contains(m));
        if unanimous && state.promoted.insert(target.to_owned()) && state.reported {
            let event = if target == local {
                ChannelEvent::Authorized
            } else {
                ChannelEvent::UserPromoted { name: target.to_owned() }
            };
            events.push(Self::channel_event(channel, event));
        }
        events
    }

    /// Report known channels the room has not heard of yet.
    fn report_new_channels(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for (id, state) in &mut self.channels {
            if state.reported || state.members.is_empty() || state.members.contains(&self.username) {
                continue;
            }
            state.reported = true;
            events.push(EngineEvent::NewChannel {
                channel: *id,
                members: state.members.iter().cloned().collect(),
            });
        }
        events
    }

    fn forget_user(&mut self, name: &str) -> Vec<EngineEvent> {
        for state in self.channels.values_mut() {
            state.remove_member(name);
        }
        self.channels.retain(|_, state| !state.members.is_empty());

        if self.users.remove(name).is_some() {
            vec![EngineEvent::UserLeft { name: name.to_owned() }]
        } else {
            Vec::new()
        }
    }

    fn on_wire(&mut self, sender: &str, message: WireMessage) -> Vec<EngineEvent> {
        match message {
            WireMessage::Hello { key } => {
                let mut events = self.meet(sender, key);
                if !events.is_empty() {
                    events.push(Self::send(&WireMessage::Welcome { key: self.public_key.clone() }));
                }
                events
            },
            WireMessage::Welcome { key } => self.meet(sender, key),
            WireMessage::Bye => self.forget_user(sender),
            WireMessage::ListChannels => {
                let mine: Vec<(ChannelId, Vec<String>)> = self
                    .channels
                    .iter()
                    .filter(|(_, state)| state.members.contains(&self.username))
                    .map(|(id, state)| (*id, state.members.iter().cloned().collect()))
                    .collect();
                vec![Self::send(&WireMessage::Channels(mine))]
            },
            WireMessage::Channels(listing) => {
                for (id, members) in listing {
                    self.channels
                        .entry(id)
                        .or_insert_with(|| LoopbackChannel { members: members.into_iter().collect(), ..LoopbackChannel::default() });
                }
                self.report_new_channels()
            },
            WireMessage::Created { channel } => {
                self.channels.entry(channel).or_insert_with(|| LoopbackChannel::with_member(sender));
                Vec::new()
            },
            WireMessage::Invite { channel, invitee } => self.on_invite(sender, channel, invitee),
            WireMessage::Join { channel } => {
                let state = self.channels.entry(channel).or_default();
                if !state.members.insert(sender.to_owned()) || !state.reported {
                    return Vec::new();
                }
                vec![Self::channel_event(channel, ChannelEvent::UserJoined { name: sender.to_owned() })]
            },
            WireMessage::Leave { channel } => {
                let Some(state) = self.channels.get_mut(&channel) else {
                    return Vec::new();
                };
                if !state.remove_member(sender) || !state.reported {
                    return Vec::new();
                }
                vec![Self::channel_event(channel, ChannelEvent::UserLeft { name: sender.to_owned() })]
            },
            WireMessage::Chat { channel, text } => {
                if !self.reported(channel) {
                    return Vec::new();
                }
                vec![Self::channel_event(
                    channel,
                    ChannelEvent::MessageReceived { sender: sender.to_owned(), text },
                )]
            },
            WireMessage::Say { text } => {
                vec![EngineEvent::RoomMessage { sender: sender.to_owned(), text }]
            },
            WireMessage::Authorize { channel, target } => self.vote(channel, sender, &target),
        }
    }

    fn meet(&mut self, sender: &str, key: PublicKey) -> Vec<EngineEvent> {
        if self.users.contains_key(sender) {
            return Vec::new();
        }
        self.users.insert(sender.to_owned(), key.clone());
        vec![EngineEvent::UserJoined { name: sender.to_owned(), public_key: key }]
    }

    fn on_invite(&mut self, inviter: &str, channel: ChannelId, invitee: String) -> Vec<EngineEvent> {
        let local = self.username.clone();
        let state = self.channels.entry(channel).or_insert_with(|| LoopbackChannel::with_member(inviter));

        if state.reported {
            return vec![Self::channel_event(
                channel,
                ChannelEvent::UserInvited { inviter: inviter.to_owned(), invitee },
            )];
        }
        if invitee != local {
            return Vec::new();
        }

        state.reported = true;
        let mut events = vec![EngineEvent::InvitedToConversation { channel, inviter: inviter.to_owned() }];
        events.extend(
            state
                .members
                .iter()
                .filter(|member| member.as_str() != inviter && **member != local)
                .map(|member| Self::channel_event(channel, ChannelEvent::UserJoined { name: member.clone() })),
        );
        events
    }
}

impl Engine for LoopbackEngine {
    fn connect(&mut self) -> EngineResult {
        if self.connected {
            return Ok(Vec::new());
        }
        self.connected = true;
        tracing::debug!(user = %self.username, "loopback connected");
        Ok(vec![
            Self::send(&WireMessage::Hello { key: self.public_key.clone() }),
            Self::send(&WireMessage::ListChannels),
            EngineEvent::Connected,
            EngineEvent::SetTimer { token: HEARTBEAT_TIMER, interval: self.heartbeat },
        ])
    }

    fn disconnect(&mut self) -> EngineResult {
        if !self.connected {
            return Ok(Vec::new());
        }
        self.connected = false;
        self.users.clear();
        self.channels.clear();
        tracing::debug!(user = %self.username, "loopback disconnected");
        Ok(vec![Self::send(&WireMessage::Bye)])
    }

    fn receive(&mut self, sender: &str, payload: &str) -> EngineResult {
        if !self.connected || sender == self.username {
            return Ok(Vec::new());
        }
        match WireMessage::parse(payload) {
            Ok(Some(message)) => Ok(self.on_wire(sender, message)),
            Ok(None) => {
                Ok(vec![EngineEvent::RoomMessage { sender: sender.to_owned(), text: payload.to_owned() }])
            },
            Err(err) => Err(EngineError::Malformed { sender: sender.to_owned(), reason: err.to_string() }),
        }
    }

    fn user_left(&mut self, name: &str) -> EngineResult {
        Ok(self.forget_user(name))
    }

    fn create_channel(&mut self) -> EngineResult {
        self.require_connected("create_channel")?;
        self.created += 1;
        let channel = ChannelId::new(self.origin * CHANNELS_PER_ORIGIN + self.created);
        self.channels.insert(
            channel,
            LoopbackChannel { reported: true, ..LoopbackChannel::with_member(&self.username) },
        );
        Ok(vec![Self::send(&WireMessage::Created { channel }), EngineEvent::CreatedConversation { channel }])
    }

    fn search_channels(&mut self) -> EngineResult {
        self.require_connected("search_channels")?;
        let mut events = vec![Self::send(&WireMessage::ListChannels)];
        events.extend(self.report_new_channels());
        Ok(events)
    }

    fn join_channel(&mut self, channel: ChannelId) -> EngineResult {
        self.require_connected("join_channel")?;
        let local = self.username.clone();
        let state = self.channels.get_mut(&channel).ok_or_else(|| EngineError::Rejected {
            operation: "join_channel",
            reason: format!("unknown channel {channel}"),
        })?;
        state.members.insert(local);
        state.reported = true;
        Ok(vec![Self::send(&WireMessage::Join { channel }), EngineEvent::JoinedChannel { channel }])
    }

    fn invite(&mut self, channel: ChannelId, name: &str, _public_key: &PublicKey) -> EngineResult {
        self.require_member("invite", channel)?;
        Ok(vec![
            Self::send(&WireMessage::Invite { channel, invitee: name.to_owned() }),
            Self::channel_event(
                channel,
                ChannelEvent::UserInvited { inviter: self.username.clone(), invitee: name.to_owned() },
            ),
        ])
    }

    fn send_chat(&mut self, channel: Option<ChannelId>, text: &str) -> EngineResult {
        match channel {
            Some(channel) => {
                self.require_member("send_chat", channel)?;
                Ok(vec![
                    Self::send(&WireMessage::Chat { channel, text: text.to_owned() }),
                    Self::channel_event(
                        channel,
                        ChannelEvent::MessageReceived { sender: self.username.clone(), text: text.to_owned() },
                    ),
                ])
            },
            None => {
                self.require_connected("send_chat")?;
                Ok(vec![
                    Self::send(&WireMessage::Say { text: text.to_owned() }),
                    EngineEvent::RoomMessage { sender: self.username.clone(), text: text.to_owned() },
                ])
            },
        }
    }

    fn authorize(&mut self, channel: Option<ChannelId>, name: &str) -> EngineResult {
        let local = self.username.clone();
        let targets: Vec<ChannelId> = match channel {
            Some(channel) => {
                self.require_member("authorize", channel)?;
                vec![channel]
            },
            None => {
                self.require_connected("authorize")?;
                self.channels
                    .iter()
                    .filter(|(_, state)| state.members.contains(&local) && state.members.contains(name))
                    .map(|(id, _)| *id)
                    .collect()
            },
        };

        let mut events = Vec::new();
        for channel in targets {
            events.push(Self::send(&WireMessage::Authorize { channel, target: name.to_owned() }));
            events.extend(self.vote(channel, &local, name));
        }
        Ok(events)
    }

    fn leave(&mut self, channel: ChannelId, suppress_callback: bool) -> EngineResult {
        self.require_member("leave", channel)?;
        let local = self.username.clone();
        if let Some(state) = self.channels.get_mut(&channel) {
            state.remove_member(&local);
            state.reported = false;
        }
        self.channels.retain(|_, state| !state.members.is_empty());

        let mut events = vec![Self::send(&WireMessage::Leave { channel })];
        if !suppress_callback {
            events.push(Self::channel_event(channel, ChannelEvent::Left));
        }
        Ok(events)
    }

    fn fire_timer(&mut self, token: TimerToken) -> EngineResult {
        if token != HEARTBEAT_TIMER || !self.connected {
            return Ok(Vec::new());
        }
        Ok(vec![
            Self::send(&WireMessage::Hello { key: self.public_key.clone() }),
            EngineEvent::SetTimer { token: HEARTBEAT_TIMER, interval: self.heartbeat },
        ])
    }
}

/// Opens [`LoopbackEngine`] sessions.
#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    origin: u64,
    heartbeat: Duration,
}

impl LoopbackFactory {
    /// Factory whose engines number channels from `origin`.
    ///
    /// Sessions sharing a transport need distinct origins.
    pub fn new(origin: u64) -> Self {
        Self { origin, heartbeat: DEFAULT_HEARTBEAT }
    }

    /// Override the presence announcement interval.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

impl EngineFactory for LoopbackFactory {
    type Engine = LoopbackEngine;

    fn open(&mut self, username: &str, public_key: &PublicKey) -> Result<LoopbackEngine, EngineError> {
        if username.is_empty() {
            return Err(EngineError::Rejected { operation: "open", reason: "empty username".to_owned() });
        }
        Ok(LoopbackEngine::new(username, public_key.clone(), self.origin, self.heartbeat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes(vec![byte; 4])
    }

    fn connected(name: &str, origin: u64) -> LoopbackEngine {
        let mut engine = LoopbackEngine::new(name, key(origin as u8), origin, DEFAULT_HEARTBEAT);
        engine.connect().unwrap();
        engine
    }

    fn payloads(events: &[EngineEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::SendMessage { payload } => Some(payload.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connect_announces_and_arms_heartbeat() {
        let mut engine = LoopbackEngine::new("alice", key(1), 1, DEFAULT_HEARTBEAT);
        let events = engine.connect().unwrap();

        assert_eq!(payloads(&events), ["#np1sec hello 01010101", "#np1sec list-channels"]);
        assert!(events.contains(&EngineEvent::Connected));
        assert!(events.contains(&EngineEvent::SetTimer { token: HEARTBEAT_TIMER, interval: DEFAULT_HEARTBEAT }));
        assert!(engine.connect().unwrap().is_empty());
    }

    #[test]
    fn hello_is_answered_once() {
        let mut alice = connected("alice", 1);
        let events = alice.receive("bob", "#np1sec hello 02020202").unwrap();

        assert_eq!(events[0], EngineEvent::UserJoined { name: "bob".into(), public_key: key(2) });
        assert_eq!(payloads(&events), ["#np1sec welcome 01010101"]);
        assert!(alice.receive("bob", "#np1sec hello 02020202").unwrap().is_empty());
    }

    #[test]
    fn own_echo_is_ignored() {
        let mut alice = connected("alice", 1);
        assert!(alice.receive("alice", "#np1sec bye").unwrap().is_empty());
    }

    #[test]
    fn plain_text_is_room_chat() {
        let mut alice = connected("alice", 1);
        assert_eq!(
            alice.receive("bob", "hi there").unwrap(),
            [EngineEvent::RoomMessage { sender: "bob".into(), text: "hi there".into() }]
        );
    }

    #[test]
    fn garbage_protocol_line_is_malformed() {
        let mut alice = connected("alice", 1);
        let err = alice.receive("bob", "#np1sec join nowhere").unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn created_channels_use_origin_numbering() {
        let mut alice = connected("alice", 3);
        let events = alice.create_channel().unwrap();
        let channel = ChannelId::new(3_000_001);

        assert_eq!(payloads(&events), ["#np1sec created 3000001"]);
        assert_eq!(events[1], EngineEvent::CreatedConversation { channel });
        assert_eq!(alice.members(channel).unwrap().len(), 1);
    }

    #[test]
    fn commands_require_connection() {
        let mut engine = LoopbackEngine::new("alice", key(1), 1, DEFAULT_HEARTBEAT);
        assert!(matches!(engine.create_channel(), Err(EngineError::Rejected { .. })));
        assert!(matches!(
            engine.join_channel(ChannelId::new(9)),
            Err(EngineError::Rejected { operation: "join_channel", .. })
        ));
    }

    #[test]
    fn invitation_introduces_channel_and_members() {
        let mut carol = connected("carol", 3);
        let channel = ChannelId::new(1_000_001);
        carol.receive("alice", &WireMessage::Created { channel }.encode()).unwrap();
        carol.receive("bob", &WireMessage::Join { channel }.encode()).unwrap();

        let events = carol
            .receive("alice", &WireMessage::Invite { channel, invitee: "carol".into() }.encode())
            .unwrap();
        assert_eq!(
            events,
            [
                EngineEvent::InvitedToConversation { channel, inviter: "alice".into() },
                EngineEvent::Channel { channel, event: ChannelEvent::UserJoined { name: "bob".into() } },
            ]
        );
    }

    #[test]
    fn unanimous_votes_promote() {
        let mut alice = connected("alice", 1);
        let channel = match alice.create_channel().unwrap()[1] {
            EngineEvent::CreatedConversation { channel } => channel,
            _ => unreachable!(),
        };
        alice.receive("bob", &WireMessage::Join { channel }.encode()).unwrap();
        alice.receive("carol", &WireMessage::Join { channel }.encode()).unwrap();

        let first = alice.authorize(Some(channel), "carol").unwrap();
        assert!(!first.iter().any(|e| matches!(
            e,
            EngineEvent::Channel { event: ChannelEvent::UserPromoted { .. }, .. }
        )));

        let second = alice
            .receive("bob", &WireMessage::Authorize { channel, target: "carol".into() }.encode())
            .unwrap();
        assert_eq!(
            second.last().unwrap(),
            &EngineEvent::Channel { channel, event: ChannelEvent::UserPromoted { name: "carol".into() } }
        );
    }

    #[test]
    fn suppressed_leave_has_no_callback() {
        let mut alice = connected("alice", 1);
        alice.create_channel().unwrap();
        let channel = ChannelId::new(1_000_001);

        let events = alice.leave(channel, true).unwrap();
        assert_eq!(payloads(&events), ["#np1sec leave 1000001"]);
        assert_eq!(events.len(), 1);
        assert!(alice.members(channel).is_none());
    }

    #[test]
    fn heartbeat_rearms() {
        let mut alice = connected("alice", 1);
        let events = alice.fire_timer(HEARTBEAT_TIMER).unwrap();
        assert_eq!(payloads(&events), ["#np1sec hello 01010101"]);
        assert!(alice.fire_timer(TimerToken::new(99)).unwrap().is_empty());
    }
}
