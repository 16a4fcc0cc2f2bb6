//! Top-level session object for one host conversation.
//!
//! # Architecture
//!
//! ```text
//! presentation ──► Room::{start, send_chat_message, invite, ...} ──┐
//! engine ────────► Room::handle(RoomEvent::Engine(..)) ────────────┼──► Vec<RoomAction>
//! transport ─────► Room::handle(RoomEvent::ReceivedData{..}) ──────┤
//! clock ─────────► Room::handle(RoomEvent::Tick{..}) ──────────────┘
//! ```
//!
//! # Responsibilities
//!
//! - Own the engine session lifecycle (open, connect, tear down)
//! - Own the room roster and every [`Channel`], keyed by engine handle
//! - Pair queued invitations with channels as the engine creates them
//! - Turn every failure into a local message at the point of detection
//!
//! Engine callbacks are validated before anything is mutated. A callback that
//! describes impossible state is logged and dropped; the session continues.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    action::{EngineCommand, RoomAction, Scope},
    channel::Channel,
    command::{Command, CommandScope, help_lines},
    config::RoomConfig,
    env::Environment,
    error::{CommandError, ProtocolViolation},
    event::{ChannelEvent, EngineEvent, RoomEvent},
    identity::{Identity, PublicKey},
    ids::{ChannelId, TimerToken},
    roster::Roster,
    timer::TimerRegistry,
};

/// Most invitation batches that may wait for channel creation at once.
pub const MAX_PENDING_INVITES: usize = 64;

/// Engine connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, or torn down.
    Disconnected,
    /// `Connect` issued, waiting for `connected`.
    Connecting,
    /// Session is live.
    Connected,
}

/// A user to invite once a channel exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Invitee {
    /// Username.
    pub name: String,
    /// Key from the room roster.
    pub public_key: PublicKey,
}

/// Users to invite into the same, not yet created, channel.
pub type InviteBatch = BTreeSet<Invitee>;

/// Room state machine.
pub struct Room<E: Environment> {
    /// Clock and entropy.
    env: E,
    /// Host-chosen settings.
    config: RoomConfig,
    /// Local username and keypair.
    identity: Identity,
    /// An engine session has been opened.
    started: bool,
    /// Engine connection status.
    connection: ConnectionState,
    /// The host chat is active.
    in_chat: bool,
    /// Users present in the room.
    roster: Roster,
    /// Live channels by engine handle.
    channels: BTreeMap<ChannelId, Channel>,
    /// Channel receiving chat input, if any.
    focused: Option<ChannelId>,
    /// Invitations waiting for `created_conversation`, oldest first.
    invite_queue: VecDeque<InviteBatch>,
    /// Engine-requested timers.
    timers: TimerRegistry<E::Instant>,
}

impl<E: Environment> Room<E> {
    /// Create a room for `account`, generating a fresh keypair.
    pub fn new(env: E, account: &str, config: RoomConfig) -> Self {
        let identity = Identity::generate(account, &env);
        Self::with_identity(env, identity, config)
    }

    /// Create a room around an existing identity.
    pub fn with_identity(env: E, identity: Identity, config: RoomConfig) -> Self {
        Self {
            env,
            config,
            identity,
            started: false,
            connection: ConnectionState::Disconnected,
            in_chat: false,
            roster: Roster::new(),
            channels: BTreeMap::new(),
            focused: None,
            invite_queue: VecDeque::new(),
            timers: TimerRegistry::new(),
        }
    }

    /// Sanitized local username.
    pub fn username(&self) -> &str {
        self.identity.username()
    }

    /// Local identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Settings.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// True once an engine session has been opened.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Engine connection status.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// True while the host chat is active.
    pub fn is_in_chat(&self) -> bool {
        self.in_chat
    }

    /// Users present in the room.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Look up a channel.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// Live channels in handle order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Channel receiving chat input.
    pub fn focused(&self) -> Option<ChannelId> {
        self.focused
    }

    /// Queued invitation batches, oldest first.
    pub fn pending_invites(&self) -> impl Iterator<Item = &InviteBatch> {
        self.invite_queue.iter()
    }

    /// Pending engine timers.
    pub fn timers(&self) -> &TimerRegistry<E::Instant> {
        &self.timers
    }

    /// Process an event from the engine, the transport or the clock.
    pub fn handle(&mut self, event: RoomEvent<E::Instant>) -> Vec<RoomAction> {
        match event {
            RoomEvent::Engine(event) => self.handle_engine(event),
            RoomEvent::ReceivedData { sender, payload } => self.on_received_data(sender, payload),
            RoomEvent::Tick { now } => self.tick(now),
        }
    }

    /// Open the engine session. Does nothing if already started.
    pub fn start(&mut self) -> Vec<RoomAction> {
        if self.started {
            debug!("session already started");
            return Vec::new();
        }
        if !self.config.protocol_enabled {
            return self.reject(None, CommandError::ProtocolDisabled);
        }

        self.started = true;
        info!(user = self.identity.username(), key = %self.identity.public_key(), "starting session");

        let mut actions = vec![RoomAction::Engine(EngineCommand::Open {
            username: self.identity.username().to_owned(),
            public_key: self.identity.public_key(),
        })];
        if self.config.auto_connect {
            actions.extend(self.begin_connect());
        }
        actions.push(RoomAction::Changed(Scope::Room));
        actions
    }

    /// Start if needed, then connect if not already connecting.
    pub fn connect(&mut self) -> Vec<RoomAction> {
        let mut actions = self.start();
        if self.started && self.connection == ConnectionState::Disconnected {
            actions.extend(self.begin_connect());
            actions.push(RoomAction::Changed(Scope::Room));
        }
        actions
    }

    /// Tear down the engine session.
    pub fn disconnect(&mut self) -> Vec<RoomAction> {
        if let Err(err) = self.ensure_started() {
            return self.reject(None, err);
        }
        if self.connection == ConnectionState::Disconnected {
            debug!("already disconnected");
            return Vec::new();
        }
        info!("disconnecting");
        let mut actions = vec![RoomAction::Engine(EngineCommand::Disconnect)];
        self.connection = ConnectionState::Disconnected;
        actions.extend(self.teardown());
        actions
    }

    /// The host chat became active.
    pub fn chat_joined(&mut self) -> Vec<RoomAction> {
        self.in_chat = true;
        let mut actions = Vec::new();
        if self.started && self.config.auto_connect && self.connection == ConnectionState::Disconnected {
            actions.extend(self.begin_connect());
        }
        actions.push(RoomAction::Changed(Scope::Room));
        actions
    }

    /// The host chat ended. Channels cannot outlive it.
    pub fn chat_left(&mut self) -> Vec<RoomAction> {
        self.in_chat = false;
        let mut actions = Vec::new();
        if self.started && self.connection != ConnectionState::Disconnected {
            actions.push(RoomAction::Engine(EngineCommand::Disconnect));
            self.connection = ConnectionState::Disconnected;
        }
        actions.extend(self.teardown());
        actions
    }

    /// The host conversation is closing.
    ///
    /// Joined channels are left without waiting for confirmation, then the
    /// session is torn down.
    pub fn close(&mut self) -> Vec<RoomAction> {
        let mut actions = Vec::new();
        if self.in_chat {
            actions.extend(self.channels.values().filter(|channel| channel.is_joined()).map(|channel| {
                RoomAction::Engine(EngineCommand::Leave { channel: channel.id(), suppress_callback: true })
            }));
        }
        if self.started && self.connection != ConnectionState::Disconnected {
            actions.push(RoomAction::Engine(EngineCommand::Disconnect));
        }
        info!(user = self.identity.username(), "closing room");

        self.connection = ConnectionState::Disconnected;
        self.started = false;
        self.in_chat = false;
        actions.extend(self.teardown());
        actions
    }

    /// Direct chat input to a channel.
    pub fn focus(&mut self, channel: ChannelId) -> Vec<RoomAction> {
        if !self.channels.contains_key(&channel) {
            return self.reject(None, CommandError::UnknownChannel { id: channel.to_string() });
        }
        self.focused = Some(channel);
        vec![RoomAction::Changed(Scope::Room)]
    }

    /// Direct chat input to the room.
    pub fn unfocus(&mut self) -> Vec<RoomAction> {
        self.focused = None;
        vec![RoomAction::Changed(Scope::Room)]
    }

    /// A chat line typed by the local user.
    ///
    /// Lines starting with the command prefix run locally. Other lines go to
    /// the focused channel, or to the room when nothing is focused. With the
    /// protocol disabled, every line is transmitted unchanged.
    pub fn send_chat_message(&mut self, text: String) -> Vec<RoomAction> {
        if !self.config.protocol_enabled {
            return vec![RoomAction::Transmit { payload: text }];
        }

        let target = self.focused;
        if let Some(command) = self.config.as_command(&text) {
            let mut actions = vec![RoomAction::info(target, format!("$ {text}"))];
            let result = Command::parse(command)
                .map_err(CommandError::from)
                .and_then(|command| self.run_command(target, command));
            actions.extend(self.complete(target, result));
            return actions;
        }

        let result = self.ensure_started().and_then(|()| match target {
            Some(id) => self.channel_for_command(id)?.send_chat_message(text),
            None => Ok(vec![RoomAction::Engine(EngineCommand::SendChat { channel: None, text })]),
        });
        self.complete(target, result)
    }

    /// Invite `name` into the focused channel, or into a new channel when
    /// nothing is focused.
    pub fn invite(&mut self, name: &str) -> Vec<RoomAction> {
        let target = self.focused;
        let result = self.try_invite(target, name);
        self.complete(target, result)
    }

    /// Queue an invitation and ask the engine for a channel to carry it.
    pub fn invite_by_creating_channel(&mut self, name: &str, public_key: PublicKey) -> Vec<RoomAction> {
        let batch = InviteBatch::from([Invitee { name: name.to_owned(), public_key }]);
        self.invite_batch_by_creating_channel(batch)
    }

    /// Queue several invitations for one new channel.
    pub fn invite_batch_by_creating_channel(&mut self, batch: InviteBatch) -> Vec<RoomAction> {
        let result = self.try_queue_invites(batch);
        self.complete(None, result)
    }

    /// Join the focused channel.
    pub fn join(&mut self) -> Vec<RoomAction> {
        let target = self.focused;
        let result = self.ensure_started().and_then(|()| match target {
            Some(id) => self.channel_for_command(id)?.join(),
            None => Err(CommandError::NotAvailable { command: "join", context: "outside a channel" }),
        });
        self.complete(target, result)
    }

    /// Join a channel by handle.
    pub fn join_channel(&mut self, channel: ChannelId) -> Vec<RoomAction> {
        let target = self.focused;
        let result =
            self.ensure_started().and_then(|()| self.channel_for_command(channel)?.join());
        self.complete(target, result)
    }

    /// Vouch for `name` in the focused channel, or room-wide.
    pub fn authorize(&mut self, name: &str) -> Vec<RoomAction> {
        let target = self.focused;
        let result = self.try_authorize(target, name);
        self.complete(target, result)
    }

    /// Ask the engine for a new channel.
    pub fn create_channel(&mut self) -> Vec<RoomAction> {
        let result = self.ensure_started().map(|()| vec![RoomAction::Engine(EngineCommand::CreateChannel)]);
        self.complete(None, result)
    }

    /// Ask the engine to enumerate channels.
    pub fn search_channels(&mut self) -> Vec<RoomAction> {
        let result = self.ensure_started().map(|()| vec![RoomAction::Engine(EngineCommand::SearchChannels)]);
        self.complete(None, result)
    }

    /// The host saw `name` leave the underlying chat.
    pub fn host_user_left(&mut self, name: &str) -> Vec<RoomAction> {
        if !self.started {
            return Vec::new();
        }
        vec![RoomAction::Engine(EngineCommand::UserLeft { name: name.to_owned() })]
    }

    fn handle_engine(&mut self, event: EngineEvent) -> Vec<RoomAction> {
        let kind = event.kind();
        let mut actions = match self.apply_engine(event) {
            Ok(actions) => actions,
            Err(violation) => {
                warn!(event = kind, %violation, "dropping engine event");
                let view = violation.channel().filter(|id| self.channels.contains_key(id));
                vec![RoomAction::warning(view, format!("protocol violation: {violation}"))]
            },
        };
        actions.extend(self.reap_destroyed());
        actions
    }

    fn apply_engine(&mut self, event: EngineEvent) -> Result<Vec<RoomAction>, ProtocolViolation> {
        match event {
            EngineEvent::Connected => Ok(self.connected()),
            EngineEvent::Disconnected => Ok(self.disconnected()),
            EngineEvent::UserJoined { name, public_key } => self.user_joined(&name, public_key),
            EngineEvent::UserLeft { name } => self.user_left(&name),
            EngineEvent::NewChannel { channel, members } => self.new_channel(channel, &members),
            EngineEvent::CreatedConversation { channel } => self.created_conversation(channel),
            EngineEvent::InvitedToConversation { channel, inviter } => {
                self.invited_to_conversation(channel, &inviter)
            },
            EngineEvent::ChannelRemoved { channel } => self.channel_removed(channel),
            EngineEvent::JoinedChannel { channel } => self.dispatch(channel, ChannelEvent::Joined),
            EngineEvent::RoomMessage { sender, text } => {
                Ok(vec![RoomAction::Display { channel: None, sender, text }])
            },
            EngineEvent::SendMessage { payload } => Ok(vec![RoomAction::Transmit { payload }]),
            EngineEvent::SetTimer { token, interval } => Ok(self.set_timer(token, interval)),
            EngineEvent::UnsetTimer { token } => self.unset_timer(token),
            EngineEvent::Channel { channel, event } => self.dispatch(channel, event),
        }
    }

    fn connected(&mut self) -> Vec<RoomAction> {
        info!(user = self.identity.username(), "connected");
        self.connection = ConnectionState::Connected;
        vec![RoomAction::info(None, "secure session connected"), RoomAction::Changed(Scope::Room)]
    }

    fn disconnected(&mut self) -> Vec<RoomAction> {
        info!(user = self.identity.username(), "disconnected");
        self.connection = ConnectionState::Disconnected;
        let mut actions = vec![RoomAction::info(None, "secure session disconnected")];
        actions.extend(self.teardown());
        actions
    }

    fn user_joined(&mut self, name: &str, public_key: PublicKey) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let user = self.roster.add(name, public_key)?;
        debug!(user = name, key = ?user.public_key(), "user joined room");
        Ok(vec![RoomAction::participant_changed(None, name), RoomAction::Changed(Scope::Room)])
    }

    fn user_left(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let in_roster = self.roster.remove(name);

        let mut actions = Vec::new();
        let mut in_channels = false;
        for channel in self.channels.values_mut() {
            let removed = channel.remove_participant(name);
            in_channels |= !removed.is_empty();
            actions.extend(removed);
        }

        match in_roster {
            Ok(_) => debug!(user = name, "user left room"),
            // Channel members reported by the engine need not be in the roster.
            Err(violation) if in_channels => {
                warn!(user = name, %violation, "departed user was only known to channels");
                actions.push(RoomAction::warning(None, format!("protocol violation: {violation}")));
            },
            Err(violation) => return Err(violation),
        }
        actions.push(RoomAction::Changed(Scope::Room));
        Ok(actions)
    }

    fn new_channel(&mut self, id: ChannelId, members: &[String]) -> Result<Vec<RoomAction>, ProtocolViolation> {
        self.ensure_absent(id)?;
        let members: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        if members.is_empty() {
            debug!(channel = %id, "ignoring channel without members");
            return Ok(Vec::new());
        }

        let mut channel = Channel::new(id, self.identity.username(), &self.config);
        for name in members {
            let key = self.roster.public_key(name).cloned();
            channel.add_participant(name, key)?.mark_joined();
        }
        Ok(self.insert_channel(channel))
    }

    fn created_conversation(&mut self, id: ChannelId) -> Result<Vec<RoomAction>, ProtocolViolation> {
        self.ensure_absent(id)?;
        let mut channel = Channel::new(id, self.identity.username(), &self.config);
        channel.add_participant(self.identity.username(), Some(self.identity.public_key()))?.mark_joined();

        let mut actions = self.insert_channel(channel);
        actions.push(RoomAction::info(Some(id), format!("created channel {id}")));

        if let Some(batch) = self.invite_queue.pop_front() {
            debug!(channel = %id, invitees = batch.len(), "issuing queued invitations");
            actions.extend(batch.into_iter().map(|invitee| {
                RoomAction::Engine(EngineCommand::Invite {
                    channel: id,
                    name: invitee.name,
                    public_key: invitee.public_key,
                })
            }));
        }
        Ok(actions)
    }

    fn invited_to_conversation(
        &mut self,
        id: ChannelId,
        inviter: &str,
    ) -> Result<Vec<RoomAction>, ProtocolViolation> {
        self.ensure_absent(id)?;
        let mut channel = Channel::new(id, self.identity.username(), &self.config);
        channel.add_participant(inviter, self.roster.public_key(inviter).cloned())?.mark_joined();
        channel.add_participant(self.identity.username(), Some(self.identity.public_key()))?.mark_invited();

        let mut actions = self.insert_channel(channel);
        actions.push(RoomAction::info(
            Some(id),
            format!("{inviter} invited you to channel {id}; type {}join to accept", self.config.command_prefix),
        ));
        Ok(actions)
    }

    fn channel_removed(&mut self, id: ChannelId) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if !self.channels.contains_key(&id) {
            return Err(ProtocolViolation::UnknownChannel { channel: id });
        }
        let mut actions = self.remove_channel(id);
        actions.push(RoomAction::Changed(Scope::Room));
        Ok(actions)
    }

    fn dispatch(&mut self, id: ChannelId, event: ChannelEvent) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let channel = self.channels.get_mut(&id).ok_or(ProtocolViolation::UnknownChannel { channel: id })?;
        debug!(channel = %id, event = event.kind(), "channel event");
        channel.apply(event)
    }

    fn set_timer(&mut self, token: TimerToken, interval: Duration) -> Vec<RoomAction> {
        let deadline = self.env.now() + interval;
        if self.timers.schedule(token, deadline) {
            debug!(%token, ?interval, "timer rescheduled");
        } else {
            debug!(%token, ?interval, "timer set");
        }
        Vec::new()
    }

    fn unset_timer(&mut self, token: TimerToken) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if !self.timers.cancel(token) {
            return Err(ProtocolViolation::UnknownTimer { token });
        }
        Ok(Vec::new())
    }

    fn tick(&mut self, now: E::Instant) -> Vec<RoomAction> {
        self.timers
            .expire(now)
            .into_iter()
            .map(|token| RoomAction::Engine(EngineCommand::FireTimer { token }))
            .collect()
    }

    fn on_received_data(&mut self, sender: String, payload: String) -> Vec<RoomAction> {
        if !self.started {
            debug!(sender, "dropping data received before session start");
            return Vec::new();
        }
        vec![RoomAction::Engine(EngineCommand::Receive { sender, payload })]
    }

    fn run_command(&mut self, target: Option<ChannelId>, command: Command) -> Result<Vec<RoomAction>, CommandError> {
        let scope = if target.is_some() { CommandScope::Channel } else { CommandScope::Room };
        if !command.is_available_in(scope) {
            let context = match scope {
                CommandScope::Room => "outside a channel",
                CommandScope::Channel => "inside a channel",
            };
            return Err(CommandError::NotAvailable { command: command.name(), context });
        }

        match command {
            Command::Help => Ok(lines(target, help_lines(self.config.command_prefix, scope))),
            Command::Whoami => Ok(vec![RoomAction::info(
                target,
                format!("{} ({})", self.identity.username(), self.identity.public_key()),
            )]),
            Command::ListUsers => {
                let users: Vec<String> = self
                    .roster
                    .iter()
                    .map(|user| match user.public_key() {
                        Some(key) => format!("{} ({key})", user.name()),
                        None => user.name().to_owned(),
                    })
                    .collect();
                if users.is_empty() {
                    Ok(vec![RoomAction::info(target, "nobody else is here")])
                } else {
                    Ok(lines(target, users))
                }
            },
            Command::ListParticipants => {
                let id = target.ok_or(CommandError::NotAvailable {
                    command: "list-participants",
                    context: "outside a channel",
                })?;
                Ok(lines(target, self.channel_for_command(id)?.list_participants()))
            },
            Command::SearchChannels => {
                self.ensure_started()?;
                Ok(vec![RoomAction::Engine(EngineCommand::SearchChannels)])
            },
            Command::CreateChannel => {
                self.ensure_started()?;
                Ok(vec![RoomAction::Engine(EngineCommand::CreateChannel)])
            },
            Command::JoinChannel { channel } => {
                self.ensure_started()?;
                self.channel_for_command(channel)?.join()
            },
            Command::Join => {
                self.ensure_started()?;
                let id = target.ok_or(CommandError::NotAvailable { command: "join", context: "outside a channel" })?;
                self.channel_for_command(id)?.join()
            },
            Command::Invite { name } => self.try_invite(target, &name),
            Command::Authorize { name } => self.try_authorize(target, &name),
        }
    }

    fn try_invite(&mut self, target: Option<ChannelId>, name: &str) -> Result<Vec<RoomAction>, CommandError> {
        self.ensure_started()?;
        if let Some(id) = target {
            return self.channel_for_command(id)?.invite(name, self.roster.public_key(name));
        }
        if name == self.identity.username() {
            return Err(CommandError::SelfTarget { operation: "invite" });
        }
        let public_key =
            self.roster.public_key(name).cloned().ok_or_else(|| CommandError::UnknownUser { name: name.to_owned() })?;
        self.try_queue_invites(InviteBatch::from([Invitee { name: name.to_owned(), public_key }]))
    }

    fn try_queue_invites(&mut self, batch: InviteBatch) -> Result<Vec<RoomAction>, CommandError> {
        self.ensure_started()?;
        if self.invite_queue.len() >= MAX_PENDING_INVITES {
            return Err(CommandError::InviteQueueFull { limit: MAX_PENDING_INVITES });
        }
        debug!(invitees = batch.len(), queued = self.invite_queue.len(), "queueing invitations");
        self.invite_queue.push_back(batch);
        Ok(vec![RoomAction::Engine(EngineCommand::CreateChannel)])
    }

    fn try_authorize(&mut self, target: Option<ChannelId>, name: &str) -> Result<Vec<RoomAction>, CommandError> {
        self.ensure_started()?;
        if let Some(id) = target {
            return self.channel_for_command(id)?.authorize(name);
        }
        if name == self.identity.username() {
            return Err(CommandError::SelfTarget { operation: "authorize" });
        }
        if !self.roster.contains(name) {
            return Err(CommandError::UnknownUser { name: name.to_owned() });
        }
        Ok(vec![RoomAction::Engine(EngineCommand::Authorize { channel: None, name: name.to_owned() })])
    }

    fn ensure_started(&self) -> Result<(), CommandError> {
        if !self.config.protocol_enabled {
            return Err(CommandError::ProtocolDisabled);
        }
        if !self.started {
            return Err(CommandError::NotStarted);
        }
        Ok(())
    }

    fn ensure_absent(&self, id: ChannelId) -> Result<(), ProtocolViolation> {
        if self.channels.contains_key(&id) {
            return Err(ProtocolViolation::ChannelExists { channel: id });
        }
        Ok(())
    }

    fn channel_for_command(&self, id: ChannelId) -> Result<&Channel, CommandError> {
        self.channels.get(&id).ok_or_else(|| CommandError::UnknownChannel { id: id.to_string() })
    }

    fn complete(&self, target: Option<ChannelId>, result: Result<Vec<RoomAction>, CommandError>) -> Vec<RoomAction> {
        result.unwrap_or_else(|err| self.reject(target, err))
    }

    fn reject(&self, target: Option<ChannelId>, err: CommandError) -> Vec<RoomAction> {
        debug!(%err, parse = err.is_parse_error(), "command rejected");
        vec![RoomAction::info(target, err.to_string())]
    }

    fn begin_connect(&mut self) -> Vec<RoomAction> {
        self.connection = ConnectionState::Connecting;
        vec![RoomAction::Engine(EngineCommand::Connect)]
    }

    fn insert_channel(&mut self, channel: Channel) -> Vec<RoomAction> {
        let id = channel.id();
        info!(channel = %id, members = channel.len(), "channel opened");
        self.channels.insert(id, channel);
        vec![RoomAction::ChannelOpened { channel: id }, RoomAction::Changed(Scope::Room)]
    }

    fn remove_channel(&mut self, id: ChannelId) -> Vec<RoomAction> {
        if self.channels.remove(&id).is_none() {
            return Vec::new();
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
        info!(channel = %id, "channel removed");
        vec![RoomAction::ChannelRemoved { channel: id }]
    }

    /// Erase every channel that flagged itself destroyed during dispatch.
    fn reap_destroyed(&mut self) -> Vec<RoomAction> {
        let destroyed: Vec<ChannelId> =
            self.channels.values().filter(|channel| channel.is_destroyed()).map(Channel::id).collect();
        if destroyed.is_empty() {
            return Vec::new();
        }

        let mut actions: Vec<RoomAction> = destroyed.into_iter().flat_map(|id| self.remove_channel(id)).collect();
        actions.push(RoomAction::Changed(Scope::Room));
        actions
    }

    fn teardown(&mut self) -> Vec<RoomAction> {
        let ids: Vec<ChannelId> = self.channels.keys().copied().collect();
        let mut actions: Vec<RoomAction> = ids.into_iter().flat_map(|id| self.remove_channel(id)).collect();

        self.roster.clear();
        self.timers.clear();
        if !self.invite_queue.is_empty() {
            debug!(dropped = self.invite_queue.len(), "dropping queued invitations");
            self.invite_queue.clear();
        }
        actions.push(RoomAction::Changed(Scope::Room));
        actions
    }
}

fn lines(target: Option<ChannelId>, text: Vec<String>) -> Vec<RoomAction> {
    text.into_iter().map(|line| RoomAction::info(target, line)).collect()
}
