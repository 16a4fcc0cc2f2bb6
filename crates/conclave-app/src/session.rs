//! Executes room actions against an engine and a presentation.
//!
//! The [`Session`] is the only place where the room's effects meet the
//! outside world. It owns the [`Room`], the engine session once opened and
//! the frontend.
//!
//! # Responsibilities
//!
//! - Opens the engine session when the room requests it.
//! - Routes engine commands and feeds the resulting callbacks back into the
//!   room depth-first, so callbacks are handled before any action queued
//!   behind the command that caused them.
//! - Accumulates transport payloads for the driver to send.
//! - Reports engine failures without letting them abort the room.

use std::collections::VecDeque;

use conclave_core::{
    ChannelId, EngineCommand, EngineEvent, Environment, Level, Room, RoomAction, RoomEvent,
};

use crate::{
    EngineError, Presentation,
    engine::{self, EngineFactory},
};

/// Binds a [`Room`] to an engine and a frontend.
pub struct Session<F, P, E>
where
    F: EngineFactory,
    P: Presentation,
    E: Environment,
{
    room: Room<E>,
    factory: F,
    engine: Option<F::Engine>,
    presentation: P,
    outgoing: Vec<String>,
    engine_failures: u64,
}

impl<F, P, E> Session<F, P, E>
where
    F: EngineFactory,
    P: Presentation,
    E: Environment,
{
    /// Create a session. Nothing happens until [`Session::start`].
    pub fn new(room: Room<E>, factory: F, presentation: P) -> Self {
        Self {
            room,
            factory,
            engine: None,
            presentation,
            outgoing: Vec::new(),
            engine_failures: 0,
        }
    }

    /// The room state machine.
    pub fn room(&self) -> &Room<E> {
        &self.room
    }

    /// The frontend.
    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// Mutable access to the frontend.
    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }

    /// The open engine session, if any.
    pub fn engine(&self) -> Option<&F::Engine> {
        self.engine.as_ref()
    }

    /// Mutable access to the open engine session.
    pub fn engine_mut(&mut self) -> Option<&mut F::Engine> {
        self.engine.as_mut()
    }

    /// The engine factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Number of engine calls that failed.
    pub fn engine_failures(&self) -> u64 {
        self.engine_failures
    }

    /// Drain payloads waiting to be sent over the transport.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Run `operation` on the room and execute the actions it returns.
    pub fn with_room(&mut self, operation: impl FnOnce(&mut Room<E>) -> Vec<RoomAction>) {
        let actions = operation(&mut self.room);
        self.execute(actions);
    }

    /// Feed an event into the room.
    pub fn handle(&mut self, event: RoomEvent<E::Instant>) {
        let actions = self.room.handle(event);
        self.execute(actions);
    }

    /// Start the room, opening the engine session.
    pub fn start(&mut self) {
        self.with_room(Room::start);
    }

    /// Close the room and drop the engine session.
    pub fn close(&mut self) {
        self.with_room(Room::close);
        if self.engine.take().is_some() {
            tracing::debug!(user = self.room.username(), "engine session closed");
        }
    }

    /// The local user typed `text` into the focused view.
    pub fn send_line(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.with_room(|room| room.send_chat_message(text));
    }

    /// Raw data arrived from the transport.
    pub fn received(&mut self, sender: impl Into<String>, payload: impl Into<String>) {
        self.handle(RoomEvent::ReceivedData { sender: sender.into(), payload: payload.into() });
    }

    /// Clock tick.
    pub fn tick(&mut self, now: E::Instant) {
        self.handle(RoomEvent::Tick { now });
    }

    /// The host joined the underlying chat.
    pub fn chat_joined(&mut self) {
        self.with_room(Room::chat_joined);
    }

    /// The host left the underlying chat.
    pub fn chat_left(&mut self) {
        self.with_room(Room::chat_left);
    }

    /// The host saw `name` leave the underlying chat.
    pub fn host_user_left(&mut self, name: &str) {
        self.with_room(|room| room.host_user_left(name));
    }

    /// Direct subsequent input to `channel`.
    pub fn focus(&mut self, channel: ChannelId) {
        self.with_room(|room| room.focus(channel));
    }

    /// Direct subsequent input to the room.
    pub fn unfocus(&mut self) {
        self.with_room(Room::unfocus);
    }

    fn execute(&mut self, actions: Vec<RoomAction>) {
        let mut pending: VecDeque<RoomAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                RoomAction::Engine(command) => {
                    let mut follow_up = Vec::new();
                    for event in self.call_engine(&command) {
                        follow_up.extend(self.room.handle(RoomEvent::Engine(event)));
                    }
                    for action in follow_up.into_iter().rev() {
                        pending.push_front(action);
                    }
                },
                RoomAction::Transmit { payload } => self.outgoing.push(payload),
                RoomAction::Display { channel, sender, text } => {
                    self.presentation.display(channel, &sender, &text);
                },
                RoomAction::Inform { channel, level, message } => {
                    self.presentation.inform(channel, level, &message);
                },
                RoomAction::Changed(scope) => self.presentation.changed(&scope),
                RoomAction::ChannelOpened { channel } => self.presentation.channel_opened(channel),
                RoomAction::ChannelRemoved { channel } => {
                    self.presentation.channel_removed(channel);
                },
                RoomAction::CloseView { channel } => self.presentation.close_view(channel),
            }
        }
    }

    fn call_engine(&mut self, command: &EngineCommand) -> Vec<EngineEvent> {
        if let EngineCommand::Open { username, public_key } = command {
            if self.engine.is_some() {
                tracing::debug!(user = %username, "engine session already open");
                return Vec::new();
            }
            return match self.factory.open(username, public_key) {
                Ok(engine) => {
                    tracing::info!(user = %username, key = %public_key, "engine session opened");
                    self.engine = Some(engine);
                    Vec::new()
                },
                Err(err) => {
                    self.engine_failed(command, &err);
                    Vec::new()
                },
            };
        }

        let result = match self.engine.as_mut() {
            Some(open) => engine::execute(open, command),
            None => Err(EngineError::NotOpen),
        };
        match result {
            Ok(events) => {
                tracing::trace!(command = command.kind(), events = events.len(), "engine call");
                events
            },
            Err(err) => {
                self.engine_failed(command, &err);
                Vec::new()
            },
        }
    }

    fn engine_failed(&mut self, command: &EngineCommand, err: &EngineError) {
        self.engine_failures += 1;
        tracing::warn!(
            command = command.kind(),
            transient = err.is_transient(),
            error = %err,
            "engine call failed"
        );

        let level = if err.is_remote() { Level::Warning } else { Level::Error };
        let channel = match command {
            EngineCommand::JoinChannel { channel }
            | EngineCommand::Invite { channel, .. }
            | EngineCommand::Leave { channel, .. } => Some(*channel),
            EngineCommand::SendChat { channel, .. } | EngineCommand::Authorize { channel, .. } => {
                *channel
            },
            _ => None,
        };
        let channel = channel.filter(|id| self.room.channel(*id).is_some());
        self.presentation.inform(channel, level, &err.to_string());
    }
}
