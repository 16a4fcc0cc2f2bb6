//! Several sessions sharing one simulated host chat.
//!
//! [`SimNetwork`] plays the host chat client for every participant: it
//! relays each session's transport payloads to all other sessions, reports
//! departures, and drives the shared virtual clock. All sessions run over
//! the loopback engine behind a [`Watchdog`], so every engine call is
//! traced exactly as in production.

use std::{collections::BTreeMap, time::Duration};

use conclave_app::{Session, Watchdog, WatchdogConfig, WatchdogFactory};
use conclave_core::{Environment, Room, RoomConfig};

use crate::{
    RecordingPresentation, SimEnv,
    invariants::{RoomSnapshot, SystemSnapshot},
    loopback::{LoopbackEngine, LoopbackFactory},
};

/// Relay rounds after which delivery stops even if sessions keep talking.
pub const MAX_DELIVERY_ROUNDS: usize = 64;

/// Session type used by the simulation.
pub type SimSession = Session<WatchdogFactory<LoopbackFactory, SimEnv>, RecordingPresentation, SimEnv>;

/// Engine type inside a [`SimSession`].
pub type SimEngine = Watchdog<LoopbackEngine, SimEnv>;

/// A simulated multi-user room.
pub struct SimNetwork {
    env: SimEnv,
    config: RoomConfig,
    sessions: BTreeMap<String, SimSession>,
    next_origin: u64,
    delivered: usize,
}

impl SimNetwork {
    /// Empty network with a seeded environment.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, RoomConfig::default())
    }

    /// Empty network whose rooms use `config`.
    pub fn with_config(seed: u64, config: RoomConfig) -> Self {
        Self { env: SimEnv::with_seed(seed), config, sessions: BTreeMap::new(), next_origin: 1, delivered: 0 }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Bring `account` into the host chat and start its session.
    ///
    /// Returns the sanitized username. Joining twice is a no-op.
    pub fn join(&mut self, account: &str) -> String {
        let room = Room::new(self.env.clone(), account, self.config.clone());
        let name = room.username().to_owned();
        if self.sessions.contains_key(&name) {
            return name;
        }

        let factory = WatchdogFactory::new(
            LoopbackFactory::new(self.next_origin),
            self.env.clone(),
            WatchdogConfig::default(),
        );
        self.next_origin += 1;

        let mut session = Session::new(room, factory, RecordingPresentation::new());
        session.chat_joined();
        session.start();
        tracing::debug!(user = %name, "joined simulated chat");

        self.sessions.insert(name.clone(), session);
        self.deliver();
        name
    }

    /// Remove `name` from the host chat.
    ///
    /// The session closes (announcing its departure on the transport) and
    /// every other session is told the user left.
    pub fn leave(&mut self, name: &str) -> Option<SimSession> {
        let mut session = self.sessions.remove(name)?;
        session.close();
        let farewell = session.take_outgoing();
        for payload in farewell {
            self.broadcast(name, &payload);
        }
        for other in self.sessions.values_mut() {
            other.host_user_left(name);
        }
        self.deliver();
        Some(session)
    }

    /// Session for `name`.
    pub fn session(&self, name: &str) -> Option<&SimSession> {
        self.sessions.get(name)
    }

    /// Mutable session for `name`.
    pub fn session_mut(&mut self, name: &str) -> Option<&mut SimSession> {
        self.sessions.get_mut(name)
    }

    /// Run `input` against `name`'s session, then deliver all traffic.
    pub fn with_session(&mut self, name: &str, input: impl FnOnce(&mut SimSession)) -> bool {
        let Some(session) = self.sessions.get_mut(name) else {
            return false;
        };
        input(session);
        self.deliver();
        true
    }

    /// Type `text` into `name`'s focused view.
    pub fn type_line(&mut self, name: &str, text: &str) -> bool {
        self.with_session(name, |session| session.send_line(text))
    }

    /// Usernames currently in the chat.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Total payloads relayed.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Relay pending transport payloads until every session is quiet.
    ///
    /// Returns the number of payloads relayed.
    pub fn deliver(&mut self) -> usize {
        let mut relayed = 0;
        for round in 0..MAX_DELIVERY_ROUNDS {
            let outgoing: Vec<(String, Vec<String>)> = self
                .sessions
                .iter_mut()
                .map(|(name, session)| (name.clone(), session.take_outgoing()))
                .filter(|(_, payloads)| !payloads.is_empty())
                .collect();
            if outgoing.is_empty() {
                break;
            }
            for (sender, payloads) in outgoing {
                for payload in payloads {
                    relayed += self.broadcast(&sender, &payload);
                }
            }
            if round + 1 == MAX_DELIVERY_ROUNDS {
                tracing::warn!(rounds = MAX_DELIVERY_ROUNDS, "delivery did not settle");
            }
        }
        self.delivered += relayed;
        relayed
    }

    /// Advance the shared clock and deliver clock ticks to every session.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        let now = self.env.now();
        for session in self.sessions.values_mut() {
            session.tick(now);
        }
        self.deliver();
    }

    /// Observable state of every room.
    pub fn snapshot(&self) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::empty();
        for session in self.sessions.values() {
            snapshot.add_room(RoomSnapshot::from_room(session.room()));
        }
        snapshot
    }

    fn broadcast(&mut self, sender: &str, payload: &str) -> usize {
        let mut relayed = 0;
        for (name, session) in &mut self.sessions {
            if name != sender {
                session.received(sender, payload);
                relayed += 1;
            }
        }
        relayed
    }
}
