//! Conclave core
//!
//! Sans-IO state machine for secure group chat sessions layered on an
//! existing chat conversation. A [`Room`] sits between three collaborators:
//! the host chat (transport and presentation), a secure-messaging engine that
//! does the cryptography, and the local user typing into the conversation.
//!
//! # Architecture
//!
//! The core performs no I/O. It receives [`RoomEvent`]s (engine callbacks,
//! transport data, clock ticks) and calls from presentation, and returns
//! [`RoomAction`]s for the caller to execute. Time and randomness come from an
//! [`Environment`] so the same code runs under simulation.
//!
//! # Components
//!
//! - [`Room`]: session lifecycle, roster, channel collection, invite queue
//! - [`Channel`]: one encrypted sub-conversation and its membership
//! - [`Participant`]: one user's trust and membership state
//! - [`Command`]: the local `.command` mini-language
//! - [`TimerRegistry`]: deadlines for engine-requested timers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod action;
pub mod channel;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod event;
pub mod identity;
pub mod ids;
pub mod participant;
pub mod room;
pub mod roster;
pub mod timer;

pub use action::{EngineCommand, Level, RoomAction, Scope};
pub use channel::Channel;
pub use command::{Command, CommandScope};
pub use config::RoomConfig;
pub use ed25519_dalek::SigningKey;
pub use env::Environment;
pub use error::{CommandError, ParseError, ProtocolViolation};
pub use event::{ChannelEvent, EngineEvent, RoomEvent};
pub use identity::{Identity, PublicKey, sanitize_name};
pub use ids::{ChannelId, TimerToken};
pub use participant::{MembershipState, Participant};
pub use room::{ConnectionState, InviteBatch, Invitee, MAX_PENDING_INVITES, Room};
pub use roster::Roster;
pub use timer::TimerRegistry;
