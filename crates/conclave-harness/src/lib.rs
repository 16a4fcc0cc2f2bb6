//! Deterministic simulation harness for Conclave rooms.
//!
//! Seeded implementations of the Environment trait and an in-memory engine
//! for deterministic, reproducible testing of multi-user rooms.
//!
//! # Components
//!
//! - [`SimEnv`]: virtual clock and seeded RNG
//! - [`LoopbackEngine`]: cooperative engine over a plain-text wire format
//! - [`SimNetwork`]: several sessions sharing one simulated host chat
//! - [`RecordingPresentation`]: presentation that logs what it is shown
//!
//! # Model-Based Testing
//!
//! The `model` module defines arbitrary [`Operation`]s that proptest and the
//! fuzzer generate and apply to a [`SimNetwork`].
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Use [`InvariantRegistry::standard()`] for the room invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod loopback;
pub mod model;
pub mod network;
pub mod recorder;
pub mod sim_env;
pub mod wire;

pub use invariants::{
    AuthorizersArePresent, ChannelSnapshot, ChannelsNonEmpty, FocusIsValid, Invariant, InvariantRegistry,
    InvariantResult, ParticipantSnapshot, QueueBounded, RoomSnapshot, SelfAuthorized, SystemSnapshot,
    Violation,
};
pub use loopback::{LoopbackEngine, LoopbackFactory};
pub use model::{Operation, SmallText, USERS, UserId};
pub use network::{SimEngine, SimNetwork, SimSession};
pub use recorder::{RecordingPresentation, Shown};
pub use sim_env::{SimEnv, SimInstant};
pub use wire::{WIRE_PREFIX, WireMessage};
