//! Session layer for Conclave
//!
//! Binds the sans-IO room state machine from `conclave-core` to a
//! secure-messaging engine and a frontend, so the same orchestration runs
//! in production and in deterministic simulation.
//!
//! # Components
//!
//! - [`Engine`] / [`EngineFactory`]: boundary to the messaging engine
//! - [`Presentation`]: frontend notifications
//! - [`Session`]: executes room actions and feeds engine callbacks back
//! - [`Watchdog`]: traces and times every engine call
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic event loop using a Driver
//! - [`SystemEnv`]: production environment

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
pub mod engine;
mod error;
mod presentation;
mod runtime;
mod session;
mod system_env;
mod watchdog;

pub use driver::{Driver, HostEvent};
pub use engine::{Engine, EngineFactory, EngineResult};
pub use error::EngineError;
pub use presentation::Presentation;
pub use runtime::Runtime;
pub use session::Session;
pub use system_env::SystemEnv;
pub use watchdog::{DEFAULT_SLOW_CALL_THRESHOLD, Watchdog, WatchdogConfig, WatchdogFactory};
