//! Line-mode console for Conclave rooms.
//!
//! Reads chat lines and host directives from stdin and prints everything the
//! room reports. In-process peers running the loopback engine stand in for
//! other users, so the full invite/join/authorize flow can be tried from a
//! single terminal.
//!
//! # Components
//!
//! - [`ConsoleDriver`]: [`conclave_app::Driver`] over a line reader
//! - [`Console`]: [`conclave_app::Presentation`] writing tagged lines
//! - [`PeerGroup`]: simulated users sharing the transport

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod console;
pub mod driver;
pub mod input;
pub mod peers;

pub use console::Console;
pub use driver::{ConsoleDriver, ConsoleError, ConsoleOptions};
pub use input::{HOST_PREFIX, Input, InputError, parse_line};
pub use peers::{PeerGroup, PeerLog, PeerSession};
