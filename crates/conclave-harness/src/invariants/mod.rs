//! Room properties checked between simulation steps.
//!
//! Each [`SimNetwork`](crate::SimNetwork) session is reduced to a
//! [`RoomSnapshot`]; the checks in [`InvariantRegistry::standard`] then
//! look at all of them at once. A check sees only the snapshot, never the
//! live room, so it cannot disturb the run it observes.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! network.deliver();
//! registry.assert_all(&network.snapshot(), "after delivery");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{AuthorizersArePresent, ChannelsNonEmpty, FocusIsValid, QueueBounded, SelfAuthorized};
pub use snapshot::{ChannelSnapshot, ParticipantSnapshot, RoomSnapshot, SystemSnapshot};

/// Outcome of a single check.
pub type InvariantResult = Result<(), Violation>;

/// A check that failed, and what it saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Check that failed.
    pub invariant: &'static str,
    /// Offending room and state.
    pub message: String,
}

impl Violation {
    /// Failure of `invariant`.
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of every room in a snapshot.
pub trait Invariant: Send + Sync {
    /// Short identifier used in reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`; report the first offending room.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of checks run together.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The room checks used by the simulation tests and the fuzzer.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ChannelsNonEmpty);
        registry.add(AuthorizersArePresent);
        registry.add(SelfAuthorized);
        registry.add(FocusIsValid);
        registry.add(QueueBounded);
        registry
    }

    /// Register another check.
    pub fn add(&mut self, check: impl Invariant + 'static) {
        self.checks.push(Box::new(check));
    }

    /// Names of the registered checks, in run order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().map(|check| check.name())
    }

    /// Run every check and collect all failures.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let failures: Vec<Violation> = self.checks.iter().filter_map(|check| check.check(state).err()).collect();
        if failures.is_empty() { Ok(()) } else { Err(failures) }
    }

    /// Run every check and panic with all failures and `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(failures) = self.check_all(state) {
            let report = failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n  ");
            panic!("room invariants broken {context}:\n  {report}");
        }
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// True without checks.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
