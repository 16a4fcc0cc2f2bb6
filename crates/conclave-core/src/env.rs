//! Environment abstraction for deterministic testing.
//!
//! Decouples the room state machine from system resources (time, randomness).
//! Simulation uses a virtual clock and a seeded RNG so that identities and
//! timer deadlines are reproducible, production uses the real clock and OS
//! entropy.

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, simulation
    /// environments use a virtual instant advanced by the test.
    type Instant: Copy
        + Ord
        + Debug
        + Send
        + Sync
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleep for the specified duration.
    ///
    /// Production uses the async runtime's timer, simulation may return
    /// immediately and advance virtual time instead.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, a simulation environment produces the same
    /// sequence of bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
