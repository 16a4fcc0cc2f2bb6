//! Deterministic environment for simulation.
//!
//! `SimEnv` replaces wall-clock time with a virtual clock that only moves
//! when the test advances it, and OS randomness with a seeded ChaCha stream.
//! Two runs with the same seed and the same operations generate the same
//! identity keys and fire the same timers at the same virtual instants.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use conclave_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Point on the virtual timeline, measured from simulation start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since simulation start.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

/// Seeded, virtually-clocked environment.
///
/// Clones share the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    elapsed_nanos: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with an explicit RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst)))
    }

    /// Advances the virtual clock and completes immediately.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
