//! Production environment using system time and the OS RNG.
//!
//! Time comes from `std::time::Instant`, sleeping from tokio and randomness
//! from getrandom. Identity keys generated through this environment are
//! security-grade; nothing about it is reproducible.

use std::time::Duration;

use conclave_core::Environment;

/// Production environment.
///
/// # Panics
///
/// Panics if the OS RNG fails. A client without working randomness cannot
/// generate identity keys, and continuing would be worse than stopping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys cannot be generated");
    }
}
