//! Environment abstraction for deterministic testing.
//!
//! Descriptor issuance needs the current time and sealing needs fresh
//! randomness. Both come from an [`Environment`] so tests can pin the clock
//! and seed the RNG while production uses the system clock and the OS RNG.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Abstract environment providing wall-clock time and randomness.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a test environment produces the same bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// A fresh CSPRNG seeded from [`Environment::random_bytes`].
    ///
    /// Used wherever an API takes `RngCore + CryptoRng` (sealing).
    fn rng(&self) -> ChaCha20Rng {
        let mut seed = [0u8; 32];
        self.random_bytes(&mut seed);
        ChaCha20Rng::from_seed(seed)
    }
}

/// Production environment using the system clock and the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Sealing without working randomness would
/// reuse ephemeral keys, so there is nothing safe to fall back to.
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
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

/// Deterministic environment: manually driven clock and seeded RNG.
///
/// Clones share the clock and the RNG stream.
#[derive(Debug, Clone)]
pub struct SeededEnv {
    clock: Arc<Mutex<DateTime<Utc>>>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededEnv {
    /// Environment starting at `now` with an RNG seeded from `seed`.
    pub fn new(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            clock: Arc::new(Mutex::new(now)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock to `now`.
    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        *clock += by;
    }
}

impl Environment for SeededEnv {
    fn now(&self) -> DateTime<Utc> {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
