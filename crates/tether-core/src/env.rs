//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (randomness, wall-clock
//! time). Production uses the OS RNG and system clock; simulation uses a
//! seeded RNG and a virtual clock so runs are reproducible.

/// Abstract environment providing randomness and time.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a simulated environment produces the same sequence
///   of bytes
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Milliseconds since the Unix epoch.
    ///
    /// Only used for reporting (status timestamps); protocol decisions never
    /// depend on it.
    fn wall_clock_millis(&self) -> u64;

    /// Generates a random `u64`.
    ///
    /// Used to assign session IDs to accepted connections.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
