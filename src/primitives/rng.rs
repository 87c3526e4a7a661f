//! Operating-system randomness for nonces and challenges.

use rand_core::{CryptoRng, OsRng, RngCore};

/// Random source backed by the operating system.
///
/// Every session in production draws its ephemeral nonces and challenges
/// from one of these; tests substitute a scripted source through the same
/// `CryptoRngCore` bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecureRng(OsRng);

impl SecureRng {
    /// Creates a new OS-backed random source.
    pub fn new() -> Self {
        Self(OsRng)
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl CryptoRng for SecureRng {}
