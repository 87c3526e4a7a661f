//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use schnorr_auth::protocol::KeyPair;
use schnorr_auth::{Curve, PeerKey, PeerKeyResolver, ProverIdentity, Result};

/// Certificate text the toy resolver accepts.
pub const TOY_CERT: &str = "toy certificate";

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schnorr_auth=info"));

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Random source that makes [`schnorr_auth::protocol::schnorr::random_scalar`]
/// return a chosen sequence of scalars.
///
/// Each fill request consumes one scalar `v` and writes `v - 1` big-endian
/// into the tail of the buffer, which reduces to `v` as long as `v < N`.
pub struct ScriptedRng {
    scalars: VecDeque<u64>,
}

impl ScriptedRng {
    pub fn new(scalars: impl IntoIterator<Item = u64>) -> Self {
        Self {
            scalars: scalars.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.scalars.len()
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_be_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_be_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let value = self
            .scalars
            .pop_front()
            .expect("scripted randomness exhausted");
        assert!(value >= 1, "scripted scalars start at 1");

        dest.fill(0);
        let bytes = (value - 1).to_be_bytes();
        let take = bytes.len().min(dest.len());
        let tail = dest.len() - take;
        dest[tail..].copy_from_slice(&bytes[bytes.len() - take..]);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for ScriptedRng {}

/// Resolves any certificate to a fixed key on the toy curve.
pub struct StaticResolver {
    key: PeerKey,
}

impl StaticResolver {
    /// Binds the public point of secret `d` on the toy curve.
    pub fn toy(d: u32) -> Self {
        let curve = Curve::toy();
        let point = curve.mul_base(&BigUint::from(d));
        Self {
            key: PeerKey { curve, point },
        }
    }
}

impl PeerKeyResolver for StaticResolver {
    fn resolve(&self, _cert_pem: &str) -> Result<PeerKey> {
        Ok(self.key.clone())
    }
}

/// Prover identity with secret `d` on the toy curve.
pub fn toy_identity(d: u32) -> ProverIdentity {
    let key = KeyPair::new(Curve::toy(), &BigUint::from(d)).expect("d must lie in [1, 16]");
    ProverIdentity::new(key, TOY_CERT)
}

/// A self-signed P-256 certificate and key written to a temporary directory.
pub struct CertFiles {
    pub dir: tempfile::TempDir,
    pub cert: PathBuf,
    pub key: PathBuf,
}

pub fn write_p256_cert() -> CertFiles {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("Certificate generation should succeed");
    let dir = tempfile::tempdir().expect("Temporary directory should be created");
    let cert = dir.path().join("eccert.pem");
    let key = dir.path().join("ecpriv.pem");
    std::fs::write(&cert, certified.cert.pem()).expect("Certificate should be written");
    std::fs::write(&key, certified.key_pair.serialize_pem()).expect("Key should be written");
    CertFiles { dir, cert, key }
}
