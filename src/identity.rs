//! Certificate and private-key loading.
//!
//! The prover proves knowledge of the private key behind an X.509
//! certificate; the verifier learns the public point from the certificate the
//! prover sends during the handshake. Only P-256 keys are supported.

use std::fs;
use std::path::Path;

use num_bigint::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::primitives::{Curve, Point};
use crate::protocol::KeyPair;
use crate::{Error, Result};

/// A peer's public point and the curve it lives on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerKey {
    /// Curve of the key.
    pub curve: Curve,
    /// Public point `P`.
    pub point: Point,
}

/// Turns certificate text received in a handshake into a public key.
pub trait PeerKeyResolver: Send + Sync {
    /// Parses `cert_pem` and returns the key it certifies.
    fn resolve(&self, cert_pem: &str) -> Result<PeerKey>;
}

/// Resolves PEM-armored X.509 certificates carrying P-256 keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct X509Resolver;

impl PeerKeyResolver for X509Resolver {
    fn resolve(&self, cert_pem: &str) -> Result<PeerKey> {
        public_key_from_certificate(cert_pem)
    }
}

/// Extracts the P-256 public point from the first certificate in `cert_pem`.
pub fn public_key_from_certificate(cert_pem: &str) -> Result<PeerKey> {
    let der = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .next()
        .ok_or_else(|| Error::Certificate("no PEM certificate found".to_string()))?
        .map_err(|e| Error::Certificate(format!("cannot decode PEM: {e}")))?;

    let cert = Certificate::from_der(der.as_ref())
        .map_err(|e| Error::Certificate(format!("cannot parse certificate: {e}")))?;
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("cannot encode public key info: {e}")))?;

    let key = p256::PublicKey::from_public_key_der(&spki)
        .map_err(|e| Error::UnsupportedKey(format!("certificate key is not P-256: {e}")))?;

    Ok(PeerKey {
        curve: Curve::p256(),
        point: point_from_p256(&key)?,
    })
}

fn point_from_p256(key: &p256::PublicKey) -> Result<Point> {
    let encoded = key.to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok(Point::affine(
            BigUint::from_bytes_be(x),
            BigUint::from_bytes_be(y),
        )),
        _ => Err(Error::InvalidPoint(
            "public key is the point at infinity".to_string(),
        )),
    }
}

/// The prover's certificate together with the matching key pair.
#[derive(Clone, Debug)]
pub struct ProverIdentity {
    key_pair: KeyPair,
    certificate_pem: String,
}

impl ProverIdentity {
    /// Pairs an existing key with the certificate text sent in handshakes.
    ///
    /// No consistency check is made; use [`ProverIdentity::from_pem`] for
    /// keys read from disk.
    pub fn new(key_pair: KeyPair, certificate_pem: impl Into<String>) -> Self {
        Self {
            key_pair,
            certificate_pem: certificate_pem.into(),
        }
    }

    /// Parses a PEM certificate and a PEM PKCS#8 private key and checks that
    /// they belong together.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let certified = public_key_from_certificate(cert_pem)?;

        let key_der = rustls_pemfile::pkcs8_private_keys(&mut key_pem.as_bytes())
            .next()
            .ok_or_else(|| Error::Certificate("no PKCS#8 private key found".to_string()))?
            .map_err(|e| Error::Certificate(format!("cannot decode PEM: {e}")))?;

        let secret = p256::SecretKey::from_pkcs8_der(key_der.secret_pkcs8_der())
            .map_err(|e| Error::UnsupportedKey(format!("private key is not P-256: {e}")))?;
        let d = Zeroizing::new(secret.to_bytes().to_vec());
        let key_pair = KeyPair::new(Curve::p256(), &BigUint::from_bytes_be(&d))?;

        if key_pair.public() != &certified.point {
            return Err(Error::KeyMismatch);
        }

        Ok(Self::new(key_pair, cert_pem))
    }

    /// Reads the certificate and key files from disk.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_pem = read_pem(cert_path.as_ref())?;
        let key_pem = Zeroizing::new(read_pem(key_path.as_ref())?);
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Returns the key pair.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Returns the certificate text.
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }
}

fn read_pem(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Certificate(format!("cannot read {}: {e}", path.display())))
}
