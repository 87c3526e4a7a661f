//! Schnorr identification primitives.
//!
//! Pure functions over a [`Curve`]: drawing scalars, committing, answering a
//! challenge and checking `r*G == K + e*P`. Nothing here touches sockets or
//! session state.

use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use crate::primitives::{Curve, Point};
use crate::{Error, Result};

/// Extra random bytes drawn beyond the byte length of `N`.
///
/// They shrink the modulo bias of [`random_scalar`] but do not remove it.
pub const EXTRA_RANDOM_BYTES: usize = 8;

/// Draws a scalar in `[1, N-1]`.
///
/// Reads `ceil(bits(N) / 8) + 8` random bytes, reduces them modulo `N - 1`
/// and adds one.
pub fn random_scalar<R: CryptoRngCore + ?Sized>(curve: &Curve, rng: &mut R) -> Result<BigUint> {
    let len = (curve.order().bits() as usize).div_ceil(8) + EXTRA_RANDOM_BYTES;
    let mut buf = Zeroizing::new(vec![0u8; len]);
    rng.try_fill_bytes(&mut buf)
        .map_err(|e| Error::Randomness(e.to_string()))?;

    let n_minus_one = curve.order() - 1u32;
    Ok(BigUint::from_bytes_be(&buf) % n_minus_one + 1u32)
}

/// Draws a fresh ephemeral secret `k`.
pub fn draw_nonce<R: CryptoRngCore + ?Sized>(curve: &Curve, rng: &mut R) -> Result<Nonce> {
    let k = random_scalar(curve, rng)?;
    Ok(Nonce::from_biguint(&k))
}

/// Computes the commitment `K = k*G`.
pub fn commit(curve: &Curve, nonce: &Nonce) -> Point {
    curve.mul_base(&nonce.scalar())
}

/// Draws the verifier's challenge `e` in `[1, N-1]`.
pub fn challenge<R: CryptoRngCore + ?Sized>(curve: &Curve, rng: &mut R) -> Result<BigUint> {
    random_scalar(curve, rng)
}

/// Computes `r = (k + e*d) mod N`.
///
/// Takes the nonce by value: it is wiped when this returns and cannot be
/// used for a second response.
pub fn respond(nonce: Nonce, challenge: &BigUint, key: &KeyPair) -> BigUint {
    let k = nonce.scalar();
    let d = key.secret_scalar();
    (k + challenge * d) % key.curve().order()
}

/// Checks `r*G == K + e*P`.
///
/// Any input that does not satisfy the equation yields `false`, including
/// points off the curve, the identity for either `K` or `P`, and scalars
/// that are not reduced modulo `N`.
pub fn verify(
    curve: &Curve,
    commitment: &Point,
    challenge: &BigUint,
    public: &Point,
    response: &BigUint,
) -> bool {
    // Unreduced scalars would make the ladder run for as many bits as the
    // peer cares to send.
    if response >= curve.order() || !in_scalar_range(curve, challenge) {
        return false;
    }
    if commitment.is_identity() || public.is_identity() {
        return false;
    }
    if !curve.contains(commitment) || !curve.contains(public) {
        return false;
    }

    let lhs = curve.mul_base(response);
    let rhs = curve.add(commitment, &curve.mul(challenge, public));
    lhs == rhs
}

/// Ephemeral secret `k` for a single commitment.
///
/// Stored as a big-endian buffer that is zeroized on drop.
pub struct Nonce(Zeroizing<Vec<u8>>);

impl Nonce {
    /// Wraps a caller-chosen `k`, which must lie in `[1, N-1]`.
    pub fn from_scalar(curve: &Curve, k: &BigUint) -> Result<Self> {
        check_range(curve, k, "nonce")?;
        Ok(Self::from_biguint(k))
    }

    fn from_biguint(k: &BigUint) -> Self {
        Self(Zeroizing::new(k.to_bytes_be()))
    }

    fn scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}

/// A private scalar `d` together with its public point `P = d*G`.
#[derive(Clone)]
pub struct KeyPair {
    curve: Curve,
    secret: Zeroizing<Vec<u8>>,
    public: Point,
}

impl KeyPair {
    /// Builds a key pair from `d`, which must lie in `[1, N-1]`.
    pub fn new(curve: Curve, d: &BigUint) -> Result<Self> {
        check_range(&curve, d, "private key")?;
        let public = curve.mul_base(d);
        Ok(Self {
            curve,
            secret: Zeroizing::new(d.to_bytes_be()),
            public,
        })
    }

    /// Generates a random key pair.
    pub fn generate<R: CryptoRngCore + ?Sized>(curve: Curve, rng: &mut R) -> Result<Self> {
        let d = Zeroizing::new(random_scalar(&curve, rng)?.to_bytes_be());
        Self::new(curve, &BigUint::from_bytes_be(&d))
    }

    /// Returns the curve the key lives on.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Returns the public point `P`.
    pub fn public(&self) -> &Point {
        &self.public
    }

    fn secret_scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve.name())
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn check_range(curve: &Curve, value: &BigUint, what: &str) -> Result<()> {
    if value.is_zero() || value >= curve.order() {
        return Err(Error::InvalidScalar(format!(
            "{what} must lie in [1, N-1] for {}",
            curve.name()
        )));
    }
    Ok(())
}

/// Returns true if `value` lies in `[1, N-1]`.
pub fn in_scalar_range(curve: &Curve, value: &BigUint) -> bool {
    value >= &BigUint::one() && value < curve.order()
}
