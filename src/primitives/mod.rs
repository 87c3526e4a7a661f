//! Mathematical building blocks for the identification protocol.
//!
//! - **curve**: prime-order short-Weierstrass curves and affine point arithmetic
//! - **nist**: P-256 scalar multiplication via the `p256` crate
//! - **rng**: operating-system randomness

/// Elliptic curve parameters and point arithmetic.
pub mod curve;
mod nist;
/// Cryptographically secure random number generation.
pub mod rng;

pub use curve::{Curve, Point};
pub use rng::SecureRng;
