//! Interactive Schnorr identification over a line-oriented TCP protocol.
//!
//! A prover holding the private key `d` behind an X.509 certificate convinces
//! a verifier that it knows `d` without revealing it:
//!
//! 1. the prover sends its certificate and the verifier binds `P = d*G`;
//! 2. the prover commits to `K = k*G` for a fresh secret `k`;
//! 3. the verifier answers with a random challenge `e`;
//! 4. the prover responds with `r = (k + e*d) mod N`;
//! 5. the verifier accepts when `r*G == K + e*P`.
//!
//! [`Session`] drives either role from wire lines, and the `server` and
//! `client` modules run it over tokio sockets.
//!
//! ```
//! use num_bigint::BigUint;
//! use schnorr_auth::primitives::Curve;
//! use schnorr_auth::protocol::{schnorr, KeyPair, Nonce};
//!
//! let key = KeyPair::new(Curve::toy(), &BigUint::from(5u32)).unwrap();
//! let curve = key.curve().clone();
//! let nonce = Nonce::from_scalar(&curve, &BigUint::from(3u32)).unwrap();
//! let commitment = schnorr::commit(&curve, &nonce);
//! let e = BigUint::from(4u32);
//! let r = schnorr::respond(nonce, &e, &key);
//!
//! assert_eq!(r, BigUint::from(6u32));
//! assert!(schnorr::verify(&curve, &commitment, &e, key.public(), &r));
//! ```

/// Prover runtime and configuration.
pub mod client;
/// Error types.
pub mod error;
/// Certificates, private keys and peer key resolution.
pub mod identity;
/// Curve arithmetic and randomness.
pub mod primitives;
/// Wire codec, Schnorr operations and role state machines.
pub mod protocol;
/// Verifier runtime and configuration.
pub mod server;
/// Session facade over the role machines.
pub mod session;
/// Line transport over async streams.
pub mod transport;

pub use error::{Error, Result};
pub use identity::{PeerKey, PeerKeyResolver, ProverIdentity, X509Resolver};
pub use primitives::{Curve, Point, SecureRng};
pub use protocol::{Disposition, KeyPair, Nonce, ProtocolEvent, Role, State};
pub use session::{Output, Session};
