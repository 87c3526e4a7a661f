/// Line codec for protocol messages.
pub mod codec;
/// Prover state machine and user intents.
pub mod prover;
/// Schnorr commitment, challenge, response and verification.
pub mod schnorr;
/// Shared session states and step results.
pub mod state;
/// Verifier state machine.
pub mod verifier;

pub use codec::{decode, encode, DecodeError, ProtocolEvent};
pub use prover::{Intent, ProverMachine};
pub use schnorr::{KeyPair, Nonce};
pub use state::{Disposition, Role, State, Step};
pub use verifier::VerifierMachine;
