//! Error types for Schnorr authentication.

use crate::protocol::codec::DecodeError;
use crate::protocol::state::State;
use crate::transport::TransportError;

/// Main error types for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid curve parameters were provided.
    #[error("Invalid curve parameters: {0}")]
    InvalidParams(String),

    /// A scalar value is invalid or out of range.
    #[error("Invalid scalar: {0}")]
    InvalidScalar(String),

    /// A point is not on the curve or cannot be used.
    #[error("Invalid curve point: {0}")]
    InvalidPoint(String),

    /// The random source failed to produce bytes.
    #[error("Random source failure: {0}")]
    Randomness(String),

    /// A certificate or key file could not be parsed.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// The certificate carries a key type this crate cannot use.
    #[error("Unsupported key type: {0}")]
    UnsupportedKey(String),

    /// The private key does not belong to the certificate.
    #[error("Private and public keys don't match")]
    KeyMismatch,

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A user intent is not legal in the current protocol state.
    #[error("Cannot {intent} in state {state}")]
    IntentRejected {
        /// The intent that was refused.
        intent: &'static str,
        /// State the session was in.
        state: State,
    },

    /// The operation is only available to the other role.
    #[error("Operation not available to the {0} role")]
    WrongRole(&'static str),

    /// A wire line could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The line transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;
