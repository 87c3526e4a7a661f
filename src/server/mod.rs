/// Verifier configuration.
pub mod config;

/// TCP accept loop and per-connection tasks.
pub mod service;

pub use config::ServerConfig;
pub use service::{drive_connection, ShutdownHandle, VerifierServer};
