/// Prover configuration.
pub mod config;

/// Prover actor owning the session.
pub mod actor;

pub use actor::{run, ClientUpdate, CloseReason};
pub use config::ClientConfig;
