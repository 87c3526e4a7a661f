//! Session states, roles and the result of one protocol step.

use std::fmt;

use super::codec::ProtocolEvent;

/// Protocol progress of one session.
///
/// Both roles walk `Uninit -> Init -> Commit -> Accept`; errors fall back to
/// `Uninit`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    /// No peer key bound yet.
    #[default]
    Uninit,
    /// Handshake done, waiting for a commitment.
    Init,
    /// Commitment and challenge exchanged, waiting for the response.
    Commit,
    /// Proof accepted.
    Accept,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninit => "UNINIT",
            Self::Init => "INIT",
            Self::Commit => "COMMIT",
            Self::Accept => "ACCEPT",
        };
        f.write_str(name)
    }
}

/// Which side of the identification protocol a session plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Holds the private key (client).
    Prover,
    /// Checks proofs (server).
    Verifier,
}

impl Role {
    /// Lowercase role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prover => "prover",
            Self::Verifier => "verifier",
        }
    }
}

/// What the transport should do after relaying a step's replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the connection open.
    #[default]
    Continue,
    /// Close this connection.
    Close,
    /// Stop the whole verifier process.
    Shutdown,
}

/// Result of feeding one event or intent into a role machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Events to send to the peer, in order.
    pub replies: Vec<ProtocolEvent>,
    /// What happens to the connection afterwards.
    pub disposition: Disposition,
}

impl Step {
    /// A step that sends nothing.
    pub fn silent() -> Self {
        Self::default()
    }

    /// A step that sends a single event.
    pub fn reply(event: ProtocolEvent) -> Self {
        Self {
            replies: vec![event],
            disposition: Disposition::Continue,
        }
    }

    /// Replaces the disposition.
    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }
}
