//! One protocol session: a role machine plus its random source.
//!
//! The session speaks in wire lines. It decodes what the peer sent, feeds the
//! event to the role machine and hands back encoded replies together with
//! what the transport should do next. It performs no I/O of its own.

use std::sync::Arc;

use rand_core::CryptoRngCore;
use tracing::debug;

use crate::identity::{PeerKeyResolver, ProverIdentity};
use crate::primitives::SecureRng;
use crate::protocol::{
    codec, Disposition, Intent, ProtocolEvent, ProverMachine, Role, State, Step, VerifierMachine,
};
use crate::{Error, Result};

/// Lines to send and what to do with the connection afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    /// Encoded lines, each ending in `\n`, in send order.
    pub lines: Vec<String>,
    /// Connection handling after the lines are sent.
    pub disposition: Disposition,
}

impl Output {
    /// True if nothing is sent and the connection stays open.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.disposition == Disposition::Continue
    }

    /// Decodes the lines back into events.
    pub fn events(&self) -> Vec<ProtocolEvent> {
        self.lines
            .iter()
            .filter_map(|line| codec::decode(line).ok())
            .collect()
    }
}

impl From<Step> for Output {
    fn from(step: Step) -> Self {
        Self {
            lines: step.replies.iter().map(codec::encode).collect(),
            disposition: step.disposition,
        }
    }
}

enum Machine {
    Prover(ProverMachine),
    Verifier(VerifierMachine),
}

/// A prover or verifier session driven by wire lines and user commands.
pub struct Session<R = SecureRng> {
    machine: Machine,
    rng: R,
}

impl Session<SecureRng> {
    /// Creates a prover session backed by the OS random source.
    pub fn prover(identity: ProverIdentity) -> Self {
        Self::prover_with_rng(identity, SecureRng::new())
    }

    /// Creates a verifier session backed by the OS random source.
    pub fn verifier(resolver: Arc<dyn PeerKeyResolver>) -> Self {
        Self::verifier_with_rng(resolver, SecureRng::new())
    }
}

impl<R: CryptoRngCore> Session<R> {
    /// Creates a prover session drawing nonces from `rng`.
    pub fn prover_with_rng(identity: ProverIdentity, rng: R) -> Self {
        Self {
            machine: Machine::Prover(ProverMachine::new(identity)),
            rng,
        }
    }

    /// Creates a verifier session drawing challenges from `rng`.
    pub fn verifier_with_rng(resolver: Arc<dyn PeerKeyResolver>, rng: R) -> Self {
        Self {
            machine: Machine::Verifier(VerifierMachine::new(resolver)),
            rng,
        }
    }

    /// The role this session plays.
    pub fn role(&self) -> Role {
        match self.machine {
            Machine::Prover(_) => Role::Prover,
            Machine::Verifier(_) => Role::Verifier,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        match &self.machine {
            Machine::Prover(m) => m.state(),
            Machine::Verifier(m) => m.state(),
        }
    }

    /// The prover machine, if this is a prover session.
    pub fn as_prover(&self) -> Option<&ProverMachine> {
        match &self.machine {
            Machine::Prover(m) => Some(m),
            Machine::Verifier(_) => None,
        }
    }

    /// The verifier machine, if this is a verifier session.
    pub fn as_verifier(&self) -> Option<&VerifierMachine> {
        match &self.machine {
            Machine::Verifier(m) => Some(m),
            Machine::Prover(_) => None,
        }
    }

    /// Handles one line received from the peer.
    pub fn on_incoming(&mut self, line: &str) -> Output {
        let step = match codec::decode(line) {
            Ok(event) => {
                debug!(role = self.role().as_str(), kind = event.kind(), "inbound message");
                match &mut self.machine {
                    Machine::Prover(m) => m.on_event(event),
                    Machine::Verifier(m) => m.on_event(event, &mut self.rng),
                }
            }
            Err(err) => match &mut self.machine {
                Machine::Prover(m) => m.on_decode_error(&err),
                Machine::Verifier(m) => m.on_decode_error(&err),
            },
        };
        step.into()
    }

    /// Handles one command typed by the prover's user.
    ///
    /// Fails with [`Error::WrongRole`] on a verifier session and with
    /// [`Error::IntentRejected`] when the state forbids the command.
    pub fn user_intent(&mut self, command: &str) -> Result<Output> {
        let Machine::Prover(m) = &mut self.machine else {
            return Err(Error::WrongRole(Role::Verifier.as_str()));
        };
        let step = m.on_intent(Intent::parse(command), &mut self.rng)?;
        Ok(step.into())
    }
}
