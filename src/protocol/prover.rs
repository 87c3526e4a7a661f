//! Prover side of the identification protocol.
//!
//! Console commands are parsed into [`Intent`]s and refused locally unless
//! the session is in the right state. The ephemeral nonce lives here from
//! commitment until the response is computed.

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use tracing::{debug, info, warn};

use super::codec::{DecodeError, ProtocolEvent, CONTROL_QUIT};
use super::schnorr::{self, Nonce};
use super::state::{Disposition, State, Step};
use crate::identity::ProverIdentity;
use crate::{Error, Result};

/// A command typed by the prover's user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// `/h`, `/handshake`: present the certificate.
    Handshake,
    /// `/c`, `/commitment`: draw `k` and send `K = k*G`.
    Commit,
    /// `/r`, `/response`: answer the pending challenge.
    Respond,
    /// `/read`: ask for the read privilege.
    Read,
    /// `/time`: ask the verifier for its clock.
    Time,
    /// `/q`, `/quit`: ask the verifier to shut down.
    Quit,
    /// `/leave`: announce departure and close the connection.
    Leave,
    /// Anything else, forwarded verbatim.
    Raw(String),
}

impl Intent {
    /// Maps a typed line to an intent.
    pub fn parse(command: &str) -> Self {
        let command = command.trim_end_matches(['\r', '\n']);
        match command.trim() {
            "/h" | "/handshake" => Self::Handshake,
            "/c" | "/commitment" => Self::Commit,
            "/r" | "/response" => Self::Respond,
            "/read" => Self::Read,
            "/time" => Self::Time,
            "/q" | "/quit" => Self::Quit,
            "/leave" => Self::Leave,
            _ => Self::Raw(command.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Commit => "commit",
            Self::Respond => "respond",
            Self::Read => "read",
            Self::Time => "time",
            Self::Quit => "quit",
            Self::Leave => "leave",
            Self::Raw(_) => "send",
        }
    }
}

/// Prover side of the identification protocol.
///
/// The nonce `k` lives only between the commitment and the response; it is
/// consumed by [`schnorr::respond`] and wiped whenever the session falls
/// back to `UNINIT`.
#[derive(Debug)]
pub struct ProverMachine {
    identity: ProverIdentity,
    state: State,
    nonce: Option<Nonce>,
    challenge: Option<BigUint>,
}

impl ProverMachine {
    /// Creates a machine in `UNINIT` for `identity`.
    pub fn new(identity: ProverIdentity) -> Self {
        Self {
            identity,
            state: State::Uninit,
            nonce: None,
            challenge: None,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The certificate and key pair this machine proves with.
    pub fn identity(&self) -> &ProverIdentity {
        &self.identity
    }

    /// True while a nonce is waiting for its challenge or response.
    pub fn has_outstanding_nonce(&self) -> bool {
        self.nonce.is_some()
    }

    /// Turns a user intent into outgoing events.
    ///
    /// Intents that the current state does not allow are rejected with
    /// [`Error::IntentRejected`] and nothing is sent.
    pub fn on_intent<R: CryptoRngCore + ?Sized>(&mut self, intent: Intent, rng: &mut R) -> Result<Step> {
        match intent {
            Intent::Handshake => Ok(Step::reply(ProtocolEvent::Handshake(
                self.identity.certificate_pem().to_string(),
            ))),
            Intent::Commit => self.commit(rng),
            Intent::Respond => self.respond(),
            Intent::Read => Ok(Step::reply(ProtocolEvent::ReadRequest)),
            Intent::Time => Ok(Step::reply(ProtocolEvent::Time)),
            Intent::Quit => Ok(Step::reply(ProtocolEvent::Quit)),
            Intent::Leave => Ok(Step::reply(ProtocolEvent::Control(CONTROL_QUIT.to_string()))
                .with_disposition(Disposition::Close)),
            Intent::Raw(text) => Ok(Step::reply(ProtocolEvent::Unrecognized(text))),
        }
    }

    fn commit<R: CryptoRngCore + ?Sized>(&mut self, rng: &mut R) -> Result<Step> {
        if self.state != State::Init {
            return Err(self.rejected(&Intent::Commit));
        }

        let curve = self.identity.key_pair().curve();
        let nonce = schnorr::draw_nonce(curve, rng)?;
        let (kx, ky) = schnorr::commit(curve, &nonce)
            .coordinates()
            .map(|(x, y)| (x.clone(), y.clone()))
            .ok_or_else(|| Error::InvalidPoint("commitment is the identity".to_string()))?;

        // Replacing an unanswered nonce drops and wipes it.
        self.nonce = Some(nonce);
        self.challenge = None;
        debug!("commitment drawn");
        Ok(Step::reply(ProtocolEvent::Commit { kx, ky }))
    }

    fn respond(&mut self) -> Result<Step> {
        if self.state != State::Commit {
            return Err(self.rejected(&Intent::Respond));
        }
        let (Some(nonce), Some(challenge)) = (self.nonce.take(), self.challenge.take()) else {
            return Err(self.rejected(&Intent::Respond));
        };

        let r = schnorr::respond(nonce, &challenge, self.identity.key_pair());
        debug!("response computed, nonce spent");
        Ok(Step::reply(ProtocolEvent::Response(r)))
    }

    fn rejected(&self, intent: &Intent) -> Error {
        Error::IntentRejected {
            intent: intent.name(),
            state: self.state,
        }
    }

    /// Handles a line from the verifier that failed to decode.
    pub fn on_decode_error(&mut self, err: &DecodeError) -> Step {
        warn!(error = %err, "ignoring malformed message from verifier");
        Step::silent()
    }

    /// Applies one event received from the verifier.
    pub fn on_event(&mut self, event: ProtocolEvent) -> Step {
        match event {
            ProtocolEvent::HandshakeAccepted => {
                self.discard_secrets();
                self.state = State::Init;
                info!("handshake accepted");
            }
            ProtocolEvent::Challenge(e) => self.on_challenge(e),
            ProtocolEvent::Verified => {
                if self.state == State::Commit {
                    self.state = State::Accept;
                    info!("proof accepted");
                } else {
                    warn!(state = %self.state, "unexpected verification notice");
                }
            }
            ProtocolEvent::ReadAccept => info!("read privilege granted"),
            ProtocolEvent::Error(reason) => {
                warn!(%reason, state = %self.state, "verifier reported an error, resetting");
                self.discard_secrets();
                self.state = State::Uninit;
            }
            ProtocolEvent::Control(name) if name == CONTROL_QUIT => {
                info!("verifier is leaving");
                self.discard_secrets();
                return Step::silent().with_disposition(Disposition::Close);
            }
            other => debug!(kind = other.kind(), "no state change"),
        }
        Step::silent()
    }

    fn on_challenge(&mut self, e: BigUint) {
        let curve = self.identity.key_pair().curve();
        if self.state != State::Init || self.nonce.is_none() {
            warn!(state = %self.state, "ignoring challenge without a pending commitment");
            return;
        }
        if !schnorr::in_scalar_range(curve, &e) {
            warn!("ignoring challenge outside [1, N-1]");
            return;
        }
        self.challenge = Some(e);
        self.state = State::Commit;
        debug!("challenge stored");
    }

    fn discard_secrets(&mut self) {
        self.nonce = None;
        self.challenge = None;
    }
}
