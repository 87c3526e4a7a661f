//! Verifier side of the identification protocol.
//!
//! [`VerifierMachine`] binds the peer's public key on handshake, answers a
//! commitment with a fresh challenge and checks the response. Any failed
//! check or malformed message drops the session back to `UNINIT`, and
//! `/read` is only granted in `ACCEPT`.

use std::sync::Arc;

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use tracing::{error, info, warn};

use super::codec::{DecodeError, ProtocolEvent, CONTROL_QUIT};
use super::schnorr;
use super::state::{Disposition, State, Step};
use crate::identity::{PeerKey, PeerKeyResolver};
use crate::primitives::Point;

/// Reply when a commitment arrives before a successful handshake.
pub const INIT_BEFORE_COMMIT: &str = "init before commit";
/// Reply when a response arrives without a pending challenge.
pub const COMMIT_BEFORE_RESPONSE: &str = "commit before response";
/// Reply when the proof does not check out.
pub const VERIFY_FAIL: &str = "verify fail";
/// Reply when reading is requested without an accepted proof.
pub const READ_DENIED: &str = "deny";
/// Notice sent before the verifier shuts down.
pub const SHUTDOWN_NOTICE: &str = "I'm shutting down now.";

/// Verifier side of the identification protocol for one connection.
///
/// Holds the peer's public key once a handshake succeeds, and the
/// commitment/challenge pair while a proof is in flight. Every field is
/// owned by the connection; nothing is shared between connections.
pub struct VerifierMachine {
    resolver: Arc<dyn PeerKeyResolver>,
    state: State,
    peer: Option<PeerKey>,
    commitment: Option<Point>,
    challenge: Option<BigUint>,
}

impl VerifierMachine {
    /// Creates a machine in `UNINIT` that resolves handshake certificates
    /// with `resolver`.
    pub fn new(resolver: Arc<dyn PeerKeyResolver>) -> Self {
        Self {
            resolver,
            state: State::Uninit,
            peer: None,
            commitment: None,
            challenge: None,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The bound peer key, if any.
    pub fn peer(&self) -> Option<&PeerKey> {
        self.peer.as_ref()
    }

    /// Returns to `UNINIT`, forgetting the peer key and any pending proof.
    pub fn reset(&mut self) {
        self.state = State::Uninit;
        self.peer = None;
        self.commitment = None;
        self.challenge = None;
    }

    /// Handles a line that failed to decode.
    pub fn on_decode_error(&mut self, err: &DecodeError) -> Step {
        warn!(error = %err, state = %self.state, "malformed payload, resetting session");
        self.reset();
        Step::reply(ProtocolEvent::Error(err.to_string()))
    }

    /// Applies one incoming event and returns the replies.
    pub fn on_event<R: CryptoRngCore + ?Sized>(&mut self, event: ProtocolEvent, rng: &mut R) -> Step {
        match event {
            ProtocolEvent::Handshake(cert) => self.on_handshake(&cert),
            ProtocolEvent::Commit { kx, ky } => self.on_commit(Point::affine(kx, ky), rng),
            ProtocolEvent::Response(r) => self.on_response(&r),
            ProtocolEvent::ReadRequest => self.on_read(),
            ProtocolEvent::Time => {
                let now = chrono::Local::now().to_rfc3339();
                Step::reply(ProtocolEvent::Notice(format!("It is {now}")))
            }
            ProtocolEvent::Quit => {
                info!("quit requested by peer");
                Step {
                    replies: vec![
                        ProtocolEvent::Notice(SHUTDOWN_NOTICE.to_string()),
                        ProtocolEvent::Control(CONTROL_QUIT.to_string()),
                    ],
                    disposition: Disposition::Shutdown,
                }
            }
            ProtocolEvent::Control(name) if name == CONTROL_QUIT => {
                info!("peer is leaving");
                Step::silent().with_disposition(Disposition::Close)
            }
            ProtocolEvent::Control(name) => {
                warn!(control = %name, "ignoring unknown control notice");
                Step::silent()
            }
            ProtocolEvent::Error(reason) => {
                warn!(%reason, "peer reported an error");
                Step::silent()
            }
            ProtocolEvent::Unrecognized(text) => unrecognized(&text),
            other => {
                warn!(kind = other.kind(), "message not meant for the verifier");
                unrecognized(&other.to_string())
            }
        }
    }

    fn on_handshake(&mut self, cert: &str) -> Step {
        // A handshake always starts from scratch, even mid-proof.
        self.reset();
        match self.resolver.resolve(cert) {
            Ok(peer) => {
                info!(curve = peer.curve.name(), "handshake accepted, peer key bound");
                self.peer = Some(peer);
                self.state = State::Init;
                Step::reply(ProtocolEvent::HandshakeAccepted)
            }
            Err(e) => {
                warn!(error = %e, "handshake rejected");
                Step::reply(ProtocolEvent::Error(format!("handshake fail: {e}")))
            }
        }
    }

    fn on_commit<R: CryptoRngCore + ?Sized>(&mut self, commitment: Point, rng: &mut R) -> Step {
        if self.state != State::Init {
            warn!(state = %self.state, "commitment out of order");
            return Step::reply(ProtocolEvent::Error(INIT_BEFORE_COMMIT.to_string()));
        }
        let Some(peer) = self.peer.as_ref() else {
            self.reset();
            return Step::reply(ProtocolEvent::Error(INIT_BEFORE_COMMIT.to_string()));
        };

        match schnorr::challenge(&peer.curve, rng) {
            Ok(e) => {
                self.commitment = Some(commitment);
                self.challenge = Some(e.clone());
                self.state = State::Commit;
                info!("commitment stored, challenge issued");
                Step::reply(ProtocolEvent::Challenge(e))
            }
            Err(e) => {
                error!(error = %e, "cannot draw challenge");
                Step::reply(ProtocolEvent::Error("challenge generation failed".to_string()))
            }
        }
    }

    fn on_response(&mut self, response: &BigUint) -> Step {
        if self.state != State::Commit {
            warn!(state = %self.state, "response out of order");
            return Step::reply(ProtocolEvent::Error(COMMIT_BEFORE_RESPONSE.to_string()));
        }

        // The commitment and challenge are spent whatever the outcome.
        let commitment = self.commitment.take();
        let challenge = self.challenge.take();
        let (Some(peer), Some(commitment), Some(challenge)) =
            (self.peer.as_ref(), commitment, challenge)
        else {
            self.reset();
            return Step::reply(ProtocolEvent::Error(COMMIT_BEFORE_RESPONSE.to_string()));
        };

        if schnorr::verify(&peer.curve, &commitment, &challenge, &peer.point, response) {
            info!("proof verified");
            self.state = State::Accept;
            Step::reply(ProtocolEvent::Verified)
        } else {
            warn!("proof verification failed, resetting session");
            self.reset();
            Step::reply(ProtocolEvent::Error(VERIFY_FAIL.to_string()))
        }
    }

    fn on_read(&self) -> Step {
        if self.state == State::Accept {
            info!("read request accepted");
            Step::reply(ProtocolEvent::ReadAccept)
        } else {
            warn!(state = %self.state, "read request denied");
            Step::reply(ProtocolEvent::Error(READ_DENIED.to_string()))
        }
    }
}

fn unrecognized(text: &str) -> Step {
    Step::reply(ProtocolEvent::Notice(format!("Unrecognized command: {text}")))
}
