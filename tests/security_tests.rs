mod common;

use std::sync::Arc;

use common::{toy_identity, ScriptedRng, StaticResolver};
use num_bigint::BigUint;
use schnorr_auth::protocol::{decode, ProtocolEvent};
use schnorr_auth::{Curve, Point, Session, State};

fn verifier(challenges: impl IntoIterator<Item = u64>) -> Session<ScriptedRng> {
    Session::verifier_with_rng(
        Arc::new(StaticResolver::toy(5)),
        ScriptedRng::new(challenges),
    )
}

fn reply(session: &mut Session<ScriptedRng>, line: &str) -> String {
    session
        .on_incoming(line)
        .lines
        .concat()
}

const HANDSHAKE: &str = "/handshake: {\"Cert\":\"toy\"}";
// K = 3G
const COMMIT_3G: &str = "/commit: {\"Kx\":\"0c\",\"Ky\":\"01\"}";
// r = 3 + 4 * 5 mod 17
const RESPONSE_6: &str = "/response: {\"R\":\"06\"}";

#[test]
fn response_without_challenge_is_refused() {
    let mut v = verifier([]);
    assert_eq!(reply(&mut v, RESPONSE_6), "/error: commit before response\n");
    assert_eq!(v.state(), State::Uninit);

    reply(&mut v, HANDSHAKE);
    assert_eq!(reply(&mut v, RESPONSE_6), "/error: commit before response\n");
    assert_eq!(v.state(), State::Init);
}

#[test]
fn commitment_without_handshake_is_refused() {
    let mut v = verifier([4]);
    assert_eq!(reply(&mut v, COMMIT_3G), "/error: init before commit\n");
    assert_eq!(v.state(), State::Uninit);
}

#[test]
fn read_requires_accepted_proof() {
    let mut v = verifier([4]);
    assert_eq!(reply(&mut v, "/read"), "/error: deny\n");
    reply(&mut v, HANDSHAKE);
    assert_eq!(reply(&mut v, "/read"), "/error: deny\n");
    reply(&mut v, COMMIT_3G);
    assert_eq!(reply(&mut v, "/read"), "/error: deny\n");
    reply(&mut v, RESPONSE_6);
    assert_eq!(reply(&mut v, "/read"), "/read: accept.\n");
}

#[test]
fn accepted_response_cannot_be_replayed() {
    let mut v = verifier([4]);
    reply(&mut v, HANDSHAKE);
    reply(&mut v, COMMIT_3G);
    assert_eq!(reply(&mut v, RESPONSE_6), "/response: Success\n");

    assert_eq!(reply(&mut v, RESPONSE_6), "/error: commit before response\n");
}

#[test]
fn oversized_response_is_rejected() {
    // Congruent to the honest r = 6 but thousands of bits long.
    let oversized = (BigUint::from(17u32) << 4000usize) + 6u32;
    let line = format!("/response: {{\"R\":\"{}\"}}", oversized.to_str_radix(16));

    let mut v = verifier([4]);
    reply(&mut v, HANDSHAKE);
    reply(&mut v, COMMIT_3G);
    assert_eq!(reply(&mut v, &line), "/error: verify fail\n");
    assert_eq!(v.state(), State::Uninit);
}

#[test]
fn failures_fall_back_to_uninit() {
    // Malformed payload mid-proof.
    let mut v = verifier([4]);
    reply(&mut v, HANDSHAKE);
    reply(&mut v, COMMIT_3G);
    assert!(reply(&mut v, "/response: {\"R\":\"zz\"}").starts_with("/error: "));
    assert_eq!(v.state(), State::Uninit);
    assert_eq!(reply(&mut v, RESPONSE_6), "/error: commit before response\n");

    // Rejected certificate after acceptance.
    let mut v = verifier([4]);
    reply(&mut v, HANDSHAKE);
    reply(&mut v, COMMIT_3G);
    reply(&mut v, RESPONSE_6);
    assert_eq!(v.state(), State::Accept);
    assert!(reply(&mut v, "/handshake: not json").starts_with("/error: "));
    assert_eq!(v.state(), State::Uninit);
    assert_eq!(reply(&mut v, "/read"), "/error: deny\n");
}

#[test]
fn identity_and_off_curve_commitments_fail() {
    let mut v = verifier([4, 4]);
    reply(&mut v, HANDSHAKE);
    // (1, 1) is not on the toy curve.
    reply(&mut v, "/commit: {\"Kx\":\"01\",\"Ky\":\"01\"}");
    assert_eq!(reply(&mut v, RESPONSE_6), "/error: verify fail\n");

    let curve = Curve::toy();
    assert!(!curve.contains(&Point::affine(BigUint::from(1u32), BigUint::from(1u32))));
}

#[test]
fn every_commitment_draws_a_fresh_nonce() {
    let mut prover = Session::prover_with_rng(toy_identity(5), ScriptedRng::new([3, 7]));
    prover.on_incoming("/handshake: Success");

    let first = prover.user_intent("/c").expect("first commitment");
    let second = prover.user_intent("/c").expect("second commitment");
    assert_ne!(first.lines, second.lines);

    // The second commitment replaced the first: r = 7 + 4 * 5 mod 17 = 10.
    prover.on_incoming("/commit: 04");
    let response = prover.user_intent("/r").expect("response");
    assert_eq!(
        decode(&response.lines[0]).expect("valid line"),
        ProtocolEvent::Response(BigUint::from(10u32))
    );

    // The nonce is gone once used.
    assert!(prover.user_intent("/r").is_err());
    assert!(!prover
        .as_prover()
        .expect("prover session")
        .has_outstanding_nonce());
}

#[test]
fn prover_ignores_out_of_range_challenges() {
    let mut prover = Session::prover_with_rng(toy_identity(5), ScriptedRng::new([3]));
    prover.on_incoming("/handshake: Success");
    prover.user_intent("/c").expect("commitment");

    // e = 0 and e = N are both outside [1, N-1].
    prover.on_incoming("/commit: 00");
    prover.on_incoming("/commit: 11");
    assert_eq!(prover.state(), State::Init);
    assert!(prover.user_intent("/r").is_err());
}

#[test]
fn verifier_error_wipes_prover_secrets() {
    let mut prover = Session::prover_with_rng(toy_identity(5), ScriptedRng::new([3]));
    prover.on_incoming("/handshake: Success");
    prover.user_intent("/c").expect("commitment");
    prover.on_incoming("/commit: 04");
    assert_eq!(prover.state(), State::Commit);

    prover.on_incoming("/error: verify fail");
    assert_eq!(prover.state(), State::Uninit);
    assert!(!prover
        .as_prover()
        .expect("prover session")
        .has_outstanding_nonce());
}

#[test]
fn secrets_stay_out_of_debug_output() {
    let identity = toy_identity(5);
    let rendered = format!("{identity:?}");
    assert!(rendered.contains("KeyPair"));
    assert!(!rendered.contains("secret"));
}
