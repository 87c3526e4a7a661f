mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, write_p256_cert};
use schnorr_auth::client::{self, ClientUpdate, CloseReason};
use schnorr_auth::server::VerifierServer;
use schnorr_auth::transport::{self, LineSink, LineSource};
use schnorr_auth::{ProverIdentity, Result, Session, X509Resolver};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

async fn start_verifier() -> (SocketAddr, JoinHandle<Result<()>>) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = VerifierServer::bind(addr, Arc::new(X509Resolver))
        .await
        .expect("Verifier should bind");
    let local_addr = server.local_addr().expect("Bound address");
    (local_addr, tokio::spawn(server.run()))
}

struct ProverHarness {
    commands: mpsc::Sender<String>,
    updates: mpsc::UnboundedReceiver<ClientUpdate>,
    actor: JoinHandle<Result<CloseReason>>,
}

impl ProverHarness {
    async fn connect(addr: SocketAddr, identity: ProverIdentity) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Should connect");
        let (mut reader, mut writer) = transport::split(stream, Some(Duration::from_secs(1)));
        let (commands, command_rx) = mpsc::channel(8);
        let (update_tx, updates) = mpsc::unbounded_channel();

        let actor = tokio::spawn(async move {
            let session = Session::prover(identity);
            client::run(session, &mut reader, &mut writer, command_rx, update_tx).await
        });

        Self {
            commands,
            updates,
            actor,
        }
    }

    async fn command(&self, line: &str) {
        self.commands
            .send(line.to_string())
            .await
            .expect("Actor should be running");
    }

    /// Waits for the next line received from the verifier.
    async fn received(&mut self) -> String {
        loop {
            let update = timeout(WAIT, self.updates.recv())
                .await
                .expect("Verifier should answer in time")
                .expect("Actor should be running");
            if let ClientUpdate::Received(line) = update {
                return line;
            }
        }
    }

    async fn finish(self) -> CloseReason {
        drop(self.commands);
        timeout(WAIT, self.actor)
            .await
            .expect("Actor should stop in time")
            .expect("Actor should not panic")
            .expect("Actor should stop cleanly")
    }
}

fn load_identity() -> (common::CertFiles, ProverIdentity) {
    let files = write_p256_cert();
    let identity = ProverIdentity::load(&files.cert, &files.key).expect("Identity should load");
    (files, identity)
}

#[tokio::test]
async fn full_identification_over_tcp() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, _server) = start_verifier().await;
    let mut prover = ProverHarness::connect(addr, identity).await;

    prover.command("/h").await;
    assert_eq!(prover.received().await, "/handshake: Success");

    prover.command("/c").await;
    let challenge = prover.received().await;
    assert!(challenge.starts_with("/commit: "), "got {challenge}");

    prover.command("/r").await;
    assert_eq!(prover.received().await, "/response: Success");

    prover.command("/read").await;
    assert_eq!(prover.received().await, "/read: accept.");

    prover.command("/leave").await;
    assert_eq!(prover.finish().await, CloseReason::Left);
}

#[tokio::test]
async fn rejected_commands_are_reported_locally() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, _server) = start_verifier().await;
    let mut prover = ProverHarness::connect(addr, identity).await;

    prover.command("/r").await;
    let update = timeout(WAIT, prover.updates.recv())
        .await
        .expect("Update in time")
        .expect("Actor running");
    assert_eq!(
        update,
        ClientUpdate::Rejected("Cannot respond in state UNINIT".to_string())
    );

    prover.command("/time").await;
    assert!(prover.received().await.starts_with("/notice: It is "));
}

#[tokio::test]
async fn connections_keep_separate_sessions() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, _server) = start_verifier().await;

    let mut accepted = ProverHarness::connect(addr, identity).await;
    accepted.command("/h").await;
    assert_eq!(accepted.received().await, "/handshake: Success");

    let stream = TcpStream::connect(addr).await.expect("Should connect");
    let (mut reader, mut writer) = transport::split(stream, None);
    writer.send_line("/commit: {\"Kx\":\"01\",\"Ky\":\"02\"}").await.unwrap();
    let reply = timeout(WAIT, reader.next_line())
        .await
        .expect("Reply in time")
        .unwrap();
    assert_eq!(reply.as_deref(), Some("/error: init before commit"));

    accepted.command("/c").await;
    assert!(accepted.received().await.starts_with("/commit: "));
}

#[tokio::test]
async fn garbage_certificate_fails_handshake() {
    init_tracing();
    let (addr, _server) = start_verifier().await;

    let stream = TcpStream::connect(addr).await.expect("Should connect");
    let (mut reader, mut writer) = transport::split(stream, None);
    writer
        .send_line("/handshake: {\"Cert\":\"not a certificate\"}")
        .await
        .unwrap();
    let reply = timeout(WAIT, reader.next_line())
        .await
        .expect("Reply in time")
        .unwrap()
        .expect("Connection open");
    assert!(reply.starts_with("/error: handshake fail"), "got {reply}");
}

#[tokio::test]
async fn oversized_line_drops_only_that_connection() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, server) = start_verifier().await;

    let stream = TcpStream::connect(addr).await.expect("Should connect");
    let (mut reader, mut writer) = transport::split(stream, None);
    let flood = "a".repeat(transport::MAX_LINE_LENGTH + 1);
    // The verifier may hang up before the whole line is out.
    let _ = writer.send_line(&flood).await;
    let closed = timeout(WAIT, reader.next_line())
        .await
        .expect("Connection should close in time");
    assert!(!matches!(closed, Ok(Some(_))), "got {closed:?}");

    let mut next = ProverHarness::connect(addr, identity).await;
    next.command("/h").await;
    assert_eq!(next.received().await, "/handshake: Success");
    assert!(!server.is_finished());
}

#[tokio::test]
async fn leaving_client_does_not_stop_verifier() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, server) = start_verifier().await;

    let prover = ProverHarness::connect(addr, identity.clone()).await;
    prover.command("/leave").await;
    assert_eq!(prover.finish().await, CloseReason::Left);

    let mut next = ProverHarness::connect(addr, identity).await;
    next.command("/h").await;
    assert_eq!(next.received().await, "/handshake: Success");
    assert!(!server.is_finished());
}

#[tokio::test]
async fn quit_shuts_the_verifier_down() {
    init_tracing();
    let (_files, identity) = load_identity();
    let (addr, server) = start_verifier().await;
    let mut prover = ProverHarness::connect(addr, identity).await;

    prover.command("/q").await;
    assert_eq!(prover.received().await, "/notice: I'm shutting down now.");
    assert_eq!(prover.received().await, "%quit%");
    assert_eq!(prover.finish().await, CloseReason::PeerLeft);

    timeout(WAIT, server)
        .await
        .expect("Verifier should stop in time")
        .expect("Verifier task should not panic")
        .expect("Verifier should stop cleanly");
}
