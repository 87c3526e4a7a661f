//! TCP accept loop and per-connection verifier sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::identity::PeerKeyResolver;
use crate::protocol::Disposition;
use crate::session::Session;
use crate::transport::{self, LineSink, LineSource};
use crate::Result;

/// Handle that stops a running [`VerifierServer`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Asks the accept loop to stop.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// True once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// TCP verifier: one independent session per accepted connection.
pub struct VerifierServer {
    listener: TcpListener,
    resolver: Arc<dyn PeerKeyResolver>,
    shutdown: ShutdownHandle,
}

impl VerifierServer {
    /// Binds `addr` and prepares to serve.
    pub async fn bind(addr: SocketAddr, resolver: Arc<dyn PeerKeyResolver>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, resolver))
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener, resolver: Arc<dyn PeerKeyResolver>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            listener,
            resolver,
            shutdown: ShutdownHandle(Arc::new(tx)),
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle that stops [`VerifierServer::run`] from outside.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accepts connections until shutdown is requested, either through a
    /// [`ShutdownHandle`] or by a peer sending `/quit`.
    ///
    /// Connection tasks still running when this returns are not awaited.
    pub async fn run(self) -> Result<()> {
        let mut stop = self.shutdown.0.subscribe();
        info!(addr = ?self.listener.local_addr().ok(), "verifier accepting connections");

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let resolver = Arc::clone(&self.resolver);
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(handle_connection(stream, peer, resolver, shutdown));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("verifier stopped accepting connections");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    resolver: Arc<dyn PeerKeyResolver>,
    shutdown: ShutdownHandle,
) {
    info!(%peer, "client connected");
    let (mut reader, mut writer) = transport::split(stream, None);
    let session = Session::verifier(resolver);

    match drive_connection(session, &mut reader, &mut writer).await {
        Ok(Disposition::Shutdown) => {
            info!(%peer, "shutdown requested by client");
            shutdown.shutdown();
        }
        Ok(_) => {}
        Err(e) => warn!(%peer, error = %e, "connection failed"),
    }

    if let Err(e) = writer.shutdown().await {
        debug!(%peer, error = %e, "socket already closed");
    }
    info!(%peer, "client disconnected");
}

/// Feeds inbound lines to a verifier session and writes its replies until the
/// peer leaves, the stream ends or the session asks to stop.
///
/// Returns the disposition that ended the loop; end of stream counts as
/// [`Disposition::Close`].
pub async fn drive_connection<R, S, K>(
    mut session: Session<R>,
    source: &mut S,
    sink: &mut K,
) -> Result<Disposition>
where
    R: rand_core::CryptoRngCore,
    S: LineSource + ?Sized,
    K: LineSink + ?Sized,
{
    while let Some(line) = source.next_line().await? {
        let output = session.on_incoming(&line);
        for reply in &output.lines {
            sink.send_line(reply).await?;
        }
        if output.disposition != Disposition::Continue {
            return Ok(output.disposition);
        }
    }
    Ok(Disposition::Close)
}
