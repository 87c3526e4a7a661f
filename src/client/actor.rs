//! Prover actor that owns the session and interleaves socket lines with console commands.

use rand_core::CryptoRngCore;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::Disposition;
use crate::session::Session;
use crate::transport::{LineSink, LineSource};
use crate::{Error, Result};

/// Something the console should show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientUpdate {
    /// A line arrived from the verifier.
    Received(String),
    /// A line was sent to the verifier.
    Sent(String),
    /// A command was refused locally and nothing was sent.
    Rejected(String),
}

/// Why the prover actor stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The verifier closed the stream.
    Disconnected,
    /// The verifier announced it is leaving.
    PeerLeft,
    /// The user left with `/leave`.
    Left,
    /// The command channel closed.
    InputClosed,
}

/// Runs the prover session until the connection or the input ends.
///
/// The actor is the only owner of `session`: inbound lines and user commands
/// are applied one at a time, so no locking is needed. A failed write ends
/// the actor with an error.
pub async fn run<R, S, K>(
    mut session: Session<R>,
    source: &mut S,
    sink: &mut K,
    mut commands: mpsc::Receiver<String>,
    updates: mpsc::UnboundedSender<ClientUpdate>,
) -> Result<CloseReason>
where
    R: CryptoRngCore + Send,
    S: LineSource + ?Sized,
    K: LineSink + ?Sized,
{
    loop {
        tokio::select! {
            line = source.next_line() => {
                let Some(line) = line? else {
                    info!("verifier closed the connection");
                    return Ok(CloseReason::Disconnected);
                };
                let _ = updates.send(ClientUpdate::Received(line.clone()));

                let output = session.on_incoming(&line);
                for reply in &output.lines {
                    sink.send_line(reply).await?;
                }
                if output.disposition != Disposition::Continue {
                    return Ok(CloseReason::PeerLeft);
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("command channel closed");
                    return Ok(CloseReason::InputClosed);
                };

                let output = match session.user_intent(&command) {
                    Ok(output) => output,
                    Err(e @ (Error::IntentRejected { .. } | Error::WrongRole(_))) => {
                        warn!(error = %e, "command rejected");
                        let _ = updates.send(ClientUpdate::Rejected(e.to_string()));
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                for line in &output.lines {
                    sink.send_line(line).await?;
                    let _ = updates.send(ClientUpdate::Sent(line.trim_end().to_string()));
                }
                if output.disposition != Disposition::Continue {
                    return Ok(CloseReason::Left);
                }
            }
        }
    }
}
