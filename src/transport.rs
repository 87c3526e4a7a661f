//! Newline-delimited line transport over tokio streams.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Longest inbound line accepted, excluding the terminator.
///
/// A handshake carrying a P-256 certificate is well under 2 KiB.
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

/// Transport failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Reading or writing the stream failed.
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write did not complete before its deadline.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The peer sent more than the allowed bytes without a line terminator.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// A source of inbound protocol lines.
#[async_trait]
pub trait LineSource: Send {
    /// Returns the next line without its terminator, or `None` at end of
    /// stream.
    ///
    /// Implementations must be cancel-safe so that callers can `select!` on
    /// this future.
    async fn next_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// A sink for outbound protocol lines.
#[async_trait]
pub trait LineSink: Send {
    /// Writes one line, appending `\n` if it is missing, and flushes.
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError>;
}

/// Reads `\n`-terminated lines from an async reader.
///
/// Lines longer than the configured maximum end the stream with
/// [`TransportError::LineTooLong`].
pub struct LineReader<R> {
    frames: FramedRead<R, LinesCodec>,
    max_length: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// Reads lines of at most [`MAX_LINE_LENGTH`] bytes.
    pub fn new(inner: R) -> Self {
        Self::with_max_length(inner, MAX_LINE_LENGTH)
    }

    /// Reads lines of at most `max_length` bytes.
    pub fn with_max_length(inner: R, max_length: usize) -> Self {
        Self {
            frames: FramedRead::new(inner, LinesCodec::new_with_max_length(max_length)),
            max_length,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        match self.frames.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                Err(TransportError::LineTooLong(self.max_length))
            }
            Some(Err(LinesCodecError::Io(e))) => Err(e.into()),
            None => Ok(None),
        }
    }
}

/// Writes lines to an async writer, optionally bounded by a deadline.
pub struct LineWriter<W> {
    inner: W,
    deadline: Option<Duration>,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    /// Writes without a deadline.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            deadline: None,
        }
    }

    /// Fails any write that takes longer than `deadline`.
    pub fn with_deadline(inner: W, deadline: Duration) -> Self {
        Self {
            inner,
            deadline: Some(deadline),
        }
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for LineWriter<W> {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let deadline = self.deadline;
        let inner = &mut self.inner;
        let write = async move {
            inner.write_all(line.as_bytes()).await?;
            if !line.ends_with('\n') {
                inner.write_all(b"\n").await?;
            }
            inner.flush().await
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, write)
                .await
                .map_err(|_| TransportError::WriteTimeout(limit))??,
            None => write.await?,
        }
        Ok(())
    }
}

/// Splits a TCP stream into a line reader and a line writer.
pub fn split(
    stream: TcpStream,
    deadline: Option<Duration>,
) -> (LineReader<OwnedReadHalf>, LineWriter<OwnedWriteHalf>) {
    let (read, write) = stream.into_split();
    let writer = match deadline {
        Some(limit) => LineWriter::with_deadline(write, limit),
        None => LineWriter::new(write),
    };
    (LineReader::new(read), writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_round_trip_through_duplex() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = LineWriter::new(client);
        let mut reader = LineReader::new(server);

        writer.send_line("/time").await.unwrap();
        writer.send_line("/read\n").await.unwrap();
        writer.send_line("/q\r\n").await.unwrap();
        drop(writer);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("/time"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("/read"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("/q"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unterminated_flood_is_cut_off() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = LineReader::with_max_length(server, 32);

        let writer = tokio::spawn(async move {
            let _ = client.write_all(&[b'a'; 4096]).await;
        });

        let err = reader.next_line().await.unwrap_err();
        assert!(matches!(err, TransportError::LineTooLong(32)));
        writer.abort();
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = LineWriter::new(client);
        let mut reader = LineReader::with_max_length(server, 8);

        writer.send_line("/commit!").await.unwrap();
        drop(writer);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("/commit!"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn stalled_write_hits_deadline() {
        // Nobody reads the other end, so the tiny buffer fills up.
        let (client, _server) = tokio::io::duplex(8);
        let mut writer = LineWriter::with_deadline(client, Duration::from_millis(50));

        let err = writer.send_line(&"x".repeat(64)).await.unwrap_err();
        assert!(matches!(err, TransportError::WriteTimeout(_)));
    }
}
