//! # Line Transport
//!
//! Both endpoints speak one envelope per `\n`-terminated line over whatever
//! byte stream the relay gives them. [`LineTransport`] is that framing over
//! any `AsyncRead`/`AsyncWrite` pair: a TCP socket in production, an
//! in-memory duplex pipe in tests.
//!
//! Lines are capped at [`MAX_LINE_LENGTH`] bytes so a hostile relay cannot
//! make an endpoint buffer without bound.

use std::io::ErrorKind;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::config::MAX_LINE_LENGTH;

/// Transport-level failures. Any of these ends the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,

    #[error("line exceeds {MAX_LINE_LENGTH} bytes")]
    LineTooLong,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Folds the I/O kinds that mean "the peer went away" into `Closed`.
    fn from_write(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::WriteZero => {
                Self::Closed
            }
            _ => Self::Io(err),
        }
    }
}

/// A bidirectional line channel.
#[async_trait]
pub trait Transport: Send {
    /// Writes `line` followed by `\n` and flushes.
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Reads the next line without its terminator. `Ok(None)` on clean EOF.
    async fn recv_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// Newline framing over a reader/writer pair.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
    /// Bytes of a line whose read was cancelled before its `\n` arrived.
    partial: Vec<u8>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            partial: Vec::new(),
        }
    }
}

impl LineTransport<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line.as_bytes());
        framed.push(b'\n');
        self.writer
            .write_all(&framed)
            .await
            .map_err(TransportError::from_write)?;
        self.writer.flush().await.map_err(TransportError::from_write)
    }

    async fn recv_line(&mut self) -> Result<Option<String>, TransportError> {
        // `read_until` appends what it has read before a cancellation to
        // `partial`, so a timed-out call loses nothing. The budget leaves room
        // for `\r\n` plus one byte to tell an over-long line from a full one.
        let budget = (MAX_LINE_LENGTH + 2).saturating_sub(self.partial.len()) as u64;
        (&mut self.reader)
            .take(budget)
            .read_until(b'\n', &mut self.partial)
            .await?;

        let mut line = std::mem::take(&mut self.partial);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        } else if line.is_empty() {
            return Ok(None);
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(TransportError::LineTooLong);
        }

        // Non-UTF-8 input is still a line; it just won't parse as an envelope.
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
