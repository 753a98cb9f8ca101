//! TCP stream transport with CRLF line buffering.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::TransportError;

/// A connected TCP transport.
///
/// The stream guarantees ordered, exactly-once byte delivery; the only
/// framing work left is reassembling CRLF-terminated lines from arbitrary
/// read chunks, which [`LineReader`] does. Message semantics stay in the
/// codec.
pub struct StreamTransport {
    stream: TcpStream,
}

impl StreamTransport {
    /// Resolves the server address and opens a TCP connection.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(TransportError::ConnectFailed)?;
        tracing::info!(host, port, "stream transport connected");
        Ok(Self { stream })
    }

    /// Splits the connection into an owned read half and write half so the
    /// receive loop and the input loop can run on separate tasks.
    pub fn split(self) -> (LineReader, LineWriter) {
        let (read, write) = self.stream.into_split();
        (
            LineReader {
                inner: BufReader::new(read),
                buf: Vec::with_capacity(256),
            },
            LineWriter { inner: write },
        )
    }
}

// ---------------------------------------------------------------------------
// LineReader
// ---------------------------------------------------------------------------

/// Read half of a stream connection, yielding complete lines.
///
/// TCP hands back arbitrary chunks; a single read may contain half a
/// message or three of them. The internal buffer absorbs partial reads so
/// the codec only ever sees whole lines.
pub struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
}

impl LineReader {
    /// Waits for and returns the next complete line, with its terminator
    /// stripped.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly. A
    /// final unterminated fragment before EOF is delivered as a line; the
    /// codec tolerates the missing end marker.
    ///
    /// Cancellation-tolerant: bytes read before a `select!` cancellation
    /// stay in the buffer and the next call resumes from them.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        let n = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        let line = String::from_utf8(std::mem::take(&mut self.buf)).map_err(|e| {
            TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })?;
        tracing::trace!(len = line.len(), "stream line received");
        Ok(Some(line))
    }
}

// ---------------------------------------------------------------------------
// LineWriter
// ---------------------------------------------------------------------------

/// Write half of a stream connection.
pub struct LineWriter {
    inner: OwnedWriteHalf,
}

impl LineWriter {
    /// Writes one already-encoded line (terminator included) to the peer.
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.inner
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::SendFailed)?;
        tracing::trace!(len = line.len(), "stream line sent");
        Ok(())
    }

    /// Flushes and shuts down the write direction, signalling EOF to the
    /// peer.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
