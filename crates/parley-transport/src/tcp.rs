//! The stream link: TCP with strict CRLF message framing.
//!
//! The text grammar delimits messages with `\r\n`, so the reader
//! consumes one byte at a time and only treats `\n` as a terminator
//! when the byte immediately before it was `\r`. A bare `\n` is data,
//! not a boundary — a naive "ends with newline" check would silently
//! accept malformed peers.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::TransportError;

/// Longest line the reader will buffer before giving up. The longest
/// grammar-valid message (`MSG FROM` + 20-char name + 1400-char
/// content + CRLF) is well under this.
pub const MAX_LINE: usize = 2048;

/// A connected TCP stream, ready to be split into its two halves.
pub struct StreamLink {
    stream: TcpStream,
}

impl StreamLink {
    /// Connects to the server.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        tracing::debug!(%addr, "stream link connected");
        Ok(Self { stream })
    }

    /// Splits into an owned reader (for the inbound loop) and writer
    /// (for outbound sends), so the two loops run as separate tasks.
    pub fn split(self) -> (StreamReader, StreamWriter) {
        let (read, write) = self.stream.into_split();
        (StreamReader { half: read }, StreamWriter { half: write })
    }
}

/// The receive half: yields one CRLF-terminated line at a time.
pub struct StreamReader {
    half: OwnedReadHalf,
}

impl StreamReader {
    /// Reads until a `\r\n` terminator and returns the whole line,
    /// terminator included.
    ///
    /// Returns `Ok(None)` when the peer closes the stream cleanly
    /// between messages.
    ///
    /// # Errors
    /// I/O failures, EOF in the middle of a line, a non-UTF-8 line, or
    /// a line longer than [`MAX_LINE`].
    pub async fn read_message(&mut self) -> Result<Option<String>, TransportError> {
        read_crlf_line(&mut self.half).await
    }
}

/// The send half.
pub struct StreamWriter {
    half: OwnedWriteHalf,
}

impl StreamWriter {
    /// Writes one already-encoded line (terminator included) and
    /// flushes it.
    pub async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        self.half
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::SendFailed)?;
        self.half
            .flush()
            .await
            .map_err(TransportError::SendFailed)
    }
}

/// Byte-at-a-time CRLF framing over any async reader.
///
/// The terminator check requires `\r` immediately before `\n`.
async fn read_crlf_line<R>(reader: &mut R) -> Result<Option<String>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut line: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = reader
            .read(&mut byte)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return if line.is_empty() {
                Ok(None)
            } else {
                Err(TransportError::ClosedMidMessage)
            };
        }

        line.push(byte[0]);
        if byte[0] == b'\n' && line.len() >= 2 && line[line.len() - 2] == b'\r' {
            break;
        }
        if line.len() > MAX_LINE {
            return Err(TransportError::LineTooLong(MAX_LINE));
        }
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| TransportError::InvalidUtf8)
}

// =========================================================================
// Tests
// =========================================================================
