// ABOUTME: Line-oriented connection management for the AT command protocol
// ABOUTME: Frames raw transport bytes into terminator-delimited lines with per-read timeouts

use crate::client::error::{GsmError, GsmResult};
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tracing::{trace, warn};

/// Default line terminator used by modems for every response line
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Longest run of bytes accepted without a terminator
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

/// Result of reading up to a terminator
///
/// A timeout is an expected outcome when the caller waits for output that
/// does not end in the usual terminator (the `> ` SMS prompt), so it is a
/// variant here rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, terminator stripped
    Line(String),
    /// No terminator arrived in time. Carries everything buffered so far.
    TimedOut(String),
}

/// AT Command Connection Management
///
/// Handles line-based communication over any byte stream connected to a
/// modem (serial device node, TCP serial bridge, in-memory duplex in tests).
///
/// ## Framing
///
/// Modems answer every command with a sequence of lines terminated by
/// `\r\n`, usually wrapped in blank lines:
///
/// ```text
/// \r\n+CSQ: 20,99\r\n\r\nOK\r\n
/// ```
///
/// The connection only splits lines. Deciding which line terminates a
/// response is the job of [`crate::response`].
///
/// ## Timeouts
///
/// Every read from the transport is bounded by the timeout passed to
/// [`Connection::read_until`]. The timeout is a per-call argument and never
/// stored on the connection, so an override cannot leak into later reads.
/// A device that keeps talking without ever sending a terminator is cut
/// off after [`MAX_LINE_LENGTH`] bytes.
#[derive(Debug)]
pub struct Connection<S> {
    // The transport. It is decorated with a `BufWriter` so that a command
    // and its terminator reach the device in one flush.
    stream: BufWriter<S>,

    // The buffer for reading lines. Bytes past a terminator stay here for
    // the next call.
    buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new `Connection`, backed by `stream`.
    pub fn new(stream: S) -> Connection<S> {
        Connection {
            stream: BufWriter::new(stream),
            // Modem responses are small. The largest are message listings.
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read until `terminator` appears, or until a single transport read
    /// waits longer than `timeout`.
    ///
    /// An end-of-stream from the transport is reported the same way as a
    /// timeout: the device produced no more data. More than
    /// [`MAX_LINE_LENGTH`] bytes without a terminator is a
    /// [`GsmError::Parse`] and the buffered bytes are dropped.
    pub async fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> GsmResult<ReadOutcome> {
        loop {
            if let Some(line) = self.take_line(terminator) {
                trace!(line = %line, "read");
                return Ok(ReadOutcome::Line(line));
            }

            if self.buffer.len() >= MAX_LINE_LENGTH {
                warn!(bytes = self.buffer.len(), "dropping unterminated input");
                self.buffer.clear();
                return Err(GsmError::Parse(format!(
                    "no line terminator within {MAX_LINE_LENGTH} bytes"
                )));
            }

            let read = tokio::time::timeout(timeout, self.stream.read_buf(&mut self.buffer)).await;
            match read {
                Ok(Ok(0)) | Err(_) => {
                    let pending = decode_line(&self.buffer.split());
                    trace!(pending = %pending, "read timed out");
                    return Ok(ReadOutcome::TimedOut(pending));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(GsmError::Read(e)),
            }
        }
    }

    /// Remove the first terminated line from the buffer, if there is one.
    fn take_line(&mut self, terminator: &[u8]) -> Option<String> {
        if terminator.is_empty() {
            return None;
        }
        let end = self
            .buffer
            .windows(terminator.len())
            .position(|window| window == terminator)?;

        let line = decode_line(&self.buffer[..end]);
        self.buffer.advance(end + terminator.len());
        Some(line)
    }

    /// Write raw bytes to the device and flush them.
    pub async fn write_all(&mut self, bytes: &[u8]) -> GsmResult<()> {
        trace!(data = ?String::from_utf8_lossy(bytes), "write");
        self.stream.write_all(bytes).await.map_err(GsmError::Write)?;
        self.stream.flush().await.map_err(GsmError::Write)
    }

    /// Drop any bytes received but not yet consumed as lines.
    pub fn discard_buffered(&mut self) {
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "discarding buffered input");
            self.buffer.clear();
        }
    }

    /// Throw away everything buffered and everything the device sends
    /// until `timeout` has passed. Returns the number of bytes dropped.
    ///
    /// Used to get rid of a late reply to an abandoned command before the
    /// next one is written.
    pub async fn drain(&mut self, timeout: Duration) -> GsmResult<usize> {
        let deadline = Instant::now() + timeout;
        let mut dropped = self.buffer.len();
        self.buffer.clear();

        loop {
            let read =
                tokio::time::timeout_at(deadline, self.stream.read_buf(&mut self.buffer)).await;
            match read {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => {
                    dropped += n;
                    self.buffer.clear();
                }
                Ok(Err(e)) => return Err(GsmError::Read(e)),
            }
        }

        if dropped > 0 {
            trace!(bytes = dropped, "drained stale input");
        }
        Ok(dropped)
    }

    /// Shut down the write half of the transport.
    pub async fn shutdown(&mut self) -> GsmResult<()> {
        self.stream.shutdown().await.map_err(GsmError::Write)
    }
}

/// Decode a line of modem output.
///
/// Valid UTF-8 is kept as is. Anything else is decoded byte for byte as
/// Latin-1, so every byte maps to exactly one `char` and binary markers
/// (such as the multipart SMS header) keep their values and offsets.
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
