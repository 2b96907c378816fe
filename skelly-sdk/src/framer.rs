//! Line framing in both directions.
//!
//! Inbound: bytes are split on `\n`, a trailing `\r` is dropped, and each
//! line is numbered in arrival order. Outbound: commands are cut at the
//! first embedded line break, truncated to [`MAX_LINE_LEN`] bytes and
//! terminated with `\r\n`.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::SessionEnd;
use crate::session::Termination;

/// Longest payload written to the wire, excluding the CRLF terminator.
pub const MAX_LINE_LEN: usize = 510;

/// One line as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLine {
    /// Arrival order within the session, starting at 0.
    pub seq: u64,
    pub text: String,
}

/// Encode an outbound command for the wire.
///
/// Truncation is byte-exact and silent: the protocol caps lines at 512
/// bytes and servers cut longer ones anyway.
pub fn frame(command: &str) -> Vec<u8> {
    let line = command.split(['\r', '\n']).next().unwrap_or("");
    let bytes = line.as_bytes();
    let len = bytes.len().min(MAX_LINE_LEN);
    let mut out = Vec::with_capacity(len + 2);
    out.extend_from_slice(&bytes[..len]);
    out.extend_from_slice(b"\r\n");
    out
}

/// Write one framed command and flush it.
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, command: &str) -> std::io::Result<()> {
    writer.write_all(&frame(command)).await?;
    writer.flush().await
}

/// Buffered reader producing numbered [`InboundLine`]s.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    next_seq: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::with_capacity(1024),
            next_seq: 0,
        }
    }

    /// Next line, or `None` at EOF. Invalid UTF-8 is replaced rather than
    /// dropping the whole line.
    ///
    /// Cancelling this future keeps any partially read bytes for the next call.
    pub async fn next_line(&mut self) -> std::io::Result<Option<InboundLine>> {
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let text = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.clear();

        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Some(InboundLine { seq, text }))
    }
}

/// Read worker: forwards lines to the dispatcher until EOF, a read error,
/// or session termination. Never retries a failed read.
pub(crate) async fn read_worker<R>(
    mut reader: LineReader<R>,
    lines: mpsc::Sender<InboundLine>,
    term: Termination,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = term.ended() => return,
            next = reader.next_line() => next,
        };
        match next {
            Ok(Some(line)) => {
                tracing::debug!(seq = line.seq, "<< {}", line.text);
                tokio::select! {
                    _ = term.ended() => return,
                    sent = lines.send(line) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(None) => {
                term.trigger(SessionEnd::Io("connection closed by server".to_string()));
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error reading from server");
                term.trigger(SessionEnd::from(e));
                return;
            }
        }
    }
}
