//! Low-level I/O primitives shared by every command on the control channel:
//! command transmission (with credential redaction), single- and multi-line
//! reply framing, and the broken-connection latch.

use crate::error::{FtpError, Result};
use crate::reply::{LineKind, Reply, classify_line};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

use super::FtpClient;

/// Timeout for a single control-channel reply (covers the common case: one
/// command, one reply, no data channel in flight).
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a reply that follows a data-channel transfer completing
/// (`226 Closing data connection`), which may be delayed behind slow
/// server-side bookkeeping.
const TRANSFER_REPLY_TIMEOUT: Duration = Duration::from_secs(300);

/// How long [`FtpClient::drain_stale_data`] waits for one more byte before
/// concluding the control channel is quiet.
pub(super) const STALE_DATA_DRAIN_TIMEOUT: Duration = Duration::from_millis(50);

/// Commands whose arguments must never be logged verbatim.
fn redact(command: &str) -> String {
    let trimmed = command.trim_end_matches(['\r', '\n']);
    let upper = trimmed.to_ascii_uppercase();
    if upper.starts_with("PASS ") || upper.starts_with("ACCT ") || upper.starts_with("USER ") {
        let verb = &trimmed[..trimmed.find(' ').unwrap_or(trimmed.len())];
        format!("{verb} ****")
    } else {
        trimmed.to_string()
    }
}

impl FtpClient {
    /// Send one command line, appending the CRLF terminator required by
    /// RFC 959 Section 3.5.
    pub(super) async fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("sending: {}", redact(command));
        let io = self.io().get_mut();
        io.write_all(command.as_bytes()).await?;
        io.write_all(b"\r\n").await?;
        io.flush().await?;
        Ok(())
    }

    /// Read and fold one complete reply (single- or multi-line) from the
    /// control channel, using the default reply timeout.
    pub(super) async fn read_reply(&mut self) -> Result<Reply> {
        self.read_reply_with_timeout(REPLY_TIMEOUT).await
    }

    /// Read a reply expected to follow a completed data transfer, which gets
    /// a longer timeout since the server may still be flushing to disk.
    pub(super) async fn read_transfer_reply(&mut self) -> Result<Reply> {
        self.read_reply_with_timeout(TRANSFER_REPLY_TIMEOUT).await
    }

    async fn read_reply_with_timeout(&mut self, timeout_duration: Duration) -> Result<Reply> {
        let result = timeout(timeout_duration, self.read_reply_inner())
            .await
            .map_err(|_| FtpError::Timeout)?;

        if matches!(result, Err(FtpError::Parse(_))) {
            self.mark_broken();
        }
        result
    }

    async fn read_reply_inner(&mut self) -> Result<Reply> {
        let first_line = self.read_line().await?;
        trace!("received: {}", first_line);

        match classify_line(&first_line) {
            LineKind::Final { code, text } => Ok(Reply {
                code,
                message: text,
                info: Vec::new(),
            }),
            LineKind::Open { code, text } => {
                let mut info = vec![text];
                loop {
                    let line = self.read_line().await?;
                    trace!("received: {}", line);
                    match classify_line(&line) {
                        LineKind::Final { code: c, text } if c == code => {
                            return Ok(Reply {
                                code,
                                message: text,
                                info,
                            });
                        }
                        LineKind::Final { text, .. } | LineKind::Open { text, .. } => {
                            info.push(text);
                        }
                        LineKind::Other(text) => info.push(text),
                    }
                }
            }
            LineKind::Other(raw) => Ok(Reply::unparseable(raw)),
        }
    }

    /// Read one CRLF- or LF-terminated line as a lossily-decoded `String`,
    /// with the terminator stripped.
    async fn read_line(&mut self) -> Result<String> {
        let mut line_bytes = Vec::with_capacity(256);
        let n = self.io().read_until(b'\n', &mut line_bytes).await?;
        if n == 0 {
            self.mark_broken();
            return Err(FtpError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
        let line = String::from_utf8_lossy(&line_bytes);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read and discard whatever is sitting on the control channel right now
    /// (including bytes already buffered), for up to `timeout_duration`.
    /// Used to swallow stray bytes left behind by a broken prior operation,
    /// or late `NOOP` echoes arriving just after a transfer's final reply.
    pub(super) async fn drain_stale_data(&mut self, timeout_duration: Duration) -> Result<()> {
        let mut scratch = [0u8; 256];
        loop {
            match timeout(timeout_duration, self.io().read(&mut scratch)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => trace!("drained {n} stale byte(s) from control channel"),
                Ok(Err(e)) => return Err(FtpError::Transport(e)),
                Err(_) => break,
            }
        }
        Ok(())
    }
}
