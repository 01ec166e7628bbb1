//! Transfer engine: `RETR`/`STOR` data movement with rate limiting, NOOP
//! keep-alive injection, and resume-on-disconnect.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::TransferOptions;
use crate::error::{FtpError, Result};
use crate::ratelimit::BandwidthLimiter;
use crate::reply::codes;
use crate::server_handler::ServerHandler;

use super::FtpClient;
use super::data_channel::DATA_BUFFER_CAPACITY;
use super::io::STALE_DATA_DRAIN_TIMEOUT;
use super::state::DataType;

/// Cooperative cancellation flag for an in-flight transfer. Cloned cheaply
/// and shared between the caller and the transfer loop; checked once per
/// chunk so cancellation takes effect within one buffer's worth of I/O.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a completed (or resumed-to-completion) transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    /// Bytes moved in this call, not counting bytes already present before a
    /// resumed `retrieve` started (i.e. not counting the initial offset).
    pub bytes_transferred: u64,
    /// Number of times the data channel was reopened after a transport
    /// fault and the transfer resumed from the last confirmed offset.
    pub resumed: u32,
}

enum TransferFault {
    Transport(FtpError),
    Canceled,
}

enum FileSinkState {
    Pending,
    Opening(Pin<Box<dyn Future<Output = std::io::Result<tokio::fs::File>> + Send>>),
    Open(tokio::fs::File),
}

/// A local-file [`AsyncWrite`] target that defers creating the file until the
/// first non-empty chunk arrives, so a zero-length remote file leaves nothing
/// on disk unless the caller forces it afterward (see
/// [`retrieve_to_file`](FtpClient::retrieve_to_file)). Once opened, seeks to
/// `start_offset` so a resumed download continues past the existing prefix
/// instead of truncating it.
struct LazyFileSink {
    path: PathBuf,
    start_offset: u64,
    state: FileSinkState,
    opened: bool,
}

impl LazyFileSink {
    fn new(path: PathBuf, start_offset: u64) -> Self {
        Self {
            path,
            start_offset,
            state: FileSinkState::Pending,
            opened: false,
        }
    }

    fn was_opened(&self) -> bool {
        self.opened
    }
}

impl AsyncWrite for LazyFileSink {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                FileSinkState::Pending => {
                    let path = this.path.clone();
                    let start_offset = this.start_offset;
                    this.state = FileSinkState::Opening(Box::pin(async move {
                        let mut file = tokio::fs::OpenOptions::new()
                            .create(true)
                            .write(true)
                            .truncate(start_offset == 0)
                            .open(&path)
                            .await?;
                        if start_offset > 0 {
                            file.seek(std::io::SeekFrom::Start(start_offset)).await?;
                        }
                        Ok(file)
                    }));
                }
                FileSinkState::Opening(fut) => match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(file)) => {
                        this.opened = true;
                        this.state = FileSinkState::Open(file);
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                },
                FileSinkState::Open(file) => return Pin::new(file).poll_write(cx, buf),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().state {
            FileSinkState::Open(file) => Pin::new(file).poll_flush(cx),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().state {
            FileSinkState::Open(file) => Pin::new(file).poll_shutdown(cx),
            _ => Poll::Ready(Ok(())),
        }
    }
}

impl FtpClient {
    /// Download `remote_path` into `sink`, starting at `offset` (`0` for a
    /// fresh transfer, or a previously-confirmed byte count to resume).
    ///
    /// `known_size`, if given, is the expected final length; it lets the
    /// engine tell a graceful EOF (at `offset == known_size`) apart from a
    /// connection that closed early. Without it, a size is queried via
    /// `SIZE` only when `progress` is supplied (otherwise nothing needs it).
    /// `progress`, if given, is called with the cumulative byte offset after
    /// each chunk is written.
    ///
    /// On a transport-level fault partway through (`FtpError::Transport`),
    /// reopens the data channel with `REST offset` and reissues `RETR` up to
    /// `options.max_resume_attempts` times. A cancellation request is never
    /// retried.
    ///
    /// Returns `Ok(None)` instead of an error when the server reports the
    /// remote file does not exist (a permanent-negative reply recognized by
    /// [`ServerHandler::is_file_not_found_message`]), per the "not found is
    /// an outcome, not an error" classification.
    ///
    /// # Errors
    /// Returns a command error if the server rejects `RETR` for any other
    /// reason, or propagates the last transport error once resume attempts
    /// are exhausted.
    pub async fn retrieve<W>(
        &mut self,
        remote_path: &str,
        sink: &mut W,
        offset: u64,
        known_size: Option<u64>,
        options: &TransferOptions,
        limiter: Option<&BandwidthLimiter>,
        cancel: Option<&CancelToken>,
        mut progress: Option<&mut dyn FnMut(u64)>,
    ) -> Result<Option<TransferProgress>>
    where
        W: AsyncWrite + Unpin,
    {
        if remote_path.is_empty() {
            return Err(FtpError::Argument("remote path must not be empty".to_string()));
        }

        let file_len = match known_size {
            Some(n) => Some(n),
            None if progress.is_some() => self.size(remote_path).await.ok(),
            None => None,
        };
        let read_to_end = self.server_handler.always_read_to_end()
            || self.session.current_type == DataType::Ascii
            || file_len.is_none();

        let mut total = offset;
        let mut resumed = 0u32;

        loop {
            self.set_data_type(DataType::Binary).await?;
            let data_conn = self
                .open_data_connection(
                    options.data_connection_mode,
                    &format!("RETR {remote_path}"),
                    options,
                )
                .await?;

            if total > 0 {
                self.send_command(&format!("REST {total}")).await?;
                let reply = self.read_reply().await?;
                if reply.code != codes::RESTART_MARKER_REPLY && reply.code != codes::FILE_ACTION_PENDING {
                    return Err(reply.into_command_error());
                }
            }

            self.send_command(&format!("RETR {remote_path}")).await?;
            let reply = self.read_reply().await?;
            if !reply.is_preliminary() {
                if reply.is_error() && self.server_handler.is_file_not_found_message(&reply.message) {
                    return Ok(None);
                }
                return Err(reply.into_command_error());
            }

            let stream = data_conn.into_stream().await?;
            match self
                .pump_to_sink(
                    stream,
                    sink,
                    &mut total,
                    file_len,
                    read_to_end,
                    options,
                    limiter,
                    cancel,
                    progress.as_deref_mut(),
                )
                .await
            {
                Ok(()) => {
                    let final_reply = self.read_transfer_reply().await?;
                    if !final_reply.is_success() {
                        return Err(final_reply.into_command_error());
                    }
                    self.drain_stale_data(STALE_DATA_DRAIN_TIMEOUT).await?;
                    return Ok(Some(TransferProgress {
                        bytes_transferred: total - offset,
                        resumed,
                    }));
                }
                Err(TransferFault::Canceled) => return Err(FtpError::Canceled),
                Err(TransferFault::Transport(e)) => {
                    if resumed >= options.max_resume_attempts {
                        return Err(e);
                    }
                    resumed += 1;
                    warn!(
                        "transfer of {remote_path} faulted at offset {total} ({e}), resuming \
                         (attempt {resumed}/{})",
                        options.max_resume_attempts
                    );
                    self.mark_broken_if_control_fault(&e);
                    if self.is_broken {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Download `remote_path` to a local file, opened lazily on the first
    /// non-empty chunk so a zero-length remote file leaves no file on disk
    /// unless `options.create_zero_byte_files` is set. Resumes from `offset`
    /// exactly like [`retrieve`](Self::retrieve), which this delegates to.
    ///
    /// # Errors
    /// Same as [`retrieve`](Self::retrieve), plus any I/O error opening or
    /// writing the local file.
    pub async fn retrieve_to_file(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        offset: u64,
        known_size: Option<u64>,
        options: &TransferOptions,
        limiter: Option<&BandwidthLimiter>,
        cancel: Option<&CancelToken>,
        progress: Option<&mut dyn FnMut(u64)>,
    ) -> Result<Option<TransferProgress>> {
        let mut sink = LazyFileSink::new(local_path.to_path_buf(), offset);
        let result = self
            .retrieve(remote_path, &mut sink, offset, known_size, options, limiter, cancel, progress)
            .await?;

        if options.create_zero_byte_files && !sink.was_opened() {
            tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(local_path)
                .await
                .map_err(FtpError::Transport)?;
        }

        Ok(result)
    }

    /// Upload `source` to `remote_path`, creating or truncating it.
    ///
    /// Unlike [`retrieve`](Self::retrieve), upload resume is not attempted:
    /// `APPE`-based resume requires the caller to track what the server
    /// already has, which this engine does not infer on its own.
    pub async fn store<R>(
        &mut self,
        remote_path: &str,
        source: &mut R,
        options: &TransferOptions,
        limiter: Option<&BandwidthLimiter>,
        cancel: Option<&CancelToken>,
    ) -> Result<TransferProgress>
    where
        R: AsyncRead + Unpin,
    {
        if remote_path.is_empty() {
            return Err(FtpError::Argument("remote path must not be empty".to_string()));
        }

        self.set_data_type(DataType::Binary).await?;
        let data_conn = self
            .open_data_connection(
                options.data_connection_mode,
                &format!("STOR {remote_path}"),
                options,
            )
            .await?;

        self.send_command(&format!("STOR {remote_path}")).await?;
        let reply = self.read_reply().await?;
        if !reply.is_preliminary() {
            return Err(reply.into_command_error());
        }

        let stream = data_conn.into_stream().await?;
        let mut total = 0u64;
        match self
            .pump_from_source(stream, source, &mut total, options, limiter, cancel)
            .await
        {
            Ok(()) => {
                let final_reply = self.read_transfer_reply().await?;
                if !final_reply.is_success() {
                    return Err(final_reply.into_command_error());
                }
                self.drain_stale_data(STALE_DATA_DRAIN_TIMEOUT).await?;
                Ok(TransferProgress {
                    bytes_transferred: total,
                    resumed: 0,
                })
            }
            Err(TransferFault::Canceled) => Err(FtpError::Canceled),
            Err(TransferFault::Transport(e)) => Err(e),
        }
    }

    /// If the data-channel fault indicates the control channel itself is
    /// gone (not just the data socket), mark the client broken so the pool
    /// evicts it instead of resuming on a dead control connection.
    fn mark_broken_if_control_fault(&mut self, _err: &FtpError) {
        // The control channel's own read/write calls already call
        // `mark_broken` on failure via `send_command`/`read_reply`; nothing
        // further to classify here. Kept as a named hook so future
        // heuristics (e.g. inspecting `_err`'s ErrorKind) have one place to
        // land instead of being inlined at every call site.
    }

    #[allow(clippy::too_many_arguments)]
    async fn pump_to_sink<S, W>(
        &mut self,
        mut data: S,
        sink: &mut W,
        total: &mut u64,
        file_len: Option<u64>,
        read_to_end: bool,
        options: &TransferOptions,
        limiter: Option<&BandwidthLimiter>,
        cancel: Option<&CancelToken>,
        mut progress: Option<&mut dyn FnMut(u64)>,
    ) -> std::result::Result<(), TransferFault>
    where
        S: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; DATA_BUFFER_CAPACITY];
        let mut pending_noops = 0u32;
        let mut ticker = options.noop_interval.map(tokio::time::interval);
        if let Some(t) = ticker.as_mut() {
            // The first tick fires immediately; consume it so keep-alives
            // start one full interval after the transfer begins.
            t.tick().await;
        }

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(TransferFault::Canceled);
            }

            let tick = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                n = data.read(&mut buf) => {
                    let n = n.map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;
                    if n == 0 {
                        if read_to_end || file_len.is_some_and(|len| *total == len) {
                            break;
                        }
                        return Err(TransferFault::Transport(FtpError::Transport(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!(
                                "data connection closed at offset {total} before expected length {file_len:?}"
                            ),
                        ))));
                    }
                    if let Some(limiter) = limiter {
                        limiter.acquire(n as u64).await;
                    }
                    sink.write_all(&buf[..n])
                        .await
                        .map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;
                    *total += n as u64;
                    if let Some(cb) = progress.as_deref_mut() {
                        cb(*total);
                    }
                }
                () = tick => {
                    if self.send_command("NOOP").await.is_ok() {
                        pending_noops += 1;
                    }
                }
            }
        }

        sink.flush()
            .await
            .map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;

        self.drain_noop_replies(pending_noops).await
    }

    async fn pump_from_source<S, R>(
        &mut self,
        mut data: S,
        source: &mut R,
        total: &mut u64,
        options: &TransferOptions,
        limiter: Option<&BandwidthLimiter>,
        cancel: Option<&CancelToken>,
    ) -> std::result::Result<(), TransferFault>
    where
        S: AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; DATA_BUFFER_CAPACITY];
        let mut pending_noops = 0u32;
        let mut ticker = options.noop_interval.map(tokio::time::interval);
        if let Some(t) = ticker.as_mut() {
            t.tick().await;
        }

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(TransferFault::Canceled);
            }

            let tick = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                n = source.read(&mut buf) => {
                    let n = n.map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;
                    if n == 0 {
                        break;
                    }
                    if let Some(limiter) = limiter {
                        limiter.acquire(n as u64).await;
                    }
                    data.write_all(&buf[..n])
                        .await
                        .map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;
                    *total += n as u64;
                }
                () = tick => {
                    if self.send_command("NOOP").await.is_ok() {
                        pending_noops += 1;
                    }
                }
            }
        }

        data.flush()
            .await
            .map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;
        data.shutdown()
            .await
            .map_err(|e| TransferFault::Transport(FtpError::Transport(e)))?;

        self.drain_noop_replies(pending_noops).await
    }

    /// Every `NOOP` sent mid-transfer gets a reply in order, before the
    /// transfer's own final reply. Read and discard them so the caller's
    /// subsequent `read_transfer_reply` lands on the real one.
    async fn drain_noop_replies(&mut self, count: u32) -> std::result::Result<(), TransferFault> {
        for _ in 0..count {
            match self.read_reply().await {
                Ok(reply) if !reply.is_success() => {
                    debug!("keep-alive NOOP during transfer got {}: {}", reply.code, reply.message);
                }
                Ok(_) => {}
                Err(e) => return Err(TransferFault::Transport(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_token_cancel_is_visible_through_clone() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_transfer_progress_is_copy() {
        let p = TransferProgress {
            bytes_transferred: 42,
            resumed: 1,
        };
        let p2 = p;
        assert_eq!(p.bytes_transferred, p2.bytes_transferred);
    }
}
