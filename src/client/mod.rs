//! The async FTP client
//!
//! [`FtpClient`] owns one control connection and the session state that
//! hangs off it (current `TYPE`, cached `FEAT` response, EPSV/FTPS-data
//! latches). Data-channel transfers borrow the client only long enough to
//! negotiate the data connection and exchange the surrounding commands; the
//! transfer itself runs over a connection opened and closed within a single
//! call.

mod auth;
mod commands;
mod connection;
mod data_channel;
mod io;
mod listing;
mod state;
mod stream;
mod transfer;

use crate::config::ClientConfig;
use crate::server_handler::ServerHandler;
use state::{ConnectionState, SessionState};
use std::sync::Arc;
use stream::ControlStream;
use tokio::io::BufReader;

pub use state::DataType;
pub use transfer::{CancelToken, TransferProgress};

/// An established FTP control connection, with session state tracked across
/// commands.
pub struct FtpClient {
    /// `None` only for the instant `upgrade_control_channel` is moving the
    /// stream from plain to TLS; every public method observes `Some`.
    pub(crate) stream: Option<BufReader<ControlStream>>,
    pub(crate) state: ConnectionState,
    pub(crate) session: SessionState,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) server_handler: Box<dyn ServerHandler>,
    pub(crate) is_broken: bool,
}

impl FtpClient {
    pub(crate) fn io(&mut self) -> &mut BufReader<ControlStream> {
        self.stream.as_mut().expect("control stream missing")
    }

    /// Whether this connection has been marked unusable (parse failure,
    /// unexpected disconnect, I/O error on a non-resumable path). A pooled
    /// client in this state is dropped rather than returned to service.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    pub(crate) fn mark_broken(&mut self) {
        self.is_broken = true;
    }

    /// `true` once `USER`/`PASS` has completed successfully.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, ConnectionState::LoggedIn)
    }

    /// The server's advertised feature set (empty until [`login`](Self::login)
    /// has sent `FEAT`, or for servers that reject it).
    #[must_use]
    pub fn features(&self) -> &crate::capabilities::Features {
        &self.session.features
    }

    /// The last working directory reported by `PWD`/`CWD`, if known.
    #[must_use]
    pub fn cwd(&self) -> Option<&str> {
        self.session.cwd.as_deref()
    }

    /// Whether the control channel has been upgraded to TLS via `AUTH TLS`.
    #[must_use]
    pub fn control_is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.get_ref().is_tls())
    }
}

impl std::fmt::Debug for FtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("is_broken", &self.is_broken)
            .finish()
    }
}

impl Drop for FtpClient {
    fn drop(&mut self) {
        tracing::debug!("FtpClient dropped");
    }
}
