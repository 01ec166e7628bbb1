//! Per-connection session state

use crate::capabilities::Features;
use std::time::Instant;

/// Lifecycle state of the control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ConnectionState {
    /// TCP (and, if requested, TLS) connected, welcome reply read, not yet logged in
    Ready,
    /// USER sent, awaiting PASS or further challenge
    InProgress,
    /// USER/PASS accepted
    LoggedIn,
    /// QUIT sent or the socket is known to be gone
    Closed,
}

/// Data representation type set by `TYPE` (RFC 959 Section 3.1.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `TYPE A`: text, CRLF-normalized; forces read-to-end transfers since the
    /// wire byte count and the decoded byte count can differ
    Ascii,
    /// `TYPE I`: raw bytes, the default for file transfers
    Binary,
}

impl Default for DataType {
    fn default() -> Self {
        Self::Binary
    }
}

/// Mutable session state carried across commands on one control connection.
///
/// Distinct from [`ConnectionState`]: this tracks protocol-level latches and
/// caches that matter to the data channel factory and transfer engine, not
/// the login handshake.
#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) current_type: DataType,
    /// Set on a fresh connection and on any successful `SetDataType` call
    /// with a *different* type; cleared once a matching `TYPE` is actually
    /// sent. Forces the very first transfer after connect to re-assert TYPE
    /// even if it happens to match the default.
    pub(super) force_retype: bool,
    /// Set the first time EPSV is rejected on this connection; never cleared
    /// except by reconnecting
    pub(super) epsv_unsupported: bool,
    /// Set once a data-channel TLS activation has failed, to stop retrying
    /// PROT P on every subsequent transfer
    pub(super) ftps_data_failed: bool,
    pub(super) features: Features,
    pub(super) cwd: Option<String>,
    pub(super) last_command_at: Instant,
}

impl SessionState {
    pub(super) fn new() -> Self {
        Self {
            current_type: DataType::default(),
            force_retype: true,
            epsv_unsupported: false,
            ftps_data_failed: false,
            features: Features::new(),
            cwd: None,
            last_command_at: Instant::now(),
        }
    }
}
