//! FTP error types

use thiserror::Error;

/// FTP protocol, transport, and usage errors
#[derive(Error, Debug)]
pub enum FtpError {
    /// Caller supplied an invalid argument (e.g. blank path); no network I/O was attempted
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The client is not in a state that allows this operation (e.g. not connected)
    #[error("invalid protocol state: {0}")]
    ProtocolState(String),

    /// Server returned an unexpected 4xx/5xx reply to a command expecting success
    #[error("FTP error {code}: {message}")]
    Command {
        /// Three-digit FTP reply code
        code: u16,
        /// Reply message (multi-line replies are folded with '\n')
        message: String,
    },

    /// Socket read/write/connect failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// TLS handshake or configuration failure on the control or data channel
    #[error("TLS error: {0}")]
    Tls(String),

    /// A reply, PASV/EPSV endpoint, or FEAT line could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The caller requested cancellation
    #[error("operation canceled")]
    Canceled,

    /// An explicit connect/read/accept timeout elapsed
    #[error("timed out")]
    Timeout,
}

/// Result type alias using [`FtpError`]
pub type Result<T> = std::result::Result<T, FtpError>;
