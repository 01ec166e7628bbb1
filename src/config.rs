//! FTP client and transfer configuration

/// FTP server connection configuration
///
/// Contains all the information needed to connect to and authenticate with
/// an FTP server.
///
/// # Example
///
/// ```
/// use ftp_rs::ClientConfig;
///
/// // Recommended: use the constructor methods
/// let config = ClientConfig::ftps("ftp.example.com", "user", "pass");
///
/// // Or construct manually
/// let config = ClientConfig {
///     host: "ftp.example.com".to_string(),
///     port: 21,
///     ftps: true,
///     allow_insecure_tls: false,
///     data_connection_encryption: true,
///     username: "user".to_string(),
///     password: "pass".to_string(),
/// };
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Server hostname (e.g., "ftp.example.com")
    pub host: String,

    /// Server port (21 for plain/explicit-TLS control, commonly still 21 for FTPS)
    pub port: u16,

    /// Upgrade the control channel with `AUTH TLS` before login
    #[cfg_attr(feature = "serde", serde(default))]
    pub ftps: bool,

    /// Allow insecure TLS connections (self-signed certificates, expired certificates)
    ///
    /// **Security Warning:** Setting this to `true` disables certificate validation,
    /// making your connection vulnerable to man-in-the-middle attacks. Only use this
    /// for testing or with servers you trust on a secure network.
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_insecure_tls: bool,

    /// Negotiate `PBSZ 0` + `PROT P` and activate TLS on data channels too
    ///
    /// Only meaningful when `ftps` is set. Some servers (or firewalls in front of
    /// them) break on encrypted data channels; setting this to `false` keeps the
    /// control channel encrypted while leaving data channels in clear text.
    #[cfg_attr(feature = "serde", serde(default = "default_data_encryption"))]
    pub data_connection_encryption: bool,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,
}

#[cfg(feature = "serde")]
fn default_data_encryption() -> bool {
    true
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(
        host: impl Into<String>,
        port: u16,
        ftps: bool,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            ftps,
            allow_insecure_tls: false,
            data_connection_encryption: ftps,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a configuration for a plain (unencrypted) connection on the standard port (21)
    ///
    /// **Warning:** Plain connections transmit credentials in clear text.
    /// Use `ftps()` whenever possible.
    pub fn plain(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, 21, false, username, password)
    }

    /// Create a configuration that upgrades the control channel with `AUTH TLS`
    /// and encrypts data channels via `PBSZ 0` / `PROT P`
    pub fn ftps(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, 21, true, username, password)
    }

    /// Create an FTPS configuration that accepts self-signed certificates
    ///
    /// **Security Warning:** This configuration disables certificate validation,
    /// making your connection vulnerable to man-in-the-middle attacks. Only use
    /// this for testing or with servers you trust on a secure network.
    ///
    /// # Example
    ///
    /// ```
    /// use ftp_rs::ClientConfig;
    ///
    /// // For a local FTP server with a self-signed certificate
    /// let config = ClientConfig::ftps_insecure("localhost", "user", "pass");
    /// ```
    pub fn ftps_insecure(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut config = Self::ftps(host, username, password);
        config.allow_insecure_tls = true;
        config
    }
}

/// Data connection mode preference passed to the data channel factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataConnectionMode {
    /// Prefer EPSV, fall back to PASV on permanent negative IPv4 replies
    AutoPassive,
    /// Prefer EPRT, fall back to PORT on permanent negative IPv4 replies
    AutoActive,
    /// Always use EPSV
    Epsv,
    /// Always use PASV
    Pasv,
    /// Use PASV but substitute the reported host with the control channel's
    /// remote host unconditionally (some load balancers report a routing IP)
    PasvEx,
    /// Always use EPRT
    Eprt,
    /// Always use PORT
    Port,
}

impl Default for DataConnectionMode {
    fn default() -> Self {
        Self::AutoPassive
    }
}

/// Per-transfer options controlling rate limiting, keep-alive, and resume behavior
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Bandwidth cap in bytes/second; `None` disables rate limiting
    pub rate_limit_bytes_per_sec: Option<u64>,
    /// Interval between keep-alive NOOPs injected on the control channel during
    /// a long transfer; `None` disables keep-alive injection
    pub noop_interval: Option<std::time::Duration>,
    /// Maximum number of resume attempts after a mid-transfer transport fault
    pub max_resume_attempts: u32,
    /// Whether a zero-length remote file should still create/truncate the local sink
    pub create_zero_byte_files: bool,
    /// Preferred data connection mode
    pub data_connection_mode: DataConnectionMode,
    /// Passive-mode ports to reject even if the server offers them (e.g. a
    /// port range known to be closed by an intervening firewall). A rejected
    /// port triggers a fresh `EPSV`/`PASV` negotiation, up to
    /// `passive_max_attempts` times.
    pub blocked_ports: std::collections::HashSet<u16>,
    /// Maximum number of times to re-negotiate a passive-mode port after the
    /// server offers one in `blocked_ports`
    pub passive_max_attempts: u32,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            rate_limit_bytes_per_sec: None,
            noop_interval: Some(std::time::Duration::from_secs(15)),
            max_resume_attempts: 3,
            create_zero_byte_files: true,
            data_connection_mode: DataConnectionMode::default(),
            blocked_ports: std::collections::HashSet::new(),
            passive_max_attempts: 5,
        }
    }
}
