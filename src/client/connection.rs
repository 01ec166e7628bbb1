//! Connection establishment: TCP dial, socket tuning, welcome banner, and
//! the `AUTH TLS` control-channel upgrade.

use crate::config::ClientConfig;
use crate::error::{FtpError, Result};
use crate::server_handler::select_for_banner;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig as RustlsClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tracing::{debug, warn};

use super::FtpClient;
use super::state::{ConnectionState, SessionState};
use super::stream::MaybeTlsStream;

/// TCP connection timeout in seconds
const TCP_CONNECT_TIMEOUT_SECS: u64 = 120;

/// TLS handshake timeout in seconds
const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 60;

/// BufReader capacity for the control channel. Control replies are short;
/// this is sized for command/reply turnaround, not transfer throughput (the
/// data channel gets its own, much larger, buffer).
const BUFREADER_CAPACITY: usize = 16 * 1024;

/// Certificate verifier that accepts any certificate, for self-signed or
/// untrusted test deployments.
///
/// **Security Warning:** This verifier disables all certificate validation,
/// making connections vulnerable to man-in-the-middle attacks. Only use this
/// for testing or with servers you trust on a secure network.
#[derive(Debug)]
pub(super) struct DangerousAcceptAnyCertificate;

impl ServerCertVerifier for DangerousAcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

pub(super) fn build_tls_connector(allow_insecure: bool) -> TlsConnector {
    use tokio_rustls::rustls::crypto::{CryptoProvider, ring};
    let _ = CryptoProvider::install_default(ring::default_provider());

    let tls_config = if allow_insecure {
        warn!("TLS certificate validation disabled - connection vulnerable to MITM attacks");
        RustlsClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        RustlsClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    TlsConnector::from(Arc::new(tls_config))
}

/// Upgrade a plain TCP-family stream to TLS against `host`, with the
/// configured timeout and certificate policy. Generic so it can wrap either
/// the raw control-channel `TcpStream` or a data-channel stream.
pub(super) async fn upgrade_to_tls<S>(
    stream: S,
    host: &str,
    allow_insecure: bool,
) -> Result<tokio_rustls::client::TlsStream<S>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let connector = build_tls_connector(allow_insecure);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| FtpError::Tls(format!("invalid domain name {host:?}: {e}")))?;

    timeout(
        Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
        connector.connect(server_name, stream),
    )
    .await
    .map_err(|_| FtpError::Timeout)?
    .map_err(|e| FtpError::Tls(format!("TLS handshake failed: {e}")))
}

impl FtpClient {
    /// Open the control connection and read the welcome banner.
    ///
    /// Always connects in the clear first, even for an `ftps: true`
    /// configuration: the `AUTH TLS` upgrade is an explicit command issued by
    /// [`login`](Self::login), sent over the plain connection and only then
    /// followed by the TLS handshake, per RFC 4217.
    ///
    /// # Errors
    ///
    /// Returns [`FtpError::Transport`] if the TCP connection fails,
    /// [`FtpError::Timeout`] if it does not complete within
    /// `TCP_CONNECT_TIMEOUT_SECS`, or a command error if the server's
    /// welcome reply is not a success code.
    pub async fn connect(config: Arc<ClientConfig>) -> Result<Self> {
        debug!("connecting to FTP server {}:{}", config.host, config.port);

        let addr = format!("{}:{}", config.host, config.port);
        use std::net::ToSocketAddrs;
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| {
                FtpError::Transport(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("failed to resolve address: {e}"),
                ))
            })?
            .next()
            .ok_or_else(|| {
                FtpError::Transport(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "no address resolved",
                ))
            })?;

        use socket2::{Domain, Protocol, Socket, Type};
        let domain = if socket_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;

        let tcp_stream = timeout(
            Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
                socket.connect(&socket_addr.into())?;
                socket.set_nonblocking(true)?;
                Ok(socket.into())
            }),
        )
        .await
        .map_err(|_| FtpError::Timeout)?
        .map_err(|e| FtpError::Transport(std::io::Error::other(format!("task join error: {e}"))))??;

        let tcp_stream = TcpStream::from_std(tcp_stream)?;

        let mut client = Self {
            stream: Some(BufReader::with_capacity(
                BUFREADER_CAPACITY,
                MaybeTlsStream::Plain(tcp_stream),
            )),
            state: ConnectionState::Ready,
            session: SessionState::new(),
            config,
            server_handler: Box::new(crate::server_handler::GenericServerHandler),
            is_broken: false,
        };

        let greeting = client.read_reply().await?;
        debug!("welcome reply: {} {}", greeting.code, greeting.message);

        // `is_success()` also accepts 1xx/3xx, but the welcome reply must be
        // a genuine 2xx: a `120 please wait` or `332 need account` here means
        // the server isn't ready to proceed yet.
        if greeting.code / 100 != 2 {
            return Err(greeting.into_command_error());
        }

        client.server_handler = select_for_banner(&greeting.full_text());

        Ok(client)
    }

    /// Replace the control stream with a TLS-wrapped one after a successful
    /// `AUTH TLS`/`AUTH SSL` negotiation. Only called from
    /// [`login`](Self::login).
    pub(super) async fn upgrade_control_channel(&mut self) -> Result<()> {
        let current = self
            .stream
            .take()
            .expect("control stream missing during upgrade");
        let plain = match current.into_inner() {
            MaybeTlsStream::Plain(s) => s,
            MaybeTlsStream::Tls(tls) => {
                // Put it back before returning the error.
                self.stream = Some(BufReader::with_capacity(
                    BUFREADER_CAPACITY,
                    MaybeTlsStream::Tls(tls),
                ));
                return Err(FtpError::ProtocolState(
                    "control channel is already TLS".to_string(),
                ));
            }
        };
        let tls = upgrade_to_tls(plain, &self.config.host, self.config.allow_insecure_tls).await?;
        self.stream = Some(BufReader::with_capacity(
            BUFREADER_CAPACITY,
            MaybeTlsStream::Tls(Box::new(tls)),
        ));
        Ok(())
    }

}
