//! Data channel negotiation: passive (`EPSV`/`PASV`/`PASVEX`) and active
//! (`EPRT`/`PORT`) connection setup, with `AutoPassive`/`AutoActive`
//! fallback and the IPv6 upgrade policy from RFC 2428.

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::config::{DataConnectionMode, TransferOptions};
use crate::endpoint::{self, ProxyState};
use crate::error::{FtpError, Result};
use crate::reply::{Reply, ReplyClass};

use super::FtpClient;
use super::connection::upgrade_to_tls;
use super::stream::MaybeTlsStream;

/// Buffer capacity for data-channel I/O, sized for transfer throughput
/// rather than the control channel's small reply lines.
pub(super) const DATA_BUFFER_CAPACITY: usize = 256 * 1024;

/// A data connection, either already dialed (passive modes) or still
/// awaiting the server's inbound connection (active modes).
pub(super) enum DataConnection {
    /// Connected to the server-advertised passive endpoint.
    Connected(MaybeTlsStream<TcpStream>),
    /// Listening locally; the server connects once the transfer command is
    /// issued. Resolved to a connected stream by
    /// [`DataConnection::into_stream`].
    Listening {
        listener: TcpListener,
        encrypt: bool,
        host: String,
        allow_insecure_tls: bool,
    },
}

impl DataConnection {
    /// For active-mode connections, accept the server's inbound connection.
    /// For passive-mode connections, this is a no-op.
    pub(super) async fn into_stream(self) -> Result<MaybeTlsStream<TcpStream>> {
        match self {
            Self::Connected(s) => Ok(s),
            Self::Listening {
                listener,
                encrypt,
                host,
                allow_insecure_tls,
            } => {
                let (stream, peer) = listener.accept().await?;
                debug!("data connection accepted from {peer}");
                if encrypt {
                    // Active-mode data TLS would require this client to act
                    // as a TLS server, which rustls's client-only feature
                    // set here doesn't support; fall back to clear text and
                    // let the caller's PROT state reflect what actually
                    // happened.
                    warn!(
                        "data channel encryption requested but not supported for active-mode \
                         connections; {host} will receive this transfer in clear text"
                    );
                }
                let _ = allow_insecure_tls;
                Ok(MaybeTlsStream::Plain(stream))
            }
        }
    }
}

fn is_permanent_negative(reply: &Reply) -> bool {
    reply.class() == ReplyClass::PermanentNegative
}

impl FtpClient {
    /// Negotiate a data connection per the session's configured
    /// [`DataConnectionMode`], honoring the `epsv_unsupported` latch and the
    /// IPv6 upgrade rule (an EPRT/EPSV family command is mandatory once the
    /// control channel is on an IPv6 socket; RFC 2428 Section 2).
    pub(super) async fn open_data_connection(
        &mut self,
        mode: DataConnectionMode,
        transfer_command: &str,
        options: &TransferOptions,
    ) -> Result<DataConnection> {
        let control_is_v6 = self.control_remote_addr()?.is_ipv6();

        match mode {
            DataConnectionMode::Pasv if control_is_v6 => self.passive_epsv(options).await,
            DataConnectionMode::Eprt if control_is_v6 => self.active_eprt().await,
            DataConnectionMode::Pasv => self.passive_pasv(false, transfer_command, options).await,
            DataConnectionMode::PasvEx => self.passive_pasv(true, transfer_command, options).await,
            DataConnectionMode::Eprt => self.active_eprt().await,
            DataConnectionMode::Port => self.active_port().await,
            DataConnectionMode::Epsv => self.passive_epsv(options).await,
            DataConnectionMode::AutoPassive => {
                if control_is_v6 || !self.session.epsv_unsupported {
                    match self.passive_epsv(options).await {
                        Ok(conn) => Ok(conn),
                        Err(FtpError::Command { code, message }) if !control_is_v6 => {
                            debug!("EPSV rejected ({code} {message}), falling back to PASV");
                            self.session.epsv_unsupported = true;
                            self.passive_pasv(false, transfer_command, options).await
                        }
                        Err(e) => Err(e),
                    }
                } else {
                    self.passive_pasv(false, transfer_command, options).await
                }
            }
            DataConnectionMode::AutoActive => {
                if control_is_v6 || !self.session.epsv_unsupported {
                    match self.active_eprt().await {
                        Ok(conn) => Ok(conn),
                        Err(FtpError::Command { code, message }) if !control_is_v6 => {
                            debug!("EPRT rejected ({code} {message}), falling back to PORT");
                            self.session.epsv_unsupported = true;
                            self.active_port().await
                        }
                        Err(e) => Err(e),
                    }
                } else {
                    self.active_port().await
                }
            }
        }
    }

    fn control_remote_addr(&self) -> Result<IpAddr> {
        match self.stream.as_ref().expect("control stream missing").get_ref() {
            MaybeTlsStream::Plain(s) => Ok(s.peer_addr()?.ip()),
            MaybeTlsStream::Tls(tls) => Ok(tls.get_ref().0.peer_addr()?.ip()),
        }
    }

    fn control_local_addr(&self) -> Result<SocketAddr> {
        match self.stream.as_ref().expect("control stream missing").get_ref() {
            MaybeTlsStream::Plain(s) => Ok(s.local_addr()?),
            MaybeTlsStream::Tls(tls) => Ok(tls.get_ref().0.local_addr()?),
        }
    }

    async fn passive_epsv(&mut self, options: &TransferOptions) -> Result<DataConnection> {
        let max_attempts = options.passive_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            self.send_command("EPSV").await?;
            let reply = self.read_reply().await?;
            if is_permanent_negative(&reply) {
                return Err(reply.into_command_error());
            }
            if !reply.is_success() {
                return Err(reply.into_command_error());
            }
            let control_remote = self.control_remote_addr()?;
            let endpoint = endpoint::parse_epsv_reply(&reply.message, control_remote)?;
            if options.blocked_ports.contains(&endpoint.port) {
                warn!(
                    "EPSV offered blocked port {} (attempt {attempt}/{max_attempts}), \
                     renegotiating",
                    endpoint.port
                );
                continue;
            }
            return self.dial_passive(endpoint.host, endpoint.port).await;
        }
        Err(FtpError::ProtocolState(format!(
            "EPSV kept offering blocked ports after {max_attempts} attempts"
        )))
    }

    async fn passive_pasv(
        &mut self,
        pasvex: bool,
        transfer_command: &str,
        options: &TransferOptions,
    ) -> Result<DataConnection> {
        let max_attempts = options.passive_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if self.session.features.has("PRET") {
                self.send_command(&format!("PRET {transfer_command}")).await?;
                let reply = self.read_reply().await?;
                if !reply.is_success() {
                    return Err(reply.into_command_error());
                }
            }

            self.send_command("PASV").await?;
            let reply = self.read_reply().await?;
            if !reply.is_success() {
                return Err(reply.into_command_error());
            }
            let control_remote = self.control_remote_addr()?;
            let endpoint = endpoint::parse_pasv_reply(
                &reply.message,
                control_remote,
                pasvex,
                ProxyState::Direct,
            )?;
            if options.blocked_ports.contains(&endpoint.port) {
                warn!(
                    "PASV offered blocked port {} (attempt {attempt}/{max_attempts}), \
                     renegotiating",
                    endpoint.port
                );
                continue;
            }
            return self.dial_passive(endpoint.host, endpoint.port).await;
        }
        Err(FtpError::ProtocolState(format!(
            "PASV kept offering blocked ports after {max_attempts} attempts"
        )))
    }

    async fn dial_passive(&mut self, host: IpAddr, port: u16) -> Result<DataConnection> {
        let addr = SocketAddr::new(host, port);
        debug!("dialing data connection to {addr}");
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        if self.config.ftps && self.config.data_connection_encryption && !self.session.ftps_data_failed {
            match upgrade_to_tls(stream, &self.config.host, self.config.allow_insecure_tls).await {
                Ok(tls) => return Ok(DataConnection::Connected(MaybeTlsStream::Tls(Box::new(tls)))),
                Err(e) => {
                    warn!("data channel TLS handshake failed, falling back to clear text: {e}");
                    self.session.ftps_data_failed = true;
                    // The TCP connection above is already consumed by the
                    // failed TLS attempt; open a fresh one in the clear.
                    let stream = TcpStream::connect(addr).await?;
                    stream.set_nodelay(true)?;
                    return Ok(DataConnection::Connected(MaybeTlsStream::Plain(stream)));
                }
            }
        }

        Ok(DataConnection::Connected(MaybeTlsStream::Plain(stream)))
    }

    async fn active_eprt(&mut self) -> Result<DataConnection> {
        let local_addr = self.control_local_addr()?;
        let listener = TcpListener::bind(SocketAddr::new(local_addr.ip(), 0)).await?;
        let bound_port = listener.local_addr()?.port();

        let (af, addr_str) = match local_addr.ip() {
            IpAddr::V4(v4) => (1, v4.to_string()),
            IpAddr::V6(v6) => (2, v6.to_string()),
        };
        self.send_command(&format!("EPRT |{af}|{addr_str}|{bound_port}|"))
            .await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_command_error());
        }

        Ok(DataConnection::Listening {
            listener,
            encrypt: self.config.ftps
                && self.config.data_connection_encryption
                && !self.session.ftps_data_failed,
            host: self.config.host.clone(),
            allow_insecure_tls: self.config.allow_insecure_tls,
        })
    }

    async fn active_port(&mut self) -> Result<DataConnection> {
        let local_addr = self.control_local_addr()?;
        let IpAddr::V4(ip) = local_addr.ip() else {
            return Err(FtpError::ProtocolState(
                "PORT requires an IPv4 control connection; use EPRT".to_string(),
            ));
        };
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(ip), 0)).await?;
        let bound_port = listener.local_addr()?.port();

        let octets = ip.octets();
        let p1 = bound_port / 256;
        let p2 = bound_port % 256;
        self.send_command(&format!(
            "PORT {},{},{},{},{},{}",
            octets[0], octets[1], octets[2], octets[3], p1, p2
        ))
        .await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_command_error());
        }

        Ok(DataConnection::Listening {
            listener,
            encrypt: self.config.ftps
                && self.config.data_connection_encryption
                && !self.session.ftps_data_failed,
            host: self.config.host.clone(),
            allow_insecure_tls: self.config.allow_insecure_tls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Reply;

    #[test]
    fn test_is_permanent_negative() {
        let reply = Reply {
            code: 502,
            message: "EPSV not understood".to_string(),
            info: Vec::new(),
        };
        assert!(is_permanent_negative(&reply));
        let ok = Reply {
            code: 229,
            message: String::new(),
            info: Vec::new(),
        };
        assert!(!is_permanent_negative(&ok));
    }

    #[test]
    fn test_eprt_command_format_ipv4() {
        let af = 1;
        let addr_str = "203.0.113.9";
        let port = 50500;
        let cmd = format!("EPRT |{af}|{addr_str}|{port}|");
        assert_eq!(cmd, "EPRT |1|203.0.113.9|50500|");
    }

    #[test]
    fn test_blocked_ports_membership() {
        let mut options = TransferOptions::default();
        options.blocked_ports.insert(50500);
        assert!(options.blocked_ports.contains(&50500));
        assert!(!options.blocked_ports.contains(&50501));
        assert_eq!(options.passive_max_attempts, 5);
    }

    #[test]
    fn test_port_command_octet_math() {
        let port: u16 = 50500;
        let p1 = port / 256;
        let p2 = port % 256;
        assert_eq!((p1, p2), (197, 64));
        assert_eq!(p1 * 256 + p2, port);
    }
}
