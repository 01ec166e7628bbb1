//! Login sequence: optional `AUTH TLS` upgrade, `USER`/`PASS`, and the `FEAT`
//! probe that populates the session's advertised feature set.

use crate::capabilities::Features;
use crate::error::{FtpError, Result};
use crate::reply::codes;
use tracing::debug;

use super::FtpClient;
use super::state::ConnectionState;

impl FtpClient {
    /// Complete the login sequence: upgrade to TLS if configured, send
    /// `USER`/`PASS`, probe `FEAT`, and run any post-connect commands the
    /// selected [`ServerHandler`](crate::server_handler::ServerHandler) wants.
    ///
    /// # Errors
    ///
    /// Returns a command error if login is rejected, [`FtpError::Tls`] if
    /// `AUTH TLS` is requested but the handshake fails, or
    /// [`FtpError::ProtocolState`] if already logged in.
    pub async fn login(&mut self) -> Result<()> {
        if self.state == ConnectionState::LoggedIn {
            return Err(FtpError::ProtocolState("already logged in".to_string()));
        }

        if self.config.ftps {
            self.send_command("AUTH TLS").await?;
            let reply = self.read_reply().await?;
            if !reply.is_success() {
                return Err(reply.into_command_error());
            }
            self.upgrade_control_channel().await?;
            debug!("control channel upgraded to TLS");
        }

        self.send_command(&format!("USER {}", self.config.username))
            .await?;
        self.state = ConnectionState::InProgress;
        let reply = self.read_reply().await?;

        match reply.code {
            codes::USER_LOGGED_IN => {}
            codes::NEED_PASSWORD | codes::NEED_ACCOUNT => {
                self.send_command(&format!("PASS {}", self.config.password))
                    .await?;
                let reply = self.read_reply().await?;
                if reply.code != codes::USER_LOGGED_IN {
                    self.state = ConnectionState::Ready;
                    return Err(reply.into_command_error());
                }
            }
            _ => {
                self.state = ConnectionState::Ready;
                return Err(reply.into_command_error());
            }
        }

        self.state = ConnectionState::LoggedIn;
        debug!("login successful as {}", self.config.username);

        if self.config.ftps && self.config.data_connection_encryption {
            self.send_command("PBSZ 0").await?;
            let reply = self.read_reply().await?;
            if !reply.is_success() {
                return Err(reply.into_command_error());
            }
            self.send_command("PROT P").await?;
            let reply = self.read_reply().await?;
            if !reply.is_success() {
                // Server accepted AUTH TLS but rejects private data channels;
                // latch so every subsequent transfer stops asking.
                self.session.ftps_data_failed = true;
            }
        }

        self.probe_features().await?;

        for cmd in self.server_handler.post_connect_commands() {
            self.send_command(&cmd).await?;
            let reply = self.read_reply().await?;
            if !reply.is_success() {
                return Err(reply.into_command_error());
            }
        }

        Ok(())
    }

    /// Send `FEAT` and store the parsed result. Servers that don't implement
    /// `FEAT` answer with a permanent-negative reply; that's not an error
    /// here, it just leaves the feature set empty.
    async fn probe_features(&mut self) -> Result<()> {
        self.send_command("FEAT").await?;
        let reply = self.read_reply().await?;
        self.session.features = if reply.is_success() {
            Features::parse(&reply.info)
        } else {
            Features::new()
        };
        Ok(())
    }
}
