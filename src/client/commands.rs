//! Simple unary commands: the ones that exchange exactly one command/reply
//! pair on the control channel and touch no data connection.

use crate::error::{FtpError, Result};
use crate::reply::codes;
use tracing::debug;

use super::FtpClient;
use super::state::DataType;

/// Extract the path from a `257`-style reply whose text carries it inside
/// double quotes, with embedded quotes doubled (RFC 959 Section 7, Appendix II).
fn parse_quoted_path(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut out = String::new();
    let mut chars = text[1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                out.push('"');
                chars.next();
            } else {
                return Some(out);
            }
        } else {
            out.push(c);
        }
    }
    None
}

impl FtpClient {
    /// Send a keep-alive `NOOP`. Used both as an explicit liveness probe
    /// (pool validation) and injected periodically during long transfers.
    ///
    /// # Errors
    /// Returns a command error if the server rejects it.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_command("NOOP").await?;
        let reply = self.read_reply().await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply.into_command_error())
        }
    }

    /// `PWD`: report the current working directory.
    pub async fn pwd(&mut self) -> Result<String> {
        self.send_command("PWD").await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::PATHNAME_CREATED {
            return Err(reply.into_command_error());
        }
        let path = parse_quoted_path(&reply.message)
            .ok_or_else(|| FtpError::Parse(format!("unparseable PWD reply: {:?}", reply.message)))?;
        self.session.cwd = Some(path.clone());
        Ok(path)
    }

    /// `CWD`: change the working directory.
    pub async fn cwd(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("CWD {path}")).await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_command_error());
        }
        // RFC 959 leaves CWD's reply text unstructured, so it can't be
        // trusted as the new absolute path; invalidate the cache instead and
        // let the next `pwd()` call repopulate it.
        self.session.cwd = None;
        Ok(())
    }

    /// `MKD`: create a directory, returning the server-reported pathname.
    pub async fn mkd(&mut self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("MKD {path}")).await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::PATHNAME_CREATED {
            return Err(reply.into_command_error());
        }
        parse_quoted_path(&reply.message)
            .ok_or_else(|| FtpError::Parse(format!("unparseable MKD reply: {:?}", reply.message)))
    }

    /// `RMD`: remove a directory.
    pub async fn rmd(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("RMD {path}")).await?;
        let reply = self.read_reply().await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply.into_command_error())
        }
    }

    /// `DELE`: delete a file.
    pub async fn dele(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("DELE {path}")).await?;
        let reply = self.read_reply().await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply.into_command_error())
        }
    }

    /// `RNFR` followed by `RNTO`: rename a file or directory.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from.is_empty() || to.is_empty() {
            return Err(FtpError::Argument(
                "rename source and destination must not be empty".to_string(),
            ));
        }
        self.send_command(&format!("RNFR {from}")).await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::FILE_ACTION_PENDING {
            return Err(reply.into_command_error());
        }
        self.send_command(&format!("RNTO {to}")).await?;
        let reply = self.read_reply().await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply.into_command_error())
        }
    }

    /// `SIZE`: report a file's size in bytes. Meaningless for directories on
    /// most servers; only reliable in `TYPE I` per RFC 3659 Section 4.
    pub async fn size(&mut self, path: &str) -> Result<u64> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("SIZE {path}")).await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::FILE_STATUS {
            return Err(reply.into_command_error());
        }
        reply
            .message
            .trim()
            .parse::<u64>()
            .map_err(|_| FtpError::Parse(format!("non-numeric SIZE reply: {:?}", reply.message)))
    }

    /// `MDTM`: report a file's last modification time as the raw
    /// `YYYYMMDDHHMMSS[.sss]` string (RFC 3659 Section 3). Left unparsed here
    /// since interpretation (UTC vs. local) varies by server.
    pub async fn mdtm(&mut self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(FtpError::Argument("path must not be empty".to_string()));
        }
        self.send_command(&format!("MDTM {path}")).await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::FILE_STATUS {
            return Err(reply.into_command_error());
        }
        Ok(reply.message.trim().to_string())
    }

    /// `SYST`: report the remote operating system type.
    pub async fn syst(&mut self) -> Result<String> {
        self.send_command("SYST").await?;
        let reply = self.read_reply().await?;
        if reply.code != codes::SYSTEM_TYPE {
            return Err(reply.into_command_error());
        }
        Ok(reply.message)
    }

    /// Send a raw `SITE` subcommand, returning the server's reply text.
    pub async fn site(&mut self, subcommand: &str) -> Result<String> {
        if subcommand.is_empty() {
            return Err(FtpError::Argument(
                "SITE subcommand must not be empty".to_string(),
            ));
        }
        self.send_command(&format!("SITE {subcommand}")).await?;
        let reply = self.read_reply().await?;
        if reply.is_success() {
            Ok(reply.message)
        } else {
            Err(reply.into_command_error())
        }
    }

    /// Set the data representation type, sending `TYPE` only when it differs
    /// from the session's cached type or `force_retype` is set (always true
    /// immediately after connect).
    pub async fn set_data_type(&mut self, data_type: DataType) -> Result<()> {
        if !self.session.force_retype && self.session.current_type == data_type {
            return Ok(());
        }
        let code = match data_type {
            DataType::Ascii => "A",
            DataType::Binary => "I",
        };
        self.send_command(&format!("TYPE {code}")).await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_command_error());
        }
        self.session.current_type = data_type;
        self.session.force_retype = false;
        Ok(())
    }

    /// `QUIT`: close the session gracefully. The control connection is
    /// dropped regardless of the server's reply.
    pub async fn quit(mut self) -> Result<()> {
        debug!("sending QUIT");
        self.send_command("QUIT").await?;
        let _ = self.read_reply().await;
        self.state = super::state::ConnectionState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_path_simple() {
        assert_eq!(
            parse_quoted_path("\"/home/user\" is current directory"),
            Some("/home/user".to_string())
        );
    }

    #[test]
    fn test_parse_quoted_path_with_escaped_quote() {
        assert_eq!(
            parse_quoted_path("\"/home/\"\"weird\"\"/dir\" created"),
            Some("/home/\"weird\"/dir".to_string())
        );
    }

    #[test]
    fn test_parse_quoted_path_missing_quotes() {
        assert_eq!(parse_quoted_path("no quotes here"), None);
    }

    #[test]
    fn test_parse_quoted_path_unterminated() {
        assert_eq!(parse_quoted_path("\"/unterminated"), None);
    }
}
