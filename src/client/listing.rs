//! Directory listing over the data channel: `LIST`, `NLST`, `MLSD`.
//!
//! This returns raw listing bytes as the server sent them. Parsing a `LIST`
//! line into structured fields is server-family-dependent to the point of
//! being its own crate; callers that need that get it elsewhere and hand us
//! back a path, or parse the bytes we return themselves.

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::{DataConnectionMode, TransferOptions};
use crate::error::Result;
use crate::reply::codes;

use super::FtpClient;
use super::data_channel::DATA_BUFFER_CAPACITY;
use super::state::DataType;

impl FtpClient {
    /// `LIST [path]`: a directory listing in the server's native (usually
    /// Unix `ls -l`-like) format.
    pub async fn list(&mut self, path: Option<&str>, mode: DataConnectionMode) -> Result<Vec<u8>> {
        let command = match path {
            Some(p) => format!("LIST {p}"),
            None => "LIST".to_string(),
        };
        self.listing_transfer(&command, mode, false).await
    }

    /// `NLST [path]`: a bare list of filenames, one per line.
    ///
    /// Some servers answer an empty directory with `550 No files found.`
    /// instead of opening an empty data connection; that reply is swallowed
    /// uniformly here and surfaces as an empty result rather than an error.
    pub async fn nlst(&mut self, path: Option<&str>, mode: DataConnectionMode) -> Result<Vec<u8>> {
        let command = match path {
            Some(p) => format!("NLST {p}"),
            None => "NLST".to_string(),
        };
        self.listing_transfer(&command, mode, true).await
    }

    /// `MLSD [path]`: machine-parseable directory listing (RFC 3659 Section 7).
    pub async fn mlsd(&mut self, path: Option<&str>, mode: DataConnectionMode) -> Result<Vec<u8>> {
        let command = match path {
            Some(p) => format!("MLSD {p}"),
            None => "MLSD".to_string(),
        };
        self.listing_transfer(&command, mode, false).await
    }

    /// Shared plumbing for the three listing commands: all three are read-to-end
    /// transfers in ASCII mode, with no restart support.
    async fn listing_transfer(
        &mut self,
        command: &str,
        mode: DataConnectionMode,
        swallow_empty: bool,
    ) -> Result<Vec<u8>> {
        self.set_data_type(DataType::Ascii).await?;
        let data_conn = self
            .open_data_connection(mode, command, &TransferOptions::default())
            .await?;

        self.send_command(command).await?;
        let reply = self.read_reply().await?;

        if swallow_empty && reply.code == codes::FILE_UNAVAILABLE && reply.message.trim() == "No files found." {
            debug!("{command} returned empty-directory quirk reply, treating as empty listing");
            return Ok(Vec::new());
        }

        if !reply.is_preliminary() {
            return Err(reply.into_command_error());
        }

        let mut stream = data_conn.into_stream().await?;
        let mut buf = Vec::with_capacity(DATA_BUFFER_CAPACITY);
        stream.read_to_end(&mut buf).await?;

        let final_reply = self.read_transfer_reply().await?;
        if !final_reply.is_success() {
            return Err(final_reply.into_command_error());
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_command_with_path() {
        let path = Some("pub");
        let command = match path {
            Some(p) => format!("LIST {p}"),
            None => "LIST".to_string(),
        };
        assert_eq!(command, "LIST pub");
    }

    #[test]
    fn test_nlst_command_without_path() {
        let path: Option<&str> = None;
        let command = match path {
            Some(p) => format!("NLST {p}"),
            None => "NLST".to_string(),
        };
        assert_eq!(command, "NLST");
    }

    #[test]
    fn test_empty_directory_quirk_message_match() {
        assert_eq!("No files found.".trim(), "No files found.");
    }
}
