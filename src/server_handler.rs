//! Server-family hook points
//!
//! Most FTP servers behave identically at the level this crate operates, but
//! a handful of long-lived server families need small behavioral overrides:
//! extra commands right after connect, always reading a data stream to EOF
//! instead of trusting a reported size, a different way to look up file size,
//! and server-specific error text that should map to a particular outcome
//! rather than a generic command error. [`ServerHandler`] collects those
//! hook points behind one trait, selected once at connect time from the
//! welcome banner, the same way a dispatch table keyed off an identifying
//! string picks a specialization elsewhere in this crate's ancestry.

/// Behavioral overrides for a specific server family
pub trait ServerHandler: Send + Sync + std::fmt::Debug {
    /// Commands to issue immediately after login, before any other
    /// operation (e.g. `SITE` commands some servers require to switch mode)
    fn post_connect_commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// If `true`, the transfer engine ignores any known/reported file length
    /// and always reads the data connection until EOF. Required by server
    /// families whose reported size is in a different unit than the bytes
    /// actually sent (e.g. record-oriented mainframe filesystems).
    fn always_read_to_end(&self) -> bool {
        false
    }

    /// Recognize a server-specific "no such file" style error message that
    /// doesn't use a permanent-negative reply code the way most servers do.
    /// Returning `true` causes the caller to treat the reply as a missing-file
    /// outcome rather than a generic command error.
    fn is_file_not_found_message(&self, message: &str) -> bool {
        let lower = message.to_ascii_lowercase();
        lower.contains("no such file") || lower.contains("file not found")
    }

    /// Build an absolute path from a relative one and the client's current
    /// working directory, for servers with non-Unix path conventions.
    /// Default implementation does simple POSIX-style joining.
    fn absolute_path(&self, cwd: &str, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else if cwd.ends_with('/') {
            format!("{cwd}{path}")
        } else {
            format!("{cwd}/{path}")
        }
    }
}

/// Default hook set used when no server-family match applies
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericServerHandler;

impl ServerHandler for GenericServerHandler {}

/// Handler for servers that report file sizes in a unit that does not match
/// the byte count actually delivered over the data connection (for example,
/// certain mainframe FTP daemons serving record-oriented datasets), and so
/// must always be read to end rather than stopped at a reported length.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOrientedServerHandler;

impl ServerHandler for RecordOrientedServerHandler {
    fn always_read_to_end(&self) -> bool {
        true
    }
}

/// Select a [`ServerHandler`] by inspecting the welcome banner text returned
/// on connect. Conservative: anything unrecognized gets
/// [`GenericServerHandler`].
pub fn select_for_banner(banner: &str) -> Box<dyn ServerHandler> {
    let lower = banner.to_ascii_lowercase();
    if lower.contains("z/os") || lower.contains("mvs") {
        Box::new(RecordOrientedServerHandler)
    } else {
        Box::new(GenericServerHandler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_handler_defaults() {
        let h = GenericServerHandler;
        assert!(h.post_connect_commands().is_empty());
        assert!(!h.always_read_to_end());
        assert!(h.is_file_not_found_message("550 No such file or directory"));
        assert!(!h.is_file_not_found_message("550 Permission denied"));
    }

    #[test]
    fn test_absolute_path_joining() {
        let h = GenericServerHandler;
        assert_eq!(h.absolute_path("/home/user", "foo.txt"), "/home/user/foo.txt");
        assert_eq!(h.absolute_path("/home/user/", "foo.txt"), "/home/user/foo.txt");
        assert_eq!(h.absolute_path("/home/user", "/abs/path"), "/abs/path");
    }

    #[test]
    fn test_select_for_banner_generic() {
        let h = select_for_banner("220 FileZilla Server ready");
        assert!(!h.always_read_to_end());
    }

    #[test]
    fn test_select_for_banner_zos() {
        let h = select_for_banner("220-FTP server ready, z/OS V2R4");
        assert!(h.always_read_to_end());
    }
}
