//! FTP reply decoding (RFC 959 Section 4.2)
//!
//! A reply is one or more lines terminated by CRLF. A single-line reply has
//! the three-digit code immediately followed by a space. A multi-line reply
//! starts with the code followed by a hyphen, and ends with a line that
//! repeats the same code followed by a space; everything in between is
//! carried as free-form text, even if it happens to start with digits that
//! look like a reply code.

use crate::error::{FtpError, Result};

/// Classification of a reply by its leading digit (RFC 959 Section 4.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1yz: the requested action is being initiated; expect another reply
    /// before proceeding with a new command
    PositivePreliminary,
    /// 2yz: the requested action was completed
    PositiveCompletion,
    /// 3yz: the command was accepted, but the requested action is being held
    /// pending receipt of further information
    PositiveIntermediate,
    /// 4yz: the command was not accepted and the requested action did not
    /// occur, but the error is temporary and the action may be requested again
    TransientNegative,
    /// 5yz: the command was not accepted and the requested action did not occur
    PermanentNegative,
    /// 6yz: protected reply (RFC 2228), payload requires integrity/privacy processing
    Protected,
    /// Reply did not parse as a three-digit code; treated as a transport fault
    Unparseable,
}

impl ReplyClass {
    fn from_first_digit(d: u8) -> Self {
        match d {
            b'1' => Self::PositivePreliminary,
            b'2' => Self::PositiveCompletion,
            b'3' => Self::PositiveIntermediate,
            b'4' => Self::TransientNegative,
            b'5' => Self::PermanentNegative,
            b'6' => Self::Protected,
            _ => Self::Unparseable,
        }
    }
}

/// A decoded FTP reply: a code, the primary message on the final line, and
/// any additional free-form text lines carried before it in a multi-line reply
#[derive(Debug, Clone)]
pub struct Reply {
    /// Three-digit reply code, or `0` if the line was unparseable
    pub code: u16,
    /// The text following the code on the final line
    pub message: String,
    /// Text lines carried between the opening and closing lines of a
    /// multi-line reply, in order, with no folding applied
    pub info: Vec<String>,
}

impl Reply {
    pub(crate) fn unparseable(raw: String) -> Self {
        Self {
            code: 0,
            message: raw,
            info: Vec::new(),
        }
    }

    /// Classification derived from the leading digit of `code`
    #[must_use]
    pub fn class(&self) -> ReplyClass {
        if self.code == 0 {
            return ReplyClass::Unparseable;
        }
        let first_digit = b'0' + (self.code / 100) as u8;
        ReplyClass::from_first_digit(first_digit)
    }

    /// `true` for 1yz, 2yz, and 3yz replies
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.code / 100, 1..=3)
    }

    /// `true` for 4yz and 5yz replies
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.code / 100, 4 | 5)
    }

    /// `true` for 1yz replies, i.e. "expect one more reply before sending a
    /// new command"
    #[must_use]
    pub fn is_preliminary(&self) -> bool {
        self.code / 100 == 1
    }

    /// `true` for 4yz replies
    #[must_use]
    pub fn is_transient_negative(&self) -> bool {
        self.code / 100 == 4
    }

    /// `true` for 5yz replies
    #[must_use]
    pub fn is_permanent_negative(&self) -> bool {
        self.code / 100 == 5
    }

    /// `message` joined with every `info` line on a single logical string,
    /// newline-separated, for error reporting
    #[must_use]
    pub fn full_text(&self) -> String {
        if self.info.is_empty() {
            self.message.clone()
        } else {
            let mut out = self.info.join("\n");
            out.push('\n');
            out.push_str(&self.message);
            out
        }
    }

    /// Convert this reply into a [`FtpError::Command`] carrying its code and text
    #[must_use]
    pub fn into_command_error(self) -> FtpError {
        FtpError::Command {
            code: self.code,
            message: self.full_text(),
        }
    }
}

/// Outcome of parsing a single line against the multi-line reply state machine
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// `DDD<space>...`: this line completes the reply
    Final { code: u16, text: String },
    /// `DDD-...`: this line opens a multi-line reply
    Open { code: u16, text: String },
    /// Anything else: continuation text inside an open multi-line reply, or
    /// (outside one) an unparseable line
    Other(String),
}

/// Parse one CRLF-stripped line's leading three digits and separator.
///
/// Returns `Other` for lines that do not start with `DDD` followed by a
/// space or hyphen, which callers use both for continuation text and for
/// the top-level unparseable-first-line case.
pub(crate) fn classify_line(line: &str) -> LineKind {
    let bytes = line.as_bytes();
    if bytes.len() >= 4 && bytes[..3].iter().all(u8::is_ascii_digit) {
        // code is exactly 3 ASCII digits, parse is infallible
        let code: u16 = line[..3].parse().unwrap_or(0);
        match bytes[3] {
            b' ' => return LineKind::Final {
                code,
                text: line[4..].to_string(),
            },
            b'-' => return LineKind::Open {
                code,
                text: line[4..].to_string(),
            },
            _ => {}
        }
    }
    LineKind::Other(line.to_string())
}

/// Fold a complete sequence of already-split lines into one [`Reply`].
///
/// The first line determines the code. If it opens a multi-line reply, every
/// subsequent line is treated as free-form `info` text until a line repeats
/// the same code followed by a space; that line's text becomes `message`.
/// Used directly by tests and indirectly mirrors the streaming logic in
/// `client::io::read_reply`.
pub(crate) fn fold_lines(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(FtpError::Parse("empty reply".to_string()));
    };
    match classify_line(first) {
        LineKind::Final { code, text } => Ok(Reply {
            code,
            message: text,
            info: Vec::new(),
        }),
        LineKind::Open { code, text } => {
            let mut info = vec![text];
            for line in &lines[1..] {
                match classify_line(line) {
                    LineKind::Final { code: c, text } if c == code => {
                        return Ok(Reply {
                            code,
                            message: text,
                            info,
                        });
                    }
                    LineKind::Final { text, .. } | LineKind::Open { text, .. } => info.push(text),
                    LineKind::Other(text) => info.push(text),
                }
            }
            Err(FtpError::Parse(format!(
                "multi-line reply {code} never terminated"
            )))
        }
        LineKind::Other(raw) => Ok(Reply::unparseable(raw)),
    }
}

/// Well-known reply codes referenced directly by the core engine
#[allow(dead_code)]
pub mod codes {
    pub const RESTART_MARKER_REPLY: u16 = 110;
    pub const SERVICE_READY_IN_N_MINUTES: u16 = 120;
    pub const DATA_CONNECTION_ALREADY_OPEN: u16 = 125;
    pub const FILE_STATUS_OK_ABOUT_TO_OPEN: u16 = 150;
    pub const COMMAND_OK: u16 = 200;
    pub const COMMAND_NOT_IMPLEMENTED_SUPERFLUOUS: u16 = 202;
    pub const SYSTEM_STATUS: u16 = 211;
    pub const DIRECTORY_STATUS: u16 = 212;
    pub const FILE_STATUS: u16 = 213;
    pub const HELP_MESSAGE: u16 = 214;
    pub const SYSTEM_TYPE: u16 = 215;
    pub const SERVICE_READY_FOR_NEW_USER: u16 = 220;
    pub const SERVICE_CLOSING_CONTROL: u16 = 221;
    pub const DATA_CONNECTION_OPEN_NO_TRANSFER: u16 = 225;
    pub const CLOSING_DATA_CONNECTION: u16 = 226;
    pub const ENTERING_PASSIVE_MODE: u16 = 227;
    pub const ENTERING_LONG_PASSIVE_MODE: u16 = 228;
    pub const ENTERING_EXTENDED_PASSIVE_MODE: u16 = 229;
    pub const USER_LOGGED_IN: u16 = 230;
    pub const AUTH_TLS_OK: u16 = 234;
    pub const FILE_ACTION_OK: u16 = 250;
    pub const PATHNAME_CREATED: u16 = 257;
    pub const NEED_PASSWORD: u16 = 331;
    pub const NEED_ACCOUNT: u16 = 332;
    pub const FILE_ACTION_PENDING: u16 = 350;
    pub const SERVICE_NOT_AVAILABLE: u16 = 421;
    pub const CANT_OPEN_DATA_CONNECTION: u16 = 425;
    pub const CONNECTION_CLOSED_TRANSFER_ABORTED: u16 = 426;
    pub const INVALID_USERNAME_OR_PASSWORD: u16 = 430;
    pub const FILE_ACTION_NOT_TAKEN: u16 = 450;
    pub const ACTION_ABORTED_LOCAL_ERROR: u16 = 451;
    pub const ACTION_NOT_TAKEN_NO_SPACE: u16 = 452;
    pub const COMMAND_NOT_UNDERSTOOD: u16 = 500;
    pub const SYNTAX_ERROR_IN_ARGUMENTS: u16 = 501;
    pub const COMMAND_NOT_IMPLEMENTED: u16 = 502;
    pub const BAD_COMMAND_SEQUENCE: u16 = 503;
    pub const COMMAND_NOT_IMPLEMENTED_FOR_PARAMETER: u16 = 504;
    pub const NOT_LOGGED_IN: u16 = 530;
    pub const NEED_ACCOUNT_FOR_STORING: u16 = 532;
    pub const FILE_UNAVAILABLE: u16 = 550;
    pub const PAGE_TYPE_UNKNOWN: u16 = 551;
    pub const EXCEEDED_STORAGE_ALLOCATION: u16 = 552;
    pub const FILE_NAME_NOT_ALLOWED: u16 = 553;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_line_reply() {
        let reply = fold_lines(&lines(&["220 Service ready"])).unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.message, "Service ready");
        assert!(reply.info.is_empty());
        assert!(reply.is_success());
    }

    #[test]
    fn test_multiline_reply_folds_to_final_line() {
        let reply = fold_lines(&lines(&[
            "211-Features:",
            " EPSV",
            " MDTM",
            "211 End",
        ]))
        .unwrap();
        assert_eq!(reply.code, 211);
        assert_eq!(reply.message, "End");
        assert_eq!(reply.info, vec![
            "Features:".to_string(),
            " EPSV".to_string(),
            " MDTM".to_string(),
        ]);
    }

    #[test]
    fn test_multiline_reply_ignores_embedded_codes() {
        // A continuation line that happens to start with "220 " must not
        // terminate the reply early unless it repeats the opening code.
        let reply = fold_lines(&lines(&[
            "230-Welcome. Note: error 220 may appear in logs.",
            "230 Logged in",
        ]))
        .unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.message, "Logged in");
        assert_eq!(reply.info.len(), 1);
    }

    #[test]
    fn test_unterminated_multiline_is_parse_error() {
        let err = fold_lines(&lines(&["150-starting", "still going"])).unwrap_err();
        assert!(matches!(err, FtpError::Parse(_)));
    }

    #[test]
    fn test_unparseable_first_line() {
        let reply = fold_lines(&lines(&["not a reply at all"])).unwrap();
        assert_eq!(reply.code, 0);
        assert_eq!(reply.class(), ReplyClass::Unparseable);
    }

    #[test]
    fn test_reply_class_boundaries() {
        for (code, expected) in [
            (110, ReplyClass::PositivePreliminary),
            (200, ReplyClass::PositiveCompletion),
            (331, ReplyClass::PositiveIntermediate),
            (425, ReplyClass::TransientNegative),
            (550, ReplyClass::PermanentNegative),
            (631, ReplyClass::Protected),
        ] {
            let reply = Reply {
                code,
                message: String::new(),
                info: Vec::new(),
            };
            assert_eq!(reply.class(), expected, "code {code}");
        }
    }

    #[test]
    fn test_is_success_and_is_error() {
        let ok = Reply { code: 226, message: String::new(), info: Vec::new() };
        let transient = Reply { code: 425, message: String::new(), info: Vec::new() };
        let permanent = Reply { code: 550, message: String::new(), info: Vec::new() };
        assert!(ok.is_success());
        assert!(!ok.is_error());
        assert!(transient.is_error());
        assert!(permanent.is_error());
        assert!(permanent.is_permanent_negative());
        assert!(transient.is_transient_negative());
    }

    #[test]
    fn test_is_preliminary() {
        let prelim = Reply { code: 150, message: String::new(), info: Vec::new() };
        assert!(prelim.is_preliminary());
        let not_prelim = Reply { code: 226, message: String::new(), info: Vec::new() };
        assert!(!not_prelim.is_preliminary());
    }

    #[test]
    fn test_into_command_error_includes_code_and_text() {
        let reply = Reply {
            code: 550,
            message: "No such file".to_string(),
            info: Vec::new(),
        };
        let err = reply.into_command_error();
        match err {
            FtpError::Command { code, message } => {
                assert_eq!(code, 550);
                assert_eq!(message, "No such file");
            }
            _ => panic!("expected Command error"),
        }
    }
}
