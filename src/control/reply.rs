//! BIRD control-socket reply format.
//!
//! Every reply is one or more lines:
//!
//! ```text
//! 0011-tailscale: enabled      code + '-'  : more lines follow
//!  continued text              leading ' ' : continuation of the previous code
//! 0000                         code + ' '  : last line of the reply
//! ```
//!
//! Codes below 8000 are informational, 8xxx are run-time errors and 9xxx are
//! parse errors.

use crate::error::{Result, SyncError};

/// Greeting sent by the daemon when a session opens.
pub const CODE_WELCOME: u16 = 1;
pub const CODE_ALREADY_DISABLED: u16 = 8;
pub const CODE_DISABLED: u16 = 9;
pub const CODE_ALREADY_ENABLED: u16 = 10;
pub const CODE_ENABLED: u16 = 11;
pub const CODE_NO_PROTOCOLS_MATCH: u16 = 8003;

/// First code in the error range.
pub const FIRST_ERROR_CODE: u16 = 8000;

/// One parsed line of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: u16,
    pub text: String,
    /// True when this line terminates the reply.
    pub last: bool,
}

impl ReplyLine {
    /// Parse one line with its trailing newline already removed.
    ///
    /// `previous` is the code of the line before, needed for space-prefixed
    /// continuations.
    pub fn parse(line: &str, previous: Option<u16>) -> Result<Self> {
        if let Some(rest) = line.strip_prefix(' ') {
            let code = previous.ok_or_else(|| {
                SyncError::Protocol(format!("continuation without a code: {line:?}"))
            })?;
            return Ok(Self {
                code,
                text: rest.to_string(),
                last: false,
            });
        }

        let bytes = line.as_bytes();
        if bytes.len() < 5 || !bytes[..4].iter().all(u8::is_ascii_digit) {
            return Err(SyncError::Protocol(format!("bad reply line: {line:?}")));
        }
        let code: u16 = line[..4]
            .parse()
            .map_err(|_| SyncError::Protocol(format!("bad reply code: {line:?}")))?;
        let last = match bytes[4] {
            b' ' => true,
            b'-' => false,
            _ => return Err(SyncError::Protocol(format!("bad reply separator: {line:?}"))),
        };
        Ok(Self {
            code,
            text: line[5..].to_string(),
            last,
        })
    }
}

/// A complete reply: all lines up to and including the terminating one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<ReplyLine>,
}

impl Reply {
    pub fn has_code(&self, code: u16) -> bool {
        self.lines.iter().any(|l| l.code == code)
    }

    /// First line carrying an error code, if any.
    pub fn error(&self) -> Option<&ReplyLine> {
        self.lines.iter().find(|l| l.code >= FIRST_ERROR_CODE)
    }

    /// All line texts joined with `; `, for logs and error messages.
    pub fn message(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Turn an error line into the matching [`SyncError`].
    pub fn into_result(self, protocol: &str) -> Result<Self> {
        match self.error() {
            Some(line) if line.code == CODE_NO_PROTOCOLS_MATCH => {
                Err(SyncError::UnknownProtocol(protocol.to_string()))
            }
            Some(line) => Err(SyncError::Rejected {
                code: line.code,
                message: line.text.trim().to_string(),
            }),
            None => Ok(self),
        }
    }
}
