// crates/oath-protocol/src/line_codec.rs

//! dynalogin line codec.
//!
//! Input format (one line → `LineCommand`):
//!
//! - Validate a code:
//!   `UDATA <HOTP|TOTP> <user> <code>`
//!
//! - Close the session:
//!   `QUIT`
//!
//! Command names are case-insensitive, mode names are not.
//!
//! Output format (`Reply` / `LineError` → line):
//!
//! - Final reply:    `<code> <text>\r\n`
//! - Partial reply:  `<code>-<text>\r\n` (more output follows)
//!
//! Line framing (terminators, length limit, timeouts) is handled by the
//! server's reader; this module only sees complete lines.

use std::borrow::Cow;
use std::fmt;

use oath_core::OtpMode;

use crate::wire_types::Reply;

/// A parsed dynalogin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCommand {
    /// `UDATA <mode> <user> <code>`
    Udata {
        mode: OtpMode,
        user: String,
        code: String,
    },
    /// `QUIT`
    Quit,
}

/// A protocol error that is reported to the client as a coded reply.
///
/// Whether it is recoverable or fatal is decided by whoever raises it;
/// the reply format is the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub reply: Reply,
    pub message: Cow<'static, str>,
}

impl LineError {
    /// Error carrying the reply's default description.
    pub fn new(reply: Reply) -> Self {
        LineError {
            reply,
            message: Cow::Borrowed(reply.description()),
        }
    }

    /// Error with a custom message in place of the default description.
    pub fn with_message(reply: Reply, message: impl Into<Cow<'static, str>>) -> Self {
        LineError {
            reply,
            message: message.into(),
        }
    }

    pub fn syntax(message: &'static str) -> Self {
        LineError::with_message(Reply::SyntaxError, message)
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reply.code(), self.message)
    }
}

impl std::error::Error for LineError {}

/// Split a raw line into whitespace-separated arguments.
///
/// An empty or all-blank line yields an empty list.
pub fn split_args(line: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(line)
        .split_ascii_whitespace()
        .map(str::to_string)
        .collect()
}

/// Turn an argument list into a command.
pub fn parse_command(args: &[String]) -> Result<LineCommand, LineError> {
    let Some(name) = args.first() else {
        return Err(LineError::syntax("Insufficient arguments"));
    };

    if name.eq_ignore_ascii_case("UDATA") {
        parse_udata(args)
    } else if name.eq_ignore_ascii_case("QUIT") {
        Ok(LineCommand::Quit)
    } else {
        Err(LineError::new(Reply::UnknownCommand))
    }
}

fn parse_udata(args: &[String]) -> Result<LineCommand, LineError> {
    // UDATA, mode, user, code
    let [_, mode, user, code] = args else {
        return Err(LineError::syntax("Expected 4 words"));
    };

    let mode = mode
        .parse::<OtpMode>()
        .map_err(|_| LineError::syntax("Mode not recognized"))?;

    Ok(LineCommand::Udata {
        mode,
        user: user.clone(),
        code: code.clone(),
    })
}

/// Format a catalog reply with its default description.
pub fn format_reply(reply: Reply) -> String {
    format!("{} {}\r\n", reply.code(), reply.description())
}

/// Format an error reply; `partial` selects the `-` separator.
pub fn format_error(err: &LineError, partial: bool) -> String {
    let sep = if partial { '-' } else { ' ' };
    format!("{}{}{}\r\n", err.reply.code(), sep, err.message)
}
