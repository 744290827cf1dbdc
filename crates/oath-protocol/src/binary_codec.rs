//! Binary encoding/decoding for weblogin messages.
//!
//! This module converts between:
//! - the plaintext payload of a `DATA` packet (after unwrap / before wrap)
//! - high-level [`Message`] values
//!
//! Message layout:
//!
//! ```text
//! [0]   : protocol version
//! [1]   : message type
//! [2..] : body (depends on type)
//!
//! COMMAND (v2, type=1):
//!   [2]      keep-alive flag (0 / 1)
//!   [3]      continue status (0..=3)
//!   [4..]    remainder (argc + length-prefixed args, possibly split)
//!
//! QUIT (v2, type=2), NOOP (v3, type=7):
//!   [no body]
//!
//! OUTPUT (v2, type=3):
//!   [2]      stream
//!   [3..7]   data length (u32 BE)
//!   [7..]    data
//!
//! STATUS (v2, type=4):
//!   [2]      exit status
//!
//! ERROR (v2, type=5):
//!   [2..6]   error code (u32 BE)
//!   [6..10]  message length (u32 BE)
//!   [10..]   message
//!
//! VERSION (v2, type=6):
//!   [2]      highest supported version
//! ```

use std::fmt;

use crate::wire_types::{ErrorCode, MessageType, HIGHEST_VERSION, MAX_MESSAGE_LEN};

/// Errors that can arise when encoding a message or framing a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short for the expected fields.
    Truncated,
    /// Packet payload length exceeds [`MAX_PAYLOAD_LEN`](crate::wire_types::MAX_PAYLOAD_LEN).
    PayloadTooLarge(usize),
    /// Encoded message exceeds [`MAX_MESSAGE_LEN`].
    MessageTooLarge(usize),
    /// A variable-length field does not fit its length prefix.
    FieldTooLarge(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated => write!(f, "Buffer truncated"),
            ProtocolError::PayloadTooLarge(n) => write!(f, "Illegal payload length {}", n),
            ProtocolError::MessageTooLarge(n) => {
                write!(f, "Message of {} bytes exceeds limit of {}", n, MAX_MESSAGE_LEN)
            }
            ProtocolError::FieldTooLarge(field) => write!(f, "Field too large: {}", field),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Why an unwrapped payload could not be turned into a [`Message`].
///
/// Each variant maps to a distinct reply; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than the two header bytes.
    Truncated,
    /// Version above [`HIGHEST_VERSION`]; the body was not examined.
    UnknownVersion { version: u8, ty: u8 },
    /// No message type matches this `(version, type)` pair.
    UnknownMessage { version: u8, ty: u8 },
    /// Known type, malformed body.
    BadCommand(String),
}

impl DecodeError {
    /// Error code to report, or `None` when the reply is a `VERSION` message.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            DecodeError::Truncated => Some(ErrorCode::BadToken),
            DecodeError::UnknownVersion { .. } => None,
            DecodeError::UnknownMessage { .. } => Some(ErrorCode::UnknownMessage),
            DecodeError::BadCommand(_) => Some(ErrorCode::BadCommand),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "Message shorter than header"),
            DecodeError::UnknownVersion { version, ty } => {
                write!(f, "Unknown version (version: {} type: {})", version, ty)
            }
            DecodeError::UnknownMessage { version, ty } => {
                write!(f, "Unknown type (version: {} type: {})", version, ty)
            }
            DecodeError::BadCommand(reason) => write!(f, "Bad command: {}", reason),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Command continuation status.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContinueStatus {
    /// Whole command in one message.
    Complete = 0,
    /// First chunk of a multi-message command.
    Incomplete = 1,
    /// Middle chunk.
    Continuation = 2,
    /// Last chunk.
    Final = 3,
}

impl ContinueStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ContinueStatus::Complete),
            1 => Some(ContinueStatus::Incomplete),
            2 => Some(ContinueStatus::Continuation),
            3 => Some(ContinueStatus::Final),
            _ => None,
        }
    }
}

/// `MESSAGE_COMMAND` body, possibly one chunk of a larger command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub keep_alive: bool,
    pub status: ContinueStatus,
    pub rest: Vec<u8>,
}

/// `MESSAGE_OUTPUT` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub stream: u8,
    pub data: Vec<u8>,
}

/// `MESSAGE_ERROR` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorMessage {
    /// Error carrying the code's catalog description.
    pub fn new(code: ErrorCode) -> Self {
        ErrorMessage {
            code,
            message: code.description().to_string(),
        }
    }
}

/// A decoded weblogin message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    Quit,
    Output(Output),
    Status { exit_status: u8 },
    Error(ErrorMessage),
    Version { highest: u8 },
    NoOp,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Command(_) => MessageType::Command,
            Message::Quit => MessageType::Quit,
            Message::Output(_) => MessageType::Output,
            Message::Status { .. } => MessageType::Status,
            Message::Error(_) => MessageType::Error,
            Message::Version { .. } => MessageType::Version,
            Message::NoOp => MessageType::NoOp,
        }
    }

    /// `MESSAGE_VERSION` advertising what this implementation supports.
    pub fn version() -> Self {
        Message::Version {
            highest: HIGHEST_VERSION,
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Message::Error(ErrorMessage::new(code))
    }
}

// ============================================================================
// Decode
// ============================================================================

/// Decode a single message from an unwrapped payload.
pub fn decode_message(buf: &[u8]) -> Result<Message, DecodeError> {
    if buf.len() < 2 {
        return Err(DecodeError::Truncated);
    }

    let version = buf[0];
    let ty = buf[1];

    if version > HIGHEST_VERSION {
        return Err(DecodeError::UnknownVersion { version, ty });
    }

    let msg_type =
        MessageType::from_header(version, ty).ok_or(DecodeError::UnknownMessage { version, ty })?;

    let body = &buf[2..];
    match msg_type {
        MessageType::Command => decode_command(body),
        MessageType::Quit => Ok(Message::Quit),
        MessageType::Output => decode_output(body),
        MessageType::Status => decode_status(body),
        MessageType::Error => decode_error(body),
        MessageType::Version => decode_version(body),
        MessageType::NoOp => Ok(Message::NoOp),
    }
}

fn decode_command(body: &[u8]) -> Result<Message, DecodeError> {
    let [keep_alive, status, rest @ ..] = body else {
        return Err(bad("command header truncated"));
    };

    let status = ContinueStatus::from_u8(*status)
        .ok_or_else(|| DecodeError::BadCommand(format!("bad continue status: {}", status)))?;

    Ok(Message::Command(Command {
        keep_alive: *keep_alive != 0,
        status,
        rest: rest.to_vec(),
    }))
}

fn decode_output(body: &[u8]) -> Result<Message, DecodeError> {
    let [stream, rest @ ..] = body else {
        return Err(bad("output truncated"));
    };
    let data = read_exact_field(rest, "output")?;

    Ok(Message::Output(Output {
        stream: *stream,
        data: data.to_vec(),
    }))
}

fn decode_status(body: &[u8]) -> Result<Message, DecodeError> {
    match body {
        [exit_status] => Ok(Message::Status {
            exit_status: *exit_status,
        }),
        _ => Err(bad("status must be one byte")),
    }
}

fn decode_error(body: &[u8]) -> Result<Message, DecodeError> {
    if body.len() < 4 {
        return Err(bad("error truncated"));
    }
    let raw_code = read_u32_be(&body[0..4]);
    let code = ErrorCode::from_u32(raw_code)
        .ok_or_else(|| DecodeError::BadCommand(format!("unknown error code: {}", raw_code)))?;

    let text = read_exact_field(&body[4..], "error")?;
    let message = String::from_utf8(text.to_vec()).map_err(|_| bad("error message not UTF-8"))?;

    Ok(Message::Error(ErrorMessage { code, message }))
}

fn decode_version(body: &[u8]) -> Result<Message, DecodeError> {
    match body {
        [highest] => Ok(Message::Version { highest: *highest }),
        _ => Err(bad("version must be one byte")),
    }
}

/// Read a `u32` length prefix followed by exactly that many bytes.
fn read_exact_field<'a>(buf: &'a [u8], what: &'static str) -> Result<&'a [u8], DecodeError> {
    if buf.len() < 4 {
        return Err(DecodeError::BadCommand(format!("{} length truncated", what)));
    }
    let len = read_u32_be(&buf[0..4]) as usize;
    let data = &buf[4..];
    if data.len() != len {
        return Err(DecodeError::BadCommand(format!(
            "{} length {} does not match {} remaining bytes",
            what,
            len,
            data.len()
        )));
    }
    Ok(data)
}

fn bad(reason: &str) -> DecodeError {
    DecodeError::BadCommand(reason.to_string())
}

// ============================================================================
// Encode
// ============================================================================

/// Encode a single message, appending to `out`.
///
/// Fails without touching `out` if the encoded message would exceed
/// [`MAX_MESSAGE_LEN`].
pub fn encode_message(msg: &Message, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let start = out.len();
    let ty = msg.message_type();
    out.push(ty.version());
    out.push(ty as u8);

    let body = match msg {
        Message::Command(c) => {
            out.push(u8::from(c.keep_alive));
            out.push(c.status as u8);
            out.extend_from_slice(&c.rest);
            Ok(())
        }
        Message::Quit | Message::NoOp => Ok(()),
        Message::Output(o) => {
            out.push(o.stream);
            write_field(out, &o.data, "output")
        }
        Message::Status { exit_status } => {
            out.push(*exit_status);
            Ok(())
        }
        Message::Error(e) => {
            out.extend_from_slice(&(e.code as u32).to_be_bytes());
            write_field(out, e.message.as_bytes(), "error")
        }
        Message::Version { highest } => {
            out.push(*highest);
            Ok(())
        }
    };

    let encoded_len = out.len() - start;
    if body.is_err() || encoded_len > MAX_MESSAGE_LEN {
        out.truncate(start);
        body?;
        return Err(ProtocolError::MessageTooLarge(encoded_len));
    }

    Ok(())
}

fn write_field(out: &mut Vec<u8>, data: &[u8], what: &'static str) -> Result<(), ProtocolError> {
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::FieldTooLarge(what))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(())
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

pub(crate) fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[0..4]);
    u32::from_be_bytes(arr)
}
