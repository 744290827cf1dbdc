//! Message catalog and wire constants for both protocols.
//!
//! This module defines:
//! - dynalogin reply codes and their descriptions
//! - weblogin packet flags, message types and error codes
//! - size limits shared by the codecs and the server
//!
//! No behavior lives here beyond table lookups; the encode/decode logic
//! lives in `line_codec`, `packet` and `binary_codec`.

use std::fmt;

// ============================================================================
// dynalogin
// ============================================================================

/// Maximum dynalogin line length, terminator excluded.
pub const MAX_LINE_LEN: usize = 256;

/// dynalogin reply catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reply {
    Greeting,
    Goodbye,
    Ok,
    Unauthorized,
    UnknownCommand,
    SyntaxError,
    NotImplemented,
    Timeout,
    TooManyErrors,
}

impl Reply {
    /// Three-digit reply code.
    pub fn code(self) -> u16 {
        match self {
            Reply::Greeting => 220,
            Reply::Goodbye => 221,
            Reply::Ok => 250,
            Reply::Unauthorized => 401,
            Reply::UnknownCommand => 500,
            Reply::SyntaxError => 501,
            Reply::NotImplemented => 502,
            Reply::Timeout => 503,
            Reply::TooManyErrors => 504,
        }
    }

    /// Default human-readable text.
    pub fn description(self) -> &'static str {
        match self {
            Reply::Greeting => "Ready",
            Reply::Goodbye => "See ya starside",
            Reply::Ok => "Authorized",
            Reply::Unauthorized => "Unauthorized",
            Reply::UnknownCommand => "Command not recognized",
            Reply::SyntaxError => "Syntax error in parameter or arguments",
            Reply::NotImplemented => "Command not implemented",
            Reply::Timeout => "Timed out waiting for command",
            Reply::TooManyErrors => "Too many errors. Goodbye!",
        }
    }
}

// ============================================================================
// weblogin packets
// ============================================================================

/// Maximum packet payload: the whole token including the 5 byte prefix
/// must fit in 2 MiB.
pub const MAX_PAYLOAD_LEN: usize = (1 << 21) - 5;

/// Maximum size of a message before it is wrapped.
pub const MAX_MESSAGE_LEN: usize = 1 << 16;

/// Packet flag byte.
///
/// Packets are checked against exact flag combinations, never single bits,
/// so this is a thin newtype rather than a full bitset API.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u8);

impl Flags {
    pub const NOOP: Flags = Flags(0x01);
    pub const CONTEXT: Flags = Flags(0x02);
    pub const DATA: Flags = Flags(0x04);
    pub const MIC: Flags = Flags(0x08);
    pub const CONTEXT_NEXT: Flags = Flags(0x10);
    pub const SEND_MIC: Flags = Flags(0x20);
    pub const PROTOCOL: Flags = Flags(0x40);

    /// First packet of a v2/v3 conversation (0x51).
    pub const INITIAL: Flags = Flags(0x01 | 0x10 | 0x40);
    /// First packet of the legacy v1 conversation (0x11).
    pub const LEGACY_INITIAL: Flags = Flags(0x01 | 0x10);
    /// Context-establishment tokens (0x42).
    pub const CONTEXT_TOKEN: Flags = Flags(0x02 | 0x40);
    /// Wrapped messages (0x44).
    pub const DATA_TOKEN: Flags = Flags(0x04 | 0x40);

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags(0x{:02x})", self.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

// ============================================================================
// weblogin messages
// ============================================================================

/// Who may send a given message type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Both,
}

/// Message types, each bound to the protocol version it was introduced in.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageType {
    Command = 1,
    Quit = 2,
    Output = 3,
    Status = 4,
    Error = 5,
    Version = 6,
    NoOp = 7,
}

impl MessageType {
    pub const ALL: [MessageType; 7] = [
        MessageType::Command,
        MessageType::Quit,
        MessageType::Output,
        MessageType::Status,
        MessageType::Error,
        MessageType::Version,
        MessageType::NoOp,
    ];

    /// Protocol version this type is sent with.
    pub const fn version(self) -> u8 {
        match self {
            MessageType::NoOp => 3,
            _ => 2,
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            MessageType::Command | MessageType::Quit => Direction::ClientToServer,
            MessageType::NoOp => Direction::Both,
            _ => Direction::ServerToClient,
        }
    }

    /// Whether a client may legitimately send this type.
    pub fn from_client(self) -> bool {
        self.direction() != Direction::ServerToClient
    }

    /// Look up the type matching an exact `(version, type)` header.
    pub fn from_header(version: u8, ty: u8) -> Option<Self> {
        MessageType::ALL
            .into_iter()
            .find(|t| *t as u8 == ty && t.version() == version)
    }
}

const fn highest_version() -> u8 {
    let mut max = 0;
    let mut i = 0;
    while i < MessageType::ALL.len() {
        let v = MessageType::ALL[i].version();
        if v > max {
            max = v;
        }
        i += 1;
    }
    max
}

/// Highest protocol version this implementation understands.
pub const HIGHEST_VERSION: u8 = highest_version();

/// Error codes carried by `MESSAGE_ERROR`.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Internal = 1,
    BadToken = 2,
    UnknownMessage = 3,
    BadCommand = 4,
    UnknownCommand = 5,
    Access = 6,
    TooManyArgs = 7,
    TooMuchData = 8,
    UnexpectedMessage = 9,
}

impl ErrorCode {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(ErrorCode::Internal),
            2 => Some(ErrorCode::BadToken),
            3 => Some(ErrorCode::UnknownMessage),
            4 => Some(ErrorCode::BadCommand),
            5 => Some(ErrorCode::UnknownCommand),
            6 => Some(ErrorCode::Access),
            7 => Some(ErrorCode::TooManyArgs),
            8 => Some(ErrorCode::TooMuchData),
            9 => Some(ErrorCode::UnexpectedMessage),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Internal => "Internal server failure",
            ErrorCode::BadToken => "Invalid format in token",
            ErrorCode::UnknownMessage => "Unknown message type",
            ErrorCode::BadCommand => "Invalid command format in token",
            ErrorCode::UnknownCommand => "Unknown command",
            ErrorCode::Access => "Access denied",
            ErrorCode::TooManyArgs => "Argument count exceeds server limit",
            ErrorCode::TooMuchData => "Argument size exceeds server limit",
            ErrorCode::UnexpectedMessage => "Message type not valid now",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_version_is_noop_version() {
        assert_eq!(HIGHEST_VERSION, 3);
    }

    #[test]
    fn header_lookup_requires_matching_version() {
        assert_eq!(MessageType::from_header(2, 1), Some(MessageType::Command));
        assert_eq!(MessageType::from_header(3, 7), Some(MessageType::NoOp));
        assert_eq!(MessageType::from_header(3, 1), None);
        assert_eq!(MessageType::from_header(2, 7), None);
        assert_eq!(MessageType::from_header(2, 8), None);
    }

    #[test]
    fn combined_flags() {
        assert_eq!(Flags::INITIAL, Flags::NOOP | Flags::CONTEXT_NEXT | Flags::PROTOCOL);
        assert_eq!(Flags::INITIAL.bits(), 0x51);
        assert_eq!(Flags::CONTEXT_TOKEN.bits(), 0x42);
        assert_eq!(Flags::DATA_TOKEN.bits(), 0x44);
        assert_eq!(Flags::LEGACY_INITIAL.to_string(), "0x11");
    }
}
