//! oath-protocol
//!
//! Wire-level encoding/decoding for the two authentication front-ends.
//!
//! - [`wire_types`]   : reply codes, flags, message types, error codes, limits
//! - [`line_codec`]   : dynalogin commands and replies
//! - [`packet`]       : weblogin packet framing
//! - [`binary_codec`] : weblogin message bodies
//! - [`command`]      : weblogin command continuation reassembly

pub mod wire_types;
pub mod line_codec;
pub mod packet;
pub mod binary_codec;
pub mod command;

pub use wire_types::{ErrorCode, Flags, MessageType, Reply, HIGHEST_VERSION};

pub use line_codec::{LineCommand, LineError};

pub use packet::{decode_packet, encode_packet, Packet};

pub use binary_codec::{
    decode_message,
    encode_message,
    Command,
    ContinueStatus,
    DecodeError,
    ErrorMessage,
    Message,
    Output,
    ProtocolError,
};

pub use command::{AssembledCommand, AssemblyError, CommandAssembler};
