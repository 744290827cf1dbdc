//! weblogin packet framing.
//!
//! ```text
//! [0]     flags
//! [1..5]  payload length (u32 BE, at most MAX_PAYLOAD_LEN)
//! [5..]   payload
//! ```
//!
//! The payload is empty, a context-establishment token, or a wrapped
//! message; this layer does not look inside it.

use crate::binary_codec::{read_u32_be, ProtocolError};
use crate::wire_types::{Flags, MAX_PAYLOAD_LEN};

/// Size of the flags + length prefix.
pub const HEADER_LEN: usize = 5;

/// One framed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub flags: Flags,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(flags: Flags, payload: impl Into<Vec<u8>>) -> Self {
        Packet {
            flags,
            payload: payload.into(),
        }
    }

    /// Exact flag comparison; packets never carry extra bits.
    pub fn has_flags(&self, expected: Flags) -> bool {
        self.flags == expected
    }
}

/// Parse the 5 byte prefix into flags and a validated payload length.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(Flags, usize), ProtocolError> {
    let flags = Flags(header[0]);
    let len = read_u32_be(&header[1..5]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    Ok((flags, len))
}

/// Decode one packet from the front of `buf`.
///
/// Returns the packet and the number of bytes consumed, or
/// `ProtocolError::Truncated` if `buf` does not yet hold a whole packet.
pub fn decode_packet(buf: &[u8]) -> Result<(Packet, usize), ProtocolError> {
    let header: &[u8; HEADER_LEN] = buf
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or(ProtocolError::Truncated)?;
    let (flags, len) = decode_header(header)?;

    let payload = buf
        .get(HEADER_LEN..HEADER_LEN + len)
        .ok_or(ProtocolError::Truncated)?;

    Ok((Packet::new(flags, payload), HEADER_LEN + len))
}

/// Encode one packet, appending to `out`.
pub fn encode_packet(packet: &Packet, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let len = packet.payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(len));
    }

    out.reserve(HEADER_LEN + len);
    out.push(packet.flags.bits());
    out.extend_from_slice(&(len as u32).to_be_bytes());
    out.extend_from_slice(&packet.payload);

    Ok(())
}
