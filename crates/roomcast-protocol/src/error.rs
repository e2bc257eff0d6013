//! Error types for the protocol layer.
//!
//! Framing errors (`VersionMismatch`, `Truncated`, `TrailingBytes`,
//! `UnknownPacketType`) mean the byte stream itself can no longer be
//! trusted. Payload errors (`Encode`, `Decode`, `UnexpectedPacketType`)
//! concern one well-framed packet.

use crate::PacketType;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a payload failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload could not be parsed into the expected message.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The packet was written for a protocol version this side does not
    /// speak. Checked before anything else in the header.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },

    /// The frame ended before the header or the declared payload did.
    #[error("truncated packet: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// The frame carried bytes past the declared payload length.
    #[error("{0} trailing bytes after packet payload")]
    TrailingBytes(usize),

    /// The type byte does not name a known packet type.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// The payload does not fit in the 16-bit length field.
    #[error("payload of {0} bytes exceeds the 65535 byte limit")]
    PayloadTooLarge(usize),

    /// A packet was parsed as a message of a different type.
    #[error("expected {expected} packet, got {found}")]
    UnexpectedPacketType {
        expected: PacketType,
        found: PacketType,
    },
}

impl ProtocolError {
    /// Returns `true` if the error means the frame boundary is broken,
    /// so nothing after it can be trusted.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::VersionMismatch { .. }
                | Self::Truncated { .. }
                | Self::TrailingBytes(_)
                | Self::UnknownPacketType(_)
        )
    }
}
