//! Binary packet framing.
//!
//! Every transport frame carries exactly one packet:
//!
//! ```text
//! +---------+------+-------------+-----------------+
//! | version | type | length (BE) | payload         |
//! |   u8    |  u8  |    u16      | `length` bytes  |
//! +---------+------+-------------+-----------------+
//! ```
//!
//! The version byte is checked before anything else is read, so a client
//! speaking another protocol revision is turned away without its payload
//! ever being looked at.

use std::fmt;

use crate::ProtocolError;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed packet header in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Selects which payload schema a packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Auth request (client) or auth response (server).
    Auth = 0,
    /// A chat message.
    Message = 1,
    /// Liveness probe. Payload may be empty.
    Ping = 2,
    /// Liveness answer. Payload may be empty.
    Pong = 3,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Auth),
            1 => Ok(Self::Message),
            2 => Ok(Self::Ping),
            3 => Ok(Self::Pong),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "Auth"),
            Self::Message => write!(f, "Message"),
            Self::Ping => write!(f, "Ping"),
            Self::Pong => write!(f, "Pong"),
        }
    }
}

/// The fixed 4-byte packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u8,
    pub packet_type: PacketType,
    pub len: u16,
}

/// One framed unit of the wire protocol.
///
/// Fields are private so that `header.len == payload.len()` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    /// Builds a packet of the current protocol version.
    ///
    /// # Errors
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload does not
    /// fit the 16-bit length field.
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        let len = u16::try_from(payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge(payload.len()))?;
        Ok(Self {
            header: PacketHeader {
                version: PROTOCOL_VERSION,
                packet_type,
                len,
            },
            payload,
        })
    }

    /// Builds a packet with no payload.
    pub fn empty(packet_type: PacketType) -> Self {
        Self {
            header: PacketHeader {
                version: PROTOCOL_VERSION,
                packet_type,
                len: 0,
            },
            payload: Vec::new(),
        }
    }

    /// An empty `Ping` packet.
    pub fn ping() -> Self {
        Self::empty(PacketType::Ping)
    }

    /// An empty `Pong` packet.
    pub fn pong() -> Self {
        Self::empty(PacketType::Pong)
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serializes the packet into its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.header.version);
        buf.push(self.header.packet_type as u8);
        buf.extend_from_slice(&self.header.len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parses one packet from a complete frame.
    ///
    /// # Errors
    /// - [`ProtocolError::VersionMismatch`] if the first byte is not
    ///   [`PROTOCOL_VERSION`]; nothing after it is inspected.
    /// - [`ProtocolError::Truncated`] if the header or payload is short.
    /// - [`ProtocolError::UnknownPacketType`] for an unassigned type byte.
    /// - [`ProtocolError::TrailingBytes`] if the frame is longer than the
    ///   header says.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let Some(&version) = data.first() else {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LEN,
                got: 0,
            });
        };
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: version,
            });
        }
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LEN,
                got: data.len(),
            });
        }

        let packet_type = PacketType::try_from(data[1])?;
        let len = u16::from_be_bytes([data[2], data[3]]);
        let body = &data[HEADER_LEN..];
        let declared = usize::from(len);

        if body.len() < declared {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LEN + declared,
                got: data.len(),
            });
        }
        if body.len() > declared {
            return Err(ProtocolError::TrailingBytes(body.len() - declared));
        }

        Ok(Self {
            header: PacketHeader {
                version,
                packet_type,
                len,
            },
            payload: body.to_vec(),
        })
    }
}

/// Frames `payload` as a packet of `packet_type` and returns the bytes.
pub fn encode(packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Packet::new(packet_type, payload.to_vec()).map(|p| p.encode())
}

/// Parses one packet from a complete frame. See [`Packet::decode`].
pub fn decode(data: &[u8]) -> Result<Packet, ProtocolError> {
    Packet::decode(data)
}
