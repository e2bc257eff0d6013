//! Codec trait and the JSON implementation used for packet payloads.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! Packet framing (see [`crate::packet`]) treats the payload as opaque;
//! the codec is what gives those bytes a schema. Every typed message in
//! this crate goes through [`JsonCodec`], so payloads stay readable in
//! browser DevTools and logs.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` lets a codec live inside long-running
/// connection tasks on any runtime thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use roomcast_protocol::{Account, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let account = Account::new("alice");
///
/// let bytes = codec.encode(&account).unwrap();
/// let decoded: Account = codec.decode(&bytes).unwrap();
/// assert_eq!(account, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
