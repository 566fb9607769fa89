//! Codec trait and implementations for turning events into frames.
//!
//! The gateway never touches `serde_json` directly; it goes through a
//! [`Codec`], so a different encoding can be swapped in without touching
//! the connection handler.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to frame bytes and decodes frame bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for an empty frame and
    /// `ProtocolError::Decode` if the bytes don't match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what browser clients speak natively, so this is the codec the
/// server runs with.
///
/// ## Example
///
/// ```rust
/// use slip_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let event: ClientEvent = codec
///     .decode(br#"{"event":"room:start","data":{"code":"K3XZQ"}}"#)
///     .unwrap();
/// assert_eq!(event, ClientEvent::Start { code: "K3XZQ".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::InvalidMessage("empty frame".into()));
        }
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientEvent, ServerEvent};

    #[test]
    fn test_decode_empty_frame_is_invalid_message() {
        let result: Result<ClientEvent, _> = JsonCodec.decode(b"  \n");
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<ClientEvent, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_produces_utf8_json() {
        let bytes = JsonCodec
            .encode(&ServerEvent::Error {
                message: "Room not found".into(),
            })
            .unwrap();
        let text = String::from_utf8(bytes).expect("JSON is UTF-8");
        assert_eq!(text, r#"{"event":"room:error","data":{"message":"Room not found"}}"#);
    }
}
