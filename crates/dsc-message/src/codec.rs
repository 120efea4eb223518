//! # Message Codec
//!
//! The deserialization collaborator: raw header strings to typed headers,
//! raw payload strings to JSON values that transformers narrow further.
//! [`JsonCodec`] is the built-in implementation over `serde_json`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::header::MessageHeader;
use crate::message::{Message, RawMessage};

/// Converts between typed and raw message parts.
pub trait MessageCodec: Send + Sync {
    /// Decode a header.
    fn decode_header(&self, raw: &str) -> Result<MessageHeader, CodecError>;

    /// Encode a header.
    fn encode_header(&self, header: &MessageHeader) -> Result<String, CodecError>;

    /// Decode a payload into a generic JSON value.
    fn decode_value(&self, raw: &str) -> Result<serde_json::Value, CodecError>;

    /// Decode a raw message.
    fn decode(&self, raw: &RawMessage) -> Result<Message, CodecError> {
        Ok(Message::new(
            self.decode_header(&raw.header)?,
            raw.payload.clone(),
        ))
    }

    /// Encode a message.
    fn encode(&self, message: &Message) -> Result<RawMessage, CodecError> {
        Ok(RawMessage {
            header: self.encode_header(&message.header)?,
            payload: message.payload.clone(),
        })
    }
}

/// Decode a payload into a concrete body type through any codec.
pub fn decode_body<T: DeserializeOwned>(
    codec: &dyn MessageCodec,
    raw: &str,
) -> Result<T, CodecError> {
    let value = codec.decode_value(raw)?;
    Ok(serde_json::from_value(value)?)
}

/// Encode a body as a JSON payload string.
pub fn encode_body<T: Serialize>(body: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(body)?)
}

/// JSON implementation of [`MessageCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn decode_header(&self, raw: &str) -> Result<MessageHeader, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }

    fn encode_header(&self, header: &MessageHeader) -> Result<String, CodecError> {
        Ok(serde_json::to_string(header)?)
    }

    fn decode_value(&self, raw: &str) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}
