//! Typed and wire forms of a message.
//!
//! On the wire a message is an opaque pair of strings keyed by `"header"`
//! and `"payload"`. The payload stays a string until a pipeline transformer
//! narrows it to the body its processor expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::header::{MessageHeader, RejectionReason};
use crate::types::MessageType;

/// Key of the header part.
pub const HEADER_PART: &str = "header";

/// Key of the payload part.
pub const PAYLOAD_PART: &str = "payload";

/// Wire form handed to and received from the transport.
pub type WireParts = BTreeMap<String, String>;

/// A message with a typed header and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Typed header.
    pub header: MessageHeader,
    /// Raw payload, if any.
    pub payload: Option<String>,
}

impl Message {
    /// Pair a header with a payload.
    pub fn new(header: MessageHeader, payload: Option<String>) -> Self {
        Self { header, payload }
    }

    /// Type tag of the header.
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// What a caller sees when this message is not the reply it expected.
    pub fn content(&self) -> ResponseContent {
        ResponseContent {
            message_type: self.header.message_type,
            reason: if self.header.message_type.is_rejection() {
                self.header.rejection_reason
            } else {
                None
            },
            payload: self.payload.clone(),
        }
    }
}

/// Surfaced content of an unexpected reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContent {
    /// Type of the reply.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Rejection reason, when the reply is a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    /// Payload of the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl std::fmt::Display for ResponseContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message_type)?;
        if let Some(reason) = self.reason {
            write!(f, " ({reason})")?;
        }
        if let Some(payload) = &self.payload {
            write!(f, ": {payload}")?;
        }
        Ok(())
    }
}

/// Header and payload as strings, before or after the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Serialized header.
    pub header: String,
    /// Serialized payload.
    pub payload: Option<String>,
}

impl RawMessage {
    /// Whether both parts are absent or blank.
    pub fn is_empty(&self) -> bool {
        self.header.trim().is_empty()
            && self.payload.as_deref().map_or(true, |p| p.trim().is_empty())
    }

    /// Read the parts from a transport map.
    ///
    /// # Errors
    ///
    /// [`CodecError::MissingPart`] when there is no header part.
    pub fn from_parts(mut parts: WireParts) -> Result<Self, CodecError> {
        let header = parts
            .remove(HEADER_PART)
            .ok_or(CodecError::MissingPart(HEADER_PART))?;
        Ok(Self {
            header,
            payload: parts.remove(PAYLOAD_PART),
        })
    }

    /// Write the parts into a transport map.
    pub fn into_parts(self) -> WireParts {
        let mut parts = WireParts::new();
        parts.insert(HEADER_PART.to_string(), self.header);
        if let Some(payload) = self.payload {
            parts.insert(PAYLOAD_PART.to_string(), payload);
        }
        parts
    }
}
