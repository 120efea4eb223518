//! # Outbound Exchange
//!
//! [`MessageSender`] encodes a message, hands the wire parts to a
//! [`Transport`], decodes the reply and checks it against the type the
//! request expects. A mismatched reply surfaces as
//! [`MessageError::ResponseTypeMismatch`] carrying its content, so callers
//! can tell a contract rejection from a generic one.
//!
//! [`Loopback`] delivers straight into a local [`Pipeline`]. It is what
//! tests and in-process peers use in place of a network transport.

use std::sync::Arc;

use dsc_core::Uri;

use crate::codec::MessageCodec;
use crate::error::{MessageError, TransportError};
use crate::message::{Message, RawMessage, ResponseContent, WireParts};
use crate::pipeline::Pipeline;
use crate::types::MessageType;

/// Delivers wire parts to a recipient and returns the reply parts.
pub trait Transport: Send + Sync {
    /// Send and wait for the reply.
    fn send(&self, recipient: &Uri, parts: WireParts) -> Result<WireParts, TransportError>;
}

/// Sends messages and validates reply types.
#[derive(Clone)]
pub struct MessageSender {
    codec: Arc<dyn MessageCodec>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender").finish_non_exhaustive()
    }
}

impl MessageSender {
    /// Create a sender over the given codec and transport.
    pub fn new(codec: Arc<dyn MessageCodec>, transport: Arc<dyn Transport>) -> Self {
        Self { codec, transport }
    }

    /// Send `message` to `recipient` and decode whatever comes back.
    ///
    /// # Errors
    ///
    /// Encoding, transport and reply decoding failures. The reply type is
    /// not checked; see [`exchange`](Self::exchange).
    pub fn send(&self, recipient: &Uri, message: &Message) -> Result<Message, MessageError> {
        let raw = self.codec.encode(message).map_err(MessageError::Encoding)?;
        tracing::debug!(
            recipient = %recipient,
            message_type = %message.header.message_type,
            message_id = %message.header.id,
            "sending message"
        );
        let reply_parts = self.transport.send(recipient, raw.into_parts())?;
        let reply_raw = RawMessage::from_parts(reply_parts).map_err(MessageError::MalformedResponse)?;
        self.codec
            .decode(&reply_raw)
            .map_err(MessageError::MalformedResponse)
    }

    /// Send and require the reply type the request expects.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus
    /// [`MessageError::ResponseTypeMismatch`] for any other reply.
    pub fn exchange(&self, recipient: &Uri, message: &Message) -> Result<Message, MessageError> {
        let request_type = message.header.message_type;
        let reply = self.send(recipient, message)?;
        if is_valid_response_type(request_type, &reply) {
            return Ok(reply);
        }
        let content = response_content(&reply);
        tracing::info!(
            recipient = %recipient,
            request_type = %request_type,
            reply = %content,
            "unexpected reply type"
        );
        Err(MessageError::ResponseTypeMismatch {
            expected: request_type
                .expected_response()
                .unwrap_or(MessageType::MessageProcessedNotification),
            content,
        })
    }
}

/// Whether `reply` is the type a request of `request_type` expects.
/// Reply types themselves accept nothing.
pub fn is_valid_response_type(request_type: MessageType, reply: &Message) -> bool {
    request_type.expected_response() == Some(reply.header.message_type)
}

/// Type, rejection reason and payload of a reply.
pub fn response_content(reply: &Message) -> ResponseContent {
    reply.content()
}

/// Transport that dispatches into an in-process pipeline.
#[derive(Debug, Clone)]
pub struct Loopback {
    pipeline: Arc<Pipeline>,
}

impl Loopback {
    /// Deliver everything to `pipeline`, whatever the recipient.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

impl Transport for Loopback {
    fn send(&self, _recipient: &Uri, parts: WireParts) -> Result<WireParts, TransportError> {
        self.pipeline
            .dispatch_parts(parts)
            .map_err(|e| TransportError::new(e.to_string()))
    }
}
