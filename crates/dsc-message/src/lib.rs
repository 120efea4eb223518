#![deny(missing_docs)]

//! # dsc-message: Protocol Message Layer
//!
//! Message types and their expected replies, the header model, the codec
//! collaborator and the inbound [`Pipeline`] that runs every message
//! through transform, validate and process stages before answering with
//! either the declared reply or a rejection.
//!
//! The outbound side is [`MessageSender`]: it stamps nothing itself, so
//! headers come from a [`MessageBuilder`] bound to the local
//! [`ConnectorContext`](dsc_core::ConnectorContext).

pub mod builder;
pub mod codec;
pub mod error;
pub mod header;
pub mod message;
pub mod pipeline;
pub mod transport;
pub mod types;

pub use builder::MessageBuilder;
pub use codec::{decode_body, encode_body, JsonCodec, MessageCodec};
pub use error::{CodecError, HandlerError, MessageError, TransportError};
pub use header::{MessageHeader, RejectionReason};
pub use message::{Message, RawMessage, ResponseContent, WireParts, HEADER_PART, PAYLOAD_PART};
pub use pipeline::{
    IgnorePayload, JsonPayload, Pipeline, Processor, Reply, Request, Route, RouteBuilder,
    Transformer, TypedRouteBuilder, Validator,
};
pub use transport::{is_valid_response_type, response_content, Loopback, MessageSender, Transport};
pub use types::{MessageCategory, MessageType};
