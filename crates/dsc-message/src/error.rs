//! # Message Layer Errors
//!
//! [`HandlerError`] is what pipeline stages return on the receiving side.
//! Each variant maps to exactly one [`RejectionReason`]; the pipeline turns
//! it into a rejection reply.
//!
//! [`MessageError`] is what the sending side sees.

use thiserror::Error;

use crate::header::RejectionReason;
use crate::message::ResponseContent;
use crate::types::MessageType;

/// Failure to read or write a message part.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A required wire part is absent.
    #[error("missing message part \"{0}\"")]
    MissingPart(&'static str),

    /// The part is not valid JSON for the requested type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure raised by a validator, transformer or processor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The message or payload cannot be read.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A required field is missing or inconsistent.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// The requested element does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Access denied by policy or agreement.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The header's model version is not accepted.
    #[error("model version {0} is not supported")]
    VersionNotSupported(String),

    /// No route handles the message type.
    #[error("message type {0} is not supported")]
    MessageTypeNotSupported(MessageType),

    /// The contract terms were declined.
    #[error("contract rejected: {0}")]
    ContractRejected(String),

    /// The recipient failed while handling the message.
    #[error("internal recipient error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Protocol reason carried by the rejection reply.
    pub fn reason(&self) -> RejectionReason {
        match self {
            Self::MalformedMessage(_) => RejectionReason::MalformedMessage,
            Self::BadParameters(_) | Self::ContractRejected(_) => RejectionReason::BadParameters,
            Self::NotFound(_) => RejectionReason::NotFound,
            Self::NotAuthorized(_) => RejectionReason::NotAuthorized,
            Self::VersionNotSupported(_) => RejectionReason::VersionNotSupported,
            Self::MessageTypeNotSupported(_) => RejectionReason::MessageTypeNotSupported,
            Self::Internal(_) => RejectionReason::InternalRecipientError,
        }
    }

    /// Type of the rejection reply.
    pub fn rejection_type(&self) -> MessageType {
        match self {
            Self::ContractRejected(_) => MessageType::ContractRejection,
            _ => MessageType::Rejection,
        }
    }

    /// Payload of the rejection reply.
    pub fn payload(&self) -> String {
        match self {
            Self::ContractRejected(_) => "Contract rejected.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure below the message layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport failure: {reason}")]
pub struct TransportError {
    /// Diagnostic from the transport.
    pub reason: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure of an outbound exchange.
#[derive(Error, Debug)]
pub enum MessageError {
    /// The transport could not deliver the message or read the reply.
    #[error(transparent)]
    TransportFailure(#[from] TransportError),

    /// The reply is not the type the request expects.
    #[error("expected {expected}, got {content}")]
    ResponseTypeMismatch {
        /// Expected reply type.
        expected: MessageType,
        /// Surfaced content of the actual reply.
        content: ResponseContent,
    },

    /// The reply could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(CodecError),

    /// The outbound message could not be encoded.
    #[error("cannot encode message: {0}")]
    Encoding(CodecError),
}

impl MessageError {
    /// Surfaced reply content, when the failure is a type mismatch.
    pub fn response_content(&self) -> Option<&ResponseContent> {
        match self {
            Self::ResponseTypeMismatch { content, .. } => Some(content),
            _ => None,
        }
    }
}
