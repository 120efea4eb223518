//! Message header model and rejection reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dsc_core::{MessageId, Uri};

use crate::types::MessageType;

/// Why a recipient refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// The message or its payload could not be read.
    MalformedMessage,
    /// A required field is missing or inconsistent.
    BadParameters,
    /// The requested element does not exist.
    NotFound,
    /// The sender may not access the requested element.
    NotAuthorized,
    /// The sender could not be authenticated.
    NotAuthenticated,
    /// The header's model version is not accepted.
    VersionNotSupported,
    /// No route handles the message type.
    MessageTypeNotSupported,
    /// The recipient failed while handling the message.
    InternalRecipientError,
    /// The recipient cannot handle the message right now.
    TemporarilyNotAvailable,
}

impl RejectionReason {
    /// The canonical string name of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedMessage => "MALFORMED_MESSAGE",
            Self::BadParameters => "BAD_PARAMETERS",
            Self::NotFound => "NOT_FOUND",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::VersionNotSupported => "VERSION_NOT_SUPPORTED",
            Self::MessageTypeNotSupported => "MESSAGE_TYPE_NOT_SUPPORTED",
            Self::InternalRecipientError => "INTERNAL_RECIPIENT_ERROR",
            Self::TemporarilyNotAvailable => "TEMPORARILY_NOT_AVAILABLE",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a protocol message.
///
/// Type-specific fields are optional and only meaningful for their type:
/// `requested_element` for description requests, `requested_artifact` and
/// `transfer_contract` for artifact requests, `affected_resource` and
/// `affected_connector` for update notifications, `rejection_reason` for
/// rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    /// Identifier of this message.
    pub id: MessageId,
    /// Type tag.
    #[serde(rename = "@type")]
    pub message_type: MessageType,
    /// Information-model version the sender speaks.
    pub model_version: String,
    /// When the message was issued.
    pub issued: DateTime<Utc>,
    /// Connector that issued the message.
    pub issuer_connector: Uri,
    /// Agent acting on behalf of the issuer.
    pub sender_agent: Uri,
    /// Intended recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_connector: Vec<Uri>,
    /// Security token value.
    #[serde(default)]
    pub security_token: String,
    /// Security profile claimed by the sender's token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<String>,
    /// Message this one answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_message: Option<MessageId>,
    /// Element whose description is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_element: Option<Uri>,
    /// Artifact whose data is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_artifact: Option<Uri>,
    /// Agreement the artifact is requested under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_contract: Option<Uri>,
    /// Resource an update notification refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_resource: Option<Uri>,
    /// Connector an update notification refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_connector: Option<Uri>,
    /// Reason carried by a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,
}
