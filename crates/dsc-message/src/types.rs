//! # Message Types
//!
//! Every protocol message carries a type tag. The tag decides which
//! pipeline route handles it and which reply the sender must accept.
//!
//! ## Expected responses
//!
//! | Request | Expected reply |
//! |---|---|
//! | `DescriptionRequest` | `DescriptionResponse` |
//! | `ContractRequest` | `ContractAgreement` |
//! | `ContractAgreement` | `MessageProcessedNotification` |
//! | `ArtifactRequest` | `ArtifactResponse` |
//! | `ResourceUpdate` | `MessageProcessedNotification` |
//! | `ConnectorUpdate` | `MessageProcessedNotification` |
//!
//! A `ContractAgreement` sent by the consumer is notification-class and is
//! acknowledged with a processed-notification rather than a response
//! message of its own kind. The same tag also serves as the provider's
//! reply to a contract request.

use serde::{Deserialize, Serialize};

/// Broad class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Asks the recipient for something.
    Request,
    /// Answers a request.
    Response,
    /// Informs the recipient; answered with a processed-notification.
    Notification,
}

/// Protocol message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    /// Ask for a resource description or the self-description.
    #[serde(rename = "ids:DescriptionRequestMessage")]
    DescriptionRequest,
    /// Carries a description.
    #[serde(rename = "ids:DescriptionResponseMessage")]
    DescriptionResponse,
    /// Proposes contract terms.
    #[serde(rename = "ids:ContractRequestMessage")]
    ContractRequest,
    /// Carries an agreement, either as the provider's answer or as the
    /// consumer's confirmation.
    #[serde(rename = "ids:ContractAgreementMessage")]
    ContractAgreement,
    /// Declines proposed contract terms.
    #[serde(rename = "ids:ContractRejectionMessage")]
    ContractRejection,
    /// Ask for artifact data under a transfer contract.
    #[serde(rename = "ids:ArtifactRequestMessage")]
    ArtifactRequest,
    /// Carries artifact data.
    #[serde(rename = "ids:ArtifactResponseMessage")]
    ArtifactResponse,
    /// Announces a changed resource.
    #[serde(rename = "ids:ResourceUpdateMessage")]
    ResourceUpdate,
    /// Announces a changed connector.
    #[serde(rename = "ids:ConnectorUpdateMessage")]
    ConnectorUpdate,
    /// Acknowledges a notification.
    #[serde(rename = "ids:MessageProcessedNotificationMessage")]
    MessageProcessedNotification,
    /// Generic refusal with a reason.
    #[serde(rename = "ids:RejectionMessage")]
    Rejection,
}

impl MessageType {
    /// All message types.
    pub const ALL: [MessageType; 11] = [
        Self::DescriptionRequest,
        Self::DescriptionResponse,
        Self::ContractRequest,
        Self::ContractAgreement,
        Self::ContractRejection,
        Self::ArtifactRequest,
        Self::ArtifactResponse,
        Self::ResourceUpdate,
        Self::ConnectorUpdate,
        Self::MessageProcessedNotification,
        Self::Rejection,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DescriptionRequest => "ids:DescriptionRequestMessage",
            Self::DescriptionResponse => "ids:DescriptionResponseMessage",
            Self::ContractRequest => "ids:ContractRequestMessage",
            Self::ContractAgreement => "ids:ContractAgreementMessage",
            Self::ContractRejection => "ids:ContractRejectionMessage",
            Self::ArtifactRequest => "ids:ArtifactRequestMessage",
            Self::ArtifactResponse => "ids:ArtifactResponseMessage",
            Self::ResourceUpdate => "ids:ResourceUpdateMessage",
            Self::ConnectorUpdate => "ids:ConnectorUpdateMessage",
            Self::MessageProcessedNotification => "ids:MessageProcessedNotificationMessage",
            Self::Rejection => "ids:RejectionMessage",
        }
    }

    /// Broad class of the type.
    pub fn category(&self) -> MessageCategory {
        match self {
            Self::DescriptionRequest | Self::ContractRequest | Self::ArtifactRequest => {
                MessageCategory::Request
            }
            Self::DescriptionResponse
            | Self::ContractRejection
            | Self::ArtifactResponse
            | Self::Rejection => MessageCategory::Response,
            Self::ContractAgreement
            | Self::ResourceUpdate
            | Self::ConnectorUpdate
            | Self::MessageProcessedNotification => MessageCategory::Notification,
        }
    }

    /// The reply a sender of this type must accept as success.
    ///
    /// `None` for types that are themselves replies.
    pub fn expected_response(&self) -> Option<MessageType> {
        match self {
            Self::DescriptionRequest => Some(Self::DescriptionResponse),
            Self::ContractRequest => Some(Self::ContractAgreement),
            Self::ContractAgreement => Some(Self::MessageProcessedNotification),
            Self::ArtifactRequest => Some(Self::ArtifactResponse),
            Self::ResourceUpdate | Self::ConnectorUpdate => {
                Some(Self::MessageProcessedNotification)
            }
            Self::DescriptionResponse
            | Self::ContractRejection
            | Self::ArtifactResponse
            | Self::MessageProcessedNotification
            | Self::Rejection => None,
        }
    }

    /// Whether the type refuses the request it answers.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejection | Self::ContractRejection)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_agreement_expects_notification() {
        assert_eq!(
            MessageType::ContractAgreement.expected_response(),
            Some(MessageType::MessageProcessedNotification)
        );
        assert_eq!(
            MessageType::ContractAgreement.category(),
            MessageCategory::Notification
        );
    }

    #[test]
    fn requests_expect_their_response() {
        assert_eq!(
            MessageType::DescriptionRequest.expected_response(),
            Some(MessageType::DescriptionResponse)
        );
        assert_eq!(
            MessageType::ContractRequest.expected_response(),
            Some(MessageType::ContractAgreement)
        );
        assert_eq!(
            MessageType::ArtifactRequest.expected_response(),
            Some(MessageType::ArtifactResponse)
        );
    }

    #[test]
    fn replies_expect_nothing() {
        for t in MessageType::ALL {
            if t.is_rejection() || t == MessageType::MessageProcessedNotification {
                assert!(t.expected_response().is_none(), "{t}");
            }
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        for t in MessageType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            let back: MessageType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, t);
        }
    }
}
