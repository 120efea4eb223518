//! # Header Building
//!
//! Every outbound header is stamped from an explicit [`ConnectorContext`]:
//! issuer, sender agent, model version and security token. Replies carry
//! the request's id as correlation id and address the request's issuer.

use chrono::Utc;

use dsc_core::{ConnectorContext, MessageId, Uri};

use crate::header::{MessageHeader, RejectionReason};
use crate::types::MessageType;

/// Builds headers on behalf of the local connector.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    ctx: ConnectorContext,
}

impl MessageBuilder {
    /// Create a builder for the given connector identity.
    pub fn new(ctx: ConnectorContext) -> Self {
        Self { ctx }
    }

    /// The identity headers are stamped with.
    pub fn context(&self) -> &ConnectorContext {
        &self.ctx
    }

    /// Base header of the given type addressed to `recipient`.
    pub fn header(&self, message_type: MessageType, recipient: Option<&Uri>) -> MessageHeader {
        MessageHeader {
            id: MessageId::new(),
            message_type,
            model_version: self.ctx.model_version.clone(),
            issued: Utc::now(),
            issuer_connector: self.ctx.connector_id.clone(),
            sender_agent: self.ctx.connector_id.clone(),
            recipient_connector: recipient.into_iter().cloned().collect(),
            security_token: self.ctx.security_token.clone(),
            security_profile: None,
            correlation_message: None,
            requested_element: None,
            requested_artifact: None,
            transfer_contract: None,
            affected_resource: None,
            affected_connector: None,
            rejection_reason: None,
        }
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Description request; `None` asks for the self-description.
    pub fn description_request(&self, recipient: &Uri, element: Option<&Uri>) -> MessageHeader {
        let mut header = self.header(MessageType::DescriptionRequest, Some(recipient));
        header.requested_element = element.cloned();
        header
    }

    /// Contract request.
    pub fn contract_request(&self, recipient: &Uri) -> MessageHeader {
        self.header(MessageType::ContractRequest, Some(recipient))
    }

    /// Contract agreement sent back to confirm.
    pub fn contract_agreement(&self, recipient: &Uri, correlation: Option<MessageId>) -> MessageHeader {
        let mut header = self.header(MessageType::ContractAgreement, Some(recipient));
        header.correlation_message = correlation;
        header
    }

    /// Artifact request under a transfer contract.
    pub fn artifact_request(
        &self,
        recipient: &Uri,
        artifact: &Uri,
        transfer_contract: &Uri,
    ) -> MessageHeader {
        let mut header = self.header(MessageType::ArtifactRequest, Some(recipient));
        header.requested_artifact = Some(artifact.clone());
        header.transfer_contract = Some(transfer_contract.clone());
        header
    }

    /// Resource update notification.
    pub fn resource_update(&self, recipient: &Uri, resource: &Uri) -> MessageHeader {
        let mut header = self.header(MessageType::ResourceUpdate, Some(recipient));
        header.affected_resource = Some(resource.clone());
        header
    }

    /// Connector update notification about the local connector.
    pub fn connector_update(&self, recipient: &Uri) -> MessageHeader {
        let mut header = self.header(MessageType::ConnectorUpdate, Some(recipient));
        header.affected_connector = Some(self.ctx.connector_id.clone());
        header
    }

    // ── Replies ──────────────────────────────────────────────────────

    /// Reply of the given type to `request`.
    pub fn reply(&self, request: &MessageHeader, message_type: MessageType) -> MessageHeader {
        let mut header = self.header(message_type, Some(&request.issuer_connector));
        header.correlation_message = Some(request.id);
        header
    }

    /// Rejection reply. Without a readable request header the rejection is
    /// unaddressed and uncorrelated.
    pub fn rejection(
        &self,
        request: Option<&MessageHeader>,
        message_type: MessageType,
        reason: RejectionReason,
    ) -> MessageHeader {
        let mut header = match request {
            Some(req) => self.reply(req, message_type),
            None => self.header(message_type, None),
        };
        header.rejection_reason = Some(reason);
        header
    }
}
