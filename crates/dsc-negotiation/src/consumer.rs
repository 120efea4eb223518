//! # Consumer-Side Saga
//!
//! [`ContractSaga::run`] negotiates a contract with a provider and pulls
//! what it covers. Steps run strictly in order, each gated on the reply to
//! the previous one:
//!
//! 1. Send the contract request and expect an agreement whose rules equal
//!    the requested ones.
//! 2. Echo the agreement back and expect a processed-notification.
//! 3. Store and confirm the agreement locally.
//! 4. Fetch and store the description of every requested resource.
//! 5. Link every requested artifact to the agreement.
//! 6. Optionally download every artifact.
//!
//! Any failure in steps 1 to 5 aborts the saga. Download failures are
//! logged and skipped, since artifacts can be requested again later under
//! the stored agreement.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use dsc_core::{AgreementId, ConnectorContext, Uri};
use dsc_message::{
    decode_body, encode_body, CodecError, Message, MessageBuilder, MessageCodec, MessageError,
    MessageSender, Transport, PAYLOAD_PART,
};
use dsc_policy::contract::first_rule_without_target;
use dsc_policy::{contract_difference, ContractAgreement, ContractRequest, Rule};
use serde_json::Value;

use crate::collaborators::{AgreementStore, EntityPersistence};
use crate::error::{SagaError, SagaStep};

/// What the caller asks the saga to negotiate.
#[derive(Debug, Clone)]
pub struct SagaRequest {
    /// Provider connector.
    pub recipient: Uri,
    /// Resources whose metadata to fetch.
    pub resources: Vec<Uri>,
    /// Artifacts to link, and download if requested.
    pub artifacts: Vec<Uri>,
    /// Whether to download the artifacts after linking.
    pub download: bool,
    /// Proposed rules. Every rule needs a target.
    pub rules: Vec<Rule>,
}

/// Result of a completed saga.
#[derive(Debug, Clone)]
pub struct SagaOutcome {
    /// Local id of the stored agreement.
    pub agreement_id: AgreementId,
    /// Where the agreement can be found locally.
    pub location: Uri,
    /// The confirmed agreement.
    pub agreement: ContractAgreement,
    /// Resources whose metadata was stored.
    pub resources: Vec<Uri>,
    /// Artifacts whose data was stored.
    pub downloaded: Vec<Uri>,
    /// Artifacts whose download failed; still linked to the agreement.
    pub failed_downloads: Vec<Uri>,
}

/// Drives contract negotiations from the consumer side.
pub struct ContractSaga {
    ctx: ConnectorContext,
    codec: Arc<dyn MessageCodec>,
    builder: MessageBuilder,
    sender: MessageSender,
    agreements: Arc<dyn AgreementStore>,
    persistence: Arc<dyn EntityPersistence>,
}

impl std::fmt::Debug for ContractSaga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractSaga")
            .field("connector", &self.ctx.connector_id)
            .finish_non_exhaustive()
    }
}

impl ContractSaga {
    /// Create a saga runner over the given collaborators.
    pub fn new(
        ctx: ConnectorContext,
        codec: Arc<dyn MessageCodec>,
        transport: Arc<dyn Transport>,
        agreements: Arc<dyn AgreementStore>,
        persistence: Arc<dyn EntityPersistence>,
    ) -> Self {
        Self {
            builder: MessageBuilder::new(ctx.clone()),
            sender: MessageSender::new(codec.clone(), transport),
            ctx,
            codec,
            agreements,
            persistence,
        }
    }

    /// Run the saga to completion.
    ///
    /// # Errors
    ///
    /// [`SagaError::UnexpectedResponse`] carries the provider's reply when a
    /// step is answered with anything but the expected type. Local store
    /// failures, agreement mismatches and transport failures abort too.
    pub fn run(&self, request: &SagaRequest) -> Result<SagaOutcome, SagaError> {
        if request.rules.is_empty() {
            return Err(SagaError::InvalidInput("no rules to request".to_string()));
        }
        if let Some(index) = first_rule_without_target(&request.rules) {
            return Err(SagaError::InvalidInput(format!("rule at position {index} has no target")));
        }
        let recipient = &request.recipient;

        let agreement = self.request_contract(recipient, request.rules.clone())?;
        let agreement_id = self.store_agreement(&agreement)?;

        let mut resources = Vec::with_capacity(request.resources.len());
        for resource in &request.resources {
            let description = self.fetch_description(recipient, resource)?;
            self.persistence
                .save_metadata(recipient, resource, &description, &request.artifacts)?;
            resources.push(resource.clone());
        }

        self.agreements
            .link_artifacts_to_agreement(&request.artifacts, agreement_id)?;
        tracing::debug!(agreement = %agreement.id, artifacts = request.artifacts.len(), "artifacts linked");

        let mut downloaded = Vec::new();
        let mut failed_downloads = Vec::new();
        if request.download {
            for artifact in &request.artifacts {
                match self.download(recipient, artifact, &agreement.id) {
                    Ok(()) => downloaded.push(artifact.clone()),
                    Err(e) => {
                        tracing::warn!(artifact = %artifact, error = %e, "artifact download failed, skipping");
                        failed_downloads.push(artifact.clone());
                    }
                }
            }
        }

        let location = self
            .ctx
            .connector_id
            .join_segment(&format!("agreements/{agreement_id}"))
            .map_err(|e| SagaError::InvalidInput(e.to_string()))?;
        tracing::info!(agreement = %agreement.id, location = %location, "contract negotiation completed");
        Ok(SagaOutcome {
            agreement_id,
            location,
            agreement,
            resources,
            downloaded,
            failed_downloads,
        })
    }

    /// Steps 1 and 2: negotiate and confirm with the provider.
    fn request_contract(&self, recipient: &Uri, rules: Vec<Rule>) -> Result<ContractAgreement, SagaError> {
        let id = self
            .ctx
            .connector_id
            .join_segment(&format!("contracts/requests/{}", Uuid::new_v4()))
            .map_err(|e| SagaError::InvalidInput(e.to_string()))?;
        let contract_request = ContractRequest::build(&self.ctx, id, rules);
        let payload = encode_body(&contract_request).map_err(|e| SagaError::Message(MessageError::Encoding(e)))?;

        let message = Message::new(self.builder.contract_request(recipient), Some(payload));
        let reply = self
            .sender
            .exchange(recipient, &message)
            .map_err(|e| SagaError::at(SagaStep::ContractRequest, e))?;
        let agreement: ContractAgreement = self.decode(&reply)?;

        if let Some(section) = contract_difference(&agreement, &contract_request) {
            tracing::warn!(agreement = %agreement.id, section = %section, "agreement does not match request");
            return Err(SagaError::AgreementMismatch(section));
        }

        let echo = Message::new(
            self.builder.contract_agreement(recipient, Some(reply.header.id)),
            reply.payload,
        );
        self.sender
            .exchange(recipient, &echo)
            .map_err(|e| SagaError::at(SagaStep::AgreementConfirmation, e))?;
        Ok(agreement)
    }

    /// Step 3: store and confirm locally. An agreement the store will not
    /// confirm is discarded again.
    fn store_agreement(&self, agreement: &ContractAgreement) -> Result<AgreementId, SagaError> {
        let id = self.agreements.save_agreement(agreement)?;
        if !self.agreements.confirm_agreement(id)? {
            if let Err(e) = self.agreements.discard_agreement(id) {
                tracing::warn!(agreement = %agreement.id, error = %e, "failed to discard unconfirmed agreement");
            }
            return Err(SagaError::UnconfirmedAgreement(id));
        }
        tracing::info!(agreement = %agreement.id, local_id = %id, "agreement stored");
        Ok(id)
    }

    fn fetch_description(&self, recipient: &Uri, resource: &Uri) -> Result<Value, SagaError> {
        let message = Message::new(self.builder.description_request(recipient, Some(resource)), None);
        let reply = self
            .sender
            .exchange(recipient, &message)
            .map_err(|e| SagaError::at(SagaStep::Description, e))?;
        self.decode(&reply)
    }

    fn download(&self, recipient: &Uri, artifact: &Uri, contract: &Uri) -> Result<(), SagaError> {
        let message = Message::new(self.builder.artifact_request(recipient, artifact, contract), None);
        let reply = self
            .sender
            .exchange(recipient, &message)
            .map_err(|e| SagaError::at(SagaStep::ArtifactRequest, e))?;
        let data = reply.payload.unwrap_or_default();
        self.persistence.save_data(artifact, &data)?;
        tracing::debug!(artifact = %artifact, bytes = data.len(), "artifact stored");
        Ok(())
    }

    fn decode<T: DeserializeOwned>(&self, reply: &Message) -> Result<T, SagaError> {
        let raw = reply
            .payload
            .as_deref()
            .ok_or(CodecError::MissingPart(PAYLOAD_PART))
            .map_err(|e| SagaError::Message(MessageError::MalformedResponse(e)))?;
        decode_body(self.codec.as_ref(), raw)
            .map_err(|e| SagaError::Message(MessageError::MalformedResponse(e)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::handlers::ConnectorServices;
    use crate::memory::{MemoryAgreements, MemoryCatalog, MemoryExecution, MemoryResources};
    use dsc_message::{JsonCodec, Loopback, MessageType, RejectionReason};
    use dsc_policy::{ContractOffer, DecisionPoint};

    fn uri(s: &str) -> Uri {
        Uri::new(s).unwrap()
    }

    fn provider_id() -> Uri {
        uri("https://provider.example")
    }

    fn artifact() -> Uri {
        uri("https://provider.example/artifacts/1")
    }

    fn resource() -> Uri {
        uri("https://provider.example/resources/1")
    }

    struct World {
        provider: MemoryResources,
        local_agreements: MemoryAgreements,
        local: MemoryResources,
        saga: ContractSaga,
    }

    fn world() -> World {
        let catalog = MemoryCatalog::new();
        catalog.publish(
            artifact(),
            ContractOffer {
                id: uri("https://provider.example/offers/1"),
                provider: provider_id(),
                consumer: None,
                start: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
                rules: vec![Rule::permission(artifact())],
            },
        );
        let provider = MemoryResources::new();
        provider.add_description(resource(), json!({"@id": resource().as_str(), "title": "Weather"}));
        provider.add_artifact(artifact(), json!({}), "21.5", Utc::now());

        let services = ConnectorServices {
            ctx: ConnectorContext::new(provider_id(), "4.2.7"),
            codec: Arc::new(JsonCodec),
            catalog: Arc::new(catalog),
            agreements: Arc::new(MemoryAgreements::new()),
            resolver: Arc::new(provider.clone()),
            persistence: Arc::new(provider.clone()),
            decision: DecisionPoint::new(Arc::new(provider.clone()), Arc::new(MemoryExecution::new())),
            default_validity: chrono::TimeDelta::days(30),
        };
        let transport = Arc::new(Loopback::new(Arc::new(services.pipeline())));

        let local_agreements = MemoryAgreements::new();
        let local = MemoryResources::new();
        let saga = ContractSaga::new(
            ConnectorContext::new(uri("https://consumer.example"), "4.2.7"),
            Arc::new(JsonCodec),
            transport,
            Arc::new(local_agreements.clone()),
            Arc::new(local.clone()),
        );
        World {
            provider,
            local_agreements,
            local,
            saga,
        }
    }

    fn saga_request(rules: Vec<Rule>) -> SagaRequest {
        SagaRequest {
            recipient: provider_id(),
            resources: vec![resource()],
            artifacts: vec![artifact()],
            download: true,
            rules,
        }
    }

    #[test]
    fn full_saga_downloads_data() {
        let w = world();
        let outcome = w.saga.run(&saga_request(vec![Rule::permission(artifact())])).unwrap();
        assert_eq!(outcome.downloaded, vec![artifact()]);
        assert!(outcome.failed_downloads.is_empty());
        assert_eq!(w.local.data(&artifact()).as_deref(), Some("21.5"));
        assert_eq!(w.local.remote_resource(&resource()).unwrap().description["title"], "Weather");
        let stored = w.local_agreements.get(outcome.agreement_id).unwrap();
        assert!(stored.confirmed);
        assert_eq!(stored.artifacts, vec![artifact()]);
        assert!(outcome.location.as_str().starts_with("https://consumer.example/agreements/"));
        assert_eq!(w.provider.artifact(&artifact()).unwrap().accessed, 1);
    }

    #[test]
    fn rejected_request_surfaces_reply() {
        let w = world();
        let rules = vec![Rule::prohibition(artifact())];
        let err = w.saga.run(&saga_request(rules)).unwrap_err();
        let content = err.response_content().unwrap();
        assert_eq!(content.message_type, MessageType::ContractRejection);
        assert_eq!(content.reason, Some(RejectionReason::BadParameters));
        assert!(w.local_agreements.is_empty());
    }

    #[test]
    fn rule_without_target_fails_before_sending() {
        let w = world();
        let rules = vec![Rule::permission(artifact()).without_target()];
        assert!(matches!(w.saga.run(&saga_request(rules)), Err(SagaError::InvalidInput(_))));
        assert!(w.local_agreements.is_empty());
    }

    #[test]
    fn unconfirmed_agreement_is_discarded() {
        let w = world();
        w.local_agreements.refuse_confirmation(true);
        let err = w.saga.run(&saga_request(vec![Rule::permission(artifact())])).unwrap_err();
        assert!(matches!(err, SagaError::UnconfirmedAgreement(_)));
        assert!(w.local_agreements.is_empty());
    }
}
