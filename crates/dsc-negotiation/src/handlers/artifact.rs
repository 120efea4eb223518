//! Artifact requests.
//!
//! Data is only served under a transfer contract that is stored,
//! confirmed, unexpired, covers the artifact and was agreed with the
//! requesting connector. Every agreed rule for the artifact is then
//! enforced before the data is read.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use dsc_core::Uri;
use dsc_message::{HandlerError, IgnorePayload, MessageType, Processor, Reply, Request, Route};
use dsc_policy::{AccessContext, DecisionPoint};

use super::{store_failure, ConnectorServices};
use crate::collaborators::{AgreementStore, EntityResolver, StoredAgreement};

/// Route for artifact requests.
pub fn route(services: &ConnectorServices) -> Route {
    Route::builder(MessageType::ArtifactRequest)
        .transform(IgnorePayload)
        .validate(requested_artifact_present)
        .validate(transfer_contract_present)
        .process(ArtifactProcessor {
            agreements: services.agreements.clone(),
            resolver: services.resolver.clone(),
            decision: services.decision.clone(),
        })
}

fn requested_artifact_present(request: &Request<()>) -> Result<(), HandlerError> {
    match request.header.requested_artifact {
        Some(_) => Ok(()),
        None => Err(HandlerError::BadParameters("missing requested artifact".to_string())),
    }
}

fn transfer_contract_present(request: &Request<()>) -> Result<(), HandlerError> {
    match request.header.transfer_contract {
        Some(_) => Ok(()),
        None => Err(HandlerError::BadParameters("missing transfer contract".to_string())),
    }
}

/// Check that `contract` entitles `issuer` to `artifact` at `now`.
pub fn validate_transfer_contract(
    agreements: &dyn AgreementStore,
    contract: &Uri,
    artifact: &Uri,
    issuer: &Uri,
    now: DateTime<Utc>,
) -> Result<StoredAgreement, HandlerError> {
    let stored = agreements
        .find_by_uri(contract)
        .ok_or_else(|| HandlerError::NotFound(format!("transfer contract {contract}")))?;

    let denial = if !stored.artifacts.contains(artifact) {
        Some("transfer contract does not cover the artifact")
    } else if !stored.confirmed {
        Some("transfer contract is not confirmed")
    } else if stored.agreement.is_expired_at(now) {
        Some("transfer contract has expired")
    } else if &stored.agreement.consumer != issuer {
        Some("transfer contract belongs to another consumer")
    } else {
        None
    };

    match denial {
        Some(reason) => {
            tracing::debug!(contract = %contract, artifact = %artifact, issuer = %issuer, reason);
            Err(HandlerError::NotAuthorized(reason.to_string()))
        }
        None => Ok(stored),
    }
}

struct ArtifactProcessor {
    agreements: Arc<dyn AgreementStore>,
    resolver: Arc<dyn EntityResolver>,
    decision: DecisionPoint,
}

impl Processor<()> for ArtifactProcessor {
    fn process(&self, request: Request<()>) -> Result<Reply, HandlerError> {
        let header = &request.header;
        let (Some(artifact), Some(contract)) = (&header.requested_artifact, &header.transfer_contract)
        else {
            return Err(HandlerError::BadParameters(
                "missing requested artifact or transfer contract".to_string(),
            ));
        };
        let now = Utc::now();
        let stored = validate_transfer_contract(
            self.agreements.as_ref(),
            contract,
            artifact,
            &header.issuer_connector,
            now,
        )?;

        let access = AccessContext {
            target: artifact,
            issuer: &header.issuer_connector,
            security_profile: header.security_profile.as_deref(),
            agreement: &stored.agreement.id,
            now,
        };
        self.decision
            .enforce_all(stored.agreement.rules_for_target(artifact), &access)
            .map_err(|e| {
                tracing::info!(artifact = %artifact, issuer = %header.issuer_connector, error = %e, "artifact access denied");
                HandlerError::NotAuthorized(e.to_string())
            })?;

        let data = self.resolver.artifact_data(artifact).map_err(store_failure)?;
        tracing::debug!(artifact = %artifact, contract = %contract, "artifact served");
        Ok(Reply::with_payload(data))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::handlers::fixtures::*;
    use crate::memory::MemoryAgreements;
    use dsc_message::{Message, MessageType, RejectionReason};
    use dsc_policy::{
        BinaryOperator, Constraint, ContractAgreement, LeftOperand, RightOperand, Rule,
    };

    fn artifact() -> Uri {
        uri("https://provider.example/artifacts/1")
    }

    fn agreement(rules: Vec<Rule>, end: DateTime<Utc>) -> ContractAgreement {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        ContractAgreement {
            id: uri("https://provider.example/agreements/1"),
            provider: provider_id(),
            consumer: consumer_id(),
            rules,
            contract_date: start,
            contract_start: start,
            contract_end: end,
        }
    }

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
    }

    /// Store, link and optionally confirm `agreement` in `store`.
    fn store(store: &MemoryAgreements, agreement: &ContractAgreement, confirm: bool) {
        let id = store.save_agreement(agreement).unwrap();
        store.link_artifacts_to_agreement(&[artifact()], id).unwrap();
        if confirm {
            store.confirm_agreement(id).unwrap();
        }
    }

    fn request(f: &Fixture) -> Message {
        f.send(
            f.consumer
                .artifact_request(&provider_id(), &artifact(), &uri("https://provider.example/agreements/1")),
            None,
        )
    }

    fn count_rule(max: &str) -> Rule {
        Rule::permission(artifact()).with_constraint(Constraint::new(
            LeftOperand::Count,
            BinaryOperator::Lteq,
            RightOperand::integer(max),
        ))
    }

    fn setup(rules: Vec<Rule>) -> Fixture {
        let f = fixture();
        f.resources.add_artifact(
            artifact(),
            json!({"@id": artifact().as_str()}),
            "temperature,21.5",
            Utc::now() - TimeDelta::days(1),
        );
        store(&f.agreements, &agreement(rules, far_future()), true);
        f
    }

    #[test]
    fn data_is_served_under_valid_contract() {
        let f = setup(vec![Rule::permission(artifact())]);
        let reply = request(&f);
        assert_type(&reply, MessageType::ArtifactResponse);
        assert_eq!(reply.payload.as_deref(), Some("temperature,21.5"));
        assert_eq!(f.resources.artifact(&artifact()).unwrap().accessed, 1);
    }

    #[test]
    fn access_count_is_enforced() {
        let f = setup(vec![count_rule("1")]);
        assert_type(&request(&f), MessageType::ArtifactResponse);
        let second = request(&f);
        assert_eq!(second.header.rejection_reason, Some(RejectionReason::NotAuthorized));
    }

    #[test]
    fn prohibition_denies_access() {
        let f = setup(vec![Rule::prohibition(artifact())]);
        let reply = request(&f);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::NotAuthorized));
        assert_eq!(f.resources.artifact(&artifact()).unwrap().accessed, 0);
    }

    #[test]
    fn missing_transfer_contract_is_bad_parameters() {
        let f = setup(vec![Rule::permission(artifact())]);
        let mut header = f.consumer.artifact_request(
            &provider_id(),
            &artifact(),
            &uri("https://provider.example/agreements/1"),
        );
        header.transfer_contract = None;
        let reply = f.send(header, None);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::BadParameters));
    }

    #[test]
    fn unknown_contract_is_not_found() {
        let f = fixture();
        let reply = request(&f);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::NotFound));
    }

    #[test]
    fn contract_checks_deny_in_order() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let contract = uri("https://provider.example/agreements/1");
        let rules = vec![Rule::permission(artifact())];

        let unconfirmed = MemoryAgreements::new();
        store(&unconfirmed, &agreement(rules.clone(), far_future()), false);
        let err = validate_transfer_contract(&unconfirmed, &contract, &artifact(), &consumer_id(), now)
            .unwrap_err();
        assert_eq!(err, HandlerError::NotAuthorized("transfer contract is not confirmed".to_string()));

        let expired = MemoryAgreements::new();
        store(&expired, &agreement(rules.clone(), now - TimeDelta::days(1)), true);
        let err = validate_transfer_contract(&expired, &contract, &artifact(), &consumer_id(), now)
            .unwrap_err();
        assert_eq!(err, HandlerError::NotAuthorized("transfer contract has expired".to_string()));

        let valid = MemoryAgreements::new();
        store(&valid, &agreement(rules, far_future()), true);
        let other = uri("https://other.example/artifacts/2");
        assert!(matches!(
            validate_transfer_contract(&valid, &contract, &other, &consumer_id(), now),
            Err(HandlerError::NotAuthorized(_))
        ));
        assert!(matches!(
            validate_transfer_contract(&valid, &contract, &artifact(), &provider_id(), now),
            Err(HandlerError::NotAuthorized(_))
        ));
        assert!(validate_transfer_contract(&valid, &contract, &artifact(), &consumer_id(), now).is_ok());
    }

    #[test]
    fn logging_duty_records_access() {
        use dsc_policy::{Action, Duty};
        let rule = Rule::permission(artifact()).with_post_duty(Duty::new(Action::Log));
        let f = setup(vec![rule]);
        assert_type(&request(&f), MessageType::ArtifactResponse);
        assert_eq!(f.execution.logged().len(), 1);
    }
}
