//! Contract requests and agreement confirmations.
//!
//! A contract request runs a full provider-side negotiation and answers
//! with the stored agreement. A contract agreement sent back by the
//! consumer is compared with the stored copy and confirmed.

use std::sync::Arc;

use chrono::Utc;

use dsc_message::{
    encode_body, HandlerError, JsonPayload, MessageType, Processor, Reply, Request, Route,
};
use dsc_policy::{agreement_difference, ContractAgreement, ContractRequest};

use super::{internal, store_failure, ConnectorServices};
use crate::collaborators::AgreementStore;
use crate::provider::ContractProvider;
use crate::session::NegotiationSession;

/// Route for contract requests.
pub fn request_route(services: &ConnectorServices) -> Route {
    let provider = ContractProvider::new(
        services.ctx.clone(),
        services.catalog.clone(),
        services.agreements.clone(),
    )
    .with_default_validity(services.default_validity);
    Route::builder(MessageType::ContractRequest)
        .transform(JsonPayload::<ContractRequest>::new(services.codec.clone()))
        .process(ContractRequestProcessor { provider })
}

/// Route for agreement confirmations.
pub fn agreement_route(services: &ConnectorServices) -> Route {
    Route::builder(MessageType::ContractAgreement)
        .transform(JsonPayload::<ContractAgreement>::new(services.codec.clone()))
        .process(AgreementConfirmation {
            agreements: services.agreements.clone(),
        })
}

struct ContractRequestProcessor {
    provider: ContractProvider,
}

impl Processor<ContractRequest> for ContractRequestProcessor {
    fn process(&self, request: Request<ContractRequest>) -> Result<Reply, HandlerError> {
        let mut session = NegotiationSession::new(
            request.header.id,
            request.header.issuer_connector.clone(),
            request.body,
        );
        let agreement = self.provider.negotiate(&mut session, Utc::now())?;
        encode_body(&agreement).map(Reply::with_payload).map_err(internal)
    }
}

struct AgreementConfirmation {
    agreements: Arc<dyn AgreementStore>,
}

impl Processor<ContractAgreement> for AgreementConfirmation {
    fn process(&self, request: Request<ContractAgreement>) -> Result<Reply, HandlerError> {
        let received = request.body;
        let stored = self
            .agreements
            .find_by_uri(&received.id)
            .ok_or_else(|| HandlerError::NotFound(format!("agreement {}", received.id)))?;

        if let Some(section) = agreement_difference(&received, &stored.agreement) {
            tracing::warn!(
                agreement = %received.id,
                issuer = %request.header.issuer_connector,
                section = %section,
                "received agreement differs from stored copy"
            );
            return Err(HandlerError::BadParameters(format!(
                "agreement differs from stored copy in {section}"
            )));
        }

        let confirmed = self
            .agreements
            .confirm_agreement(stored.id)
            .map_err(store_failure)?;
        if !confirmed {
            return Err(HandlerError::Internal(format!(
                "agreement {} could not be confirmed",
                received.id
            )));
        }
        tracing::info!(agreement = %received.id, "agreement confirmed");
        Ok(Reply::empty())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::collaborators::AgreementStore;
    use crate::handlers::fixtures::*;
    use dsc_core::Uri;
    use dsc_message::{MessageType, RejectionReason};
    use dsc_policy::{
        Action, BinaryOperator, Constraint, ContractAgreement, ContractOffer, ContractRequest,
        LeftOperand, RightOperand, Rule,
    };

    fn artifact() -> Uri {
        uri("https://provider.example/artifacts/1")
    }

    fn rule(max: &str) -> Rule {
        Rule::permission(artifact()).with_constraint(Constraint::new(
            LeftOperand::Count,
            BinaryOperator::Lteq,
            RightOperand::integer(max),
        ))
    }

    fn publish(f: &Fixture, restricted_to: Option<Uri>) {
        f.catalog.publish(
            artifact(),
            ContractOffer {
                id: uri("https://provider.example/offers/1"),
                provider: provider_id(),
                consumer: restricted_to,
                start: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
                rules: vec![rule("5")],
            },
        );
    }

    fn request_payload(rules: Vec<Rule>) -> String {
        serde_json::to_string(&ContractRequest {
            id: uri("https://consumer.example/requests/1"),
            consumer: Some(consumer_id()),
            rules,
            contract_end: None,
        })
        .unwrap()
    }

    fn negotiate(f: &Fixture, rules: Vec<Rule>) -> dsc_message::Message {
        f.send(f.consumer.contract_request(&provider_id()), Some(request_payload(rules)))
    }

    #[test]
    fn matching_request_gets_agreement() {
        let f = fixture();
        publish(&f, None);
        let reply = negotiate(&f, vec![rule("5")]);
        assert_type(&reply, MessageType::ContractAgreement);
        let agreement: ContractAgreement =
            serde_json::from_str(reply.payload.as_deref().unwrap()).unwrap();
        assert_eq!(agreement.consumer, consumer_id());
        assert_eq!(agreement.provider, provider_id());
        assert_eq!(agreement.contract_end, Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(f.agreements.len(), 1);
    }

    #[test]
    fn differing_rules_get_contract_rejection() {
        let f = fixture();
        publish(&f, None);
        let reply = negotiate(&f, vec![rule("50")]);
        assert_type(&reply, MessageType::ContractRejection);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::BadParameters));
        assert_eq!(reply.payload.as_deref(), Some("Contract rejected."));
        assert!(f.agreements.is_empty());
    }

    #[test]
    fn restricted_offer_rejects_other_consumer() {
        let f = fixture();
        publish(&f, Some(uri("https://someone-else.example")));
        let reply = negotiate(&f, vec![rule("5")]);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::NotFound));
        assert!(f.agreements.is_empty());
    }

    #[test]
    fn empty_request_is_malformed() {
        let f = fixture();
        let reply = negotiate(&f, Vec::new());
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::MalformedMessage));
    }

    #[test]
    fn confirmation_marks_agreement_confirmed() {
        let f = fixture();
        publish(&f, None);
        let reply = negotiate(&f, vec![rule("5")]);
        let payload = reply.payload.clone();

        let ack = f.send(
            f.consumer.contract_agreement(&provider_id(), Some(reply.header.id)),
            payload,
        );
        assert_type(&ack, MessageType::MessageProcessedNotification);
        assert!(f.agreements.list()[0].confirmed);
    }

    #[test]
    fn tampered_agreement_is_refused() {
        let f = fixture();
        publish(&f, None);
        let reply = negotiate(&f, vec![rule("5")]);
        let mut agreement: ContractAgreement =
            serde_json::from_str(reply.payload.as_deref().unwrap()).unwrap();
        agreement.rules = vec![rule("500")];

        let ack = f.send(
            f.consumer.contract_agreement(&provider_id(), None),
            Some(serde_json::to_string(&agreement).unwrap()),
        );
        assert_eq!(ack.header.rejection_reason, Some(RejectionReason::BadParameters));
        let stored = f.agreements.find_by_uri(&agreement.id).unwrap();
        assert!(!stored.confirmed);
    }

    #[test]
    fn swapped_unknown_action_is_refused() {
        let f = fixture();
        let anonymize = Rule::permission(artifact()).with_actions([Action::from("ANONYMIZE")]);
        f.catalog.publish(
            artifact(),
            ContractOffer {
                id: uri("https://provider.example/offers/2"),
                provider: provider_id(),
                consumer: None,
                start: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
                rules: vec![anonymize.clone()],
            },
        );
        let reply = negotiate(&f, vec![anonymize]);
        assert_type(&reply, MessageType::ContractAgreement);
        let mut agreement: ContractAgreement =
            serde_json::from_str(reply.payload.as_deref().unwrap()).unwrap();
        agreement.rules[0].actions = vec![Action::from("AGGREGATE")];

        let ack = f.send(
            f.consumer.contract_agreement(&provider_id(), None),
            Some(serde_json::to_string(&agreement).unwrap()),
        );
        assert_eq!(ack.header.rejection_reason, Some(RejectionReason::BadParameters));
        assert!(!f.agreements.find_by_uri(&agreement.id).unwrap().confirmed);
    }

    #[test]
    fn unknown_agreement_is_not_found() {
        let f = fixture();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let agreement = ContractAgreement {
            id: uri("https://provider.example/agreements/unknown"),
            provider: provider_id(),
            consumer: consumer_id(),
            rules: vec![rule("5")],
            contract_date: at,
            contract_start: at,
            contract_end: at,
        };
        let ack = f.send(
            f.consumer.contract_agreement(&provider_id(), None),
            Some(serde_json::to_string(&agreement).unwrap()),
        );
        assert_eq!(ack.header.rejection_reason, Some(RejectionReason::NotFound));
    }

    #[test]
    fn refused_confirmation_is_internal_error() {
        let f = fixture();
        publish(&f, None);
        let reply = negotiate(&f, vec![rule("5")]);
        f.agreements.refuse_confirmation(true);
        let ack = f.send(f.consumer.contract_agreement(&provider_id(), None), reply.payload);
        assert_eq!(
            ack.header.rejection_reason,
            Some(RejectionReason::InternalRecipientError)
        );
    }
}
