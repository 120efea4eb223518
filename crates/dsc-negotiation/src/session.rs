//! # Provider-Side Negotiation Session
//!
//! One session per inbound contract request.
//!
//! ## States
//!
//! RECEIVED → RULES_VALIDATED → OFFERS_MATCHED → ACCEPTED → PERSISTED → RESPONSE_SENT
//!
//! Every step can instead end in REJECTED. Terminal states: REJECTED,
//! RESPONSE_SENT.
//!
//! A single target without a matching offer rejects the whole request;
//! there are no partial agreements. Persistence is one create-or-fail call
//! followed by the artifact link; if the link fails the saved agreement is
//! discarded again.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use dsc_core::{AgreementId, ConnectorContext, MessageId, Uri};
use dsc_policy::contract::{first_rule_without_target, retain_admitted, retain_valid_dates};
use dsc_policy::{contracts_equal, ContractAgreement, ContractOffer, ContractRequest, Rule};

use crate::collaborators::{AgreementStore, OfferCatalog};
use crate::error::NegotiationError;

// ── Session State ────────────────────────────────────────────────────

/// Provider-side negotiation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Request decoded, nothing checked yet.
    Received,
    /// Every rule carries a target.
    RulesValidated,
    /// Every target has at least one admissible offer.
    OffersMatched,
    /// Every target's rules equal one of its offers.
    Accepted,
    /// Agreement stored and linked to its artifacts.
    Persisted,
    /// Agreement handed back to the requester. Terminal state.
    ResponseSent,
    /// Negotiation declined. Terminal state.
    Rejected,
}

impl SessionState {
    /// Whether this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResponseSent | Self::Rejected)
    }

    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::RulesValidated => "RULES_VALIDATED",
            Self::OffersMatched => "OFFERS_MATCHED",
            Self::Accepted => "ACCEPTED",
            Self::Persisted => "PERSISTED",
            Self::ResponseSent => "RESPONSE_SENT",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// State of one in-flight negotiation.
///
/// Owns the target→rules map for its lifetime. Nothing here outlives the
/// negotiation except the persisted agreement.
#[derive(Debug)]
pub struct NegotiationSession {
    /// Id of the contract request message.
    pub correlation: MessageId,
    /// Requesting connector.
    pub counterpart: Uri,
    state: SessionState,
    request: ContractRequest,
    targets: BTreeMap<Uri, Vec<Rule>>,
    candidates: BTreeMap<Uri, Vec<ContractOffer>>,
    agreement: Option<ContractAgreement>,
    agreement_id: Option<AgreementId>,
}

impl NegotiationSession {
    /// Start a session for a decoded request.
    pub fn new(correlation: MessageId, counterpart: Uri, request: ContractRequest) -> Self {
        Self {
            correlation,
            counterpart,
            state: SessionState::Received,
            request,
            targets: BTreeMap::new(),
            candidates: BTreeMap::new(),
            agreement: None,
            agreement_id: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Requested rules grouped by target. Empty before validation.
    pub fn targets(&self) -> &BTreeMap<Uri, Vec<Rule>> {
        &self.targets
    }

    /// The request, with its end set once offers are matched.
    pub fn request(&self) -> &ContractRequest {
        &self.request
    }

    /// Agreement, once persisted.
    pub fn agreement(&self) -> Option<&ContractAgreement> {
        self.agreement.as_ref()
    }

    /// Local id of the persisted agreement.
    pub fn agreement_id(&self) -> Option<AgreementId> {
        self.agreement_id
    }

    fn enter(&self, expected: SessionState, next: SessionState) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(NegotiationError::AlreadyTerminal { state: self.state });
        }
        if self.state != expected {
            return Err(NegotiationError::InvalidTransition {
                from: self.state,
                to: next,
                reason: format!("{next} requires state {expected}"),
            });
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(
            correlation = %self.correlation,
            from = %self.state,
            to = %next,
            "negotiation transition"
        );
        self.state = next;
    }

    fn reject(&mut self, err: NegotiationError) -> NegotiationError {
        tracing::debug!(
            correlation = %self.correlation,
            from = %self.state,
            error = %err,
            "negotiation rejected"
        );
        self.state = SessionState::Rejected;
        err
    }

    /// RECEIVED → RULES_VALIDATED.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::EmptyRuleSet`] or
    /// [`NegotiationError::MissingTarget`]; the session is then rejected.
    pub fn validate_rules(&mut self) -> Result<(), NegotiationError> {
        self.enter(SessionState::Received, SessionState::RulesValidated)?;
        if self.request.rules.is_empty() {
            return Err(self.reject(NegotiationError::EmptyRuleSet));
        }
        if let Some(index) = first_rule_without_target(&self.request.rules) {
            return Err(self.reject(NegotiationError::MissingTarget { index }));
        }
        self.targets = self.request.target_rule_map();
        self.advance(SessionState::RulesValidated);
        Ok(())
    }

    /// RULES_VALIDATED → OFFERS_MATCHED.
    ///
    /// Keeps, per target, the offers valid at `now` that admit the
    /// counterpart.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::NoOffers`] for the first target left without
    /// candidates; the session is then rejected.
    pub fn match_offers(
        &mut self,
        catalog: &dyn OfferCatalog,
        now: DateTime<Utc>,
    ) -> Result<(), NegotiationError> {
        self.enter(SessionState::RulesValidated, SessionState::OffersMatched)?;
        let mut candidates = BTreeMap::new();
        let mut empty = None;
        for target in self.targets.keys() {
            let offers = retain_valid_dates(catalog.offers_for_target(target), now);
            let offers = retain_admitted(offers, &self.counterpart);
            if offers.is_empty() {
                empty = Some(target.clone());
                break;
            }
            candidates.insert(target.clone(), offers);
        }
        if let Some(target) = empty {
            return Err(self.reject(NegotiationError::NoOffers { target }));
        }
        self.candidates = candidates;
        self.advance(SessionState::OffersMatched);
        Ok(())
    }

    /// OFFERS_MATCHED → ACCEPTED.
    ///
    /// For each target the first candidate whose rules equal the requested
    /// rules wins. The contract ends with the earliest end among the
    /// winning offers.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::NoMatchingOffer`] for the first target without
    /// a match; the session is then rejected.
    pub fn decide(&mut self) -> Result<(), NegotiationError> {
        self.enter(SessionState::OffersMatched, SessionState::Accepted)?;
        let mut contract_end: Option<DateTime<Utc>> = None;
        let mut unmatched = None;
        for (target, rules) in &self.targets {
            let offers = self.candidates.get(target).map(Vec::as_slice).unwrap_or_default();
            match offers.iter().find(|offer| contracts_equal(rules, *offer)) {
                Some(offer) => {
                    contract_end = Some(contract_end.map_or(offer.end, |end| end.min(offer.end)));
                }
                None => {
                    tracing::debug!(
                        correlation = %self.correlation,
                        target = %target,
                        candidates = offers.len(),
                        "requested rules match no offer"
                    );
                    unmatched = Some(target.clone());
                    break;
                }
            }
        }
        if let Some(target) = unmatched {
            return Err(self.reject(NegotiationError::NoMatchingOffer { target }));
        }
        self.request.contract_end = contract_end;
        self.advance(SessionState::Accepted);
        Ok(())
    }

    /// ACCEPTED → PERSISTED.
    ///
    /// Builds the agreement under `agreement_uri`, saves it unconfirmed and
    /// links it to every requested target.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::PersistenceFailed`]; nothing stays stored and
    /// the session is rejected.
    pub fn persist(
        &mut self,
        ctx: &ConnectorContext,
        store: &dyn AgreementStore,
        agreement_uri: Uri,
        now: DateTime<Utc>,
        default_validity: TimeDelta,
    ) -> Result<AgreementId, NegotiationError> {
        self.enter(SessionState::Accepted, SessionState::Persisted)?;
        let agreement = ContractAgreement::from_request(
            ctx,
            agreement_uri,
            &self.request,
            &self.counterpart,
            now,
            default_validity,
        );
        let id = match store.save_agreement(&agreement) {
            Ok(id) => id,
            Err(e) => return Err(self.reject(NegotiationError::PersistenceFailed(e))),
        };
        let artifacts: Vec<Uri> = self.targets.keys().cloned().collect();
        if let Err(e) = store.link_artifacts_to_agreement(&artifacts, id) {
            if let Err(discard) = store.discard_agreement(id) {
                tracing::warn!(agreement = %id, error = %discard, "could not discard agreement");
            }
            return Err(self.reject(NegotiationError::PersistenceFailed(e)));
        }
        tracing::info!(
            correlation = %self.correlation,
            agreement = %agreement.id,
            consumer = %self.counterpart,
            targets = artifacts.len(),
            "agreement accepted"
        );
        self.agreement = Some(agreement);
        self.agreement_id = Some(id);
        self.advance(SessionState::Persisted);
        Ok(id)
    }

    /// PERSISTED → RESPONSE_SENT. Returns the agreement to send.
    pub fn respond(&mut self) -> Result<&ContractAgreement, NegotiationError> {
        self.enter(SessionState::Persisted, SessionState::ResponseSent)?;
        self.advance(SessionState::ResponseSent);
        self.agreement.as_ref().ok_or(NegotiationError::InvalidTransition {
            from: SessionState::Persisted,
            to: SessionState::ResponseSent,
            reason: "no agreement recorded".to_string(),
        })
    }
}
