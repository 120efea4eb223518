//! # Provider-Side Negotiation
//!
//! [`ContractProvider`] drives a [`NegotiationSession`] from RECEIVED to
//! RESPONSE_SENT against the catalog and agreement store. Agreement URIs
//! are minted under the local connector id as `<connector>/agreements/<uuid>`.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use dsc_core::config::DEFAULT_CONTRACT_DAYS;
use dsc_core::{ConnectorConfig, ConnectorContext, Uri};
use dsc_policy::ContractAgreement;

use crate::collaborators::{AgreementStore, OfferCatalog, StoreError};
use crate::error::NegotiationError;
use crate::session::NegotiationSession;

/// Runs provider-side negotiations.
#[derive(Clone)]
pub struct ContractProvider {
    ctx: ConnectorContext,
    catalog: Arc<dyn OfferCatalog>,
    agreements: Arc<dyn AgreementStore>,
    default_validity: TimeDelta,
}

impl std::fmt::Debug for ContractProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractProvider")
            .field("connector", &self.ctx.connector_id)
            .field("default_validity", &self.default_validity)
            .finish_non_exhaustive()
    }
}

impl ContractProvider {
    /// Create a provider for the given identity and collaborators.
    pub fn new(
        ctx: ConnectorContext,
        catalog: Arc<dyn OfferCatalog>,
        agreements: Arc<dyn AgreementStore>,
    ) -> Self {
        Self {
            ctx,
            catalog,
            agreements,
            default_validity: TimeDelta::days(i64::from(DEFAULT_CONTRACT_DAYS)),
        }
    }

    /// Create a provider from loaded configuration.
    pub fn from_config(
        config: &ConnectorConfig,
        catalog: Arc<dyn OfferCatalog>,
        agreements: Arc<dyn AgreementStore>,
    ) -> Self {
        Self::new(config.context(), catalog, agreements)
            .with_default_validity(TimeDelta::days(i64::from(config.default_contract_days)))
    }

    /// Override the fallback agreement validity.
    pub fn with_default_validity(mut self, validity: TimeDelta) -> Self {
        self.default_validity = validity;
        self
    }

    /// Run `session` to completion at `now`.
    ///
    /// On success the session is in RESPONSE_SENT and the returned
    /// agreement is stored, unconfirmed and linked to its targets. On
    /// failure the session is REJECTED and nothing is stored.
    pub fn negotiate(
        &self,
        session: &mut NegotiationSession,
        now: DateTime<Utc>,
    ) -> Result<ContractAgreement, NegotiationError> {
        session.validate_rules()?;
        session.match_offers(self.catalog.as_ref(), now)?;
        session.decide()?;
        let uri = self.agreement_uri()?;
        session.persist(&self.ctx, self.agreements.as_ref(), uri, now, self.default_validity)?;
        session.respond().cloned()
    }

    fn agreement_uri(&self) -> Result<Uri, NegotiationError> {
        self.ctx
            .connector_id
            .join_segment(&format!("agreements/{}", Uuid::new_v4()))
            .map_err(|e| NegotiationError::PersistenceFailed(StoreError::Unavailable(e.to_string())))
    }
}
