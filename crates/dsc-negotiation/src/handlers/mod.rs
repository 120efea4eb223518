//! # Message Handlers
//!
//! One route per inbound message type, registered into a [`Pipeline`]:
//!
//! | Message | Reply |
//! |---|---|
//! | description request | description response |
//! | contract request | contract agreement |
//! | contract agreement | processed-notification |
//! | artifact request | artifact response |
//! | resource update | processed-notification |
//! | connector update | processed-notification |

use std::sync::Arc;

use chrono::TimeDelta;
use serde_json::Value;

use dsc_core::{ConnectorConfig, ConnectorContext};
use dsc_message::{HandlerError, MessageCodec, Pipeline};
use dsc_policy::DecisionPoint;

use crate::collaborators::{
    AgreementStore, EntityPersistence, EntityResolver, OfferCatalog, StoreError,
};

pub mod artifact;
pub mod contract;
pub mod description;
pub mod update;

/// Everything the provider-side handlers need.
#[derive(Clone)]
pub struct ConnectorServices {
    /// Local identity.
    pub ctx: ConnectorContext,
    /// Payload codec.
    pub codec: Arc<dyn MessageCodec>,
    /// Offer lookup.
    pub catalog: Arc<dyn OfferCatalog>,
    /// Agreement persistence.
    pub agreements: Arc<dyn AgreementStore>,
    /// Local resources.
    pub resolver: Arc<dyn EntityResolver>,
    /// Remote metadata and data.
    pub persistence: Arc<dyn EntityPersistence>,
    /// Usage enforcement on artifact access.
    pub decision: DecisionPoint,
    /// Agreement validity when no offer end applies.
    pub default_validity: TimeDelta,
}

impl std::fmt::Debug for ConnectorServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorServices")
            .field("ctx", &self.ctx)
            .field("default_validity", &self.default_validity)
            .finish_non_exhaustive()
    }
}

impl ConnectorServices {
    /// Take identity and default validity from configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn from_config(
        config: &ConnectorConfig,
        codec: Arc<dyn MessageCodec>,
        catalog: Arc<dyn OfferCatalog>,
        agreements: Arc<dyn AgreementStore>,
        resolver: Arc<dyn EntityResolver>,
        persistence: Arc<dyn EntityPersistence>,
        decision: DecisionPoint,
    ) -> Self {
        Self {
            ctx: config.context(),
            codec,
            catalog,
            agreements,
            resolver,
            persistence,
            decision,
            default_validity: TimeDelta::days(i64::from(config.default_contract_days)),
        }
    }

    /// A pipeline with every handler registered.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.ctx.clone(), self.codec.clone())
            .with_route(description::route(self))
            .with_route(contract::request_route(self))
            .with_route(contract::agreement_route(self))
            .with_route(artifact::route(self))
            .with_route(update::resource_route(self))
            .with_route(update::connector_route(self))
    }
}

fn internal(err: impl std::fmt::Display) -> HandlerError {
    HandlerError::Internal(err.to_string())
}

fn store_failure(err: StoreError) -> HandlerError {
    match err {
        StoreError::NotFound { .. } => HandlerError::NotFound(err.to_string()),
        other => internal(other),
    }
}

/// `@id`, or `id`, of a JSON-LD style payload.
fn payload_id(value: &Value) -> Option<&str> {
    value
        .get("@id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
}
