//! # Collaborator Traits
//!
//! The negotiation engine never touches storage or the catalog directly.
//! It talks to these traits, which a deployment backs with its own
//! repositories and which [`crate::memory`] backs with in-process maps.
//!
//! All collaborators are synchronous and `Send + Sync`. Persistence follows
//! create-or-fail: a failed call leaves nothing behind.

use serde_json::Value;
use thiserror::Error;

use dsc_core::{AgreementId, Uri};
use dsc_policy::{ContractAgreement, ContractOffer};

/// Failure of a persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No entity with the given identifier.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity looked up.
        entity: &'static str,
        /// Identifier that missed.
        id: String,
    },

    /// An entity with the same identifier already exists.
    #[error("{entity} {id} already exists")]
    Conflict {
        /// Kind of entity written.
        entity: &'static str,
        /// Identifier that collided.
        id: String,
    },

    /// The backing store refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ── Catalog ──────────────────────────────────────────────────────────

/// Published offers, looked up by target.
pub trait OfferCatalog: Send + Sync {
    /// Every offer published for `target`, unfiltered.
    fn offers_for_target(&self, target: &Uri) -> Vec<ContractOffer>;
}

// ── Agreements ───────────────────────────────────────────────────────

/// An agreement as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAgreement {
    /// Local identifier.
    pub id: AgreementId,
    /// The agreement document. Never mutated after confirmation.
    pub agreement: ContractAgreement,
    /// Whether both parties have confirmed.
    pub confirmed: bool,
    /// Artifacts the agreement grants access to.
    pub artifacts: Vec<Uri>,
}

/// Persistence of agreements and their artifact links.
pub trait AgreementStore: Send + Sync {
    /// Persist a new, unconfirmed agreement.
    fn save_agreement(&self, agreement: &ContractAgreement) -> Result<AgreementId, StoreError>;

    /// Mark an agreement confirmed. `Ok(false)` when it cannot be.
    fn confirm_agreement(&self, id: AgreementId) -> Result<bool, StoreError>;

    /// Link artifacts to an agreement. Existing links are kept.
    fn link_artifacts_to_agreement(&self, artifacts: &[Uri], id: AgreementId)
        -> Result<(), StoreError>;

    /// Remove an agreement that never completed persistence.
    fn discard_agreement(&self, id: AgreementId) -> Result<(), StoreError>;

    /// Look up by local id.
    fn get(&self, id: AgreementId) -> Option<StoredAgreement>;

    /// Look up by the agreement document's URI.
    fn find_by_uri(&self, uri: &Uri) -> Option<StoredAgreement>;
}

// ── Resources ────────────────────────────────────────────────────────

/// Read access to the local connector's own resources.
pub trait EntityResolver: Send + Sync {
    /// Description of a resource, representation, artifact or catalog.
    fn description(&self, element: &Uri) -> Option<Value>;

    /// Self-description of the local connector.
    fn self_description(&self) -> Value;

    /// Data of a local artifact. Counts as one access.
    fn artifact_data(&self, artifact: &Uri) -> Result<String, StoreError>;
}

/// Write access for data received from remote connectors.
pub trait EntityPersistence: Send + Sync {
    /// Store a remote resource description and its requested artifacts.
    fn save_metadata(
        &self,
        provider: &Uri,
        resource: &Uri,
        description: &Value,
        artifacts: &[Uri],
    ) -> Result<(), StoreError>;

    /// Store downloaded artifact data.
    fn save_data(&self, artifact: &Uri, data: &str) -> Result<(), StoreError>;

    /// Apply a resource-update notification.
    fn update_resource(&self, resource: &Uri, description: &Value) -> Result<(), StoreError>;

    /// Apply a connector-update notification.
    fn update_connector(&self, connector: &Uri, description: &Value) -> Result<(), StoreError>;
}
