#![deny(missing_docs)]

//! # dsc-negotiation: Contract Negotiation
//!
//! Both sides of the contract protocol:
//!
//! - [`session`] and [`provider`]: the provider-side state machine that
//!   turns a contract request into a stored agreement or a rejection.
//! - [`handlers`]: one pipeline route per inbound message type.
//! - [`consumer`]: the consumer-side saga from contract request to
//!   downloaded data.
//! - [`collaborators`]: the catalog, store and resource seams, with
//!   in-memory implementations in [`memory`].
//!
//! Negotiations share no mutable state apart from the collaborators, which
//! are `Send + Sync` and may serve any number of sessions concurrently.

pub mod collaborators;
pub mod consumer;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod provider;
pub mod session;

pub use collaborators::{
    AgreementStore, EntityPersistence, EntityResolver, OfferCatalog, StoreError, StoredAgreement,
};
pub use consumer::{ContractSaga, SagaOutcome, SagaRequest};
pub use error::{NegotiationError, SagaError, SagaStep};
pub use handlers::ConnectorServices;
pub use memory::{MemoryAgreements, MemoryCatalog, MemoryExecution, MemoryResources};
pub use provider::ContractProvider;
pub use session::{NegotiationSession, SessionState};
