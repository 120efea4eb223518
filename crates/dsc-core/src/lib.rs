#![deny(missing_docs)]

//! # dsc-core: Foundational Types for the Dataspace Connector
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `thiserror`,
//! `chrono`, `uuid` and `url` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for protocol identifiers.** A [`Uri`] naming a
//!    resource cannot be confused with a [`MessageId`] correlating a
//!    request/response pair or an [`AgreementId`] issued by the local store.
//!
//! 2. **UTC only.** The parsing helpers in [`temporal`] normalise every
//!    date to UTC. Policy evaluation compares against an explicitly passed
//!    instant, never an ambient clock.
//!
//! 3. **Explicit connector identity.** Message building reads the local
//!    connector id, model version and security token from a
//!    [`ConnectorContext`] handed in by the caller.
//!
//! 4. **Per-concern error enums.** [`ValidationError`], [`TemporalError`]
//!    and [`ConfigError`] are built with `thiserror`. No `Box<dyn Error>`
//!    and no `.unwrap()` outside tests.

pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{ConfigError, ConnectorConfig};
pub use context::ConnectorContext;
pub use error::{TemporalError, ValidationError};
pub use identity::{AgreementId, MessageId, Uri};
pub use temporal::{parse_date, parse_duration};
