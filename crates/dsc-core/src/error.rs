//! # Error Hierarchy
//!
//! Structured error types shared by the connector crates, built with
//! `thiserror`. Subsystem crates define their own enums for protocol and
//! policy failures and wrap the variants here with `#[from]`.

use thiserror::Error;

/// Validation errors for identifier newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The URI was empty or whitespace only.
    #[error("URI must be non-empty")]
    EmptyUri,

    /// The URI does not parse as an absolute URI.
    #[error("invalid URI \"{value}\": {reason}")]
    InvalidUri {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Failures while interpreting date and duration literals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemporalError {
    /// The value is not an RFC 3339 / ISO 8601 date-time.
    #[error("invalid date \"{value}\": {reason}")]
    InvalidDate {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The value is not an ISO 8601 `PnDTnHnMn.nS` duration.
    #[error("invalid duration \"{value}\": {reason}")]
    InvalidDuration {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}
