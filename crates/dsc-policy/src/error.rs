//! Policy evaluation errors.

use thiserror::Error;

use dsc_core::TemporalError;

use crate::pattern::PolicyPattern;

/// Errors raised while reading or enforcing a usage policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The rule does not carry the constraint shape its pattern requires,
    /// or a right operand cannot be interpreted.
    #[error("malformed policy: {reason}")]
    MalformedPolicy {
        /// What could not be read.
        reason: String,
    },

    /// A date or duration operand failed to parse.
    #[error("malformed policy operand: {0}")]
    Temporal(#[from] TemporalError),

    /// Access was denied by the policy.
    #[error("policy restriction: {0}")]
    Restricted(#[from] PolicyRestriction),
}

impl PolicyError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPolicy {
            reason: reason.into(),
        }
    }
}

/// Why the decision point denied access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyRestriction {
    /// The rule prohibits access.
    #[error("access is not allowed")]
    NotAllowed,

    /// The allowed number of accesses has been used up.
    #[error("access count reached: {accessed} of {max}")]
    AccessCountReached {
        /// Accesses recorded so far.
        accessed: u64,
        /// Ceiling computed from the rule.
        max: i64,
    },

    /// The current instant lies outside the allowed usage interval.
    #[error("access outside the allowed time interval")]
    OutsideInterval,

    /// The allowed usage duration since creation has elapsed.
    #[error("allowed usage duration exceeded")]
    DurationExceeded,

    /// The requesting connector is not the one the rule names.
    #[error("invalid consumer connector: {issuer}")]
    InvalidConsumer {
        /// The requesting connector.
        issuer: String,
    },

    /// The presented security profile does not match.
    #[error("invalid security profile")]
    InvalidSecurityProfile,

    /// No security profile was presented.
    #[error("missing security profile claim")]
    MissingSecurityProfile,

    /// The rule's pattern cannot be enforced.
    #[error("unrecognized policy pattern {0}")]
    Unrecognized(PolicyPattern),
}
