//! # Negotiation Errors
//!
//! [`NegotiationError`] is what the provider-side session fails with. It
//! converts into a [`HandlerError`] so the pipeline can answer with the
//! right rejection. [`SagaError`] is what the consumer-side saga returns to
//! its caller.

use thiserror::Error;

use dsc_core::{AgreementId, Uri};
use dsc_message::{HandlerError, MessageError, ResponseContent};
use dsc_policy::ContractSection;

use crate::collaborators::StoreError;
use crate::session::SessionState;

/// Failure of a provider-side negotiation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The request carries no rules.
    #[error("contract request contains no rules")]
    EmptyRuleSet,

    /// A rule has no target.
    #[error("rule at position {index} has no target")]
    MissingTarget {
        /// Position of the rule in the request.
        index: usize,
    },

    /// No offer survives filtering for a target.
    #[error("no contract offers for target {target}")]
    NoOffers {
        /// The target without offers.
        target: Uri,
    },

    /// The requested rules for a target match none of its offers.
    #[error("requested rules for target {target} match no offer")]
    NoMatchingOffer {
        /// The target that failed to match.
        target: Uri,
    },

    /// The agreement could not be persisted.
    #[error("could not persist agreement: {0}")]
    PersistenceFailed(#[source] StoreError),

    /// A step was invoked out of order.
    #[error("invalid negotiation transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Attempted target state.
        to: SessionState,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// The session has already finished.
    #[error("negotiation is in terminal state {state}")]
    AlreadyTerminal {
        /// The terminal state.
        state: SessionState,
    },
}

impl From<NegotiationError> for HandlerError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::EmptyRuleSet | NegotiationError::MissingTarget { .. } => {
                HandlerError::MalformedMessage(err.to_string())
            }
            NegotiationError::NoOffers { .. } => HandlerError::NotFound(err.to_string()),
            NegotiationError::NoMatchingOffer { .. } => {
                HandlerError::ContractRejected(err.to_string())
            }
            NegotiationError::PersistenceFailed(_)
            | NegotiationError::InvalidTransition { .. }
            | NegotiationError::AlreadyTerminal { .. } => HandlerError::Internal(err.to_string()),
        }
    }
}

/// Round-trip of the consumer-side saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    /// Contract request, expecting an agreement.
    ContractRequest,
    /// Agreement echo, expecting a processed-notification.
    AgreementConfirmation,
    /// Description request for one resource.
    Description,
    /// Artifact request for one artifact.
    ArtifactRequest,
}

impl SagaStep {
    /// The canonical string name of this step.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractRequest => "CONTRACT_REQUEST",
            Self::AgreementConfirmation => "AGREEMENT_CONFIRMATION",
            Self::Description => "DESCRIPTION",
            Self::ArtifactRequest => "ARTIFACT_REQUEST",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the consumer-side saga.
///
/// Every variant aborts the saga. Artifact download failures never
/// surface here.
#[derive(Error, Debug)]
pub enum SagaError {
    /// The caller's input cannot start a negotiation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The counterpart answered with something other than the expected
    /// reply. Carries the reply content for the caller.
    #[error("unexpected response at {step}: {content}")]
    UnexpectedResponse {
        /// Step that received the reply.
        step: SagaStep,
        /// Type, rejection reason and payload of the reply.
        content: ResponseContent,
    },

    /// The received agreement differs from the request.
    #[error("received agreement differs from request in {0}")]
    AgreementMismatch(ContractSection),

    /// The store refused to confirm the agreement.
    #[error("agreement {0} could not be confirmed")]
    UnconfirmedAgreement(AgreementId),

    /// A local store call failed.
    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),

    /// Sending or decoding failed below the protocol.
    #[error(transparent)]
    Message(MessageError),
}

impl SagaError {
    /// Reply content to hand to the caller, for protocol-level aborts.
    pub fn response_content(&self) -> Option<&ResponseContent> {
        match self {
            Self::UnexpectedResponse { content, .. } => Some(content),
            _ => None,
        }
    }

    pub(crate) fn at(step: SagaStep, err: MessageError) -> Self {
        match err {
            MessageError::ResponseTypeMismatch { content, .. } => {
                Self::UnexpectedResponse { step, content }
            }
            other => Self::Message(other),
        }
    }
}
