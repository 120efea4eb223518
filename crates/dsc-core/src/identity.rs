//! # Identifier Newtypes
//!
//! Every party, resource, artifact, contract and rule in the dataspace is
//! named by an absolute URI. Message ids correlate a request with its
//! response; agreement ids are issued by the local persistence collaborator.
//!
//! ## Validation
//!
//! [`Uri`] validates at construction time with the `url` parser. UUID-based
//! identifiers are always valid by construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// An absolute URI identifying a connector, resource, artifact or contract.
///
/// Serializes transparently as its string form. Deserialization re-runs
/// validation so a payload cannot smuggle in a malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(String);

impl Uri {
    /// Create a URI from a string, validating that it is absolute.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyUri`] for blank input and
    /// [`ValidationError::InvalidUri`] when the value does not parse.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUri);
        }
        url::Url::parse(trimmed).map_err(|e| ValidationError::InvalidUri {
            value: s.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self(trimmed.to_string()))
    }

    /// Access the URI string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a path segment, e.g. to derive a child resource URI.
    pub fn join_segment(&self, segment: &str) -> Result<Self, ValidationError> {
        let base = self.0.trim_end_matches('/');
        Self::new(format!("{base}/{segment}"))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Uri {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Uri {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0
    }
}

/// Identifier of a single protocol message.
///
/// Responses echo the request's id as their correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new random message identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a message identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local identifier of a persisted contract agreement.
///
/// Distinct from the agreement's protocol URI: the URI travels on the wire,
/// this id is what the local store hands back from a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementId(Uuid);

impl AgreementId {
    /// Create a new random agreement identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an agreement identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
