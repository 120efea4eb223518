//! # Connector Context
//!
//! Immutable snapshot of the local connector's identity, handed explicitly
//! to every message-building and message-validating call.

use crate::identity::Uri;

/// The local connector identity as seen by the protocol engine.
///
/// The engine only reads these values. Rotating the security token means
/// building a new context.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorContext {
    /// Identifier of the local connector, used as sender and issuer.
    pub connector_id: Uri,
    /// Information-model version stamped on outbound headers.
    pub model_version: String,
    /// Model versions accepted on inbound headers.
    pub inbound_model_versions: Vec<String>,
    /// Current security token value attached to outbound headers.
    pub security_token: String,
}

impl ConnectorContext {
    /// Build a context that accepts only its own model version inbound.
    pub fn new(connector_id: Uri, model_version: impl Into<String>) -> Self {
        let model_version = model_version.into();
        Self {
            connector_id,
            inbound_model_versions: vec![model_version.clone()],
            model_version,
            security_token: String::new(),
        }
    }

    /// Replace the security token.
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = token.into();
        self
    }

    /// Replace the accepted inbound model versions.
    pub fn with_inbound_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inbound_model_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Whether an inbound header's model version is accepted.
    pub fn supports_inbound_version(&self, version: &str) -> bool {
        self.inbound_model_versions.iter().any(|v| v == version)
    }
}

impl std::fmt::Debug for ConnectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorContext")
            .field("connector_id", &self.connector_id)
            .field("model_version", &self.model_version)
            .field("inbound_model_versions", &self.inbound_model_versions)
            .field("security_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConnectorContext {
        ConnectorContext::new(Uri::new("https://consumer.example").unwrap(), "4.2.7")
    }

    #[test]
    fn new_accepts_own_version() {
        let c = ctx();
        assert!(c.supports_inbound_version("4.2.7"));
        assert!(!c.supports_inbound_version("3.0.0"));
    }

    #[test]
    fn inbound_versions_can_be_widened() {
        let c = ctx().with_inbound_versions(["4.0.0", "4.2.7"]);
        assert!(c.supports_inbound_version("4.0.0"));
    }

    #[test]
    fn debug_redacts_token() {
        let c = ctx().with_security_token("eyJhbGciOi.secret");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
