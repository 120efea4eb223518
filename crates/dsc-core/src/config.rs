//! Connector configuration.
//!
//! Loaded from `DSC_*` environment variables with defaults for everything
//! except the connector identifier. Explicit construction is available for
//! tests and embedding.

use crate::context::ConnectorContext;
use crate::identity::Uri;

/// Default information-model version for outbound messages.
pub const DEFAULT_MODEL_VERSION: &str = "4.2.7";

/// Default agreement validity in days when no offer end applies.
pub const DEFAULT_CONTRACT_DAYS: u32 = 365;

/// Configuration of the local connector.
///
/// Custom `Debug` implementation redacts the `security_token` field.
#[derive(Clone)]
pub struct ConnectorConfig {
    /// Identifier of the local connector.
    pub connector_id: Uri,
    /// Outbound information-model version.
    pub model_version: String,
    /// Accepted inbound model versions.
    pub inbound_model_versions: Vec<String>,
    /// Current security token value.
    pub security_token: String,
    /// Agreement validity in days when no offer end applies.
    pub default_contract_days: u32,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("connector_id", &self.connector_id)
            .field("model_version", &self.model_version)
            .field("inbound_model_versions", &self.inbound_model_versions)
            .field("security_token", &"[REDACTED]")
            .field("default_contract_days", &self.default_contract_days)
            .finish()
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DSC_CONNECTOR_ID` (required)
    /// - `DSC_MODEL_VERSION` (default: `4.2.7`)
    /// - `DSC_INBOUND_MODEL_VERSIONS` (comma-separated, default: the model version)
    /// - `DSC_SECURITY_TOKEN` (default: empty)
    /// - `DSC_DEFAULT_CONTRACT_DAYS` (default: 365)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_id = lookup("DSC_CONNECTOR_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingConnectorId)?;
        let connector_id = Uri::new(raw_id.as_str()).map_err(|e| ConfigError::InvalidUri {
            var: "DSC_CONNECTOR_ID".to_string(),
            reason: e.to_string(),
        })?;

        let model_version = lookup("DSC_MODEL_VERSION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string());

        let inbound_model_versions = lookup("DSC_INBOUND_MODEL_VERSIONS")
            .map(|raw| split_versions(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec![model_version.clone()]);

        let default_contract_days = match lookup("DSC_DEFAULT_CONTRACT_DAYS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "DSC_DEFAULT_CONTRACT_DAYS".to_string(),
                    value: raw.clone(),
                })?,
            None => DEFAULT_CONTRACT_DAYS,
        };

        Ok(Self {
            connector_id,
            model_version,
            inbound_model_versions,
            security_token: lookup("DSC_SECURITY_TOKEN").unwrap_or_default(),
            default_contract_days,
        })
    }

    /// Create a configuration for a connector with defaults for the rest.
    pub fn for_connector(connector_id: Uri) -> Self {
        Self {
            connector_id,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            inbound_model_versions: vec![DEFAULT_MODEL_VERSION.to_string()],
            security_token: String::new(),
            default_contract_days: DEFAULT_CONTRACT_DAYS,
        }
    }

    /// The identity snapshot threaded through message building.
    pub fn context(&self) -> ConnectorContext {
        ConnectorContext::new(self.connector_id.clone(), self.model_version.clone())
            .with_inbound_versions(self.inbound_model_versions.iter().cloned())
            .with_security_token(self.security_token.clone())
    }
}

fn split_versions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `DSC_CONNECTOR_ID` is unset or blank.
    #[error("DSC_CONNECTOR_ID environment variable is required")]
    MissingConnectorId,

    /// A URI-valued variable does not parse.
    #[error("invalid URI for {var}: {reason}")]
    InvalidUri {
        /// Variable name.
        var: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A numeric variable does not parse.
    #[error("invalid number for {var}: \"{value}\"")]
    InvalidNumber {
        /// Variable name.
        var: String,
        /// The rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_connector_id() {
        let err = ConnectorConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConnectorId));
    }

    #[test]
    fn blank_connector_id_is_missing() {
        let err = ConnectorConfig::from_lookup(lookup(&[("DSC_CONNECTOR_ID", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConnectorId));
    }

    #[test]
    fn rejects_relative_connector_id() {
        let err =
            ConnectorConfig::from_lookup(lookup(&[("DSC_CONNECTOR_ID", "connector")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUri { .. }));
    }

    #[test]
    fn defaults_apply() {
        let cfg =
            ConnectorConfig::from_lookup(lookup(&[("DSC_CONNECTOR_ID", "https://c.example")]))
                .unwrap();
        assert_eq!(cfg.model_version, DEFAULT_MODEL_VERSION);
        assert_eq!(cfg.inbound_model_versions, vec![DEFAULT_MODEL_VERSION]);
        assert_eq!(cfg.default_contract_days, 365);
        assert!(cfg.security_token.is_empty());
    }

    #[test]
    fn inbound_versions_are_split_and_trimmed() {
        let cfg = ConnectorConfig::from_lookup(lookup(&[
            ("DSC_CONNECTOR_ID", "https://c.example"),
            ("DSC_INBOUND_MODEL_VERSIONS", "4.0.0, 4.1.0 ,,4.2.7"),
        ]))
        .unwrap();
        assert_eq!(cfg.inbound_model_versions, vec!["4.0.0", "4.1.0", "4.2.7"]);
    }

    #[test]
    fn invalid_contract_days_is_an_error() {
        let err = ConnectorConfig::from_lookup(lookup(&[
            ("DSC_CONNECTOR_ID", "https://c.example"),
            ("DSC_DEFAULT_CONTRACT_DAYS", "a year"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ConnectorConfig::from_lookup(lookup(&[
            ("DSC_CONNECTOR_ID", "https://c.example"),
            ("DSC_SECURITY_TOKEN", "top-secret-dat"),
        ]))
        .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("top-secret-dat"));
    }

    #[test]
    fn context_carries_identity() {
        let cfg = ConnectorConfig::for_connector(Uri::new("https://c.example").unwrap());
        let ctx = cfg.context();
        assert_eq!(ctx.connector_id.as_str(), "https://c.example");
        assert!(ctx.supports_inbound_version(DEFAULT_MODEL_VERSION));
    }

    #[test]
    fn from_env_without_id_fails() {
        std::env::remove_var("DSC_CONNECTOR_ID");
        assert!(ConnectorConfig::from_env().is_err());
    }
}
