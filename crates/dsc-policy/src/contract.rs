//! # Contract Documents
//!
//! Offers published by a provider, requests proposed by a consumer and the
//! agreements both sides confirm. Each carries a flat rule list; the
//! permission, prohibition and obligation views are partitions of it by
//! [`RuleKind`].
//!
//! Building a request or agreement stamps the local connector identity
//! from an explicit [`ConnectorContext`].

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use dsc_core::{ConnectorContext, Uri};

use crate::rule::{Rule, RuleKind};

/// Access to the rule partitions of a contract document.
pub trait Contract {
    /// Every rule of the contract.
    fn rules(&self) -> &[Rule];

    /// Rules of one kind, in declaration order.
    fn rules_of_kind(&self, kind: RuleKind) -> Vec<&Rule> {
        self.rules().iter().filter(|r| r.kind == kind).collect()
    }

    /// Permissions.
    fn permissions(&self) -> Vec<&Rule> {
        self.rules_of_kind(RuleKind::Permission)
    }

    /// Prohibitions.
    fn prohibitions(&self) -> Vec<&Rule> {
        self.rules_of_kind(RuleKind::Prohibition)
    }

    /// Obligations.
    fn obligations(&self) -> Vec<&Rule> {
        self.rules_of_kind(RuleKind::Obligation)
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<Uri>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => Uri::new(s).map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// A bare rule list, e.g. the rules requested for one target.
impl Contract for Vec<Rule> {
    fn rules(&self) -> &[Rule] {
        self
    }
}

// ── Offer ────────────────────────────────────────────────────────────

/// Terms a provider offers for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractOffer {
    /// Offer identifier.
    pub id: Uri,
    /// Offering connector.
    pub provider: Uri,
    /// Connector the offer is restricted to. Absent or blank admits any.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub consumer: Option<Uri>,
    /// Start of the validity window (exclusive).
    pub start: DateTime<Utc>,
    /// End of the validity window (exclusive).
    pub end: DateTime<Utc>,
    /// Offered rules.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl ContractOffer {
    /// Whether `now` lies strictly inside the validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now > self.start && now < self.end
    }

    /// Whether the consumer restriction admits `issuer`.
    pub fn admits(&self, issuer: &Uri) -> bool {
        self.consumer.as_ref().map_or(true, |c| c == issuer)
    }
}

impl Contract for ContractOffer {
    fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Keep the offers whose validity window contains `now`.
pub fn retain_valid_dates(offers: Vec<ContractOffer>, now: DateTime<Utc>) -> Vec<ContractOffer> {
    offers.into_iter().filter(|o| o.is_valid_at(now)).collect()
}

/// Keep the offers that admit `issuer`.
pub fn retain_admitted(offers: Vec<ContractOffer>, issuer: &Uri) -> Vec<ContractOffer> {
    offers.into_iter().filter(|o| o.admits(issuer)).collect()
}

// ── Request ──────────────────────────────────────────────────────────

/// Terms a consumer proposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRequest {
    /// Request identifier.
    pub id: Uri,
    /// Requesting connector, when stamped.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub consumer: Option<Uri>,
    /// Proposed rules across all targets.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Proposed end of the contract. The provider overwrites it with the
    /// matched offer's end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_end: Option<DateTime<Utc>>,
}

impl ContractRequest {
    /// Build a request from caller-supplied rules, stamping the local
    /// connector as consumer and as assignee of every rule.
    pub fn build(ctx: &ConnectorContext, id: Uri, rules: Vec<Rule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.assignee = vec![ctx.connector_id.clone()];
                rule
            })
            .collect();
        Self {
            id,
            consumer: Some(ctx.connector_id.clone()),
            rules,
            contract_end: None,
        }
    }

    /// Group the rules by target.
    ///
    /// Rules without a target are skipped; validate targets first.
    pub fn target_rule_map(&self) -> BTreeMap<Uri, Vec<Rule>> {
        target_rule_map(&self.rules)
    }
}

impl Contract for ContractRequest {
    fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Group rules by target, skipping rules without one.
pub fn target_rule_map(rules: &[Rule]) -> BTreeMap<Uri, Vec<Rule>> {
    let mut map: BTreeMap<Uri, Vec<Rule>> = BTreeMap::new();
    for rule in rules {
        if let Some(target) = rule.target.as_ref() {
            map.entry(target.clone()).or_default().push(rule.clone());
        }
    }
    map
}

/// Index of the first rule without a non-blank target.
pub fn first_rule_without_target(rules: &[Rule]) -> Option<usize> {
    rules.iter().position(|r| !r.has_target())
}

// ── Agreement ────────────────────────────────────────────────────────

/// Terms both parties have agreed on.
///
/// Confirmation status is tracked by the store that owns the agreement, not
/// by the document. The document is never mutated after confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAgreement {
    /// Agreement identifier.
    pub id: Uri,
    /// Providing connector.
    pub provider: Uri,
    /// Consuming connector.
    pub consumer: Uri,
    /// Agreed rules.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// When the agreement was made.
    pub contract_date: DateTime<Utc>,
    /// Start of validity.
    pub contract_start: DateTime<Utc>,
    /// End of validity.
    pub contract_end: DateTime<Utc>,
}

impl ContractAgreement {
    /// Build an agreement from an accepted request.
    ///
    /// The local connector becomes provider and assigner of every rule, the
    /// issuer of the request becomes consumer. The contract runs from `now`
    /// until the request's end, or `default_validity` from `now` when the
    /// request carries none.
    pub fn from_request(
        ctx: &ConnectorContext,
        id: Uri,
        request: &ContractRequest,
        issuer: &Uri,
        now: DateTime<Utc>,
        default_validity: TimeDelta,
    ) -> Self {
        let rules = request
            .rules
            .iter()
            .cloned()
            .map(|mut rule| {
                rule.assigner = vec![ctx.connector_id.clone()];
                rule
            })
            .collect();
        Self {
            id,
            provider: ctx.connector_id.clone(),
            consumer: issuer.clone(),
            rules,
            contract_date: now,
            contract_start: now,
            contract_end: request.contract_end.unwrap_or(now + default_validity),
        }
    }

    /// Whether the agreement's end has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.contract_end < now
    }

    /// Rules whose target is `target`.
    pub fn rules_for_target(&self, target: &Uri) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.target.as_ref() == Some(target))
            .collect()
    }

    /// Distinct targets of the agreed rules, in first-seen order.
    pub fn targets(&self) -> Vec<Uri> {
        let mut out: Vec<Uri> = Vec::new();
        for target in self.rules.iter().filter_map(|r| r.target.as_ref()) {
            if !out.contains(target) {
                out.push(target.clone());
            }
        }
        out
    }
}

impl Contract for ContractAgreement {
    fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
