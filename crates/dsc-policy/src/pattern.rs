//! # Rule Classifier
//!
//! Maps a [`Rule`] to the usage-control pattern it encodes through a fixed
//! decision tree. Classification is total: shapes outside the tree yield
//! [`PolicyPattern::Unrecognized`] instead of an error.
//!
//! The pattern is always recomputed from the rule and never stored as a
//! source of truth.

use serde::{Deserialize, Serialize};

use crate::rule::{Action, BinaryOperator, LeftOperand, Rule, RuleKind};

/// Recognized usage-control pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyPattern {
    /// Unrestricted use.
    ProvideAccess,
    /// No use.
    ProhibitAccess,
    /// Use at most N times.
    NTimesUsage,
    /// Use for a duration after creation.
    DurationUsage,
    /// Use within a time interval.
    UsageDuringInterval,
    /// Use within an interval, then delete.
    UsageUntilDeletion,
    /// Use and log each access.
    UsageLogging,
    /// Use and notify an endpoint of each access.
    UsageNotification,
    /// Use only by a named connector.
    ConnectorRestrictedUsage,
    /// Use only with a given security profile.
    SecurityProfileRestrictedUsage,
    /// The rule does not match any known pattern.
    Unrecognized,
}

impl PolicyPattern {
    /// The canonical string name of this pattern.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvideAccess => "PROVIDE_ACCESS",
            Self::ProhibitAccess => "PROHIBIT_ACCESS",
            Self::NTimesUsage => "N_TIMES_USAGE",
            Self::DurationUsage => "DURATION_USAGE",
            Self::UsageDuringInterval => "USAGE_DURING_INTERVAL",
            Self::UsageUntilDeletion => "USAGE_UNTIL_DELETION",
            Self::UsageLogging => "USAGE_LOGGING",
            Self::UsageNotification => "USAGE_NOTIFICATION",
            Self::ConnectorRestrictedUsage => "CONNECTOR_RESTRICTED_USAGE",
            Self::SecurityProfileRestrictedUsage => "SECURITY_PROFILE_RESTRICTED_USAGE",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl std::fmt::Display for PolicyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a rule.
///
/// Obligations on their own are not classified: duties only have meaning
/// through the permission that owns them.
pub fn classify(rule: &Rule) -> PolicyPattern {
    match rule.kind {
        RuleKind::Prohibition => PolicyPattern::ProhibitAccess,
        RuleKind::Obligation => PolicyPattern::Unrecognized,
        RuleKind::Permission => classify_permission(rule),
    }
}

fn classify_permission(rule: &Rule) -> PolicyPattern {
    let has_post_duty = !rule.post_duties.is_empty();

    match rule.constraints.as_slice() {
        [] => match rule.post_duties.first() {
            None => PolicyPattern::ProvideAccess,
            Some(duty) => match duty.actions.first() {
                Some(Action::Notify) => PolicyPattern::UsageNotification,
                Some(Action::Log) => PolicyPattern::UsageLogging,
                _ => PolicyPattern::Unrecognized,
            },
        },
        [only] => match (&only.left_operand, &only.operator) {
            (LeftOperand::Count, _) => PolicyPattern::NTimesUsage,
            (LeftOperand::ElapsedTime, _) => PolicyPattern::DurationUsage,
            (LeftOperand::System, BinaryOperator::SameAs) => {
                PolicyPattern::ConnectorRestrictedUsage
            }
            (LeftOperand::SecurityLevel, BinaryOperator::Eq) => {
                PolicyPattern::SecurityProfileRestrictedUsage
            }
            _ => PolicyPattern::Unrecognized,
        },
        _ if has_post_duty => PolicyPattern::UsageUntilDeletion,
        _ => PolicyPattern::UsageDuringInterval,
    }
}
