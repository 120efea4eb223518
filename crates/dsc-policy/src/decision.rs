//! # Usage Decision Point
//!
//! Enforces agreed rules when data is accessed. Each rule is classified and
//! the pattern decides what is checked: interval, duration since creation,
//! access count, requesting connector or security profile. Logging and
//! notification patterns delegate to a [`UsageExecution`] collaborator and
//! allow access even when that side effect fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use dsc_core::Uri;

use crate::error::{PolicyError, PolicyRestriction};
use crate::monitor;
use crate::pattern::{classify, PolicyPattern};
use crate::rule::Rule;

/// Usage information about a local resource.
pub trait UsageInformation: Send + Sync {
    /// How often the target has been accessed.
    fn access_count(&self, target: &Uri) -> u64;

    /// When the target was created locally, if known.
    fn creation_date(&self, target: &Uri) -> Option<DateTime<Utc>>;
}

/// Side effects some patterns require on access.
pub trait UsageExecution: Send + Sync {
    /// Record an access in the usage log.
    fn log_access(&self, target: &Uri, agreement: &Uri) -> Result<(), ExecutionFailure>;

    /// Notify `endpoint` about an access.
    fn notify_access(&self, endpoint: &str, target: &Uri) -> Result<(), ExecutionFailure>;
}

/// A logging or notification side effect could not be carried out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("policy execution failed: {reason}")]
pub struct ExecutionFailure {
    /// Diagnostic.
    pub reason: String,
}

/// Who is accessing what, under which agreement, and when.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    /// Accessed resource.
    pub target: &'a Uri,
    /// Requesting connector.
    pub issuer: &'a Uri,
    /// Security profile the requester presented.
    pub security_profile: Option<&'a str>,
    /// Agreement the access is made under.
    pub agreement: &'a Uri,
    /// Evaluation instant.
    pub now: DateTime<Utc>,
}

/// Enforces classified rules against an access.
#[derive(Clone)]
pub struct DecisionPoint {
    information: Arc<dyn UsageInformation>,
    execution: Arc<dyn UsageExecution>,
}

impl std::fmt::Debug for DecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPoint").finish_non_exhaustive()
    }
}

impl DecisionPoint {
    /// Create a decision point over the given collaborators.
    pub fn new(information: Arc<dyn UsageInformation>, execution: Arc<dyn UsageExecution>) -> Self {
        Self {
            information,
            execution,
        }
    }

    /// Enforce every rule, stopping at the first denial.
    pub fn enforce_all<'r, I>(&self, rules: I, access: &AccessContext<'_>) -> Result<(), PolicyError>
    where
        I: IntoIterator<Item = &'r Rule>,
    {
        for rule in rules {
            self.enforce(rule, access)?;
        }
        Ok(())
    }

    /// Enforce one rule and return the pattern it was enforced as.
    pub fn enforce(&self, rule: &Rule, access: &AccessContext<'_>) -> Result<PolicyPattern, PolicyError> {
        let pattern = classify(rule);
        match pattern {
            PolicyPattern::ProvideAccess => {}
            PolicyPattern::ProhibitAccess => return Err(PolicyRestriction::NotAllowed.into()),
            PolicyPattern::UsageDuringInterval | PolicyPattern::UsageUntilDeletion => {
                let interval = monitor::time_interval(rule)?;
                if !interval.contains(access.now) {
                    tracing::warn!(target_uri = %access.target, ?interval, "access outside time interval");
                    return Err(PolicyRestriction::OutsideInterval.into());
                }
            }
            PolicyPattern::DurationUsage => self.check_duration(rule, access)?,
            PolicyPattern::NTimesUsage => {
                let max = monitor::max_access_count(rule)?;
                let accessed = self.information.access_count(access.target);
                if i64::try_from(accessed).map_or(true, |n| n >= max) {
                    tracing::debug!(target_uri = %access.target, accessed, max, "access number reached");
                    return Err(PolicyRestriction::AccessCountReached { accessed, max }.into());
                }
            }
            PolicyPattern::UsageLogging => {
                if let Err(e) = self.execution.log_access(access.target, access.agreement) {
                    tracing::debug!(target_uri = %access.target, error = %e, "usage logging failed, access granted");
                }
            }
            PolicyPattern::UsageNotification => {
                let endpoint = rule
                    .post_duties
                    .first()
                    .and_then(|duty| monitor::endpoint(duty))
                    .or_else(|| monitor::endpoint(rule))
                    .unwrap_or_default();
                if let Err(e) = self.execution.notify_access(endpoint, access.target) {
                    tracing::debug!(target_uri = %access.target, error = %e, "usage notification failed, access granted");
                }
            }
            PolicyPattern::ConnectorRestrictedUsage => {
                let allowed = monitor::endpoint(rule).unwrap_or_default();
                if allowed != access.issuer.as_str() {
                    tracing::debug!(issuer = %access.issuer, "invalid consumer connector");
                    return Err(PolicyRestriction::InvalidConsumer {
                        issuer: access.issuer.to_string(),
                    }
                    .into());
                }
            }
            PolicyPattern::SecurityProfileRestrictedUsage => {
                let presented = access
                    .security_profile
                    .ok_or(PolicyRestriction::MissingSecurityProfile)?;
                if monitor::security_profile(rule) != Some(presented) {
                    return Err(PolicyRestriction::InvalidSecurityProfile.into());
                }
            }
            PolicyPattern::Unrecognized => {
                tracing::debug!(target_uri = %access.target, "no pattern detected");
                return Err(PolicyRestriction::Unrecognized(pattern).into());
            }
        }
        Ok(pattern)
    }

    fn check_duration(&self, rule: &Rule, access: &AccessContext<'_>) -> Result<(), PolicyError> {
        let Some(duration) = monitor::duration(rule)? else {
            tracing::warn!(target_uri = %access.target, "duration constraint is not typed as a duration");
            return Err(PolicyRestriction::DurationExceeded.into());
        };
        let Some(created) = self.information.creation_date(access.target) else {
            tracing::warn!(target_uri = %access.target, "creation date unknown");
            return Err(PolicyRestriction::DurationExceeded.into());
        };
        match created.checked_add_signed(duration) {
            Some(deadline) if access.now <= deadline => Ok(()),
            _ => Err(PolicyRestriction::DurationExceeded.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Action, BinaryOperator, Constraint, Duty, LeftOperand, RightOperand};
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Info {
        count: u64,
        created: Option<DateTime<Utc>>,
    }

    impl UsageInformation for Info {
        fn access_count(&self, _target: &Uri) -> u64 {
            self.count
        }

        fn creation_date(&self, _target: &Uri) -> Option<DateTime<Utc>> {
            self.created
        }
    }

    #[derive(Default)]
    struct Exec {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl UsageExecution for Exec {
        fn log_access(&self, target: &Uri, _agreement: &Uri) -> Result<(), ExecutionFailure> {
            self.calls.lock().unwrap().push(format!("log {target}"));
            if self.fail {
                return Err(ExecutionFailure { reason: "clearing house down".into() });
            }
            Ok(())
        }

        fn notify_access(&self, endpoint: &str, target: &Uri) -> Result<(), ExecutionFailure> {
            self.calls.lock().unwrap().push(format!("notify {endpoint} {target}"));
            if self.fail {
                return Err(ExecutionFailure { reason: "endpoint unreachable".into() });
            }
            Ok(())
        }
    }

    fn uri(s: &str) -> Uri {
        Uri::new(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn point(info: Info, exec: Arc<Exec>) -> DecisionPoint {
        DecisionPoint::new(Arc::new(info), exec)
    }

    fn check(pdp: &DecisionPoint, rule: &Rule, profile: Option<&str>) -> Result<PolicyPattern, PolicyError> {
        let target = uri("urn:artifact:1");
        let issuer = uri("https://c.example");
        let agreement = uri("https://p.example/agreements/1");
        pdp.enforce(
            rule,
            &AccessContext {
                target: &target,
                issuer: &issuer,
                security_profile: profile,
                agreement: &agreement,
                now: now(),
            },
        )
    }

    fn single(left: LeftOperand, op: BinaryOperator, right: RightOperand) -> Rule {
        Rule::permission(uri("urn:artifact:1")).with_constraint(Constraint::new(left, op, right))
    }

    #[test]
    fn provide_access_allows() {
        let pdp = point(Info::default(), Arc::default());
        assert_eq!(
            check(&pdp, &Rule::permission(uri("urn:artifact:1")), None).unwrap(),
            PolicyPattern::ProvideAccess
        );
    }

    #[test]
    fn prohibition_denies() {
        let pdp = point(Info::default(), Arc::default());
        let err = check(&pdp, &Rule::prohibition(uri("urn:artifact:1")), None).unwrap_err();
        assert_eq!(err, PolicyError::Restricted(PolicyRestriction::NotAllowed));
    }

    #[test]
    fn n_times_denies_at_ceiling() {
        let rule = single(LeftOperand::Count, BinaryOperator::Lteq, RightOperand::integer("3"));
        let pdp = point(Info { count: 2, created: None }, Arc::default());
        assert!(check(&pdp, &rule, None).is_ok());
        let pdp = point(Info { count: 3, created: None }, Arc::default());
        assert!(matches!(
            check(&pdp, &rule, None),
            Err(PolicyError::Restricted(PolicyRestriction::AccessCountReached { accessed: 3, max: 3 }))
        ));
    }

    #[test]
    fn interval_enforced() {
        let open = Rule::permission(uri("urn:artifact:1"))
            .with_constraint(Constraint::new(
                LeftOperand::PolicyEvaluationTime,
                BinaryOperator::After,
                RightOperand::date("2020-01-01T00:00:00Z"),
            ))
            .with_constraint(Constraint::new(
                LeftOperand::PolicyEvaluationTime,
                BinaryOperator::Before,
                RightOperand::date("2021-01-01T00:00:00Z"),
            ));
        let pdp = point(Info::default(), Arc::default());
        assert_eq!(
            check(&pdp, &open, None).unwrap_err(),
            PolicyError::Restricted(PolicyRestriction::OutsideInterval)
        );
    }

    #[test]
    fn duration_from_creation() {
        let rule = single(LeftOperand::ElapsedTime, BinaryOperator::Lteq, RightOperand::duration("P1D"));
        let fresh = Info { count: 0, created: Some(now() - TimeDelta::hours(2)) };
        assert!(check(&point(fresh, Arc::default()), &rule, None).is_ok());
        let stale = Info { count: 0, created: Some(now() - TimeDelta::days(2)) };
        assert_eq!(
            check(&point(stale, Arc::default()), &rule, None).unwrap_err(),
            PolicyError::Restricted(PolicyRestriction::DurationExceeded)
        );
    }

    #[test]
    fn untyped_duration_denies() {
        let rule = single(LeftOperand::ElapsedTime, BinaryOperator::Lteq, RightOperand::string("P1D"));
        let info = Info { count: 0, created: Some(now()) };
        assert!(check(&point(info, Arc::default()), &rule, None).is_err());
    }

    #[test]
    fn connector_restriction() {
        let rule = single(
            LeftOperand::System,
            BinaryOperator::SameAs,
            RightOperand::string("https://c.example"),
        );
        assert!(check(&point(Info::default(), Arc::default()), &rule, None).is_ok());
        let other = single(
            LeftOperand::System,
            BinaryOperator::SameAs,
            RightOperand::string("https://other.example"),
        );
        assert!(matches!(
            check(&point(Info::default(), Arc::default()), &other, None),
            Err(PolicyError::Restricted(PolicyRestriction::InvalidConsumer { .. }))
        ));
    }

    #[test]
    fn security_profile_restriction() {
        let rule = single(
            LeftOperand::SecurityLevel,
            BinaryOperator::Eq,
            RightOperand::string("idsc:TRUST_SECURITY_PROFILE"),
        );
        let pdp = point(Info::default(), Arc::default());
        assert_eq!(
            check(&pdp, &rule, None).unwrap_err(),
            PolicyError::Restricted(PolicyRestriction::MissingSecurityProfile)
        );
        assert_eq!(
            check(&pdp, &rule, Some("idsc:BASE_SECURITY_PROFILE")).unwrap_err(),
            PolicyError::Restricted(PolicyRestriction::InvalidSecurityProfile)
        );
        assert!(check(&pdp, &rule, Some("idsc:TRUST_SECURITY_PROFILE")).is_ok());
    }

    #[test]
    fn logging_and_notification_delegate_and_tolerate_failure() {
        let exec = Arc::new(Exec { calls: Mutex::default(), fail: true });
        let pdp = point(Info::default(), exec.clone());
        let logging = Rule::permission(uri("urn:artifact:1")).with_post_duty(Duty::new(Action::Log));
        let notify = Rule::permission(uri("urn:artifact:1")).with_post_duty(
            Duty::new(Action::Notify).with_constraint(Constraint::new(
                LeftOperand::Endpoint,
                BinaryOperator::Eq,
                RightOperand::string("https://hook.example"),
            )),
        );
        assert_eq!(check(&pdp, &logging, None).unwrap(), PolicyPattern::UsageLogging);
        assert_eq!(check(&pdp, &notify, None).unwrap(), PolicyPattern::UsageNotification);
        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "notify https://hook.example urn:artifact:1");
    }

    #[test]
    fn unrecognized_denies() {
        let rule = single(LeftOperand::Purpose, BinaryOperator::Eq, RightOperand::string("research"));
        assert!(matches!(
            check(&point(Info::default(), Arc::default()), &rule, None),
            Err(PolicyError::Restricted(PolicyRestriction::Unrecognized(PolicyPattern::Unrecognized)))
        ));
    }

    #[test]
    fn enforce_all_stops_at_first_denial() {
        let pdp = point(Info::default(), Arc::default());
        let rules = [
            Rule::permission(uri("urn:artifact:1")),
            Rule::prohibition(uri("urn:artifact:1")),
        ];
        let target = uri("urn:artifact:1");
        let issuer = uri("https://c.example");
        let agreement = uri("https://p.example/agreements/1");
        let access = AccessContext {
            target: &target,
            issuer: &issuer,
            security_profile: None,
            agreement: &agreement,
            now: now(),
        };
        assert!(pdp.enforce_all(&rules, &access).is_err());
        assert!(pdp.enforce_all(&rules[..1], &access).is_ok());
    }
}
