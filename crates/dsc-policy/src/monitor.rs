//! # Obligation Monitor
//!
//! Reads time- and count-based constraints off a rule and evaluates them
//! against an instant passed in by the caller. Every function here is pure.
//!
//! Single-constraint patterns read the rule's first constraint, which is
//! the shape the classifier recognizes them by.

use chrono::{DateTime, TimeDelta, Utc};

use dsc_core::{parse_date, parse_duration, Uri};

use crate::error::PolicyError;
use crate::rule::{Action, BinaryOperator, Clause, LeftOperand, OperandType, Rule, RuleKind};

/// Start and end read from a rule's AFTER and BEFORE constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInterval {
    /// Lower bound (AFTER operand).
    pub start: Option<DateTime<Utc>>,
    /// Upper bound (BEFORE operand).
    pub end: Option<DateTime<Utc>>,
}

impl TimeInterval {
    /// Whether `now` lies strictly between both bounds. A missing bound
    /// never contains anything.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => now > start && now < end,
            _ => false,
        }
    }
}

/// Ceiling on accesses from the rule's COUNT constraint.
///
/// Negative values clamp to zero. `EQ` and `LTEQ` pass the value through,
/// `LT` subtracts one and any other operator yields zero. The clamp comes
/// before the subtraction, so `LT 0` yields `-1`, which no access count
/// stays within.
///
/// # Errors
///
/// [`PolicyError::MalformedPolicy`] when there is no COUNT constraint or
/// its value is not an integer.
pub fn max_access_count(rule: &Rule) -> Result<i64, PolicyError> {
    let constraint = rule
        .constraints
        .iter()
        .find(|c| c.left_operand == LeftOperand::Count)
        .ok_or_else(|| PolicyError::malformed("rule has no COUNT constraint"))?;

    let raw = constraint.right_operand.value.trim();
    let number: i64 = raw.parse().map_err(|_| {
        tracing::debug!(value = raw, "failed to parse access count");
        PolicyError::malformed(format!("access count \"{raw}\" is not an integer"))
    })?;
    let number = number.max(0);

    Ok(match constraint.operator {
        BinaryOperator::Eq | BinaryOperator::Lteq => number,
        BinaryOperator::Lt => number - 1,
        _ => 0,
    })
}

/// Interval from every AFTER (start) and BEFORE (end) constraint.
///
/// When several constraints set the same bound, the last one wins.
pub fn time_interval(rule: &Rule) -> Result<TimeInterval, PolicyError> {
    let mut interval = TimeInterval::default();
    for constraint in &rule.constraints {
        match constraint.operator {
            BinaryOperator::After => {
                interval.start = Some(parse_date(&constraint.right_operand.value)?);
            }
            BinaryOperator::Before => {
                interval.end = Some(parse_date(&constraint.right_operand.value)?);
            }
            _ => {}
        }
    }
    Ok(interval)
}

/// Duration from the first constraint, only when its operand is typed as
/// an `xsd:duration`.
pub fn duration<C: Clause + ?Sized>(clause: &C) -> Result<Option<TimeDelta>, PolicyError> {
    match clause.first_constraint() {
        Some(c) if c.right_operand.operand_type == OperandType::Duration => {
            Ok(Some(parse_duration(&c.right_operand.value)?))
        }
        _ => Ok(None),
    }
}

/// Endpoint value of the first constraint: the notification target for
/// notification rules and the allowed connector for restricted rules.
pub fn endpoint<C: Clause + ?Sized>(clause: &C) -> Option<&str> {
    clause.first_constraint().map(|c| c.right_operand.value.as_str())
}

/// Required security profile from the first constraint.
pub fn security_profile(rule: &Rule) -> Option<&str> {
    rule.first_constraint().map(|c| c.right_operand.value.as_str())
}

/// Policy information point of the first constraint.
pub fn pip_endpoint(rule: &Rule) -> Option<&Uri> {
    rule.first_constraint().and_then(|c| c.pip_endpoint.as_ref())
}

/// Date a clause's first constraint resolves to: the literal date, or
/// `now + duration` when the operand is typed as a duration.
pub fn resolved_date<C: Clause + ?Sized>(
    clause: &C,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, PolicyError> {
    let Some(constraint) = clause.first_constraint() else {
        return Ok(None);
    };
    let operand = &constraint.right_operand;
    let date = if operand.operand_type == OperandType::Duration {
        let delta = parse_duration(&operand.value)?;
        now.checked_add_signed(delta)
            .ok_or_else(|| PolicyError::malformed("duration overflows the calendar"))?
    } else {
        parse_date(&operand.value)?
    };
    Ok(Some(date))
}

/// Whether a DELETE obligation is due.
///
/// For a permission the post-duties are inspected, otherwise the rule
/// itself. The first clause carrying DELETE decides: it is due when the
/// date its constraint resolves to lies before `now`.
pub fn is_deletion_due(rule: &Rule, now: DateTime<Utc>) -> Result<bool, PolicyError> {
    if rule.kind == RuleKind::Permission {
        match rule.post_duties.iter().find(|d| d.has_action(&Action::Delete)) {
            Some(duty) => clause_deletion_due(duty, now),
            None => Ok(false),
        }
    } else if rule.has_action(&Action::Delete) {
        clause_deletion_due(rule, now)
    } else {
        Ok(false)
    }
}

fn clause_deletion_due<C: Clause + ?Sized>(
    clause: &C,
    now: DateTime<Utc>,
) -> Result<bool, PolicyError> {
    Ok(resolved_date(clause, now)?.is_some_and(|due| now > due))
}
