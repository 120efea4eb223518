//! # Rule and Contract Comparator
//!
//! Structural, order-independent equality over rule sets. Two lists are
//! equal when, after removing duplicates under the element comparison,
//! they have the same size and every element of each list has a
//! counterpart in the other.
//!
//! The same comparator serves two checks that must stay distinct:
//!
//! - **Offer against request** during negotiation, via [`rules_equal`].
//!   Targets are ignored because a request is grouped by target first.
//! - **Agreement against stored copy** after transport, via
//!   [`agreements_equal`], which also compares identifiers and duties.

use std::borrow::Borrow;

use crate::contract::{Contract, ContractAgreement};
use crate::rule::{Clause, Duty, Rule};

/// Section of a contract in which two contracts differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractSection {
    /// Agreement identifiers differ.
    Identifier,
    /// Permission lists (including their duties) differ.
    Permissions,
    /// Prohibition lists differ.
    Prohibitions,
    /// Obligation lists differ.
    Obligations,
}

impl std::fmt::Display for ContractSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identifier => "identifier",
            Self::Permissions => "permissions",
            Self::Prohibitions => "prohibitions",
            Self::Obligations => "obligations",
        };
        f.write_str(s)
    }
}

// ── Generic list comparison ──────────────────────────────────────────

/// Order-independent list equality under `eq`.
///
/// Duplicates (under `eq`) are collapsed before sizes are compared, so
/// `[a, a, b]` equals `[b, a]`.
pub fn compare_list<T, F>(left: &[T], right: &[T], eq: F) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    let left = unique(left, &eq);
    let right = unique(right, &eq);
    if left.len() != right.len() {
        return false;
    }
    left.iter().all(|l| right.iter().any(|r| eq(l, r)))
        && right.iter().all(|r| left.iter().any(|l| eq(l, r)))
}

fn unique<'a, T, F>(items: &'a [T], eq: &F) -> Vec<&'a T>
where
    F: Fn(&T, &T) -> bool,
{
    let mut out: Vec<&T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|seen| eq(seen, item)) {
            out.push(item);
        }
    }
    out
}

// ── Clause comparison ────────────────────────────────────────────────

/// Equal action sets and equal constraint lists.
pub fn clause_equal<A: Clause + ?Sized, B: Clause + ?Sized>(a: &A, b: &B) -> bool {
    compare_list(a.actions(), b.actions(), |x, y| x == y)
        && compare_list(a.constraints(), b.constraints(), |x, y| x == y)
}

/// Same kind and equal clause content. Targets, identifiers, assigners
/// and assignees do not take part.
pub fn rule_equal(a: &Rule, b: &Rule) -> bool {
    a.kind == b.kind && clause_equal(a, b)
}

/// Order-independent equality of rule lists.
pub fn rules_equal<R: Borrow<Rule>>(a: &[R], b: &[R]) -> bool {
    compare_list(a, b, |x, y| rule_equal(x.borrow(), y.borrow()))
}

/// Order-independent equality of duty lists.
pub fn duties_equal(a: &[Duty], b: &[Duty]) -> bool {
    compare_list(a, b, |x, y| clause_equal(x, y))
}

/// Rule equality plus equal pre- and post-duties.
pub fn permission_equal(a: &Rule, b: &Rule) -> bool {
    rule_equal(a, b)
        && duties_equal(&a.pre_duties, &b.pre_duties)
        && duties_equal(&a.post_duties, &b.post_duties)
}

/// Order-independent equality of permission lists, duties included.
pub fn permissions_equal<R: Borrow<Rule>>(a: &[R], b: &[R]) -> bool {
    compare_list(a, b, |x, y| permission_equal(x.borrow(), y.borrow()))
}

// ── Contract comparison ──────────────────────────────────────────────

/// The first section in which two contracts differ, if any.
pub fn contract_difference<A: Contract, B: Contract>(a: &A, b: &B) -> Option<ContractSection> {
    if !permissions_equal(&a.permissions(), &b.permissions()) {
        return Some(ContractSection::Permissions);
    }
    if !rules_equal(&a.prohibitions(), &b.prohibitions()) {
        return Some(ContractSection::Prohibitions);
    }
    if !rules_equal(&a.obligations(), &b.obligations()) {
        return Some(ContractSection::Obligations);
    }
    None
}

/// Permissions, prohibitions and obligations are all equal.
pub fn contracts_equal<A: Contract, B: Contract>(a: &A, b: &B) -> bool {
    contract_difference(a, b).is_none()
}

/// The first section in which two agreements differ, identifier first.
pub fn agreement_difference(
    a: &ContractAgreement,
    b: &ContractAgreement,
) -> Option<ContractSection> {
    if a.id != b.id {
        return Some(ContractSection::Identifier);
    }
    contract_difference(a, b)
}

/// Same identifier and equal contract content.
pub fn agreements_equal(a: &ContractAgreement, b: &ContractAgreement) -> bool {
    agreement_difference(a, b).is_none()
}
