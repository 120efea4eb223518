#![deny(missing_docs)]

//! # dsc-policy: Usage-Control Policies
//!
//! The rule grammar and everything that reasons about it:
//!
//! - [`rule`]: rules, duties and constraints.
//! - [`pattern`]: the classifier from rule shape to [`PolicyPattern`].
//! - [`compare`]: order-independent equality over rule sets and contracts.
//! - [`monitor`]: access ceilings, intervals and due deletions.
//! - [`contract`]: offers, requests and agreements.
//! - [`decision`]: enforcement of agreed rules at access time.
//!
//! Classification, comparison and monitoring are pure functions and safe
//! to call concurrently. Time is always passed in explicitly.

pub mod compare;
pub mod contract;
pub mod decision;
pub mod error;
pub mod monitor;
pub mod pattern;
pub mod rule;

pub use compare::{
    agreement_difference, agreements_equal, contract_difference, contracts_equal, permissions_equal,
    rule_equal, rules_equal, ContractSection,
};
pub use contract::{Contract, ContractAgreement, ContractOffer, ContractRequest};
pub use decision::{AccessContext, DecisionPoint, ExecutionFailure, UsageExecution, UsageInformation};
pub use error::{PolicyError, PolicyRestriction};
pub use monitor::{is_deletion_due, max_access_count, time_interval, TimeInterval};
pub use pattern::{classify, PolicyPattern};
pub use rule::{
    Action, BinaryOperator, Clause, Constraint, Duty, LeftOperand, OperandType, RightOperand, Rule,
    RuleKind,
};
