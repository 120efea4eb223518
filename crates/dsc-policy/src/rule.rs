//! # Rule Model
//!
//! A usage-control rule is a permission, prohibition or obligation over a
//! target resource. The kind is a discriminator on a single struct rather
//! than a type hierarchy, so the classifier and comparator switch on it.
//!
//! Duties attached to a permission (pre- and post-duties) are [`Duty`]
//! values. A duty cannot carry duties of its own, which keeps the grammar
//! exactly one level deep.

use serde::{Deserialize, Serialize};

use dsc_core::Uri;

/// XML Schema datatype IRI for durations.
pub const XSD_DURATION: &str = "http://www.w3.org/2001/XMLSchema#duration";

// ── Vocabulary ───────────────────────────────────────────────────────

/// Which kind of clause a rule is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    /// Grants usage.
    Permission,
    /// Forbids usage.
    Prohibition,
    /// Requires an action.
    Obligation,
}

/// Generates a string-backed vocabulary enum. Terms outside the listed
/// ones are kept verbatim in `Other`, so they compare and re-serialize
/// exactly as received.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $term:literal, )+
        }
        $(#[$other_meta:meta])*
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            $(#[$other_meta])*
            Other(String),
        }

        impl $name {
            /// The wire term.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $term, )+
                    Self::Other(term) => term.as_str(),
                }
            }

            /// Whether the term is outside the known vocabulary.
            pub fn is_other(&self) -> bool {
                matches!(self, Self::Other(_))
            }
        }

        impl From<&str> for $name {
            fn from(term: &str) -> Self {
                match term {
                    $( $term => Self::$variant, )+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::from(raw.as_str()))
            }
        }
    };
}

vocabulary! {
    /// Action tag on a rule or duty.
    Action {
        /// Use the data.
        Use => "USE",
        /// Read the data.
        Read => "READ",
        /// Delete the data.
        Delete => "DELETE",
        /// Log the usage.
        Log => "LOG",
        /// Notify a party about the usage.
        Notify => "NOTIFY",
        /// Distribute the data further.
        Distribute => "DISTRIBUTE",
        /// Modify the data.
        Modify => "MODIFY",
    }
    /// An action outside this vocabulary, as received.
}

vocabulary! {
    /// Left operand of a constraint.
    LeftOperand {
        /// Number of accesses.
        Count => "COUNT",
        /// Time elapsed since creation.
        ElapsedTime => "ELAPSED_TIME",
        /// Calendar date.
        Date => "DATE",
        /// Instant at which the policy is evaluated.
        PolicyEvaluationTime => "POLICY_EVALUATION_TIME",
        /// The consuming system (connector).
        System => "SYSTEM",
        /// Security profile of the consumer.
        SecurityLevel => "SECURITY_LEVEL",
        /// Endpoint to notify or log to.
        Endpoint => "ENDPOINT",
        /// Declared purpose of use.
        Purpose => "PURPOSE",
    }
    /// An operand outside this vocabulary, as received.
}

vocabulary! {
    /// Comparison operator of a constraint.
    BinaryOperator {
        /// Equal.
        Eq => "EQ",
        /// Not equal.
        Neq => "NEQ",
        /// Less than.
        Lt => "LT",
        /// Less than or equal.
        Lteq => "LTEQ",
        /// Greater than.
        Gt => "GT",
        /// Greater than or equal.
        Gteq => "GTEQ",
        /// Temporal: after.
        After => "AFTER",
        /// Temporal: before.
        Before => "BEFORE",
        /// Identity: same as.
        SameAs => "SAME_AS",
        /// Membership.
        In => "IN",
    }
    /// An operator outside this vocabulary, as received.
}

vocabulary! {
    /// Datatype of a right operand literal.
    #[derive(Default)]
    OperandType {
        /// `xsd:string`.
        #[default]
        String => "http://www.w3.org/2001/XMLSchema#string",
        /// `xsd:dateTimeStamp`.
        DateTimeStamp => "http://www.w3.org/2001/XMLSchema#dateTimeStamp",
        /// `xsd:duration`.
        Duration => "http://www.w3.org/2001/XMLSchema#duration",
        /// `xsd:integer`.
        Integer => "http://www.w3.org/2001/XMLSchema#integer",
        /// `xsd:anyURI`.
        AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
    }
    /// Any other datatype IRI, as received.
}

// ── Constraint ───────────────────────────────────────────────────────

/// A typed literal on the right-hand side of a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RightOperand {
    /// Lexical value.
    pub value: String,
    /// Datatype.
    #[serde(rename = "type", default)]
    pub operand_type: OperandType,
}

impl RightOperand {
    /// A plain string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            operand_type: OperandType::String,
        }
    }

    /// A date-time literal.
    pub fn date(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            operand_type: OperandType::DateTimeStamp,
        }
    }

    /// A duration literal.
    pub fn duration(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            operand_type: OperandType::Duration,
        }
    }

    /// An integer literal.
    pub fn integer(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            operand_type: OperandType::Integer,
        }
    }
}

/// One atomic condition on a rule.
///
/// Equality is exact over every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// What is being constrained.
    pub left_operand: LeftOperand,
    /// How it is compared.
    pub operator: BinaryOperator,
    /// What it is compared against.
    pub right_operand: RightOperand,
    /// Policy information point to resolve the left operand from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_endpoint: Option<Uri>,
}

impl Constraint {
    /// Create a constraint without a PIP endpoint.
    pub fn new(left_operand: LeftOperand, operator: BinaryOperator, right_operand: RightOperand) -> Self {
        Self {
            left_operand,
            operator,
            right_operand,
            pip_endpoint: None,
        }
    }

    /// Attach a policy information point.
    pub fn with_pip_endpoint(mut self, endpoint: Uri) -> Self {
        self.pip_endpoint = Some(endpoint);
        self
    }
}

// ── Clauses ──────────────────────────────────────────────────────────

/// Behaviour shared by rules and duties: both carry actions and
/// constraints and are compared by them.
pub trait Clause {
    /// Action tags.
    fn actions(&self) -> &[Action];
    /// Constraints in declaration order.
    fn constraints(&self) -> &[Constraint];

    /// Whether the clause carries the given action.
    fn has_action(&self, action: &Action) -> bool {
        self.actions().contains(action)
    }

    /// First constraint, which single-constraint patterns read from.
    fn first_constraint(&self) -> Option<&Constraint> {
        self.constraints().first()
    }
}

/// An obligation attached to a permission as a pre- or post-duty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Duty {
    /// Resource the duty applies to, when it differs from the permission's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Uri>,
    /// Required actions.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Conditions on the duty.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Duty {
    /// A duty with a single action and no constraints.
    pub fn new(action: Action) -> Self {
        Self {
            target: None,
            actions: vec![action],
            constraints: Vec::new(),
        }
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

impl Clause for Duty {
    fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

/// A permission, prohibition or obligation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Identifier of the rule, if it has been assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uri>,
    /// Discriminator.
    pub kind: RuleKind,
    /// Resource the rule applies to. Only absent transiently, before a
    /// request is validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Uri>,
    /// Action tags.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Conditions in declaration order.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Duties that must be fulfilled before use. Permissions only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_duties: Vec<Duty>,
    /// Duties that must be fulfilled after use. Permissions only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_duties: Vec<Duty>,
    /// Parties granting the rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigner: Vec<Uri>,
    /// Parties the rule is granted to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee: Vec<Uri>,
}

impl Rule {
    fn of_kind(kind: RuleKind, target: Option<Uri>) -> Self {
        Self {
            id: None,
            kind,
            target,
            actions: vec![Action::Use],
            constraints: Vec::new(),
            pre_duties: Vec::new(),
            post_duties: Vec::new(),
            assigner: Vec::new(),
            assignee: Vec::new(),
        }
    }

    /// A permission to use the target, without constraints.
    pub fn permission(target: Uri) -> Self {
        Self::of_kind(RuleKind::Permission, Some(target))
    }

    /// A prohibition to use the target.
    pub fn prohibition(target: Uri) -> Self {
        Self::of_kind(RuleKind::Prohibition, Some(target))
    }

    /// An obligation on the target with the given action.
    pub fn obligation(target: Uri, action: Action) -> Self {
        let mut rule = Self::of_kind(RuleKind::Obligation, Some(target));
        rule.actions = vec![action];
        rule
    }

    /// Set the rule identifier.
    pub fn with_id(mut self, id: Uri) -> Self {
        self.id = Some(id);
        self
    }

    /// Drop the target. Useful for building invalid requests in tests and
    /// for target-independent templates.
    pub fn without_target(mut self) -> Self {
        self.target = None;
        self
    }

    /// Replace the action tags.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a pre-duty.
    pub fn with_pre_duty(mut self, duty: Duty) -> Self {
        self.pre_duties.push(duty);
        self
    }

    /// Add a post-duty.
    pub fn with_post_duty(mut self, duty: Duty) -> Self {
        self.post_duties.push(duty);
        self
    }

    /// Whether the rule names a non-blank target.
    pub fn has_target(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|t| !t.as_str().trim().is_empty())
    }

    /// Whether this is a permission.
    pub fn is_permission(&self) -> bool {
        self.kind == RuleKind::Permission
    }
}

impl Clause for Rule {
    fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}
