//! Abstract Syntax Tree types for ECL expressions.
//!
//! The tree is produced by an external grammar and consumed by the evaluator.
//! Repeated binary operators without parentheses are represented as
//! right-recursive chains (`A AND B AND C` is `And(A, And(B, C))`), while
//! explicit parentheses are always kept as [`EclExpression::Nested`]. The
//! [`rewrite`](crate::rewrite) pass turns chains into their canonical
//! left-leaning shape.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;

use crate::error::{EclError, EclResult};
use crate::filter::{EclFilter, FilterDomain};
use crate::SctId;

// =============================================================================
// Cardinality
// =============================================================================

/// Cardinality constraint for attributes and attribute groups: `[min..max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cardinality {
    /// Minimum occurrences.
    pub min: usize,
    /// Maximum occurrences (None = unbounded `*`).
    pub max: Option<usize>,
}

impl Cardinality {
    /// Creates a cardinality constraint.
    pub fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// Creates a cardinality constraint, rejecting ranges whose minimum exceeds the maximum.
    pub fn try_new(min: usize, max: Option<usize>) -> EclResult<Self> {
        match max {
            Some(max) if max < min => Err(EclError::InvalidCardinality { min, max }),
            _ => Ok(Self { min, max }),
        }
    }

    /// Cardinality of exactly zero: `[0..0]`
    pub fn zero() -> Self {
        Self { min: 0, max: Some(0) }
    }

    /// Cardinality of exactly one: `[1..1]`
    pub fn one() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Cardinality of at least one: `[1..*]`
    pub fn at_least_one() -> Self {
        Self { min: 1, max: None }
    }

    /// Checks if a count satisfies this cardinality constraint.
    pub fn matches(&self, count: usize) -> bool {
        if count < self.min {
            return false;
        }
        match self.max {
            Some(max) => count <= max,
            None => true,
        }
    }

    /// Returns true if the upper bound is `*`.
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    /// Returns true for `[0..*]`, which every focus concept satisfies.
    /// `[0..usize::MAX]` admits every possible count and is treated the same.
    pub fn matches_everything(&self) -> bool {
        self.min == 0 && self.max.map_or(true, |max| max == usize::MAX)
    }

    /// For a zero-minimum bounded range `[0..n]`, returns the over-cardinality
    /// range `[n+1..*]` whose matches have to be excluded from the focus set.
    /// Returns `None` when nothing lies above `n`.
    pub fn exclusion_range(&self) -> Option<Cardinality> {
        match (self.min, self.max) {
            (0, Some(max)) => max.checked_add(1).map(|min| Cardinality::new(min, None)),
            _ => None,
        }
    }

    /// Effective relationship cardinality of an item constrained by `self`
    /// when it is nested inside a group constrained by `group`.
    ///
    /// `min` is the item minimum when the group minimum is zero, otherwise the
    /// product of both minimums. `max` is unbounded when either side is,
    /// otherwise the product of both maximums.
    pub fn cross(&self, group: &Cardinality) -> Cardinality {
        let min = if group.min == 0 {
            self.min
        } else {
            group.min.saturating_mul(self.min)
        };
        let max = match (group.max, self.max) {
            (Some(group_max), Some(item_max)) => Some(group_max.saturating_mul(item_max)),
            _ => None,
        };
        Cardinality { min, max }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::at_least_one()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

// =============================================================================
// Operators and concrete values
// =============================================================================

/// Operator of an attribute-to-expression comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefinementOperator {
    /// Value is in the expression's concept set: `=`
    Equal,
    /// Value is outside the expression's concept set: `!=`
    NotEqual,
}

impl fmt::Display for RefinementOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefinementOperator::Equal => write!(f, "="),
            RefinementOperator::NotEqual => write!(f, "!="),
        }
    }
}

/// Comparison operators for concrete values and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOperator {
    /// Equal: `=`
    Equal,
    /// Not equal: `!=`
    NotEqual,
    /// Less than: `<`
    LessThan,
    /// Less than or equal: `<=`
    LessThanOrEqual,
    /// Greater than: `>`
    GreaterThan,
    /// Greater than or equal: `>=`
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    /// Returns true for `=` and `!=`.
    pub fn is_equality(&self) -> bool {
        matches!(self, ComparisonOperator::Equal | ComparisonOperator::NotEqual)
    }

    /// Applies the operator to the ordering of `actual` relative to `expected`.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Equal => write!(f, "="),
            ComparisonOperator::NotEqual => write!(f, "!="),
            ComparisonOperator::LessThan => write!(f, "<"),
            ComparisonOperator::LessThanOrEqual => write!(f, "<="),
            ComparisonOperator::GreaterThan => write!(f, ">"),
            ComparisonOperator::GreaterThanOrEqual => write!(f, ">="),
        }
    }
}

/// Concrete (non-concept) attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConcreteValue {
    /// Integer value: `#250`
    Integer(i64),
    /// Decimal value: `#3.14`
    Decimal(Decimal),
    /// String value: `"text"`
    String(String),
    /// Boolean value: `true` or `false`
    Boolean(bool),
}

impl ConcreteValue {
    /// Typed ordering of two values.
    ///
    /// Integers and decimals compare numerically with each other. Values of
    /// unrelated types are incomparable and yield `None`.
    pub fn compare(&self, other: &ConcreteValue) -> Option<Ordering> {
        match (self, other) {
            (ConcreteValue::Integer(a), ConcreteValue::Integer(b)) => Some(a.cmp(b)),
            (ConcreteValue::Decimal(a), ConcreteValue::Decimal(b)) => Some(a.cmp(b)),
            (ConcreteValue::Integer(a), ConcreteValue::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (ConcreteValue::Decimal(a), ConcreteValue::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (ConcreteValue::String(a), ConcreteValue::String(b)) => Some(a.cmp(b)),
            (ConcreteValue::Boolean(a), ConcreteValue::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Returns true if `self` satisfies `self <operator> expected`.
    ///
    /// Incomparable values never match, not even with `!=`.
    pub fn satisfies(&self, operator: ComparisonOperator, expected: &ConcreteValue) -> bool {
        self.compare(expected)
            .map(|ordering| operator.accepts(ordering))
            .unwrap_or(false)
    }

    /// Short name of the value type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConcreteValue::Integer(_) => "integer",
            ConcreteValue::Decimal(_) => "decimal",
            ConcreteValue::String(_) => "string",
            ConcreteValue::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for ConcreteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteValue::Integer(n) => write!(f, "#{}", n),
            ConcreteValue::Decimal(n) => write!(f, "#{}", n),
            ConcreteValue::String(s) => write!(f, "\"{}\"", s),
            ConcreteValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// =============================================================================
// Refinements
// =============================================================================

/// Right-hand side of an attribute constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparison {
    /// Attribute value compared against a concept set: `= << 39057004`
    Expression {
        /// `=` or `!=`.
        operator: RefinementOperator,
        /// The value constraint.
        value: Box<EclExpression>,
    },
    /// Attribute value compared against a boolean, string, integer or decimal.
    Concrete {
        /// Comparison operator.
        operator: ComparisonOperator,
        /// The value to compare with.
        value: ConcreteValue,
    },
}

impl Comparison {
    /// `= value`
    pub fn equal(value: EclExpression) -> Self {
        Comparison::Expression {
            operator: RefinementOperator::Equal,
            value: Box::new(value),
        }
    }

    /// `!= value`
    pub fn not_equal(value: EclExpression) -> Self {
        Comparison::Expression {
            operator: RefinementOperator::NotEqual,
            value: Box::new(value),
        }
    }

    /// `<operator> #value`
    pub fn concrete(operator: ComparisonOperator, value: ConcreteValue) -> Self {
        Comparison::Concrete { operator, value }
    }

    /// Returns true for concrete value comparisons.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Comparison::Concrete { .. })
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Expression { operator, value } => write!(f, "{} {}", operator, value),
            Comparison::Concrete { operator, value } => write!(f, "{} {}", operator, value),
        }
    }
}

/// A single attribute constraint within a refinement.
///
/// Example: `363698007 |Finding site| = << 39057004 |Pulmonary structure|`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeConstraint {
    /// Optional cardinality constraint (`[1..*]` when absent).
    pub cardinality: Option<Cardinality>,
    /// Whether the attribute constraint reverses the relationship direction (`R`).
    pub reverse: bool,
    /// The attribute type constraint.
    pub attribute_type: Box<EclExpression>,
    /// The value comparison.
    pub comparison: Comparison,
}

impl AttributeConstraint {
    /// Creates an unreversed constraint without explicit cardinality.
    pub fn new(attribute_type: EclExpression, comparison: Comparison) -> Self {
        Self {
            cardinality: None,
            reverse: false,
            attribute_type: Box::new(attribute_type),
            comparison,
        }
    }

    /// Sets the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Marks the constraint as reversed.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// The declared cardinality or the `[1..*]` default.
    pub fn effective_cardinality(&self) -> Cardinality {
        self.cardinality.unwrap_or_default()
    }
}

impl fmt::Display for AttributeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref card) = self.cardinality {
            write!(f, "{} ", card)?;
        }
        if self.reverse {
            write!(f, "R ")?;
        }
        write!(f, "{} {}", self.attribute_type, self.comparison)
    }
}

/// Attribute constraints that must be satisfied within the same role group.
///
/// Example: `[1..2] { 363698007 = << 39057004, 116676008 = << 415582006 }`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeGroup {
    /// Optional cardinality for the group itself (`[1..*]` when absent).
    pub cardinality: Option<Cardinality>,
    /// The constraints evaluated inside the group.
    pub refinement: Box<Refinement>,
}

impl AttributeGroup {
    /// The declared group cardinality or the `[1..*]` default.
    pub fn effective_cardinality(&self) -> Cardinality {
        self.cardinality.unwrap_or_default()
    }
}

impl fmt::Display for AttributeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref card) = self.cardinality {
            write!(f, "{} ", card)?;
        }
        write!(f, "{{ {} }}", self.refinement)
    }
}

/// Refinement clause of a refined expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Refinement {
    /// A single attribute constraint.
    Attribute(AttributeConstraint),
    /// An attribute group.
    Group(AttributeGroup),
    /// Both refinements must hold.
    And(Box<Refinement>, Box<Refinement>),
    /// Either refinement must hold.
    Or(Box<Refinement>, Box<Refinement>),
    /// Parenthesised refinement.
    Nested(Box<Refinement>),
}

impl Refinement {
    /// Creates an attribute refinement.
    pub fn attribute(constraint: AttributeConstraint) -> Self {
        Refinement::Attribute(constraint)
    }

    /// Creates an attribute group refinement.
    pub fn group(cardinality: Option<Cardinality>, inner: Refinement) -> Self {
        Refinement::Group(AttributeGroup {
            cardinality,
            refinement: Box::new(inner),
        })
    }

    /// Creates a conjunction.
    pub fn and(left: Refinement, right: Refinement) -> Self {
        Refinement::And(Box::new(left), Box::new(right))
    }

    /// Creates a disjunction.
    pub fn or(left: Refinement, right: Refinement) -> Self {
        Refinement::Or(Box::new(left), Box::new(right))
    }

    /// Short node kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Refinement::Attribute(_) => "AttributeConstraint",
            Refinement::Group(_) => "AttributeGroup",
            Refinement::And(_, _) => "AndRefinement",
            Refinement::Or(_, _) => "OrRefinement",
            Refinement::Nested(_) => "NestedRefinement",
        }
    }
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refinement::Attribute(constraint) => write!(f, "{}", constraint),
            Refinement::Group(group) => write!(f, "{}", group),
            Refinement::And(left, right) => write!(f, "{}, {}", left, right),
            Refinement::Or(left, right) => write!(f, "{} OR {}", left, right),
            Refinement::Nested(inner) => write!(f, "({})", inner),
        }
    }
}

// =============================================================================
// History supplements
// =============================================================================

/// History supplement profile for historical associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HistoryProfile {
    /// Minimal: SAME AS only.
    Min,
    /// Moderate: a fixed subset of the historical associations.
    Mod,
    /// Maximum: all historical associations.
    Max,
}

impl fmt::Display for HistoryProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryProfile::Min => write!(f, "-MIN"),
            HistoryProfile::Mod => write!(f, "-MOD"),
            HistoryProfile::Max => write!(f, "-MAX"),
        }
    }
}

/// Which historical association reference sets a supplement follows.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HistorySupplement {
    /// `{{ +HISTORY-MIN }}` etc. `{{ +HISTORY }}` is `Profile(Max)`.
    Profile(HistoryProfile),
    /// `{{ +HISTORY (<< 900000000000527005) }}`
    Subset(Box<EclExpression>),
}

impl fmt::Display for HistorySupplement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistorySupplement::Profile(HistoryProfile::Max) => write!(f, "+HISTORY"),
            HistorySupplement::Profile(profile) => write!(f, "+HISTORY{}", profile),
            HistorySupplement::Subset(expression) => write!(f, "+HISTORY ({})", expression),
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// A concept reference with an optional display term.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConceptReference {
    /// The SNOMED CT concept ID.
    pub concept_id: SctId,
    /// Optional term in pipe notation.
    pub term: Option<String>,
}

impl ConceptReference {
    /// Creates a reference without a term.
    pub fn new(concept_id: SctId) -> Self {
        Self {
            concept_id,
            term: None,
        }
    }
}

impl fmt::Display for ConceptReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.term {
            Some(term) => write!(f, "{} |{}|", self.concept_id, term),
            None => write!(f, "{}", self.concept_id),
        }
    }
}

/// Abstract Syntax Tree for ECL expressions.
///
/// # Examples
///
/// ```rust
/// use snomed_ecl::{Comparison, AttributeConstraint, Cardinality, EclExpression, Refinement};
///
/// // << 404684003 : [0..0] 116676008 = << 409774005
/// let expr = EclExpression::refined(
///     EclExpression::descendant_or_self_of(EclExpression::concept(404684003)),
///     Refinement::attribute(
///         AttributeConstraint::new(
///             EclExpression::concept(116676008),
///             Comparison::equal(EclExpression::descendant_or_self_of(EclExpression::concept(409774005))),
///         )
///         .with_cardinality(Cardinality::zero()),
///     ),
/// );
/// assert_eq!(expr.to_string(), "<< 404684003 : [0..0] 116676008 = << 409774005");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EclExpression {
    /// Wildcard matching any concept.
    /// Syntax: `*`
    Any,

    /// A single concept reference (self).
    /// Example: `404684003` or `404684003 |Clinical finding|`
    ConceptReference {
        /// The SNOMED CT concept ID.
        concept_id: SctId,
        /// Optional term/label in pipe notation.
        term: Option<String>,
    },

    /// An explicit set of concept references.
    /// Example: `(404684003 71388002)`
    ConceptSet(Vec<ConceptReference>),

    /// Descendants of a concept (exclusive, not including self).
    /// Syntax: `< expression`
    DescendantOf(Box<EclExpression>),

    /// Descendants of a concept or the concept itself (inclusive).
    /// Syntax: `<< expression`
    DescendantOrSelfOf(Box<EclExpression>),

    /// Child of a concept (direct descendants only, one level).
    /// Syntax: `<! expression`
    ChildOf(Box<EclExpression>),

    /// Child or self of a concept.
    /// Syntax: `<<! expression`
    ChildOrSelfOf(Box<EclExpression>),

    /// Ancestors of a concept (exclusive, not including self).
    /// Syntax: `> expression`
    AncestorOf(Box<EclExpression>),

    /// Ancestors of a concept or the concept itself (inclusive).
    /// Syntax: `>> expression`
    AncestorOrSelfOf(Box<EclExpression>),

    /// Parent of a concept (direct ancestors only, one level).
    /// Syntax: `>! expression`
    ParentOf(Box<EclExpression>),

    /// Parent or self of a concept.
    /// Syntax: `>>! expression`
    ParentOrSelfOf(Box<EclExpression>),

    /// Reference set membership.
    /// Syntax: `^ expression`
    /// Example: `^ 700043003 |Example problem list concepts reference set|`
    MemberOf(Box<EclExpression>),

    /// Conjunction (AND) of two expressions.
    And(Box<EclExpression>, Box<EclExpression>),

    /// Disjunction (OR) of two expressions.
    Or(Box<EclExpression>, Box<EclExpression>),

    /// Set difference (MINUS) of two expressions.
    Minus(Box<EclExpression>, Box<EclExpression>),

    /// Refined expression with attribute constraints.
    /// Syntax: `focusExpression : refinement`
    /// Example: `< 19829001 : 116676008 = << 79654002`
    Refined {
        /// The focus expression.
        focus: Box<EclExpression>,
        /// The refinement clause.
        refinement: Refinement,
    },

    /// Dot notation for attribute value extraction.
    /// Syntax: `expression . attributeType`
    /// Example: `< 125605004 . 363698007`
    DotNotation {
        /// The source expression.
        source: Box<EclExpression>,
        /// The attribute type to extract values for.
        attribute_type: Box<EclExpression>,
    },

    /// Expression restricted by a concept, description or member filter.
    /// Syntax: `expression {{ c active = true }}`
    Filtered {
        /// The source expression.
        expression: Box<EclExpression>,
        /// Component domain the filter applies to.
        domain: FilterDomain,
        /// The filter constraint.
        filter: EclFilter,
    },

    /// Expression supplemented with historically associated concepts.
    /// Syntax: `expression {{ +HISTORY-MIN }}`
    Supplemented {
        /// The source expression.
        expression: Box<EclExpression>,
        /// Association reference sets to follow.
        supplement: HistorySupplement,
    },

    /// Nested expression in parentheses.
    Nested(Box<EclExpression>),
}

impl EclExpression {
    /// Creates a new concept reference expression.
    pub fn concept(id: SctId) -> Self {
        EclExpression::ConceptReference {
            concept_id: id,
            term: None,
        }
    }

    /// Creates a new concept reference expression with a term.
    pub fn concept_with_term(id: SctId, term: impl Into<String>) -> Self {
        EclExpression::ConceptReference {
            concept_id: id,
            term: Some(term.into()),
        }
    }

    /// Creates a concept set expression.
    pub fn concept_set(ids: impl IntoIterator<Item = SctId>) -> Self {
        EclExpression::ConceptSet(ids.into_iter().map(ConceptReference::new).collect())
    }

    /// Creates a descendant-of expression.
    pub fn descendant_of(inner: EclExpression) -> Self {
        EclExpression::DescendantOf(Box::new(inner))
    }

    /// Creates a descendant-or-self-of expression.
    pub fn descendant_or_self_of(inner: EclExpression) -> Self {
        EclExpression::DescendantOrSelfOf(Box::new(inner))
    }

    /// Creates a child-of expression.
    pub fn child_of(inner: EclExpression) -> Self {
        EclExpression::ChildOf(Box::new(inner))
    }

    /// Creates an ancestor-of expression.
    pub fn ancestor_of(inner: EclExpression) -> Self {
        EclExpression::AncestorOf(Box::new(inner))
    }

    /// Creates an ancestor-or-self-of expression.
    pub fn ancestor_or_self_of(inner: EclExpression) -> Self {
        EclExpression::AncestorOrSelfOf(Box::new(inner))
    }

    /// Creates a parent-of expression.
    pub fn parent_of(inner: EclExpression) -> Self {
        EclExpression::ParentOf(Box::new(inner))
    }

    /// Creates an AND expression.
    pub fn and(left: EclExpression, right: EclExpression) -> Self {
        EclExpression::And(Box::new(left), Box::new(right))
    }

    /// Creates an OR expression.
    pub fn or(left: EclExpression, right: EclExpression) -> Self {
        EclExpression::Or(Box::new(left), Box::new(right))
    }

    /// Creates a MINUS expression.
    pub fn minus(left: EclExpression, right: EclExpression) -> Self {
        EclExpression::Minus(Box::new(left), Box::new(right))
    }

    /// Creates a member-of expression for a single reference set.
    pub fn member_of(refset_id: SctId) -> Self {
        EclExpression::MemberOf(Box::new(EclExpression::concept(refset_id)))
    }

    /// Creates a parenthesised expression.
    pub fn nested(inner: EclExpression) -> Self {
        EclExpression::Nested(Box::new(inner))
    }

    /// Creates a refined expression.
    pub fn refined(focus: EclExpression, refinement: Refinement) -> Self {
        EclExpression::Refined {
            focus: Box::new(focus),
            refinement,
        }
    }

    /// Creates a dotted attribute expression.
    pub fn dotted(source: EclExpression, attribute_type: EclExpression) -> Self {
        EclExpression::DotNotation {
            source: Box::new(source),
            attribute_type: Box::new(attribute_type),
        }
    }

    /// Creates a filtered expression.
    pub fn filtered(expression: EclExpression, domain: FilterDomain, filter: EclFilter) -> Self {
        EclExpression::Filtered {
            expression: Box::new(expression),
            domain,
            filter,
        }
    }

    /// Creates a history-supplemented expression.
    pub fn supplemented(expression: EclExpression, supplement: HistorySupplement) -> Self {
        EclExpression::Supplemented {
            expression: Box::new(expression),
            supplement,
        }
    }

    /// Short node kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EclExpression::Any => "Any",
            EclExpression::ConceptReference { .. } => "ConceptReference",
            EclExpression::ConceptSet(_) => "ConceptSet",
            EclExpression::DescendantOf(_) => "DescendantOf",
            EclExpression::DescendantOrSelfOf(_) => "DescendantOrSelfOf",
            EclExpression::ChildOf(_) => "ChildOf",
            EclExpression::ChildOrSelfOf(_) => "ChildOrSelfOf",
            EclExpression::AncestorOf(_) => "AncestorOf",
            EclExpression::AncestorOrSelfOf(_) => "AncestorOrSelfOf",
            EclExpression::ParentOf(_) => "ParentOf",
            EclExpression::ParentOrSelfOf(_) => "ParentOrSelfOf",
            EclExpression::MemberOf(_) => "MemberOf",
            EclExpression::And(_, _) => "And",
            EclExpression::Or(_, _) => "Or",
            EclExpression::Minus(_, _) => "Minus",
            EclExpression::Refined { .. } => "Refined",
            EclExpression::DotNotation { .. } => "DotNotation",
            EclExpression::Filtered { .. } => "Filtered",
            EclExpression::Supplemented { .. } => "Supplemented",
            EclExpression::Nested(_) => "Nested",
        }
    }

    /// Returns true if this is a simple concept reference.
    pub fn is_concept_reference(&self) -> bool {
        matches!(self, EclExpression::ConceptReference { .. })
    }

    /// Returns true if this expression is `*`, ignoring parentheses.
    pub fn is_any(&self) -> bool {
        matches!(self.unwrap_nested(), EclExpression::Any)
    }

    /// Returns true if this expression contains a hierarchy operator.
    pub fn has_hierarchy_operator(&self) -> bool {
        matches!(
            self,
            EclExpression::DescendantOf(_)
                | EclExpression::DescendantOrSelfOf(_)
                | EclExpression::ChildOf(_)
                | EclExpression::ChildOrSelfOf(_)
                | EclExpression::AncestorOf(_)
                | EclExpression::AncestorOrSelfOf(_)
                | EclExpression::ParentOf(_)
                | EclExpression::ParentOrSelfOf(_)
        )
    }

    /// Returns true if this is a compound expression (AND, OR, MINUS).
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            EclExpression::And(_, _) | EclExpression::Or(_, _) | EclExpression::Minus(_, _)
        )
    }

    /// Returns the concept ID if this is a simple concept reference.
    pub fn as_concept_id(&self) -> Option<SctId> {
        match self {
            EclExpression::ConceptReference { concept_id, .. } => Some(*concept_id),
            _ => None,
        }
    }

    /// Returns the literal ids of a concept reference or concept set, looking
    /// through parentheses. Other expressions need evaluation and yield `None`.
    pub fn literal_ids(&self) -> Option<Vec<SctId>> {
        match self.unwrap_nested() {
            EclExpression::ConceptReference { concept_id, .. } => Some(vec![*concept_id]),
            EclExpression::ConceptSet(refs) => Some(refs.iter().map(|r| r.concept_id).collect()),
            _ => None,
        }
    }

    /// Unwraps nested expressions to get the inner expression.
    pub fn unwrap_nested(&self) -> &EclExpression {
        let mut current = self;
        while let EclExpression::Nested(inner) = current {
            current = inner;
        }
        current
    }
}

impl EclExpression {
    /// Moves every directly boxed subexpression into `out`, leaving `*`
    /// behind.
    fn take_children(&mut self, out: &mut Vec<EclExpression>) {
        let mut take = |child: &mut Box<EclExpression>| {
            if !child.is_any() {
                out.push(std::mem::replace(&mut **child, EclExpression::Any));
            }
        };
        match self {
            EclExpression::Any | EclExpression::ConceptReference { .. } | EclExpression::ConceptSet(_) => {}
            EclExpression::DescendantOf(inner)
            | EclExpression::DescendantOrSelfOf(inner)
            | EclExpression::ChildOf(inner)
            | EclExpression::ChildOrSelfOf(inner)
            | EclExpression::AncestorOf(inner)
            | EclExpression::AncestorOrSelfOf(inner)
            | EclExpression::ParentOf(inner)
            | EclExpression::ParentOrSelfOf(inner)
            | EclExpression::MemberOf(inner)
            | EclExpression::Nested(inner)
            | EclExpression::Refined { focus: inner, .. }
            | EclExpression::Filtered { expression: inner, .. }
            | EclExpression::Supplemented { expression: inner, .. } => take(inner),
            EclExpression::And(left, right)
            | EclExpression::Or(left, right)
            | EclExpression::Minus(left, right)
            | EclExpression::DotNotation {
                source: left,
                attribute_type: right,
            } => {
                take(left);
                take(right);
            }
        }
    }
}

/// Drops subexpressions from an explicit stack, so arbitrarily deep operator
/// chains can be released without exhausting the call stack.
impl Drop for EclExpression {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expression) = pending.pop() {
            expression.take_children(&mut pending);
        }
    }
}

impl fmt::Display for EclExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EclExpression::Any => write!(f, "*"),
            EclExpression::ConceptReference { concept_id, term } => {
                if let Some(t) = term {
                    write!(f, "{} |{}|", concept_id, t)
                } else {
                    write!(f, "{}", concept_id)
                }
            }
            EclExpression::ConceptSet(refs) => {
                let items: Vec<String> = refs.iter().map(|r| r.to_string()).collect();
                write!(f, "({})", items.join(" "))
            }
            EclExpression::DescendantOf(inner) => write!(f, "< {}", inner),
            EclExpression::DescendantOrSelfOf(inner) => write!(f, "<< {}", inner),
            EclExpression::ChildOf(inner) => write!(f, "<! {}", inner),
            EclExpression::ChildOrSelfOf(inner) => write!(f, "<<! {}", inner),
            EclExpression::AncestorOf(inner) => write!(f, "> {}", inner),
            EclExpression::AncestorOrSelfOf(inner) => write!(f, ">> {}", inner),
            EclExpression::ParentOf(inner) => write!(f, ">! {}", inner),
            EclExpression::ParentOrSelfOf(inner) => write!(f, ">>! {}", inner),
            EclExpression::MemberOf(inner) => write!(f, "^ {}", inner),
            EclExpression::And(left, right) => write!(f, "{} AND {}", left, right),
            EclExpression::Or(left, right) => write!(f, "{} OR {}", left, right),
            EclExpression::Minus(left, right) => write!(f, "{} MINUS {}", left, right),
            EclExpression::Refined { focus, refinement } => {
                write!(f, "{} : {}", focus, refinement)
            }
            EclExpression::DotNotation {
                source,
                attribute_type,
            } => write!(f, "{} . {}", source, attribute_type),
            EclExpression::Filtered {
                expression,
                domain,
                filter,
            } => write!(f, "{} {{{{ {} {} }}}}", expression, domain, filter),
            EclExpression::Supplemented {
                expression,
                supplement,
            } => write!(f, "{} {{{{ {} }}}}", expression, supplement),
            EclExpression::Nested(inner) => write!(f, "({})", inner),
        }
    }
}
