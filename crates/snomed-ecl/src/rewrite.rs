//! Canonical rewriting of expression trees.
//!
//! [`rewrite`] is a pure tree-to-tree pass that prepares an expression for
//! evaluation without changing the set of concepts it denotes:
//!
//! - concept sets are deduplicated by id, keeping the first occurrence;
//! - display terms are stripped from concept references;
//! - `AND`, `OR` and `MINUS` chains are rebuilt left-leaning;
//! - `attribute != value` becomes `attribute = (* MINUS (value))`;
//! - duplicate description type keywords are dropped.
//!
//! The pass is idempotent: `rewrite(&rewrite(x)) == rewrite(x)`.

use std::collections::HashSet;
use std::hash::Hash;

use crate::ast::{
    AttributeConstraint, AttributeGroup, Comparison, ConceptReference, EclExpression,
    HistorySupplement, Refinement, RefinementOperator,
};
use crate::filter::{
    DefinitionStatusValue, DescriptionTypeValue, DialectRef, DialectSpec, EclFilter,
    MemberFieldValue,
};

/// Rewrites `expression` into its canonical shape.
pub fn rewrite(expression: &EclExpression) -> EclExpression {
    match expression {
        EclExpression::Any => EclExpression::Any,
        EclExpression::ConceptReference { concept_id, .. } => EclExpression::concept(*concept_id),
        EclExpression::ConceptSet(refs) => EclExpression::ConceptSet(
            dedup_preserving_order(refs.iter(), |r| r.concept_id)
                .map(|r| ConceptReference::new(r.concept_id))
                .collect(),
        ),
        EclExpression::DescendantOf(inner) => EclExpression::DescendantOf(boxed(inner)),
        EclExpression::DescendantOrSelfOf(inner) => EclExpression::DescendantOrSelfOf(boxed(inner)),
        EclExpression::ChildOf(inner) => EclExpression::ChildOf(boxed(inner)),
        EclExpression::ChildOrSelfOf(inner) => EclExpression::ChildOrSelfOf(boxed(inner)),
        EclExpression::AncestorOf(inner) => EclExpression::AncestorOf(boxed(inner)),
        EclExpression::AncestorOrSelfOf(inner) => EclExpression::AncestorOrSelfOf(boxed(inner)),
        EclExpression::ParentOf(inner) => EclExpression::ParentOf(boxed(inner)),
        EclExpression::ParentOrSelfOf(inner) => EclExpression::ParentOrSelfOf(boxed(inner)),
        EclExpression::MemberOf(inner) => EclExpression::MemberOf(boxed(inner)),
        EclExpression::And(_, _) => rewrite_chain(expression, ChainOperator::And),
        EclExpression::Or(_, _) => rewrite_chain(expression, ChainOperator::Or),
        EclExpression::Minus(_, _) => rewrite_chain(expression, ChainOperator::Minus),
        EclExpression::Refined { focus, refinement } => EclExpression::Refined {
            focus: boxed(focus),
            refinement: rewrite_refinement(refinement),
        },
        EclExpression::DotNotation {
            source,
            attribute_type,
        } => EclExpression::DotNotation {
            source: boxed(source),
            attribute_type: boxed(attribute_type),
        },
        EclExpression::Filtered {
            expression,
            domain,
            filter,
        } => EclExpression::Filtered {
            expression: boxed(expression),
            domain: *domain,
            filter: rewrite_filter(filter),
        },
        EclExpression::Supplemented {
            expression,
            supplement,
        } => EclExpression::Supplemented {
            expression: boxed(expression),
            supplement: match supplement {
                HistorySupplement::Profile(profile) => HistorySupplement::Profile(*profile),
                HistorySupplement::Subset(subset) => HistorySupplement::Subset(boxed(subset)),
            },
        },
        EclExpression::Nested(inner) => EclExpression::Nested(boxed(inner)),
    }
}

fn boxed(expression: &EclExpression) -> Box<EclExpression> {
    Box::new(rewrite(expression))
}

fn dedup_preserving_order<'a, T, K, I, F>(items: I, key: F) -> impl Iterator<Item = &'a T>
where
    T: 'a,
    K: Hash + Eq,
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.filter(move |item| seen.insert(key(*item)))
}

// =============================================================================
// Operator chains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainOperator {
    And,
    Or,
    Minus,
}

impl ChainOperator {
    fn combine(self, left: EclExpression, right: EclExpression) -> EclExpression {
        match self {
            ChainOperator::And => EclExpression::and(left, right),
            ChainOperator::Or => EclExpression::or(left, right),
            ChainOperator::Minus => EclExpression::minus(left, right),
        }
    }

    /// Splits `node` if it continues a chain of this operator.
    ///
    /// Parenthesised operands are absorbed for the associative operators only.
    fn split(self, node: &EclExpression) -> Option<(&EclExpression, &EclExpression)> {
        let candidate = match (self, node) {
            (ChainOperator::And | ChainOperator::Or, EclExpression::Nested(_)) => {
                node.unwrap_nested()
            }
            _ => node,
        };
        match (self, candidate) {
            (ChainOperator::And, EclExpression::And(left, right))
            | (ChainOperator::Or, EclExpression::Or(left, right))
            | (ChainOperator::Minus, EclExpression::Minus(left, right)) => {
                Some((left.as_ref(), right.as_ref()))
            }
            _ => None,
        }
    }
}

/// Collects the operands of a chain with an explicit stack, then folds the
/// rewritten operands from the left. Only operands recurse.
fn rewrite_chain(expression: &EclExpression, operator: ChainOperator) -> EclExpression {
    let mut operands: Vec<&EclExpression> = Vec::new();
    let mut pending = vec![expression];
    while let Some(node) = pending.pop() {
        match operator.split(node) {
            Some((left, right)) => {
                pending.push(right);
                pending.push(left);
            }
            None => operands.push(node),
        }
    }

    let mut rewritten = operands.into_iter().map(rewrite);
    let first = rewritten.next().unwrap_or(EclExpression::Any);
    rewritten.fold(first, |acc, next| operator.combine(acc, next))
}

// =============================================================================
// Refinements
// =============================================================================

fn rewrite_refinement(refinement: &Refinement) -> Refinement {
    match refinement {
        Refinement::Attribute(constraint) => Refinement::Attribute(rewrite_attribute(constraint)),
        Refinement::Group(group) => Refinement::Group(AttributeGroup {
            cardinality: group.cardinality,
            refinement: Box::new(rewrite_refinement(&group.refinement)),
        }),
        Refinement::And(left, right) => {
            Refinement::and(rewrite_refinement(left), rewrite_refinement(right))
        }
        Refinement::Or(left, right) => {
            Refinement::or(rewrite_refinement(left), rewrite_refinement(right))
        }
        Refinement::Nested(inner) => Refinement::Nested(Box::new(rewrite_refinement(inner))),
    }
}

fn rewrite_attribute(constraint: &AttributeConstraint) -> AttributeConstraint {
    let comparison = match &constraint.comparison {
        Comparison::Expression {
            operator: RefinementOperator::Equal,
            value,
        } => Comparison::Expression {
            operator: RefinementOperator::Equal,
            value: boxed(value),
        },
        Comparison::Expression {
            operator: RefinementOperator::NotEqual,
            value,
        } => {
            let value = match rewrite(value) {
                nested @ EclExpression::Nested(_) => nested,
                other => EclExpression::nested(other),
            };
            Comparison::equal(EclExpression::nested(EclExpression::minus(
                EclExpression::Any,
                value,
            )))
        }
        Comparison::Concrete { operator, value } => Comparison::Concrete {
            operator: *operator,
            value: value.clone(),
        },
    };
    AttributeConstraint {
        cardinality: constraint.cardinality,
        reverse: constraint.reverse,
        attribute_type: boxed(&constraint.attribute_type),
        comparison,
    }
}

// =============================================================================
// Filters
// =============================================================================

fn rewrite_filter(filter: &EclFilter) -> EclFilter {
    match filter {
        EclFilter::And(left, right) => EclFilter::and(rewrite_filter(left), rewrite_filter(right)),
        EclFilter::Or(left, right) => EclFilter::or(rewrite_filter(left), rewrite_filter(right)),
        EclFilter::Nested(inner) => EclFilter::Nested(Box::new(rewrite_filter(inner))),
        EclFilter::Module { operator, value } => EclFilter::Module {
            operator: *operator,
            value: boxed(value),
        },
        EclFilter::DefinitionStatus { operator, value } => EclFilter::DefinitionStatus {
            operator: *operator,
            value: match value {
                DefinitionStatusValue::Token(token) => DefinitionStatusValue::Token(*token),
                DefinitionStatusValue::Expression(expr) => {
                    DefinitionStatusValue::Expression(boxed(expr))
                }
            },
        },
        EclFilter::DescriptionType { operator, value } => EclFilter::DescriptionType {
            operator: *operator,
            value: match value {
                DescriptionTypeValue::Tokens(tokens) => DescriptionTypeValue::Tokens(
                    dedup_preserving_order(tokens.iter(), |token| *token)
                        .copied()
                        .collect(),
                ),
                DescriptionTypeValue::Expression(expr) => {
                    DescriptionTypeValue::Expression(boxed(expr))
                }
            },
        },
        EclFilter::Dialect { operator, dialects } => EclFilter::Dialect {
            operator: *operator,
            dialects: dialects
                .iter()
                .map(|spec| DialectSpec {
                    dialect: match &spec.dialect {
                        DialectRef::Alias(alias) => DialectRef::Alias(alias.clone()),
                        DialectRef::Expression(expr) => DialectRef::Expression(boxed(expr)),
                    },
                    acceptability: spec.acceptability,
                })
                .collect(),
        },
        EclFilter::CaseSignificance { operator, value } => EclFilter::CaseSignificance {
            operator: *operator,
            value: boxed(value),
        },
        EclFilter::PreferredIn { operator, value } => EclFilter::PreferredIn {
            operator: *operator,
            value: boxed(value),
        },
        EclFilter::AcceptableIn { operator, value } => EclFilter::AcceptableIn {
            operator: *operator,
            value: boxed(value),
        },
        EclFilter::LanguageRefSet { operator, value } => EclFilter::LanguageRefSet {
            operator: *operator,
            value: boxed(value),
        },
        EclFilter::MemberField {
            field,
            operator,
            value,
        } => EclFilter::MemberField {
            field: field.clone(),
            operator: *operator,
            value: match value {
                MemberFieldValue::Concrete(concrete) => MemberFieldValue::Concrete(concrete.clone()),
                MemberFieldValue::Expression(expr) => MemberFieldValue::Expression(boxed(expr)),
            },
        },
        EclFilter::Active(_)
        | EclFilter::EffectiveTime { .. }
        | EclFilter::Id { .. }
        | EclFilter::Term { .. }
        | EclFilter::Language { .. }
        | EclFilter::SemanticTag { .. } => filter.clone(),
    }
}
