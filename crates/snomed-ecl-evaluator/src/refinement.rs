//! Attribute refinements: `focus : refinement`.
//!
//! A flat refinement evaluates to an [`Outcome`]. Refinements inside an
//! attribute group evaluate to the [`Property`] values of their valid role
//! groups instead, so sibling constraints can be combined group by group.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use snomed_ecl::{
    AttributeConstraint, AttributeGroup, Cardinality, Comparison, EclExpression, Refinement,
    RefinementOperator, SctId,
};
use snomed_ecl_index::Query;

use crate::cardinality::{combine_groups, filter_by_cardinality, object_ids, GroupCombination};
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{ids_query, resolve_ids};
use crate::property::Property;
use crate::resolver::{ExpressionResolver, Memo};
use crate::statements::{self, StatementFilter, ValueFilter};

/// Result of a flat refinement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// The refinement accepts every focus concept.
    WholeFocusSet,
    /// Query for the focus concepts that satisfy the refinement.
    Query(Query),
}

impl Outcome {
    fn and(left: Outcome, right: Outcome) -> Outcome {
        match (left, right) {
            (Outcome::WholeFocusSet, other) | (other, Outcome::WholeFocusSet) => other,
            (Outcome::Query(left), Outcome::Query(right)) => Outcome::Query(Query::and(left, right)),
        }
    }

    fn or(left: Outcome, right: Outcome) -> Outcome {
        match (left, right) {
            (Outcome::WholeFocusSet, _) | (_, Outcome::WholeFocusSet) => Outcome::WholeFocusSet,
            (Outcome::Query(left), Outcome::Query(right)) => Outcome::Query(Query::or(left, right)),
        }
    }
}

/// Evaluates `focus : refinement` to a concept query.
pub(crate) async fn evaluate_refined(
    ctx: &EvalContext,
    focus: &EclExpression,
    refinement: &Refinement,
) -> EvalResult<Query> {
    let focus = ExpressionResolver::new(ctx.clone(), Arc::new(focus.clone()));
    refined_query(ctx, &focus, refinement).await
}

/// Refines the concepts of an existing focus resolver.
pub(crate) async fn refined_query(
    ctx: &EvalContext,
    focus: &ExpressionResolver,
    refinement: &Refinement,
) -> EvalResult<Query> {
    match refine(ctx, focus, refinement).await? {
        Outcome::WholeFocusSet => focus.query().await,
        Outcome::Query(query) => Ok(query),
    }
}

fn refine<'a>(
    ctx: &'a EvalContext,
    focus: &'a ExpressionResolver,
    refinement: &'a Refinement,
) -> BoxFuture<'a, EvalResult<Outcome>> {
    async move {
        match refinement {
            Refinement::Attribute(constraint) => attribute_outcome(focus, constraint).await,
            Refinement::Group(group) => group_outcome(ctx, focus, group).await,
            Refinement::And(left, right) => {
                let (left, right) =
                    futures::try_join!(refine(ctx, focus, left), refine(ctx, focus, right))?;
                Ok(Outcome::and(left, right))
            }
            Refinement::Or(left, right) => {
                let (left, right) =
                    futures::try_join!(refine(ctx, focus, left), refine(ctx, focus, right))?;
                Ok(Outcome::or(left, right))
            }
            Refinement::Nested(inner) => refine(ctx, focus, inner).await,
        }
    }
    .boxed()
}

/// Splits a cardinality into the range to evaluate and whether its matches
/// are excluded from the focus set. `None` means every focus concept matches.
fn evaluation_range(cardinality: Cardinality) -> Option<(Cardinality, bool)> {
    if cardinality.matches_everything() {
        return None;
    }
    match cardinality.exclusion_range() {
        Some(range) => Some((range, true)),
        None => Some((cardinality, false)),
    }
}

async fn attribute_outcome(
    focus: &ExpressionResolver,
    constraint: &AttributeConstraint,
) -> EvalResult<Outcome> {
    check_combination(constraint)?;
    let Some((range, excluded)) = evaluation_range(constraint.effective_cardinality()) else {
        return Ok(Outcome::WholeFocusSet);
    };

    let properties = attribute_properties(focus, constraint).await?;
    let matched = filter_by_cardinality(false, Cardinality::default(), range, properties);
    let ids = ids_query(object_ids(&matched));
    if excluded {
        Ok(Outcome::Query(Query::exclude(focus.query().await?, ids)))
    } else {
        Ok(Outcome::Query(ids))
    }
}

async fn group_outcome(
    ctx: &EvalContext,
    focus: &ExpressionResolver,
    group: &AttributeGroup,
) -> EvalResult<Outcome> {
    let Some((range, excluded)) = evaluation_range(group.effective_cardinality()) else {
        return Ok(Outcome::WholeFocusSet);
    };

    let (focus_query, properties) = futures::try_join!(
        focus.query(),
        group_properties(ctx, focus, &group.refinement, range),
    )?;
    let ids = ids_query(object_ids(&properties));
    if excluded {
        Ok(Outcome::Query(Query::exclude(focus_query, ids)))
    } else {
        Ok(Outcome::Query(Query::and(focus_query, ids)))
    }
}

/// Properties of the role groups satisfying `refinement`, for concepts whose
/// valid group count is in `group_cardinality`.
fn group_properties<'a>(
    ctx: &'a EvalContext,
    focus: &'a ExpressionResolver,
    refinement: &'a Refinement,
    group_cardinality: Cardinality,
) -> BoxFuture<'a, EvalResult<Vec<Property>>> {
    async move {
        match refinement {
            Refinement::Attribute(constraint) => {
                check_combination(constraint)?;
                let item_cardinality = constraint.effective_cardinality();
                if item_cardinality.min == 0 {
                    return Err(EvalError::invalid_refinement(
                        "zero minimum cardinality is not supported inside an attribute group",
                        constraint,
                    ));
                }

                let never_grouped = &ctx.config.never_grouped_attributes;
                let properties = attribute_properties(focus, constraint)
                    .await?
                    .into_iter()
                    .filter(|property| {
                        property.group_number() != 0
                            || property
                                .type_id
                                .is_some_and(|type_id| never_grouped.contains(&type_id))
                    });

                let candidates = filter_by_cardinality(
                    false,
                    Cardinality::default(),
                    item_cardinality.cross(&group_cardinality),
                    properties,
                );
                Ok(filter_by_cardinality(
                    true,
                    group_cardinality,
                    item_cardinality,
                    candidates,
                ))
            }
            Refinement::Group(_) => Err(EvalError::unsupported(
                "nested attribute group",
                refinement,
            )),
            Refinement::And(left, right) => {
                let (left, right) = futures::try_join!(
                    group_properties(ctx, focus, left, Cardinality::at_least_one()),
                    group_properties(ctx, focus, right, Cardinality::at_least_one()),
                )?;
                Ok(combine_groups(
                    GroupCombination::Intersection,
                    group_cardinality,
                    left,
                    right,
                ))
            }
            Refinement::Or(left, right) => {
                let (left, right) = futures::try_join!(
                    group_properties(ctx, focus, left, Cardinality::at_least_one()),
                    group_properties(ctx, focus, right, Cardinality::at_least_one()),
                )?;
                Ok(combine_groups(
                    GroupCombination::Union,
                    group_cardinality,
                    left,
                    right,
                ))
            }
            Refinement::Nested(inner) => {
                group_properties(ctx, focus, inner, group_cardinality).await
            }
        }
    }
    .boxed()
}

/// Properties behind the concepts accepted by `refinement`, used for the
/// concept to role group view of a refined expression.
///
/// Concepts accepted through a zero minimum cardinality contribute nothing.
pub(crate) fn satisfying_properties<'a>(
    ctx: &'a EvalContext,
    focus: &'a ExpressionResolver,
    refinement: &'a Refinement,
) -> BoxFuture<'a, EvalResult<Vec<Property>>> {
    async move {
        match refinement {
            Refinement::Attribute(constraint) => {
                check_combination(constraint)?;
                let cardinality = constraint.effective_cardinality();
                let Some(range) = present_range(cardinality) else {
                    return Ok(Vec::new());
                };
                let properties = attribute_properties(focus, constraint).await?;
                Ok(filter_by_cardinality(
                    false,
                    Cardinality::default(),
                    range,
                    properties,
                ))
            }
            Refinement::Group(group) => {
                let Some(range) = present_range(group.effective_cardinality()) else {
                    return Ok(Vec::new());
                };
                group_properties(ctx, focus, &group.refinement, range).await
            }
            Refinement::And(left, right) | Refinement::Or(left, right) => {
                let (mut left, right) = futures::try_join!(
                    satisfying_properties(ctx, focus, left),
                    satisfying_properties(ctx, focus, right),
                )?;
                left.extend(right);
                Ok(left)
            }
            Refinement::Nested(inner) => satisfying_properties(ctx, focus, inner).await,
        }
    }
    .boxed()
}

/// The part of `cardinality` with at least one statement.
fn present_range(cardinality: Cardinality) -> Option<Cardinality> {
    match cardinality.max {
        Some(0) => None,
        max => Some(Cardinality::new(cardinality.min.max(1), max)),
    }
}

fn check_combination(constraint: &AttributeConstraint) -> EvalResult<()> {
    if constraint.reverse && constraint.comparison.is_concrete() {
        return Err(EvalError::invalid_refinement(
            "reversed attributes cannot be compared with concrete values",
            constraint,
        ));
    }
    Ok(())
}

async fn attribute_properties(
    focus: &ExpressionResolver,
    constraint: &AttributeConstraint,
) -> EvalResult<Vec<Property>> {
    let properties = focus.attribute_properties(constraint).await?;
    Ok(properties.as_ref().clone())
}

/// Statements of the focus concepts matching one attribute constraint,
/// before cardinality filtering. `focus` is `None` for `*`.
pub(crate) async fn fetch_attribute_properties(
    ctx: &EvalContext,
    focus: Option<Memo<BTreeSet<SctId>>>,
    constraint: &AttributeConstraint,
) -> EvalResult<Vec<Property>> {
    let (focus_ids, types, value) = futures::try_join!(
        focus_ids(ctx, focus),
        attribute_types(ctx, &constraint.attribute_type),
        value_filter(ctx, &constraint.comparison),
    )?;

    let filter = StatementFilter {
        focus: focus_ids,
        types,
        value,
        reversed: constraint.reverse,
    };
    statements::fetch(ctx, &filter).await
}

async fn focus_ids(
    ctx: &EvalContext,
    focus: Option<Memo<BTreeSet<SctId>>>,
) -> EvalResult<Option<BTreeSet<SctId>>> {
    let Some(ids) = focus else {
        return Ok(None);
    };
    let ids = ctx.bounded("focus concepts", ids).await?;
    Ok(Some(ids.as_ref().clone()))
}

/// Attribute type ids, `None` for `*`.
pub(crate) async fn attribute_types(
    ctx: &EvalContext,
    attribute_type: &EclExpression,
) -> EvalResult<Option<BTreeSet<SctId>>> {
    if attribute_type.is_any() {
        return Ok(None);
    }
    resolve_ids(ctx, attribute_type, "attribute types").await.map(Some)
}

async fn value_filter(ctx: &EvalContext, comparison: &Comparison) -> EvalResult<ValueFilter> {
    match comparison {
        Comparison::Expression { operator, value } => {
            let any = value.is_any();
            match (operator, any) {
                (RefinementOperator::Equal, true) => Ok(ValueFilter::AnyConcept),
                (RefinementOperator::NotEqual, true) => Ok(ValueFilter::Concepts(BTreeSet::new())),
                (RefinementOperator::Equal, false) => {
                    let ids = resolve_ids(ctx, value, "attribute values").await?;
                    Ok(ValueFilter::Concepts(ids))
                }
                (RefinementOperator::NotEqual, false) => {
                    let ids = resolve_ids(ctx, value, "attribute values").await?;
                    Ok(ValueFilter::NotConcepts(ids))
                }
            }
        }
        Comparison::Concrete { operator, value } => {
            Ok(ValueFilter::Concrete(*operator, value.clone()))
        }
    }
}
