//! Compilation of `{{ ... }}` filters into index queries.

use std::collections::BTreeSet;
use std::ops::Bound;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::FutureExt;
use snomed_ecl::{
    ComparisonOperator, DefinitionStatusValue, DescriptionTypeValue, DialectRef, DialectSpec,
    EclExpression, EclFilter, FilterAcceptability, FilterDomain, MemberFieldValue, SctId,
    TermMatchType, TypedTerm,
};
use snomed_ecl_index::{fields, Field, Query, Value};
use tracing::debug;

use crate::context::EvalContext;
use crate::domain::map_to_concept_domain;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{evaluate, resolve_ids};

/// Query comparing `field` against `value`.
///
/// `!=` only matches documents that have the field.
pub(crate) fn comparison_query(
    field: impl Into<Field>,
    operator: ComparisonOperator,
    value: Value,
) -> Query {
    let field = field.into();
    match operator {
        ComparisonOperator::Equal => Query::Term { field, value },
        ComparisonOperator::NotEqual => Query::exclude(
            Query::exists(field.clone()),
            Query::Term { field, value },
        ),
        ComparisonOperator::LessThan => Query::range(field, Bound::Unbounded, Bound::Excluded(value)),
        ComparisonOperator::LessThanOrEqual => {
            Query::range(field, Bound::Unbounded, Bound::Included(value))
        }
        ComparisonOperator::GreaterThan => {
            Query::range(field, Bound::Excluded(value), Bound::Unbounded)
        }
        ComparisonOperator::GreaterThanOrEqual => {
            Query::range(field, Bound::Included(value), Bound::Unbounded)
        }
    }
}

/// Evaluates `expression {{ domain filter }}`.
pub(crate) async fn evaluate_filtered(
    ctx: &EvalContext,
    expression: &EclExpression,
    domain: FilterDomain,
    filter: &EclFilter,
) -> EvalResult<Query> {
    check_domain(filter, domain)?;

    let (focus, filter_query, refsets) = futures::try_join!(
        evaluate(ctx, expression),
        compile(ctx, filter),
        member_refsets(ctx, expression, domain),
    )?;
    debug!(%domain, filter = %filter_query, "compiled filter");

    let domain_query = match refsets {
        Some(refsets) => Query::and(Query::terms(fields::REFSET_ID, refsets), filter_query),
        None => filter_query,
    };
    let concepts = map_to_concept_domain(ctx, domain_query, domain).await?;
    Ok(Query::and(focus, concepts))
}

fn domain_name(domain: FilterDomain) -> &'static str {
    match domain {
        FilterDomain::Concept => "concept",
        FilterDomain::Description => "description",
        FilterDomain::Member => "member",
    }
}

/// Rejects leaves that do not belong to `domain`.
fn check_domain(filter: &EclFilter, domain: FilterDomain) -> EvalResult<()> {
    match filter {
        EclFilter::And(left, right) | EclFilter::Or(left, right) => {
            check_domain(left, domain)?;
            check_domain(right, domain)
        }
        EclFilter::Nested(inner) => check_domain(inner, domain),
        leaf if leaf.is_allowed_in(domain) => Ok(()),
        leaf => Err(EvalError::invalid_filter(
            format!(
                "{} filter cannot be used on the {} domain",
                leaf.keyword(),
                domain_name(domain)
            ),
            leaf,
        )),
    }
}

/// Member filters on `^ X` only look at the members of `X`.
async fn member_refsets(
    ctx: &EvalContext,
    expression: &EclExpression,
    domain: FilterDomain,
) -> EvalResult<Option<BTreeSet<SctId>>> {
    if domain != FilterDomain::Member {
        return Ok(None);
    }
    match expression.unwrap_nested() {
        EclExpression::MemberOf(inner) if !inner.unwrap_nested().is_any() => {
            resolve_ids(ctx, inner, "member filter refsets").await.map(Some)
        }
        _ => Ok(None),
    }
}

fn compile<'a>(ctx: &'a EvalContext, filter: &'a EclFilter) -> BoxFuture<'a, EvalResult<Query>> {
    async move {
        match filter {
            EclFilter::And(left, right) => {
                let (left, right) = futures::try_join!(compile(ctx, left), compile(ctx, right))?;
                Ok(Query::and(left, right))
            }
            EclFilter::Or(left, right) => {
                let (left, right) = futures::try_join!(compile(ctx, left), compile(ctx, right))?;
                Ok(Query::or(left, right))
            }
            EclFilter::Nested(inner) => compile(ctx, inner).await,
            EclFilter::Active(active) => Ok(Query::term(fields::ACTIVE, *active)),
            EclFilter::Module { operator, value } => {
                let ids = resolve_ids(ctx, value, "module filter").await?;
                equality_query(fields::MODULE_ID, *operator, ids, filter)
            }
            EclFilter::EffectiveTime { operator, date } => {
                let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| {
                    EvalError::invalid_filter("effective time must be a YYYYMMDD date", filter)
                })?;
                Ok(comparison_query(fields::EFFECTIVE_TIME, *operator, Value::Date(date)))
            }
            EclFilter::Id { operator, ids } => {
                equality_query(fields::ID, *operator, ids.iter().copied(), filter)
            }
            EclFilter::DefinitionStatus { operator, value } => {
                let ids = match value {
                    DefinitionStatusValue::Token(token) => BTreeSet::from([token.concept_id()]),
                    DefinitionStatusValue::Expression(expression) => {
                        resolve_ids(ctx, expression, "definition status filter").await?
                    }
                };
                equality_query(fields::DEFINITION_STATUS_ID, *operator, ids, filter)
            }
            EclFilter::Term { operator, terms } => {
                let query = terms
                    .iter()
                    .map(|term| term_query(term, filter))
                    .collect::<EvalResult<Vec<_>>>()?
                    .into_iter()
                    .fold(Query::MatchNone, Query::or);
                negatable(*operator, query, filter)
            }
            EclFilter::DescriptionType { operator, value } => {
                let ids = match value {
                    DescriptionTypeValue::Tokens(tokens) => {
                        tokens.iter().map(|token| token.concept_id()).collect()
                    }
                    DescriptionTypeValue::Expression(expression) => {
                        resolve_ids(ctx, expression, "description type filter").await?
                    }
                };
                equality_query(fields::TYPE_ID, *operator, ids, filter)
            }
            EclFilter::Dialect { operator, dialects } => {
                let queries = futures::future::try_join_all(
                    dialects.iter().map(|dialect| dialect_query(ctx, dialect)),
                )
                .await?;
                let query = queries.into_iter().fold(Query::MatchNone, Query::or);
                negatable(*operator, query, filter)
            }
            EclFilter::Language { operator, codes } => {
                if let Some(code) = codes.iter().find(|code| !is_language_code(code)) {
                    return Err(EvalError::invalid_filter(
                        format!("language code `{}` must be two lowercase letters", code),
                        filter,
                    ));
                }
                equality_query(fields::LANGUAGE_CODE, *operator, codes.iter().cloned(), filter)
            }
            EclFilter::CaseSignificance { operator, value } => {
                let ids = resolve_ids(ctx, value, "case significance filter").await?;
                equality_query(fields::CASE_SIGNIFICANCE_ID, *operator, ids, filter)
            }
            EclFilter::SemanticTag { operator, tags } => {
                equality_query(fields::SEMANTIC_TAG, *operator, tags.iter().cloned(), filter)
            }
            EclFilter::PreferredIn { operator, value } => {
                let ids = resolve_ids(ctx, value, "preferredIn filter").await?;
                equality_query(fields::PREFERRED_IN, *operator, ids, filter)
            }
            EclFilter::AcceptableIn { operator, value } => {
                let ids = resolve_ids(ctx, value, "acceptableIn filter").await?;
                equality_query(fields::ACCEPTABLE_IN, *operator, ids, filter)
            }
            EclFilter::LanguageRefSet { operator, value } => {
                let ids = resolve_ids(ctx, value, "languageRefSetId filter").await?;
                let query = Query::or(
                    acceptability_query(&ids, Some(FilterAcceptability::Preferred)),
                    acceptability_query(&ids, Some(FilterAcceptability::Acceptable)),
                );
                negatable(*operator, query, filter)
            }
            EclFilter::MemberField {
                field,
                operator,
                value,
            } => match value {
                MemberFieldValue::Concrete(value) => Ok(comparison_query(
                    field.clone(),
                    *operator,
                    Value::from(value),
                )),
                MemberFieldValue::Expression(expression) => {
                    let ids = resolve_ids(ctx, expression, "member field filter").await?;
                    equality_query(field.clone(), *operator, ids, filter)
                }
            },
        }
    }
    .boxed()
}

/// `=` matches one of `values`, `!=` none of them. Other operators are
/// rejected.
fn equality_query<V: Into<Value>>(
    field: impl Into<Field>,
    operator: ComparisonOperator,
    values: impl IntoIterator<Item = V>,
    filter: &EclFilter,
) -> EvalResult<Query> {
    let values: BTreeSet<Value> = values.into_iter().map(Into::into).collect();
    let query = if values.is_empty() {
        Query::MatchNone
    } else {
        Query::Terms {
            field: field.into(),
            values,
        }
    };
    negatable(operator, query, filter)
}

fn negatable(operator: ComparisonOperator, query: Query, filter: &EclFilter) -> EvalResult<Query> {
    match operator {
        ComparisonOperator::Equal => Ok(query),
        ComparisonOperator::NotEqual => Ok(Query::exclude(Query::MatchAll, query)),
        other => Err(EvalError::invalid_filter(
            format!(
                "operator {} is not supported by the {} filter",
                other,
                filter.keyword()
            ),
            filter,
        )),
    }
}

fn term_query(term: &TypedTerm, filter: &EclFilter) -> EvalResult<Query> {
    let query = match term.match_type {
        TermMatchType::Match => {
            if term.value.trim().chars().count() < 2 {
                return Err(EvalError::invalid_filter(
                    "match terms need at least two characters",
                    filter,
                ));
            }
            Query::matching(fields::TERM, term.value.trim())
        }
        TermMatchType::Wild => Query::wildcard(fields::TERM, term.value.as_str()),
        TermMatchType::Regex => Query::regex(fields::TERM, term.value.as_str()),
        TermMatchType::Exact => Query::term(fields::TERM, term.value.as_str()),
    };
    Ok(query)
}

fn is_language_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase())
}

async fn dialect_query(ctx: &EvalContext, dialect: &DialectSpec) -> EvalResult<Query> {
    let refsets = match &dialect.dialect {
        DialectRef::Alias(alias) => ctx.config.dialect(alias).into_iter().collect(),
        DialectRef::Expression(expression) => {
            resolve_ids(ctx, expression, "dialect filter").await?
        }
    };
    Ok(acceptability_query(&refsets, dialect.acceptability))
}

fn acceptability_query(
    refsets: &BTreeSet<SctId>,
    acceptability: Option<FilterAcceptability>,
) -> Query {
    if refsets.is_empty() {
        return Query::MatchNone;
    }
    let preferred = Query::terms(fields::PREFERRED_IN, refsets.iter().copied());
    let acceptable = Query::terms(fields::ACCEPTABLE_IN, refsets.iter().copied());
    match acceptability {
        Some(FilterAcceptability::Preferred) => preferred,
        Some(FilterAcceptability::Acceptable) => acceptable,
        None => Query::or(preferred, acceptable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_query_shapes() {
        assert_eq!(
            comparison_query(fields::VALUE, ComparisonOperator::Equal, Value::Int(5)),
            Query::term(fields::VALUE, Value::Int(5))
        );
        assert_eq!(
            comparison_query(fields::VALUE, ComparisonOperator::GreaterThanOrEqual, Value::Int(5)),
            Query::range(fields::VALUE, Bound::Included(Value::Int(5)), Bound::Unbounded)
        );
        assert_eq!(
            comparison_query(fields::VALUE, ComparisonOperator::NotEqual, Value::Int(5)),
            Query::bool()
                .filter(Query::exists(fields::VALUE))
                .must_not(Query::term(fields::VALUE, Value::Int(5)))
                .build()
        );
    }

    #[test]
    fn test_check_domain_rejects_foreign_leaves() {
        let filter = EclFilter::and(
            EclFilter::Active(true),
            EclFilter::term(vec![TypedTerm::matching("heart")]),
        );
        assert!(check_domain(&filter, FilterDomain::Description).is_ok());
        let err = check_domain(&filter, FilterDomain::Concept).unwrap_err();
        assert!(matches!(err, EvalError::InvalidFilter { .. }));
        assert!(err.to_string().contains("term filter cannot be used on the concept domain"));
    }

    #[test]
    fn test_language_codes() {
        assert!(is_language_code("en"));
        assert!(!is_language_code("EN"));
        assert!(!is_language_code("eng"));
    }

    #[test]
    fn test_short_match_term_is_rejected() {
        let filter = EclFilter::term(vec![TypedTerm::matching("a")]);
        assert!(term_query(&TypedTerm::matching("a"), &filter).is_err());
        assert!(term_query(&TypedTerm::wild("a*"), &filter).is_ok());
    }

    #[test]
    fn test_equality_query_rejects_ordering_operators() {
        let filter = EclFilter::Active(true);
        let result = equality_query(fields::MODULE_ID, ComparisonOperator::LessThan, [1u64], &filter);
        assert!(result.is_err());
        assert_eq!(
            equality_query(fields::MODULE_ID, ComparisonOperator::NotEqual, [1u64], &filter).unwrap(),
            Query::bool().must_not(Query::terms(fields::MODULE_ID, [1u64])).build()
        );
    }
}
