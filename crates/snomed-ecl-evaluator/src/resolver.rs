//! Memoized resolution of one expression.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use snomed_ecl::{AttributeConstraint, EclExpression, SctId};
use snomed_ecl_index::{ConceptDocument, Query};

use crate::context::EvalContext;
use crate::error::EvalResult;
use crate::evaluator::{evaluate, query_ids};
use crate::form::LogicalForm;
use crate::property::Property;
use crate::refinement;

pub(crate) type Memo<T> = Shared<BoxFuture<'static, EvalResult<Arc<T>>>>;

/// Concept to role group numbers.
pub type ConceptGroups = BTreeMap<SctId, BTreeSet<u32>>;

/// Resolves one expression in one logical form, in any of four shapes.
///
/// Each shape is computed at most once per resolver: the first caller starts
/// the computation and every later or concurrent caller awaits the same
/// result, failures included. Clones share the memo cells.
///
/// A refined expression owns a resolver for its focus. The query and the
/// role group view both refine through it, so the focus concepts and the
/// statements of each attribute constraint are fetched once.
#[derive(Clone)]
pub struct ExpressionResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    ctx: EvalContext,
    expression: Arc<EclExpression>,
    focus: Option<ExpressionResolver>,
    query: OnceLock<Memo<Query>>,
    concept_ids: OnceLock<Memo<BTreeSet<SctId>>>,
    concepts: OnceLock<Memo<Vec<ConceptDocument>>>,
    concept_groups: OnceLock<Memo<ConceptGroups>>,
    statements: Mutex<HashMap<String, Memo<Vec<Property>>>>,
}

impl ExpressionResolver {
    pub(crate) fn new(ctx: EvalContext, expression: Arc<EclExpression>) -> Self {
        let focus = match expression.unwrap_nested() {
            EclExpression::Refined { focus, .. } => Some(ExpressionResolver::new(
                ctx.clone(),
                Arc::new(focus.as_ref().clone()),
            )),
            _ => None,
        };
        Self {
            inner: Arc::new(ResolverInner {
                ctx,
                expression,
                focus,
                query: OnceLock::new(),
                concept_ids: OnceLock::new(),
                concepts: OnceLock::new(),
                concept_groups: OnceLock::new(),
                statements: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The expression being resolved.
    pub fn expression(&self) -> &EclExpression {
        &self.inner.expression
    }

    /// The logical form the expression is resolved in.
    pub fn form(&self) -> LogicalForm {
        self.inner.ctx.form
    }

    /// True when both handles share the same memo cells.
    pub(crate) fn same_as(&self, other: &ExpressionResolver) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn is_any(&self) -> bool {
        self.inner.expression.is_any()
    }

    /// The expression compiled to an index query.
    pub async fn query(&self) -> EvalResult<Query> {
        let query = self.query_memo().await?;
        Ok(query.as_ref().clone())
    }

    /// Ids of the matching concepts.
    pub async fn concept_ids(&self) -> EvalResult<Arc<BTreeSet<SctId>>> {
        self.concept_ids_memo().await
    }

    /// The matching concept documents.
    pub async fn concepts(&self) -> EvalResult<Arc<Vec<ConceptDocument>>> {
        let memo = self
            .inner
            .concepts
            .get_or_init(|| {
                let ctx = self.inner.ctx.clone();
                let query = self.query_memo();
                async move {
                    let query = query.await?;
                    let concepts = ctx.concepts(query.as_ref().clone(), &[]).await?;
                    Ok(Arc::new(concepts))
                }
                .boxed()
                .shared()
            })
            .clone();
        memo.await
    }

    /// Matching concepts with the role groups that satisfied the refinement
    /// of a refined expression. Other expressions map every concept to an
    /// empty set.
    pub async fn concept_groups(&self) -> EvalResult<Arc<ConceptGroups>> {
        let memo = self
            .inner
            .concept_groups
            .get_or_init(|| {
                let ctx = self.inner.ctx.clone();
                let expression = self.inner.expression.clone();
                let focus = self.inner.focus.clone();
                let ids = self.concept_ids_memo();
                async move {
                    let ids = ids.await?;
                    let mut groups: ConceptGroups =
                        ids.iter().map(|id| (*id, BTreeSet::new())).collect();

                    if let (Some(focus), EclExpression::Refined { refinement, .. }) =
                        (focus, expression.unwrap_nested())
                    {
                        let properties =
                            refinement::satisfying_properties(&ctx, &focus, refinement).await?;
                        for property in properties {
                            if let Some(concept_groups) = groups.get_mut(&property.object_id) {
                                concept_groups.insert(property.group_number());
                            }
                        }
                    }
                    Ok(Arc::new(groups))
                }
                .boxed()
                .shared()
            })
            .clone();
        memo.await
    }

    fn query_memo(&self) -> Memo<Query> {
        self.inner
            .query
            .get_or_init(|| {
                let ctx = self.inner.ctx.clone();
                let expression = self.inner.expression.clone();
                let focus = self.inner.focus.clone();
                async move {
                    let query = match (focus, expression.unwrap_nested()) {
                        (Some(focus), EclExpression::Refined { refinement, .. }) => {
                            refinement::refined_query(&ctx, &focus, refinement).await?
                        }
                        _ => evaluate(&ctx, &expression).await?,
                    };
                    Ok(Arc::new(query))
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    /// Statements of the concepts of this resolver matching `constraint`,
    /// before cardinality filtering. Shared by every refinement of this
    /// focus that repeats the constraint, whatever its cardinality.
    pub(crate) fn attribute_properties(
        &self,
        constraint: &AttributeConstraint,
    ) -> Memo<Vec<Property>> {
        let key = format!(
            "{}{} {}",
            if constraint.reverse { "R " } else { "" },
            constraint.attribute_type,
            constraint.comparison
        );
        self.inner
            .statements
            .lock()
            .entry(key)
            .or_insert_with(|| {
                let ctx = self.inner.ctx.clone();
                let focus_ids = (!self.is_any()).then(|| self.concept_ids_memo());
                let constraint = constraint.clone();
                async move {
                    let properties =
                        refinement::fetch_attribute_properties(&ctx, focus_ids, &constraint).await?;
                    Ok(Arc::new(properties))
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    fn concept_ids_memo(&self) -> Memo<BTreeSet<SctId>> {
        self.inner
            .concept_ids
            .get_or_init(|| {
                let ctx = self.inner.ctx.clone();
                let literal = self.inner.expression.literal_ids();
                let query = self.query_memo();
                async move {
                    let ids = match literal {
                        Some(ids) => ids.into_iter().collect(),
                        None => query_ids(&ctx, query.await?.as_ref().clone()).await?,
                    };
                    Ok(Arc::new(ids))
                }
                .boxed()
                .shared()
            })
            .clone()
    }
}

impl fmt::Debug for ExpressionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionResolver")
            .field("expression", &self.inner.expression.to_string())
            .field("form", &self.inner.ctx.form)
            .finish()
    }
}
