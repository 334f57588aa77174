//! Compilation of expressions into index queries.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use snomed_ecl::{rewrite, EclExpression, SctId};
use snomed_ecl_index::{fields, ConceptDocument, Query, TerminologyIndex};
use tracing::debug;

use crate::cache::ResolverCache;
use crate::config::EvaluatorConfig;
use crate::context::{with_timeout, EvalContext};
use crate::error::EvalResult;
use crate::filter::evaluate_filtered;
use crate::form::LogicalForm;
use crate::history::evaluate_supplemented;
use crate::refinement::{attribute_types, evaluate_refined};
use crate::resolver::{ConceptGroups, ExpressionResolver};
use crate::statements::{self, StatementFilter, ValueFilter};

/// ECL evaluation engine.
///
/// Bridges parsed expressions and any terminology index implementing
/// [`TerminologyIndex`]. Expressions are rewritten into canonical shape
/// before evaluation.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use snomed_ecl::EclExpression;
/// use snomed_ecl_evaluator::{EclEvaluator, LogicalForm};
/// use snomed_ecl_index::{ConceptDocument, MemoryIndex, RelationshipDocument};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let index = MemoryIndex::builder()
///     .concepts([ConceptDocument::new(100), ConceptDocument::new(200)])
///     .relationship(RelationshipDocument::new(1, 200, 116680003, 100))
///     .build();
/// let evaluator = EclEvaluator::new(Arc::new(index));
///
/// let expression = EclExpression::descendant_of(EclExpression::concept(100));
/// let ids = evaluator.concept_ids(&expression, LogicalForm::Inferred).await.unwrap();
/// assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![200]);
/// # });
/// ```
#[derive(Clone)]
pub struct EclEvaluator {
    index: Arc<dyn TerminologyIndex>,
    config: Arc<EvaluatorConfig>,
    cache: Option<Arc<ResolverCache>>,
}

impl EclEvaluator {
    /// Creates an evaluator with the default configuration.
    pub fn new(index: Arc<dyn TerminologyIndex>) -> Self {
        Self::with_config(index, EvaluatorConfig::default())
    }

    /// Creates an evaluator with custom configuration.
    pub fn with_config(index: Arc<dyn TerminologyIndex>, config: EvaluatorConfig) -> Self {
        let cache = config
            .cache
            .as_ref()
            .map(|cache| Arc::new(ResolverCache::new(cache.clone())));
        Self {
            index,
            config: Arc::new(config),
            cache,
        }
    }

    /// Returns a reference to the evaluator configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Returns the resolver cache if enabled.
    pub fn cache(&self) -> Option<&ResolverCache> {
        self.cache.as_deref()
    }

    /// Resolver for `expression` in `form`.
    ///
    /// With caching enabled, equal expressions share one resolver (and its
    /// memoized results) until the entry expires or is evicted. The
    /// evaluation methods also evict a resolver after a backend failure or
    /// timeout.
    pub fn resolver(&self, expression: &EclExpression, form: LogicalForm) -> ExpressionResolver {
        let expression = rewrite(expression);
        let create = |expression: EclExpression| {
            let ctx = EvalContext::new(self.index.clone(), self.config.clone(), form);
            ExpressionResolver::new(ctx, Arc::new(expression))
        };

        match &self.cache {
            Some(cache) => cache.get_or_insert(&expression, form, || create(expression.clone())),
            None => create(expression),
        }
    }

    /// Compiles `expression` to a query over concepts.
    ///
    /// The configured outer timeout, if any, bounds the whole evaluation.
    pub async fn evaluate(&self, expression: &EclExpression, form: LogicalForm) -> EvalResult<Query> {
        debug!(%expression, %form, "evaluating");
        let resolver = self.resolver(expression, form);
        self.bounded(&resolver, resolver.query()).await
    }

    /// Ids of the concepts matching `expression`.
    pub async fn concept_ids(
        &self,
        expression: &EclExpression,
        form: LogicalForm,
    ) -> EvalResult<Arc<BTreeSet<SctId>>> {
        debug!(%expression, %form, "resolving concept ids");
        let resolver = self.resolver(expression, form);
        self.bounded(&resolver, resolver.concept_ids()).await
    }

    /// Concepts matching `expression`.
    pub async fn concepts(
        &self,
        expression: &EclExpression,
        form: LogicalForm,
    ) -> EvalResult<Arc<Vec<ConceptDocument>>> {
        debug!(%expression, %form, "resolving concepts");
        let resolver = self.resolver(expression, form);
        self.bounded(&resolver, resolver.concepts()).await
    }

    /// Matching concepts with the role groups that satisfied a refinement.
    pub async fn concept_groups(
        &self,
        expression: &EclExpression,
        form: LogicalForm,
    ) -> EvalResult<Arc<ConceptGroups>> {
        debug!(%expression, %form, "resolving concept groups");
        let resolver = self.resolver(expression, form);
        self.bounded(&resolver, resolver.concept_groups()).await
    }

    /// Applies the outer timeout. A cached resolver whose resolution failed
    /// for a reason other than the expression itself is evicted, so the next
    /// request reaches the index again.
    async fn bounded<T>(
        &self,
        resolver: &ExpressionResolver,
        future: impl std::future::Future<Output = EvalResult<T>>,
    ) -> EvalResult<T> {
        let result = match self.config.timeout {
            Some(after) => with_timeout(after, "evaluation", future).await,
            None => future.await,
        };
        if let (Err(error), Some(cache)) = (&result, &self.cache) {
            if !error.is_request_error() && cache.invalidate(resolver) {
                debug!(%error, expression = %resolver.expression(), "dropped failed resolver");
            }
        }
        result
    }
}

impl std::fmt::Debug for EclEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EclEvaluator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Query for exactly `ids`; nothing when empty.
pub(crate) fn ids_query(ids: impl IntoIterator<Item = SctId>) -> Query {
    let ids: BTreeSet<SctId> = ids.into_iter().collect();
    match ids.first() {
        None => Query::MatchNone,
        Some(id) if ids.len() == 1 => Query::term(fields::ID, *id),
        Some(_) => Query::ids(ids),
    }
}

/// Ids of the concepts matching `query`.
pub(crate) async fn query_ids(ctx: &EvalContext, query: Query) -> EvalResult<BTreeSet<SctId>> {
    if let Some(ids) = query.as_ids() {
        return Ok(ids);
    }
    let concepts = ctx.concepts(query, &[fields::ID]).await?;
    Ok(concepts.iter().map(|concept| concept.id).collect())
}

/// Resolves a nested expression to concept ids, bounded by the resolve
/// timeout. Literal ids are returned without a search.
pub(crate) async fn resolve_ids(
    ctx: &EvalContext,
    expression: &EclExpression,
    stage: &str,
) -> EvalResult<BTreeSet<SctId>> {
    if let Some(ids) = expression.literal_ids() {
        return Ok(ids.into_iter().collect());
    }
    ctx.bounded(stage, async {
        let query = evaluate(ctx, expression).await?;
        query_ids(ctx, query).await
    })
    .await
}

/// Compiles one expression node.
pub(crate) fn evaluate<'a>(
    ctx: &'a EvalContext,
    expression: &'a EclExpression,
) -> BoxFuture<'a, EvalResult<Query>> {
    async move {
        match expression {
            EclExpression::Any => Ok(Query::MatchAll),
            EclExpression::ConceptReference { concept_id, .. } => {
                Ok(Query::term(fields::ID, *concept_id))
            }
            EclExpression::ConceptSet(references) => {
                Ok(ids_query(references.iter().map(|reference| reference.concept_id)))
            }
            EclExpression::DescendantOf(inner) => descendants(ctx, inner, false, false).await,
            EclExpression::DescendantOrSelfOf(inner) => descendants(ctx, inner, true, false).await,
            EclExpression::ChildOf(inner) => descendants(ctx, inner, false, true).await,
            EclExpression::ChildOrSelfOf(inner) => descendants(ctx, inner, true, true).await,
            EclExpression::AncestorOf(inner) => ancestors(ctx, inner, false, false).await,
            EclExpression::AncestorOrSelfOf(inner) => ancestors(ctx, inner, true, false).await,
            EclExpression::ParentOf(inner) => ancestors(ctx, inner, false, true).await,
            EclExpression::ParentOrSelfOf(inner) => ancestors(ctx, inner, true, true).await,
            EclExpression::MemberOf(inner) => member_of(ctx, inner).await,
            EclExpression::And(left, right) => {
                let (left, right) = futures::try_join!(evaluate(ctx, left), evaluate(ctx, right))?;
                Ok(Query::and(left, right))
            }
            EclExpression::Or(left, right) => {
                let (left, right) = futures::try_join!(evaluate(ctx, left), evaluate(ctx, right))?;
                Ok(Query::or(left, right))
            }
            EclExpression::Minus(left, right) => {
                let (left, right) = futures::try_join!(evaluate(ctx, left), evaluate(ctx, right))?;
                Ok(Query::exclude(left, right))
            }
            EclExpression::Refined { focus, refinement } => {
                evaluate_refined(ctx, focus, refinement).await
            }
            EclExpression::DotNotation {
                source,
                attribute_type,
            } => dotted(ctx, source, attribute_type).await,
            EclExpression::Filtered {
                expression,
                domain,
                filter,
            } => evaluate_filtered(ctx, expression, *domain, filter).await,
            EclExpression::Supplemented {
                expression,
                supplement,
            } => evaluate_supplemented(ctx, expression, supplement).await,
            EclExpression::Nested(inner) => evaluate(ctx, inner).await,
        }
    }
    .boxed()
}

/// `<`, `<<`, `<!` and `<<!` read the parent and ancestor fields of the
/// candidate concepts.
async fn descendants(
    ctx: &EvalContext,
    inner: &EclExpression,
    include_self: bool,
    direct: bool,
) -> EvalResult<Query> {
    let parents = ctx.form.parents_field();
    if inner.is_any() {
        return Ok(if include_self {
            Query::MatchAll
        } else {
            Query::exists(parents)
        });
    }

    let ids = resolve_ids(ctx, inner, "hierarchy focus").await?;
    if ids.is_empty() {
        return Ok(Query::MatchNone);
    }

    let mut clauses = Vec::with_capacity(3);
    if include_self {
        clauses.push(ids_query(ids.iter().copied()));
    }
    clauses.push(Query::terms(parents, ids.iter().copied()));
    if !direct {
        clauses.push(Query::terms(ctx.form.ancestors_field(), ids.iter().copied()));
    }
    Ok(clauses.into_iter().fold(Query::MatchNone, Query::or))
}

/// `>`, `>>`, `>!` and `>>!` fetch the inner concepts and answer with the
/// ids stored in their parent and ancestor fields.
async fn ancestors(
    ctx: &EvalContext,
    inner: &EclExpression,
    include_self: bool,
    direct: bool,
) -> EvalResult<Query> {
    if include_self && inner.is_any() {
        return Ok(Query::MatchAll);
    }

    let query = match inner.literal_ids() {
        Some(ids) => ids_query(ids),
        None => ctx.bounded("hierarchy focus", evaluate(ctx, inner)).await?,
    };
    let (parents, ancestors) = (ctx.form.parents_field(), ctx.form.ancestors_field());
    let concepts = ctx.concepts(query, &[fields::ID, parents, ancestors]).await?;

    let mut ids = BTreeSet::new();
    for concept in &concepts {
        if include_self {
            ids.insert(concept.id);
        }
        ids.extend(hierarchy_ids(concept, ctx.form, direct));
    }
    Ok(ids_query(ids))
}

fn hierarchy_ids(concept: &ConceptDocument, form: LogicalForm, direct: bool) -> Vec<SctId> {
    let (parents, ancestors) = match form {
        LogicalForm::Inferred => (&concept.parents, &concept.ancestors),
        LogicalForm::Stated => (&concept.stated_parents, &concept.stated_ancestors),
    };
    if direct {
        parents.iter().copied().collect()
    } else {
        parents.iter().chain(ancestors).copied().collect()
    }
}

/// `^ refsets`
async fn member_of(ctx: &EvalContext, inner: &EclExpression) -> EvalResult<Query> {
    if inner.is_any() {
        return Ok(Query::exists(fields::MEMBER_OF));
    }
    let refsets = resolve_ids(ctx, inner, "reference sets").await?;
    Ok(match refsets.first() {
        None => Query::MatchNone,
        Some(refset) if refsets.len() == 1 => Query::term(fields::MEMBER_OF, *refset),
        Some(_) => Query::terms(fields::MEMBER_OF, refsets),
    })
}

/// `source . attribute`: the values of the matching statements of the
/// source concepts, regardless of role group.
async fn dotted(
    ctx: &EvalContext,
    source: &EclExpression,
    attribute_type: &EclExpression,
) -> EvalResult<Query> {
    let source_ids = async {
        if source.is_any() {
            Ok(None)
        } else {
            resolve_ids(ctx, source, "dotted source").await.map(Some)
        }
    };
    let (focus, types) = futures::try_join!(source_ids, attribute_types(ctx, attribute_type))?;

    let filter = StatementFilter {
        focus,
        types,
        value: ValueFilter::AnyConcept,
        reversed: false,
    };
    let properties = statements::fetch(ctx, &filter).await?;
    Ok(ids_query(
        properties.iter().filter_map(|property| property.concept_value()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_query_shapes() {
        assert_eq!(ids_query([]), Query::MatchNone);
        assert_eq!(ids_query([5]), Query::term(fields::ID, 5u64));
        assert_eq!(ids_query([5, 3, 5]), Query::ids([3, 5]));
    }

    #[test]
    fn test_hierarchy_ids_per_form() {
        let mut concept = ConceptDocument::new(1);
        concept.parents.insert(2);
        concept.ancestors.insert(3);
        concept.stated_parents.insert(4);

        assert_eq!(hierarchy_ids(&concept, LogicalForm::Inferred, false), vec![2, 3]);
        assert_eq!(hierarchy_ids(&concept, LogicalForm::Inferred, true), vec![2]);
        assert_eq!(hierarchy_ids(&concept, LogicalForm::Stated, false), vec![4]);
    }
}
