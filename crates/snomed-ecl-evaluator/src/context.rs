//! Per-evaluation capabilities: the search collaborator, configuration and
//! the logical form.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use snomed_ecl::SctId;
use snomed_ecl_index::{
    ConceptDocument, DescriptionDocument, Hits, IndexResult, MemberDocument, Query,
    RelationshipDocument, SearchRequest, TerminologyIndex,
};
use tracing::{trace, warn};

use crate::config::EvaluatorConfig;
use crate::error::{EvalError, EvalResult};
use crate::form::LogicalForm;

/// Everything an evaluation needs. Cheap to clone.
#[derive(Clone)]
pub(crate) struct EvalContext {
    pub index: Arc<dyn TerminologyIndex>,
    pub config: Arc<EvaluatorConfig>,
    pub form: LogicalForm,
}

impl EvalContext {
    pub fn new(
        index: Arc<dyn TerminologyIndex>,
        config: Arc<EvaluatorConfig>,
        form: LogicalForm,
    ) -> Self {
        Self {
            index,
            config,
            form,
        }
    }

    pub fn characteristic_types(&self) -> Vec<SctId> {
        self.config
            .characteristic_types(self.form)
            .iter()
            .copied()
            .collect()
    }

    /// Runs a nested resolution another step is blocked on, bounded by the
    /// configured resolve timeout.
    pub async fn bounded<T, F>(&self, stage: &str, future: F) -> EvalResult<T>
    where
        F: Future<Output = EvalResult<T>>,
    {
        with_timeout(self.config.resolve_timeout, stage, future).await
    }

    /// Collects every page of a search.
    async fn scroll<T, F>(
        &self,
        collection: &'static str,
        query: Query,
        fields: &[&'static str],
        search: F,
    ) -> EvalResult<Vec<T>>
    where
        F: Fn(Arc<dyn TerminologyIndex>, SearchRequest) -> BoxFuture<'static, IndexResult<Hits<T>>>,
    {
        if query.is_match_none() {
            return Ok(Vec::new());
        }

        let mut request = SearchRequest::new(query)
            .with_limit(self.config.page_size)
            .with_fields(fields.iter().copied());
        let mut items = Vec::new();
        loop {
            let hits = search(self.index.clone(), request.clone()).await?;
            trace!(
                collection,
                offset = request.offset,
                returned = hits.items.len(),
                total = hits.total,
                "search page"
            );
            let last = hits.is_last_page(&request);
            items.extend(hits.items);
            if last {
                break;
            }
            request = request.next_page();
        }
        Ok(items)
    }

    pub async fn concepts(
        &self,
        query: Query,
        fields: &[&'static str],
    ) -> EvalResult<Vec<ConceptDocument>> {
        self.scroll("concepts", query, fields, |index, request| {
            async move { index.search_concepts(request).await }.boxed()
        })
        .await
    }

    pub async fn descriptions(
        &self,
        query: Query,
        fields: &[&'static str],
    ) -> EvalResult<Vec<DescriptionDocument>> {
        self.scroll("descriptions", query, fields, |index, request| {
            async move { index.search_descriptions(request).await }.boxed()
        })
        .await
    }

    pub async fn relationships(
        &self,
        query: Query,
        fields: &[&'static str],
    ) -> EvalResult<Vec<RelationshipDocument>> {
        self.scroll("relationships", query, fields, |index, request| {
            async move { index.search_relationships(request).await }.boxed()
        })
        .await
    }

    pub async fn members(
        &self,
        query: Query,
        fields: &[&'static str],
    ) -> EvalResult<Vec<MemberDocument>> {
        self.scroll("members", query, fields, |index, request| {
            async move { index.search_members(request).await }.boxed()
        })
        .await
    }
}

/// Fails with [`EvalError::Timeout`] when `future` does not finish within
/// `after`. The future is dropped, together with its pending searches.
pub(crate) async fn with_timeout<T, F>(after: Duration, stage: &str, future: F) -> EvalResult<T>
where
    F: Future<Output = EvalResult<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(stage, ?after, "timed out");
            Err(EvalError::Timeout {
                after,
                stage: stage.to_string(),
            })
        }
    }
}
