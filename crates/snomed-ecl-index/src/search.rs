//! The search collaborator boundary.

use async_trait::async_trait;

use crate::document::{ConceptDocument, DescriptionDocument, MemberDocument, RelationshipDocument};
use crate::error::IndexResult;
use crate::query::{Field, Query};

/// Default number of hits returned by a [`SearchRequest`].
pub const DEFAULT_LIMIT: usize = 10_000;

/// A single page of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: Query,
    pub offset: usize,
    pub limit: usize,
    /// Fields the caller reads from the hits. Empty means all fields.
    /// Backends may use this to load less data and are free to ignore it.
    pub fields: Vec<Field>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            offset: 0,
            limit: DEFAULT_LIMIT,
            fields: Vec::new(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_fields<F: Into<Field>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// The request for the page after this one.
    pub fn next_page(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            ..self.clone()
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hits<T> {
    pub items: Vec<T>,
    /// Number of documents matching the query across all pages.
    pub total: usize,
}

impl<T> Hits<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    /// Returns true if no later page can contain more hits.
    pub fn is_last_page(&self, request: &SearchRequest) -> bool {
        self.items.is_empty() || request.offset + self.items.len() >= self.total
    }
}

/// Read access to the four searchable document collections.
///
/// Implementations must be safe to call concurrently. Documents are
/// returned in a stable order so that paging is deterministic.
#[async_trait]
pub trait TerminologyIndex: Send + Sync {
    async fn search_concepts(&self, request: SearchRequest) -> IndexResult<Hits<ConceptDocument>>;

    async fn search_descriptions(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<DescriptionDocument>>;

    async fn search_relationships(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<RelationshipDocument>>;

    async fn search_members(&self, request: SearchRequest) -> IndexResult<Hits<MemberDocument>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging() {
        let request = SearchRequest::new(Query::MatchAll).with_limit(2);
        let hits = Hits {
            items: vec![1, 2],
            total: 5,
        };
        assert!(!hits.is_last_page(&request));

        let next = request.next_page();
        assert_eq!(next.offset, 2);
        assert_eq!(next.limit, 2);

        let last = Hits {
            items: vec![5],
            total: 5,
        };
        assert!(last.is_last_page(&next.next_page()));
    }
}
