//! An in-memory [`TerminologyIndex`].
//!
//! Useful for tests and small terminologies. Concept hierarchy fields are
//! derived when the index is built:
//!
//! - `parents`/`ancestors` from active inferred IS-A relationships
//! - `statedParents`/`statedAncestors` from active stated IS-A relationships
//!   and the IS-A relationships of active OWL axiom members
//! - `memberOf` from active reference set members
//!
//! # Example
//!
//! ```rust
//! use snomed_ecl_index::{ConceptDocument, MemoryIndex, RelationshipDocument, well_known};
//!
//! let index = MemoryIndex::builder()
//!     .concept(ConceptDocument::new(138875005))
//!     .concept(ConceptDocument::new(404684003))
//!     .relationship(RelationshipDocument::new(1, 404684003, well_known::IS_A, 138875005))
//!     .build();
//! assert_eq!(index.concept_count(), 2);
//! ```

mod closure;
mod matcher;

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use snomed_ecl::SctId;
use tracing::{debug, trace};

use crate::document::{ConceptDocument, DescriptionDocument, MemberDocument, RelationshipDocument};
use crate::error::IndexResult;
use crate::search::{Hits, SearchRequest, TerminologyIndex};
use crate::well_known;

use closure::HierarchyClosure;
use matcher::{Indexed, Matcher};

#[derive(Debug, Default)]
struct Collections {
    concepts: BTreeMap<SctId, ConceptDocument>,
    descriptions: BTreeMap<SctId, DescriptionDocument>,
    relationships: BTreeMap<SctId, RelationshipDocument>,
    members: BTreeMap<String, MemberDocument>,
}

/// Thread-safe in-memory document store answering [`Query`](crate::Query)
/// searches by scanning.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<Collections>,
}

impl MemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MemoryIndexBuilder {
        MemoryIndexBuilder::default()
    }

    pub fn concept_count(&self) -> usize {
        self.collections.read().concepts.len()
    }

    /// Looks up a concept by id.
    pub fn concept(&self, id: SctId) -> Option<ConceptDocument> {
        self.collections.read().concepts.get(&id).cloned()
    }

    /// Replaces the content of the index and recomputes derived fields.
    pub fn load(&self, builder: MemoryIndexBuilder) {
        let collections = builder.into_collections();
        *self.collections.write() = collections;
    }
}

fn search<'a, T>(
    docs: impl Iterator<Item = &'a T>,
    request: &SearchRequest,
) -> IndexResult<Hits<T>>
where
    T: Indexed + Clone + 'a,
{
    let matcher = Matcher::compile(&request.query)?;
    let mut total = 0;
    let mut items = Vec::new();
    for doc in docs.filter(|doc| matcher.matches(*doc)) {
        if total >= request.offset && items.len() < request.limit {
            items.push(doc.clone());
        }
        total += 1;
    }
    trace!(
        query = %request.query,
        offset = request.offset,
        returned = items.len(),
        total,
        "memory index search"
    );
    Ok(Hits { items, total })
}

#[async_trait]
impl TerminologyIndex for MemoryIndex {
    async fn search_concepts(&self, request: SearchRequest) -> IndexResult<Hits<ConceptDocument>> {
        let collections = self.collections.read();
        search(collections.concepts.values(), &request)
    }

    async fn search_descriptions(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<DescriptionDocument>> {
        let collections = self.collections.read();
        search(collections.descriptions.values(), &request)
    }

    async fn search_relationships(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<RelationshipDocument>> {
        let collections = self.collections.read();
        search(collections.relationships.values(), &request)
    }

    async fn search_members(&self, request: SearchRequest) -> IndexResult<Hits<MemberDocument>> {
        let collections = self.collections.read();
        search(collections.members.values(), &request)
    }
}

/// Collects documents for a [`MemoryIndex`].
#[derive(Debug, Default)]
pub struct MemoryIndexBuilder {
    concepts: Vec<ConceptDocument>,
    descriptions: Vec<DescriptionDocument>,
    relationships: Vec<RelationshipDocument>,
    members: Vec<MemberDocument>,
}

impl MemoryIndexBuilder {
    pub fn concept(mut self, concept: ConceptDocument) -> Self {
        self.concepts.push(concept);
        self
    }

    pub fn concepts(mut self, concepts: impl IntoIterator<Item = ConceptDocument>) -> Self {
        self.concepts.extend(concepts);
        self
    }

    pub fn description(mut self, description: DescriptionDocument) -> Self {
        self.descriptions.push(description);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDocument) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn member(mut self, member: MemberDocument) -> Self {
        self.members.push(member);
        self
    }

    pub fn build(self) -> MemoryIndex {
        MemoryIndex {
            collections: RwLock::new(self.into_collections()),
        }
    }

    fn into_collections(self) -> Collections {
        let inferred = HierarchyClosure::build(
            self.relationships
                .iter()
                .filter(|r| {
                    r.active
                        && r.type_id == well_known::IS_A
                        && r.characteristic_type_id == well_known::INFERRED_RELATIONSHIP
                })
                .filter_map(|r| r.destination_id.map(|destination| (r.source_id, destination))),
        );

        let stated_relationships = self
            .relationships
            .iter()
            .filter(|r| {
                r.active
                    && r.type_id == well_known::IS_A
                    && r.characteristic_type_id == well_known::STATED_RELATIONSHIP
            })
            .filter_map(|r| r.destination_id.map(|destination| (r.source_id, destination)));
        let axiom_parents = self
            .members
            .iter()
            .filter(|m| m.active && m.refset_id == well_known::REFSET_OWL_AXIOM)
            .flat_map(|m| {
                m.class_axiom_relationships
                    .iter()
                    .filter(|r| r.type_id == well_known::IS_A && r.group == 0)
                    .filter_map(move |r| {
                        r.destination_id
                            .map(|destination| (m.referenced_component_id, destination))
                    })
            });
        let stated = HierarchyClosure::build(stated_relationships.chain(axiom_parents));

        debug!(
            concepts = self.concepts.len(),
            inferred_edges = inferred.edge_count(),
            inferred_depth = inferred.max_depth(),
            stated_edges = stated.edge_count(),
            stated_depth = stated.max_depth(),
            "building memory index"
        );

        let mut concepts: BTreeMap<SctId, ConceptDocument> = self
            .concepts
            .into_iter()
            .map(|mut concept| {
                concept.parents.extend(inferred.parents(concept.id));
                concept.ancestors.extend(inferred.indirect_ancestors(concept.id));
                concept.stated_parents.extend(stated.parents(concept.id));
                concept
                    .stated_ancestors
                    .extend(stated.indirect_ancestors(concept.id));
                (concept.id, concept)
            })
            .collect();

        for member in self.members.iter().filter(|m| m.active) {
            if let Some(concept) = concepts.get_mut(&member.referenced_component_id) {
                concept.member_of.insert(member.refset_id);
            }
        }

        Collections {
            concepts,
            descriptions: self.descriptions.into_iter().map(|d| (d.id, d)).collect(),
            relationships: self.relationships.into_iter().map(|r| (r.id, r)).collect(),
            members: self
                .members
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AxiomRelationship;
    use crate::fields;
    use crate::query::Query;
    use std::collections::BTreeSet;

    fn create_test_index() -> MemoryIndex {
        MemoryIndex::builder()
            .concepts([100, 200, 300, 400].map(ConceptDocument::new))
            .concept(ConceptDocument::new(500).inactive())
            .relationship(RelationshipDocument::new(1, 200, well_known::IS_A, 100))
            .relationship(RelationshipDocument::new(2, 300, well_known::IS_A, 200))
            .relationship(RelationshipDocument::new(3, 400, well_known::IS_A, 100).stated())
            .relationship(RelationshipDocument::new(4, 300, well_known::IS_A, 100).inactive())
            .member(MemberDocument::axiom(
                "ax1",
                300,
                [AxiomRelationship::new(well_known::IS_A, 400, 0)],
            ))
            .member(MemberDocument::new("m1", 900, 300))
            .member(MemberDocument::new("m2", 901, 300).inactive())
            .build()
    }

    #[tokio::test]
    async fn test_derived_inferred_hierarchy() {
        let index = create_test_index();
        let concept = index.concept(300).unwrap();
        assert_eq!(concept.parents, BTreeSet::from([200]));
        assert_eq!(concept.ancestors, BTreeSet::from([100]));

        let hits = index
            .search_concepts(SearchRequest::new(Query::term(fields::ANCESTORS, 100u64)))
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.items[0].id, 300);
    }

    #[tokio::test]
    async fn test_derived_stated_hierarchy_includes_axioms() {
        let index = create_test_index();
        let concept = index.concept(300).unwrap();
        assert_eq!(concept.stated_parents, BTreeSet::from([400]));
        assert_eq!(concept.stated_ancestors, BTreeSet::from([100]));
    }

    #[tokio::test]
    async fn test_member_of_ignores_inactive_members() {
        let index = create_test_index();
        assert_eq!(index.concept(300).unwrap().member_of, BTreeSet::from([900]));
    }

    #[tokio::test]
    async fn test_paging() {
        let index = create_test_index();
        let request = SearchRequest::new(Query::term(fields::ACTIVE, true)).with_limit(3);
        let first = index.search_concepts(request.clone()).await.unwrap();
        assert_eq!(first.total, 4);
        assert_eq!(
            first.items.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );

        let second = index.search_concepts(request.next_page()).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.is_last_page(&request.next_page()));
    }

    #[tokio::test]
    async fn test_invalid_regex_is_reported() {
        let index = create_test_index();
        let result = index
            .search_descriptions(SearchRequest::new(Query::regex(fields::TERM, "[")))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_replaces_content() {
        let index = MemoryIndex::new();
        assert_eq!(index.concept_count(), 0);
        index.load(MemoryIndex::builder().concept(ConceptDocument::new(1)));
        assert_eq!(index.concept_count(), 1);
    }
}
