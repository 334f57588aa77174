//! # snomed-ecl-index
//!
//! The search side of ECL evaluation. The evaluator never walks the
//! terminology itself; it describes the components it needs as a [`Query`]
//! and hands it to a [`TerminologyIndex`].
//!
//! This crate provides:
//!
//! - **Queries**: [`Query`], [`QueryBuilder`] and [`Value`], a small boolean
//!   query model over named [`fields`]
//! - **Documents**: concepts, descriptions, relationships and reference set
//!   members as returned by searches
//! - **The boundary**: the async [`TerminologyIndex`] trait with paged
//!   [`SearchRequest`]s
//! - **An implementation**: [`MemoryIndex`], which derives hierarchy fields
//!   from IS-A relationships and OWL axioms
//!
//! ## Quick Start
//!
//! ```rust
//! use snomed_ecl_index::{fields, ConceptDocument, MemoryIndex, Query, SearchRequest, TerminologyIndex};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let index = MemoryIndex::builder()
//!     .concept(ConceptDocument::new(404684003))
//!     .concept(ConceptDocument::new(71388002).inactive())
//!     .build();
//!
//! let active = Query::term(fields::ACTIVE, true);
//! let hits = index.search_concepts(SearchRequest::new(active)).await.unwrap();
//! assert_eq!(hits.total, 1);
//! # });
//! # }
//! ```

pub mod document;
pub mod error;
pub mod fields;
pub mod memory;
pub mod query;
pub mod search;
pub mod well_known;

pub use document::{
    AxiomRelationship, ConceptDocument, DescriptionDocument, MemberDocument, RelationshipDocument,
};
pub use error::{IndexError, IndexResult};
pub use memory::{MemoryIndex, MemoryIndexBuilder};
pub use query::{BoolQuery, Field, Query, QueryBuilder, Value};
pub use search::{Hits, SearchRequest, TerminologyIndex, DEFAULT_LIMIT};
