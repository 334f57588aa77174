//! # snomed-ecl-evaluator
//!
//! Asynchronous ECL evaluation engine for SNOMED CT.
//!
//! This crate compiles [`snomed-ecl`] expression trees into queries for any
//! terminology index implementing [`TerminologyIndex`], and resolves them to
//! concept ids, concept documents or concept to role group maps.
//!
//! ## Key Features
//!
//! - **Two logical forms** - inferred relationships, or stated relationships
//!   together with OWL axiom statements
//! - **Refinements** - cardinality, role groups, reversed attributes and
//!   concrete values
//! - **Filters** - concept, description and member filters
//! - **History supplements** - `{{ +HISTORY-MIN }}`, `-MOD`, `-MAX` and
//!   custom association sets
//! - **Single-flight resolution** - each shape of an expression is computed
//!   once per resolver, optionally cached across requests
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use snomed_ecl::{AttributeConstraint, Comparison, EclExpression, Refinement};
//! use snomed_ecl_evaluator::{EclEvaluator, LogicalForm};
//! use snomed_ecl_index::{ConceptDocument, MemoryIndex, RelationshipDocument};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let index = MemoryIndex::builder()
//!     .concepts([ConceptDocument::new(404684003), ConceptDocument::new(1), ConceptDocument::new(2)])
//!     .relationship(RelationshipDocument::new(10, 1, 116680003, 404684003))
//!     .relationship(RelationshipDocument::new(11, 2, 116680003, 404684003))
//!     .relationship(RelationshipDocument::new(12, 1, 116676008, 409774005))
//!     .build();
//! let evaluator = EclEvaluator::new(Arc::new(index));
//!
//! // < 404684003 : 116676008 = 409774005
//! let expression = EclExpression::refined(
//!     EclExpression::descendant_of(EclExpression::concept(404684003)),
//!     Refinement::attribute(AttributeConstraint::new(
//!         EclExpression::concept(116676008),
//!         Comparison::equal(EclExpression::concept(409774005)),
//!     )),
//! );
//! let ids = evaluator.concept_ids(&expression, LogicalForm::Inferred).await.unwrap();
//! assert!(ids.contains(&1));
//! assert!(!ids.contains(&2));
//! # });
//! ```
//!
//! ## With Configuration
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use snomed_ecl_evaluator::{CacheConfig, EclEvaluator, EvaluatorConfig};
//! use snomed_ecl_index::MemoryIndex;
//!
//! let config = EvaluatorConfig::builder()
//!     .with_cache(CacheConfig {
//!         max_entries: 10_000,
//!         ttl: Duration::from_secs(300),
//!     })
//!     .with_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let evaluator = EclEvaluator::with_config(Arc::new(MemoryIndex::new()), config);
//! assert!(evaluator.cache().is_some());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    snomed-ecl-evaluator                       │
//! │                                                               │
//! │  EclEvaluator                                                 │
//! │  ├── rewrite expression (snomed-ecl)                          │
//! │  ├── ExpressionResolver (memoized, optionally cached)         │
//! │  │   ├── evaluate → Query                                     │
//! │  │   ├── refinements → statements → cardinality filtering     │
//! │  │   ├── filters → description / member searches              │
//! │  │   └── history supplements → association members           │
//! │  └── outer timeout                                            │
//! │                                                               │
//! │  Dependencies:                                                │
//! │  ├── snomed-ecl       - ECL AST and rewriter                  │
//! │  └── snomed-ecl-index - TerminologyIndex, Query, documents    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod cardinality;
mod config;
mod context;
mod domain;
mod error;
mod evaluator;
mod filter;
mod form;
mod history;
mod property;
mod refinement;
mod resolver;
mod statements;

// Public re-exports
pub use cache::{normalize_cache_key, CacheStats, ResolverCache};
pub use cardinality::filter_by_cardinality;
pub use config::{
    CacheConfig, EvaluatorConfig, EvaluatorConfigBuilder, HistoryConfig, HAS_ACTIVE_INGREDIENT,
    HAS_DOSE_FORM, LATERALITY, PART_OF,
};
pub use error::{EvalError, EvalResult};
pub use evaluator::EclEvaluator;
pub use form::LogicalForm;
pub use property::{Property, PropertyValue};
pub use resolver::{ConceptGroups, ExpressionResolver};

// Re-export commonly used types from dependencies for convenience
pub use snomed_ecl::{EclExpression, SctId};
pub use snomed_ecl_index::{Query, TerminologyIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<CacheConfig> = None;
        let _: Option<EvaluatorConfig> = None;
        let _: Option<ExpressionResolver> = None;
        let _: Option<EvalResult<()>> = None;
        let _id: SctId = 73211009;
    }
}
