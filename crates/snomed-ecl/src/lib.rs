//! # snomed-ecl
//!
//! Syntax tree types for the SNOMED CT Expression Constraint Language (ECL)
//! and the canonical rewriting pass applied before evaluation.
//!
//! Text parsing happens upstream; this crate models the tree the grammar
//! produces, renders it back to ECL text through `Display`, and normalises it
//! with [`rewrite`].
//!
//! ## Usage
//!
//! ```rust
//! use snomed_ecl::{rewrite, EclExpression};
//!
//! // << 404684003 AND (<< 19829001 AND << 301867009)
//! let expr = EclExpression::and(
//!     EclExpression::descendant_or_self_of(EclExpression::concept(404684003)),
//!     EclExpression::nested(EclExpression::and(
//!         EclExpression::descendant_or_self_of(EclExpression::concept(19829001)),
//!         EclExpression::descendant_or_self_of(EclExpression::concept(301867009)),
//!     )),
//! );
//!
//! let canonical = rewrite(&expr);
//! assert_eq!(canonical.to_string(), "<< 404684003 AND << 19829001 AND << 301867009");
//! assert_eq!(rewrite(&canonical), canonical);
//! ```
//!
//! ## ECL Syntax Quick Reference
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | (none) | Self | `404684003` |
//! | `<` | Descendants of | `< 404684003` |
//! | `<<` | Descendants or self of | `<< 404684003` |
//! | `<!` | Children of | `<! 404684003` |
//! | `>` | Ancestors of | `> 404684003` |
//! | `>>` | Ancestors or self of | `>> 404684003` |
//! | `>!` | Parents of | `>! 404684003` |
//! | `^` | Member of (refset) | `^ 700043003` |
//! | `*` | Any concept | `*` |
//! | `:` | Refinement | `< 404684003 : 363698007 = << 39057004` |
//! | `.` | Attribute values | `< 404684003 . 363698007` |
//! | `{{ }}` | Filters and history supplements | `* {{ c active = true }}` |
//! | `AND` | Conjunction | `<< A AND << B` |
//! | `OR` | Disjunction | `<< A OR << B` |
//! | `MINUS` | Exclusion | `<< A MINUS << B` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod filter;
mod rewrite;

pub use ast::{
    AttributeConstraint, AttributeGroup, Cardinality, Comparison, ComparisonOperator,
    ConceptReference, ConcreteValue, EclExpression, HistoryProfile, HistorySupplement,
    Refinement, RefinementOperator,
};
pub use error::{EclError, EclResult};
pub use filter::{
    DefinitionStatusToken, DefinitionStatusValue, DescriptionTypeToken, DescriptionTypeValue,
    DialectRef, DialectSpec, EclFilter, FilterAcceptability, FilterDomain, MemberFieldValue,
    TermMatchType, TypedTerm,
};
pub use rewrite::rewrite;

/// Re-exported so downstream crates build decimal concrete values with the same type.
pub use rust_decimal::Decimal;

/// SNOMED CT Identifier type (64-bit unsigned integer).
pub type SctId = u64;
