//! Integration tests for concept, description and member filters.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use snomed_ecl::{
    ComparisonOperator, ConcreteValue, DefinitionStatusToken, DefinitionStatusValue,
    DescriptionTypeToken, DescriptionTypeValue, DialectRef, DialectSpec, EclExpression, EclFilter,
    FilterAcceptability, FilterDomain, MemberFieldValue, SctId, TermMatchType, TypedTerm,
};
use snomed_ecl_evaluator::{EclEvaluator, EvalError, LogicalForm};
use snomed_ecl_index::{
    well_known, ConceptDocument, DescriptionDocument, Hits, IndexResult, MemberDocument,
    MemoryIndex, RelationshipDocument, SearchRequest, TerminologyIndex,
};
use tokio::sync::Barrier;

const CLINICAL_FINDING: SctId = 404684003;
const HEART_ATTACK: SctId = 22298006;
const ASTHMA: SctId = 195967001;
const FRACTURE: SctId = 125605004;

const EXTENSION_MODULE: SctId = 1000002;
const MAP_REFSET: SctId = 447562003;
const OTHER_MAP_REFSET: SctId = 1000003;

const GB: SctId = well_known::REFSET_LANGUAGE_TYPE_UK;
const US: SctId = well_known::REFSET_LANGUAGE_TYPE_US;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn fixture() -> MemoryIndex {
    MemoryIndex::builder()
        .concept(ConceptDocument::new(CLINICAL_FINDING))
        .concept(
            ConceptDocument::new(HEART_ATTACK)
                .fully_defined()
                .with_effective_time(date(2002, 1, 31)),
        )
        .concept(
            ConceptDocument::new(ASTHMA)
                .with_module(EXTENSION_MODULE)
                .with_effective_time(date(2020, 7, 31)),
        )
        .concept(ConceptDocument::new(FRACTURE).with_effective_time(date(2015, 1, 31)))
        .relationship(RelationshipDocument::new(1, HEART_ATTACK, well_known::IS_A, CLINICAL_FINDING))
        .relationship(RelationshipDocument::new(2, ASTHMA, well_known::IS_A, CLINICAL_FINDING))
        .relationship(RelationshipDocument::new(3, FRACTURE, well_known::IS_A, CLINICAL_FINDING))
        .description(DescriptionDocument::fsn(10, CLINICAL_FINDING, "Clinical finding (finding)"))
        .description(
            DescriptionDocument::fsn(11, HEART_ATTACK, "Myocardial infarction (disorder)")
                .preferred_in(GB)
                .preferred_in(US),
        )
        .description(
            DescriptionDocument::new(12, HEART_ATTACK, "Heart attack")
                .preferred_in(GB)
                .preferred_in(US),
        )
        .description(DescriptionDocument::new(13, HEART_ATTACK, "Cardiac infarction").acceptable_in(GB))
        .description(
            DescriptionDocument::new(14, HEART_ATTACK, "Infarto de miocardio").with_language("es"),
        )
        .description(
            DescriptionDocument::fsn(21, ASTHMA, "Asthma (disorder)")
                .with_module(EXTENSION_MODULE)
                .preferred_in(GB),
        )
        .description(
            DescriptionDocument::new(22, ASTHMA, "Asthma")
                .with_module(EXTENSION_MODULE)
                .preferred_in(GB)
                .preferred_in(US),
        )
        .description(
            DescriptionDocument::fsn(31, FRACTURE, "Fracture of bone (morphologic abnormality)")
                .preferred_in(US),
        )
        .description(DescriptionDocument::new(32, FRACTURE, "Broken bone").inactive())
        .member(MemberDocument::new("map-1", MAP_REFSET, HEART_ATTACK).with_property("mapTarget", "I21.9"))
        .member(MemberDocument::new("map-2", MAP_REFSET, ASTHMA).with_property("mapTarget", "J45.9"))
        .member(MemberDocument::new("map-3", MAP_REFSET, FRACTURE).with_property("mapTarget", "T14.2"))
        .member(
            MemberDocument::new("other-1", OTHER_MAP_REFSET, FRACTURE)
                .with_property("mapTarget", "J45.9"),
        )
        .build()
}

fn evaluator() -> EclEvaluator {
    EclEvaluator::new(Arc::new(fixture()))
}

fn findings() -> EclExpression {
    EclExpression::descendant_of(EclExpression::concept(CLINICAL_FINDING))
}

fn filtered(domain: FilterDomain, filter: EclFilter) -> EclExpression {
    EclExpression::filtered(findings(), domain, filter)
}

fn terms(values: &[&str]) -> EclFilter {
    EclFilter::term(values.iter().map(|value| TypedTerm::matching(*value)).collect())
}

async fn ids(expression: &EclExpression) -> BTreeSet<SctId> {
    evaluator()
        .concept_ids(expression, LogicalForm::Inferred)
        .await
        .expect("evaluation should succeed")
        .as_ref()
        .clone()
}

async fn failure(expression: &EclExpression) -> EvalError {
    evaluator()
        .concept_ids(expression, LogicalForm::Inferred)
        .await
        .expect_err("evaluation should fail")
}

fn set(ids: &[SctId]) -> BTreeSet<SctId> {
    ids.iter().copied().collect()
}

// =============================================================================
// Description filters
// =============================================================================

#[tokio::test]
async fn test_term_match_uses_word_prefixes() {
    let expression = filtered(FilterDomain::Description, terms(&["heart att"]));
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK]));

    let expression = filtered(FilterDomain::Description, terms(&["INFARC"]));
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK]));
}

#[tokio::test]
async fn test_any_listed_term_satisfies_the_filter() {
    let expression = filtered(FilterDomain::Description, terms(&["asthma", "fracture"]));
    assert_eq!(ids(&expression).await, set(&[ASTHMA, FRACTURE]));
}

#[tokio::test]
async fn test_wildcard_regex_and_exact_terms() {
    let wild = filtered(
        FilterDomain::Description,
        EclFilter::term(vec![TypedTerm::wild("*BONE*")]),
    );
    assert_eq!(ids(&wild).await, set(&[FRACTURE]));

    let regex = filtered(
        FilterDomain::Description,
        EclFilter::term(vec![TypedTerm {
            match_type: TermMatchType::Regex,
            value: "Heart.*".to_string(),
        }]),
    );
    assert_eq!(ids(&regex).await, set(&[HEART_ATTACK]));

    let exact = filtered(
        FilterDomain::Description,
        EclFilter::term(vec![TypedTerm {
            match_type: TermMatchType::Exact,
            value: "Asthma".to_string(),
        }]),
    );
    assert_eq!(ids(&exact).await, set(&[ASTHMA]));
}

#[tokio::test]
async fn test_negated_term_needs_one_other_description() {
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::Term {
            operator: ComparisonOperator::NotEqual,
            terms: vec![TypedTerm::matching("asthma")],
        },
    );
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK, FRACTURE]));
}

#[tokio::test]
async fn test_short_match_term_is_rejected() {
    let expression = filtered(FilterDomain::Description, terms(&["a"]));
    let error = failure(&expression).await;
    assert!(matches!(error, EvalError::InvalidFilter { .. }));
    assert!(error.to_string().contains("at least two characters"));
}

#[tokio::test]
async fn test_filters_apply_to_the_same_description() {
    let fsn = EclFilter::DescriptionType {
        operator: ComparisonOperator::Equal,
        value: DescriptionTypeValue::Tokens(vec![DescriptionTypeToken::Fsn]),
    };
    let syn = EclFilter::DescriptionType {
        operator: ComparisonOperator::Equal,
        value: DescriptionTypeValue::Tokens(vec![DescriptionTypeToken::Syn]),
    };

    let expression = filtered(FilterDomain::Description, EclFilter::and(terms(&["myocardial"]), fsn));
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK]));

    let expression = filtered(FilterDomain::Description, EclFilter::and(terms(&["myocardial"]), syn));
    assert!(ids(&expression).await.is_empty());
}

#[tokio::test]
async fn test_dialect_acceptability() {
    let dialect = |alias: &str, acceptability| EclFilter::Dialect {
        operator: ComparisonOperator::Equal,
        dialects: vec![DialectSpec::alias(alias, acceptability)],
    };
    let cardiac = |filter| {
        filtered(FilterDomain::Description, EclFilter::and(terms(&["cardiac"]), filter))
    };

    assert_eq!(ids(&cardiac(dialect("en-gb", None))).await, set(&[HEART_ATTACK]));
    assert_eq!(
        ids(&cardiac(dialect("en-GB", Some(FilterAcceptability::Acceptable)))).await,
        set(&[HEART_ATTACK])
    );
    assert!(ids(&cardiac(dialect("en-gb", Some(FilterAcceptability::Preferred))))
        .await
        .is_empty());
    assert!(ids(&cardiac(dialect("en-us", None))).await.is_empty());
}

#[tokio::test]
async fn test_dialect_by_refset_id_and_unknown_alias() {
    let by_id = filtered(
        FilterDomain::Description,
        EclFilter::Dialect {
            operator: ComparisonOperator::Equal,
            dialects: vec![DialectSpec::id(US, Some(FilterAcceptability::Preferred))],
        },
    );
    assert_eq!(ids(&by_id).await, set(&[HEART_ATTACK, ASTHMA, FRACTURE]));

    let unknown = filtered(
        FilterDomain::Description,
        EclFilter::Dialect {
            operator: ComparisonOperator::Equal,
            dialects: vec![DialectSpec::alias("en-nz", None)],
        },
    );
    assert!(ids(&unknown).await.is_empty());
}

#[tokio::test]
async fn test_dialect_specs_are_combined_with_or() {
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::and(
            terms(&["cardiac"]),
            EclFilter::Dialect {
                operator: ComparisonOperator::Equal,
                dialects: vec![
                    DialectSpec::alias("en-nz", None),
                    DialectSpec::id(US, None),
                    DialectSpec::id(GB, Some(FilterAcceptability::Acceptable)),
                ],
            },
        ),
    );
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK]));
}

/// Holds the first two concept searches until both have arrived.
struct RendezvousIndex {
    inner: MemoryIndex,
    barrier: Barrier,
    arrivals: AtomicUsize,
}

#[async_trait]
impl TerminologyIndex for RendezvousIndex {
    async fn search_concepts(&self, request: SearchRequest) -> IndexResult<Hits<ConceptDocument>> {
        if self.arrivals.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        self.inner.search_concepts(request).await
    }

    async fn search_descriptions(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<DescriptionDocument>> {
        self.inner.search_descriptions(request).await
    }

    async fn search_relationships(
        &self,
        request: SearchRequest,
    ) -> IndexResult<Hits<RelationshipDocument>> {
        self.inner.search_relationships(request).await
    }

    async fn search_members(&self, request: SearchRequest) -> IndexResult<Hits<MemberDocument>> {
        self.inner.search_members(request).await
    }
}

#[tokio::test]
async fn test_dialects_resolve_concurrently() {
    let inner = MemoryIndex::builder()
        .concept(ConceptDocument::new(CLINICAL_FINDING))
        .concept(ConceptDocument::new(HEART_ATTACK))
        .concept(ConceptDocument::new(GB))
        .concept(ConceptDocument::new(US))
        .relationship(RelationshipDocument::new(1, HEART_ATTACK, well_known::IS_A, CLINICAL_FINDING))
        .description(DescriptionDocument::new(12, HEART_ATTACK, "Heart attack").acceptable_in(GB))
        .build();
    let index = RendezvousIndex {
        inner,
        barrier: Barrier::new(2),
        arrivals: AtomicUsize::new(0),
    };
    let evaluator = EclEvaluator::new(Arc::new(index));

    // Each dialect needs a concept search, and neither search completes
    // until the other one has started.
    let dialect = |refset| DialectSpec {
        dialect: DialectRef::Expression(Box::new(EclExpression::descendant_or_self_of(
            EclExpression::concept(refset),
        ))),
        acceptability: None,
    };
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::Dialect {
            operator: ComparisonOperator::Equal,
            dialects: vec![dialect(GB), dialect(US)],
        },
    );

    let ids = tokio::time::timeout(
        Duration::from_secs(5),
        evaluator.concept_ids(&expression, LogicalForm::Inferred),
    )
    .await
    .expect("dialect searches should run together")
    .unwrap();
    assert_eq!(ids.as_ref(), &set(&[HEART_ATTACK]));
}

#[tokio::test]
async fn test_language_filter() {
    let spanish = filtered(
        FilterDomain::Description,
        EclFilter::Language {
            operator: ComparisonOperator::Equal,
            codes: vec!["es".to_string()],
        },
    );
    assert_eq!(ids(&spanish).await, set(&[HEART_ATTACK]));

    let invalid = filtered(
        FilterDomain::Description,
        EclFilter::Language {
            operator: ComparisonOperator::Equal,
            codes: vec!["ES".to_string()],
        },
    );
    assert!(matches!(failure(&invalid).await, EvalError::InvalidFilter { .. }));
}

#[tokio::test]
async fn test_semantic_tag_filter() {
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::SemanticTag {
            operator: ComparisonOperator::Equal,
            tags: vec!["morphologic abnormality".to_string()],
        },
    );
    assert_eq!(ids(&expression).await, set(&[FRACTURE]));
}

#[tokio::test]
async fn test_description_active_filter() {
    let expression = filtered(FilterDomain::Description, EclFilter::Active(false));
    assert_eq!(ids(&expression).await, set(&[FRACTURE]));

    // Inactive descriptions still match unless the filter asks otherwise.
    let expression = filtered(FilterDomain::Description, terms(&["broken"]));
    assert_eq!(ids(&expression).await, set(&[FRACTURE]));
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::and(terms(&["broken"]), EclFilter::Active(true)),
    );
    assert!(ids(&expression).await.is_empty());
}

#[tokio::test]
async fn test_description_module_filter() {
    let expression = filtered(FilterDomain::Description, EclFilter::module(EXTENSION_MODULE));
    assert_eq!(ids(&expression).await, set(&[ASTHMA]));

    let expression = filtered(
        FilterDomain::Description,
        EclFilter::Module {
            operator: ComparisonOperator::NotEqual,
            value: Box::new(EclExpression::concept(EXTENSION_MODULE)),
        },
    );
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK, FRACTURE]));
}

#[tokio::test]
async fn test_filter_disjunction() {
    let expression = filtered(
        FilterDomain::Description,
        EclFilter::or(terms(&["asthma"]), terms(&["broken"])),
    );
    assert_eq!(ids(&expression).await, set(&[ASTHMA, FRACTURE]));
}

// =============================================================================
// Concept filters
// =============================================================================

#[tokio::test]
async fn test_definition_status_filter() {
    let status = |token| EclFilter::DefinitionStatus {
        operator: ComparisonOperator::Equal,
        value: DefinitionStatusValue::Token(token),
    };

    let defined = filtered(FilterDomain::Concept, status(DefinitionStatusToken::Defined));
    assert_eq!(ids(&defined).await, set(&[HEART_ATTACK]));

    let primitive = filtered(FilterDomain::Concept, status(DefinitionStatusToken::Primitive));
    assert_eq!(ids(&primitive).await, set(&[ASTHMA, FRACTURE]));
}

#[tokio::test]
async fn test_concept_module_and_id_filters() {
    let module = filtered(FilterDomain::Concept, EclFilter::module(EXTENSION_MODULE));
    assert_eq!(ids(&module).await, set(&[ASTHMA]));

    let id = filtered(
        FilterDomain::Concept,
        EclFilter::Id {
            operator: ComparisonOperator::Equal,
            ids: vec![ASTHMA, CLINICAL_FINDING],
        },
    );
    // The focus set still applies.
    assert_eq!(ids(&id).await, set(&[ASTHMA]));
}

#[tokio::test]
async fn test_effective_time_filter() {
    let since = |operator, date: &str| {
        filtered(
            FilterDomain::Concept,
            EclFilter::EffectiveTime {
                operator,
                date: date.to_string(),
            },
        )
    };

    assert_eq!(
        ids(&since(ComparisonOperator::GreaterThanOrEqual, "20150131")).await,
        set(&[ASTHMA, FRACTURE])
    );
    assert_eq!(
        ids(&since(ComparisonOperator::LessThan, "20150131")).await,
        set(&[HEART_ATTACK])
    );
    assert_eq!(
        ids(&since(ComparisonOperator::Equal, "20200731")).await,
        set(&[ASTHMA])
    );

    let error = failure(&since(ComparisonOperator::Equal, "2020-07-31")).await;
    assert!(error.to_string().contains("YYYYMMDD"));
}

#[tokio::test]
async fn test_filter_outside_its_domain_is_rejected() {
    let error = failure(&filtered(FilterDomain::Concept, terms(&["heart"]))).await;
    assert!(matches!(error, EvalError::InvalidFilter { .. }));
    assert!(error
        .to_string()
        .contains("term filter cannot be used on the concept domain"));

    let status = EclFilter::DefinitionStatus {
        operator: ComparisonOperator::Equal,
        value: DefinitionStatusValue::Token(DefinitionStatusToken::Defined),
    };
    let error = failure(&filtered(FilterDomain::Description, status)).await;
    assert!(error.is_request_error());
}

#[tokio::test]
async fn test_ordering_operator_on_equality_filter_is_rejected() {
    let expression = filtered(
        FilterDomain::Concept,
        EclFilter::Module {
            operator: ComparisonOperator::GreaterThan,
            value: Box::new(EclExpression::concept(EXTENSION_MODULE)),
        },
    );
    let error = failure(&expression).await;
    assert!(error.to_string().contains("not supported by the moduleId filter"));
}

// =============================================================================
// Member filters
// =============================================================================

fn map_target(value: &str) -> EclFilter {
    EclFilter::MemberField {
        field: "mapTarget".to_string(),
        operator: ComparisonOperator::Equal,
        value: MemberFieldValue::Concrete(ConcreteValue::String(value.to_string())),
    }
}

#[tokio::test]
async fn test_member_filter_is_limited_to_the_focus_refset() {
    let expression = EclExpression::filtered(
        EclExpression::member_of(MAP_REFSET),
        FilterDomain::Member,
        map_target("J45.9"),
    );
    assert_eq!(ids(&expression).await, set(&[ASTHMA]));
}

#[tokio::test]
async fn test_member_filter_on_plain_focus_reads_every_refset() {
    let expression = filtered(FilterDomain::Member, map_target("J45.9"));
    assert_eq!(ids(&expression).await, set(&[ASTHMA, FRACTURE]));
}

#[tokio::test]
async fn test_member_field_component_constraint() {
    let expression = EclExpression::filtered(
        EclExpression::member_of(MAP_REFSET),
        FilterDomain::Member,
        EclFilter::MemberField {
            field: "referencedComponentId".to_string(),
            operator: ComparisonOperator::NotEqual,
            value: MemberFieldValue::Expression(Box::new(EclExpression::concept(ASTHMA))),
        },
    );
    assert_eq!(ids(&expression).await, set(&[HEART_ATTACK, FRACTURE]));
}

#[tokio::test]
async fn test_filter_over_any_uses_the_filter_alone() {
    let expression = EclExpression::filtered(
        EclExpression::Any,
        FilterDomain::Description,
        terms(&["clinical"]),
    );
    assert_eq!(ids(&expression).await, set(&[CLINICAL_FINDING]));
}
