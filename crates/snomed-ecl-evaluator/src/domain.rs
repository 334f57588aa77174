//! Mapping description and member filter results back to concepts.

use std::collections::BTreeSet;

use snomed_ecl::{FilterDomain, SctId};
use snomed_ecl_index::{fields, Query};

use crate::context::EvalContext;
use crate::error::EvalResult;

/// Turns a query over `domain` into a concept query.
///
/// Concept queries pass through. Description and member queries are run
/// against their collection and answered with the ids of the concepts they
/// reference.
pub(crate) async fn map_to_concept_domain(
    ctx: &EvalContext,
    query: Query,
    domain: FilterDomain,
) -> EvalResult<Query> {
    let concept_ids: BTreeSet<SctId> = match domain {
        FilterDomain::Concept => return Ok(query),
        FilterDomain::Description => ctx
            .descriptions(query, &[fields::CONCEPT_ID])
            .await?
            .iter()
            .map(|description| description.concept_id)
            .collect(),
        FilterDomain::Member => ctx
            .members(query, &[fields::REFERENCED_COMPONENT_ID])
            .await?
            .iter()
            .map(|member| member.referenced_component_id)
            .collect(),
    };
    Ok(Query::ids(concept_ids))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use snomed_ecl_index::{DescriptionDocument, MemberDocument, MemoryIndex};

    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::form::LogicalForm;

    fn context() -> EvalContext {
        let index = MemoryIndex::builder()
            .description(DescriptionDocument::new(1, 100, "Heart attack"))
            .description(DescriptionDocument::new(2, 100, "Heart infarction"))
            .description(DescriptionDocument::new(3, 200, "Lung"))
            .member(MemberDocument::new("m1", 900, 300))
            .build();
        EvalContext::new(
            Arc::new(index),
            Arc::new(EvaluatorConfig::default()),
            LogicalForm::Inferred,
        )
    }

    #[tokio::test]
    async fn test_concept_domain_is_identity() {
        let query = Query::term(fields::ACTIVE, true);
        let mapped = map_to_concept_domain(&context(), query.clone(), FilterDomain::Concept)
            .await
            .unwrap();
        assert_eq!(mapped, query);
    }

    #[tokio::test]
    async fn test_descriptions_map_to_distinct_concepts() {
        let mapped = map_to_concept_domain(
            &context(),
            Query::matching(fields::TERM, "heart"),
            FilterDomain::Description,
        )
        .await
        .unwrap();
        assert_eq!(mapped, Query::ids([100]));
    }

    #[tokio::test]
    async fn test_members_map_to_referenced_components() {
        let mapped = map_to_concept_domain(
            &context(),
            Query::term(fields::REFSET_ID, 900u64),
            FilterDomain::Member,
        )
        .await
        .unwrap();
        assert_eq!(mapped, Query::ids([300]));
    }

    #[tokio::test]
    async fn test_match_none_maps_to_empty_ids() {
        let mapped = map_to_concept_domain(&context(), Query::MatchNone, FilterDomain::Description)
            .await
            .unwrap();
        assert_eq!(mapped, Query::ids([]));
    }
}
