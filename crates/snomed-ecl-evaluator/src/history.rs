//! `{{ +HISTORY }}` supplements.

use std::collections::BTreeSet;

use snomed_ecl::{EclExpression, HistoryProfile, HistorySupplement, SctId};
use snomed_ecl_index::{fields, Query};
use tracing::debug;

use crate::context::EvalContext;
use crate::error::EvalResult;
use crate::evaluator::{ids_query, resolve_ids};

/// Evaluates `expression {{ +HISTORY... }}`: the focus concepts plus every
/// component an active association member of the selected reference sets
/// points at them from.
pub(crate) async fn evaluate_supplemented(
    ctx: &EvalContext,
    expression: &EclExpression,
    supplement: &HistorySupplement,
) -> EvalResult<Query> {
    let (mut ids, refsets) = futures::try_join!(
        resolve_ids(ctx, expression, "history focus"),
        association_refsets(ctx, supplement),
    )?;
    if ids.is_empty() || refsets.is_empty() {
        return Ok(ids_query(ids));
    }

    let query = Query::bool()
        .filter(Query::term(fields::ACTIVE, true))
        .filter(Query::terms(fields::REFSET_ID, refsets.iter().copied()))
        .filter(Query::terms(fields::TARGET_COMPONENT_ID, ids.iter().copied()))
        .build();
    let members = ctx
        .members(query, &[fields::REFERENCED_COMPONENT_ID])
        .await?;

    let focus = ids.len();
    ids.extend(members.iter().map(|member| member.referenced_component_id));
    debug!(
        %supplement,
        refsets = refsets.len(),
        focus,
        supplemented = ids.len() - focus,
        "history supplement"
    );
    Ok(ids_query(ids))
}

async fn association_refsets(
    ctx: &EvalContext,
    supplement: &HistorySupplement,
) -> EvalResult<BTreeSet<SctId>> {
    let history = &ctx.config.history;
    match supplement {
        HistorySupplement::Profile(HistoryProfile::Min) => Ok(history.min.clone()),
        HistorySupplement::Profile(HistoryProfile::Mod) => Ok(history.moderate.clone()),
        HistorySupplement::Profile(HistoryProfile::Max) => {
            let descendants = EclExpression::descendant_of(EclExpression::concept(
                history.association_root,
            ));
            resolve_ids(ctx, &descendants, "history reference sets").await
        }
        HistorySupplement::Subset(expression) => {
            resolve_ids(ctx, expression, "history reference sets").await
        }
    }
}
