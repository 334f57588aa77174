//! Fetching attribute statements from the three statement sources:
//! relationships, OWL axiom members (stated form only) and concrete domain
//! members.

use std::collections::{BTreeSet, HashSet};

use snomed_ecl::{ComparisonOperator, ConcreteValue, SctId};
use snomed_ecl_index::{
    fields, AxiomRelationship, MemberDocument, Query, RelationshipDocument, Value,
};

use crate::context::EvalContext;
use crate::error::EvalResult;
use crate::filter::comparison_query;
use crate::property::{Property, PropertyValue};

/// Restriction on the value side of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValueFilter {
    /// Any concept value.
    AnyConcept,
    /// A concept value from the set.
    Concepts(BTreeSet<SctId>),
    /// A concept value outside the set.
    NotConcepts(BTreeSet<SctId>),
    /// A concrete value satisfying the comparison.
    Concrete(ComparisonOperator, ConcreteValue),
}

impl ValueFilter {
    fn accepts_concept(&self, id: SctId) -> bool {
        match self {
            ValueFilter::AnyConcept => true,
            ValueFilter::Concepts(ids) => ids.contains(&id),
            ValueFilter::NotConcepts(ids) => !ids.contains(&id),
            ValueFilter::Concrete(..) => false,
        }
    }

    /// Typed comparison, so `#5` equals `#5.0` and values of another type
    /// never match.
    fn accepts_concrete(&self, value: &ConcreteValue) -> bool {
        match self {
            ValueFilter::Concrete(operator, expected) => value.satisfies(*operator, expected),
            _ => false,
        }
    }
}

/// Which statements to fetch.
///
/// `focus` restricts the concept the statement counts for: the source of a
/// forward statement, the destination of a reversed one. `None` means any.
#[derive(Debug, Clone)]
pub(crate) struct StatementFilter {
    pub focus: Option<BTreeSet<SctId>>,
    pub types: Option<BTreeSet<SctId>>,
    pub value: ValueFilter,
    pub reversed: bool,
}

impl StatementFilter {
    fn accepts_type(&self, type_id: SctId) -> bool {
        self.types.as_ref().map_or(true, |types| types.contains(&type_id))
    }

    fn accepts_focus(&self, id: SctId) -> bool {
        self.focus.as_ref().map_or(true, |focus| focus.contains(&id))
    }

    /// Query restricting the value side of a concept statement stored in `field`.
    fn concept_value_query(&self, field: &'static str) -> Query {
        match &self.value {
            ValueFilter::AnyConcept => Query::MatchAll,
            ValueFilter::Concepts(ids) => Query::terms(field, ids.iter().copied()),
            ValueFilter::NotConcepts(ids) => {
                Query::exclude(Query::MatchAll, Query::terms(field, ids.iter().copied()))
            }
            ValueFilter::Concrete(..) => Query::MatchNone,
        }
    }

    fn type_query(&self) -> Query {
        match &self.types {
            Some(types) => Query::terms(fields::TYPE_ID, types.iter().copied()),
            None => Query::MatchAll,
        }
    }

    fn focus_query(&self, field: &'static str) -> Query {
        match &self.focus {
            Some(focus) => Query::terms(field, focus.iter().copied()),
            None => Query::MatchAll,
        }
    }

    fn matches_nothing(&self) -> bool {
        self.focus.as_ref().is_some_and(BTreeSet::is_empty)
            || self.types.as_ref().is_some_and(BTreeSet::is_empty)
            || matches!(&self.value, ValueFilter::Concepts(ids) if ids.is_empty())
    }
}

/// Fetches every distinct statement matching `filter` in the context's
/// logical form.
pub(crate) async fn fetch(ctx: &EvalContext, filter: &StatementFilter) -> EvalResult<Vec<Property>> {
    if filter.matches_nothing() {
        return Ok(Vec::new());
    }

    let (relationships, axioms, members) = futures::try_join!(
        relationship_statements(ctx, filter),
        axiom_statements(ctx, filter),
        concrete_member_statements(ctx, filter),
    )?;

    let unique: HashSet<Property> = relationships
        .into_iter()
        .chain(axioms)
        .chain(members)
        .collect();
    Ok(unique.into_iter().collect())
}

async fn relationship_statements(
    ctx: &EvalContext,
    filter: &StatementFilter,
) -> EvalResult<Vec<Property>> {
    let (object_field, value_field) = if filter.reversed {
        (fields::DESTINATION_ID, fields::SOURCE_ID)
    } else {
        (fields::SOURCE_ID, fields::DESTINATION_ID)
    };

    let value_query = match &filter.value {
        ValueFilter::Concrete(operator, value) => {
            comparison_query(fields::VALUE, *operator, Value::from(value))
        }
        _ => Query::and(
            Query::exists(fields::DESTINATION_ID),
            filter.concept_value_query(value_field),
        ),
    };
    let query = [
        Query::terms(fields::CHARACTERISTIC_TYPE_ID, ctx.characteristic_types()),
        filter.focus_query(object_field),
        filter.type_query(),
        value_query,
    ]
    .into_iter()
    .fold(Query::term(fields::ACTIVE, true), Query::and);

    let relationships = ctx
        .relationships(
            query,
            &[
                fields::SOURCE_ID,
                fields::TYPE_ID,
                fields::DESTINATION_ID,
                fields::VALUE,
                fields::RELATIONSHIP_GROUP,
            ],
        )
        .await?;

    Ok(relationships
        .iter()
        .filter_map(|relationship| relationship_property(filter, relationship))
        .collect())
}

fn relationship_property(
    filter: &StatementFilter,
    relationship: &RelationshipDocument,
) -> Option<Property> {
    let statement = Statement {
        source_id: relationship.source_id,
        type_id: relationship.type_id,
        destination_id: relationship.destination_id,
        value: relationship.value.as_ref(),
        group: relationship.group,
    };
    statement.to_property(filter)
}

/// A statement from any source, before filtering.
struct Statement<'a> {
    source_id: SctId,
    type_id: SctId,
    destination_id: Option<SctId>,
    value: Option<&'a ConcreteValue>,
    group: u32,
}

impl Statement<'_> {
    /// Applies the in-process part of `filter` and normalizes the statement.
    fn to_property(&self, filter: &StatementFilter) -> Option<Property> {
        if !filter.accepts_type(self.type_id) {
            return None;
        }

        if let ValueFilter::Concrete(..) = filter.value {
            let value = self.value?;
            return (filter.accepts_focus(self.source_id) && filter.value.accepts_concrete(value))
                .then(|| {
                    Property::new(
                        self.source_id,
                        self.type_id,
                        PropertyValue::Concrete(value.clone()),
                        self.group,
                    )
                });
        }

        let destination_id = self.destination_id?;
        let (object_id, value_id) = if filter.reversed {
            (destination_id, self.source_id)
        } else {
            (self.source_id, destination_id)
        };
        (filter.accepts_focus(object_id) && filter.value.accepts_concept(value_id)).then(|| {
            Property::new(
                object_id,
                self.type_id,
                PropertyValue::Concept(value_id),
                self.group,
            )
        })
    }
}

/// Statements encoded in OWL axioms. Only the stated form reads them.
///
/// The index narrows the candidate members; the relationships inside each
/// axiom are then matched in process.
async fn axiom_statements(ctx: &EvalContext, filter: &StatementFilter) -> EvalResult<Vec<Property>> {
    if !ctx.form.is_stated() {
        return Ok(Vec::new());
    }

    let (member_query, nested_query) = if filter.reversed {
        (
            filter.concept_value_query(fields::REFERENCED_COMPONENT_ID),
            Query::and(filter.type_query(), filter.focus_query(fields::DESTINATION_ID)),
        )
    } else {
        let value_query = match &filter.value {
            ValueFilter::Concrete(..) => Query::exists(fields::VALUE),
            _ => Query::and(
                Query::exists(fields::DESTINATION_ID),
                filter.concept_value_query(fields::DESTINATION_ID),
            ),
        };
        (
            filter.focus_query(fields::REFERENCED_COMPONENT_ID),
            Query::and(filter.type_query(), value_query),
        )
    };

    let query = [
        Query::term(fields::REFSET_ID, ctx.config.axiom_refset_id),
        member_query,
        Query::nested(fields::CLASS_AXIOM_RELATIONSHIPS, nested_query),
    ]
    .into_iter()
    .fold(Query::term(fields::ACTIVE, true), Query::and);

    let members = ctx
        .members(
            query,
            &[
                fields::REFERENCED_COMPONENT_ID,
                fields::CLASS_AXIOM_RELATIONSHIPS,
            ],
        )
        .await?;

    Ok(members
        .iter()
        .flat_map(|member| axiom_properties(filter, member))
        .collect())
}

fn axiom_properties(filter: &StatementFilter, member: &MemberDocument) -> Vec<Property> {
    member
        .class_axiom_relationships
        .iter()
        .filter_map(|relationship: &AxiomRelationship| {
            Statement {
                source_id: member.referenced_component_id,
                type_id: relationship.type_id,
                destination_id: relationship.destination_id,
                value: relationship.value.as_ref(),
                group: relationship.group,
            }
            .to_property(filter)
        })
        .collect()
}

/// Concrete values held by concrete domain reference set members.
async fn concrete_member_statements(
    ctx: &EvalContext,
    filter: &StatementFilter,
) -> EvalResult<Vec<Property>> {
    let ValueFilter::Concrete(operator, value) = &filter.value else {
        return Ok(Vec::new());
    };

    let query = [
        Query::terms(fields::CHARACTERISTIC_TYPE_ID, ctx.characteristic_types()),
        filter.focus_query(fields::REFERENCED_COMPONENT_ID),
        filter.type_query(),
        comparison_query(fields::VALUE, *operator, Value::from(value)),
    ]
    .into_iter()
    .fold(Query::term(fields::ACTIVE, true), Query::and);

    let members = ctx
        .members(
            query,
            &[
                fields::REFERENCED_COMPONENT_ID,
                fields::TYPE_ID,
                fields::VALUE,
                fields::RELATIONSHIP_GROUP,
            ],
        )
        .await?;

    Ok(members
        .iter()
        .filter_map(|member| {
            let type_id = member.property(fields::TYPE_ID)?.as_id()?;
            let value = member.property(fields::VALUE)?.to_concrete()?;
            let group = match member.property(fields::RELATIONSHIP_GROUP) {
                Some(Value::Int(group)) => u32::try_from(*group).ok()?,
                _ => 0,
            };
            Statement {
                source_id: member.referenced_component_id,
                type_id,
                destination_id: None,
                value: Some(&value),
                group,
            }
            .to_property(filter)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(value: ValueFilter, reversed: bool) -> StatementFilter {
        StatementFilter {
            focus: Some(BTreeSet::from([1])),
            types: Some(BTreeSet::from([10])),
            value,
            reversed,
        }
    }

    fn statement(source_id: SctId, destination_id: SctId) -> Statement<'static> {
        Statement {
            source_id,
            type_id: 10,
            destination_id: Some(destination_id),
            value: None,
            group: 2,
        }
    }

    #[test]
    fn test_forward_statement_counts_for_source() {
        let property = statement(1, 20)
            .to_property(&filter(ValueFilter::Concepts(BTreeSet::from([20])), false))
            .unwrap();
        assert_eq!(property.object_id, 1);
        assert_eq!(property.concept_value(), Some(20));
        assert_eq!(property.group, Some(2));
    }

    #[test]
    fn test_reversed_statement_counts_for_destination() {
        let property = statement(20, 1)
            .to_property(&filter(ValueFilter::Concepts(BTreeSet::from([20])), true))
            .unwrap();
        assert_eq!(property.object_id, 1);
        assert_eq!(property.concept_value(), Some(20));

        assert!(statement(21, 1)
            .to_property(&filter(ValueFilter::Concepts(BTreeSet::from([20])), true))
            .is_none());
    }

    #[test]
    fn test_not_concepts() {
        let not_twenty = filter(ValueFilter::NotConcepts(BTreeSet::from([20])), false);
        assert!(statement(1, 20).to_property(&not_twenty).is_none());
        assert!(statement(1, 21).to_property(&not_twenty).is_some());
    }

    #[test]
    fn test_concrete_values_use_typed_comparison() {
        let five = ConcreteValue::Decimal(snomed_ecl::Decimal::new(50, 1));
        let statement = Statement {
            source_id: 1,
            type_id: 10,
            destination_id: None,
            value: Some(&five),
            group: 0,
        };
        let equal = filter(
            ValueFilter::Concrete(ComparisonOperator::Equal, ConcreteValue::Integer(5)),
            false,
        );
        assert!(statement.to_property(&equal).is_some());

        let string = filter(
            ValueFilter::Concrete(ComparisonOperator::NotEqual, ConcreteValue::String("5".into())),
            false,
        );
        assert!(statement.to_property(&string).is_none());
    }

    #[test]
    fn test_empty_type_set_matches_nothing() {
        let mut empty = filter(ValueFilter::AnyConcept, false);
        empty.types = Some(BTreeSet::new());
        assert!(empty.matches_nothing());
    }
}
