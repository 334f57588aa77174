//! Cardinality filtering of matched statements.
//!
//! The ungrouped rule counts statements per concept. The grouped rule counts
//! statements per role group, and then valid groups per concept.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use snomed_ecl::{Cardinality, SctId};
use tracing::debug;

use crate::property::Property;

/// Keeps the properties of concepts that satisfy the cardinalities.
///
/// Ungrouped: a concept is kept with all its properties iff its property
/// count is in `item_cardinality`; `group_cardinality` is ignored.
///
/// Grouped: a role group is valid iff its property count is in
/// `item_cardinality`; a concept is kept with the properties of its valid
/// groups iff the number of valid groups is in `group_cardinality`.
///
/// # Example
///
/// ```rust
/// use snomed_ecl::Cardinality;
/// use snomed_ecl_evaluator::{filter_by_cardinality, Property, PropertyValue};
///
/// let properties = vec![
///     Property::new(1, 10, PropertyValue::Concept(20), 1),
///     Property::new(1, 10, PropertyValue::Concept(21), 2),
///     Property::new(2, 10, PropertyValue::Concept(20), 1),
/// ];
/// let kept = filter_by_cardinality(false, Cardinality::default(), Cardinality::new(2, None), properties);
/// assert!(kept.iter().all(|p| p.object_id == 1));
/// ```
pub fn filter_by_cardinality(
    grouped: bool,
    group_cardinality: Cardinality,
    item_cardinality: Cardinality,
    properties: impl IntoIterator<Item = Property>,
) -> Vec<Property> {
    let by_concept = partition_by_concept(properties);
    let candidates = by_concept.len();
    let mut kept_concepts = 0;
    let mut result = Vec::new();

    for (_, properties) in by_concept {
        if grouped {
            let groups = valid_groups(item_cardinality, properties);
            if group_cardinality.matches(groups.len()) {
                kept_concepts += 1;
                result.extend(groups.into_values().flatten());
            }
        } else if item_cardinality.matches(properties.len()) {
            kept_concepts += 1;
            result.extend(properties);
        }
    }

    debug!(
        grouped,
        %group_cardinality,
        %item_cardinality,
        candidates,
        kept = kept_concepts,
        "cardinality filter"
    );
    result
}

/// Distinct properties partitioned by object concept.
pub(crate) fn partition_by_concept(
    properties: impl IntoIterator<Item = Property>,
) -> BTreeMap<SctId, Vec<Property>> {
    let unique: HashSet<Property> = properties.into_iter().collect();
    let mut by_concept: BTreeMap<SctId, Vec<Property>> = BTreeMap::new();
    for property in unique {
        by_concept.entry(property.object_id).or_default().push(property);
    }
    by_concept
}

/// Role groups of one concept whose property count is in `item_cardinality`.
fn valid_groups(
    item_cardinality: Cardinality,
    properties: Vec<Property>,
) -> BTreeMap<u32, Vec<Property>> {
    let mut by_group: BTreeMap<u32, Vec<Property>> = BTreeMap::new();
    for property in properties {
        by_group.entry(property.group_number()).or_default().push(property);
    }
    by_group.retain(|_, group| item_cardinality.matches(group.len()));
    by_group
}

/// How sibling refinements inside an attribute group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupCombination {
    /// A group must be valid on both sides.
    Intersection,
    /// A group must be valid on either side.
    Union,
}

/// Combines the valid-group properties of two sibling refinements and
/// re-validates the resulting group count of each concept.
pub(crate) fn combine_groups(
    combination: GroupCombination,
    group_cardinality: Cardinality,
    left: Vec<Property>,
    right: Vec<Property>,
) -> Vec<Property> {
    let mut left = partition_by_concept(left);
    let mut right = partition_by_concept(right);
    let concepts: BTreeSet<SctId> = left.keys().chain(right.keys()).copied().collect();

    let mut result = Vec::new();
    for concept_id in concepts {
        let left_properties = left.remove(&concept_id).unwrap_or_default();
        let right_properties = right.remove(&concept_id).unwrap_or_default();
        let left_groups: BTreeSet<u32> = left_properties.iter().map(Property::group_number).collect();
        let right_groups: BTreeSet<u32> = right_properties.iter().map(Property::group_number).collect();

        let groups: BTreeSet<u32> = match combination {
            GroupCombination::Intersection => left_groups.intersection(&right_groups).copied().collect(),
            GroupCombination::Union => left_groups.union(&right_groups).copied().collect(),
        };

        if !groups.is_empty() && group_cardinality.matches(groups.len()) {
            result.extend(
                left_properties
                    .into_iter()
                    .chain(right_properties)
                    .filter(|property| groups.contains(&property.group_number())),
            );
        }
    }
    result
}

/// Distinct object concept ids of `properties`.
pub(crate) fn object_ids<'a>(properties: impl IntoIterator<Item = &'a Property>) -> BTreeSet<SctId> {
    properties.into_iter().map(|property| property.object_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;

    fn prop(concept: SctId, destination: SctId, group: u32) -> Property {
        Property::new(concept, 100, PropertyValue::Concept(destination), group)
    }

    fn groups_of(properties: &[Property], concept: SctId) -> BTreeSet<u32> {
        properties
            .iter()
            .filter(|p| p.object_id == concept)
            .map(Property::group_number)
            .collect()
    }

    #[test]
    fn test_ungrouped_counts_statements() {
        let properties = vec![prop(1, 10, 0), prop(1, 11, 0), prop(2, 10, 0)];
        let kept = filter_by_cardinality(
            false,
            Cardinality::default(),
            Cardinality::new(1, Some(1)),
            properties,
        );
        assert_eq!(object_ids(&kept), BTreeSet::from([2]));
    }

    #[test]
    fn test_duplicate_statements_count_once() {
        let properties = vec![prop(1, 10, 0), prop(1, 10, 0)];
        let kept = filter_by_cardinality(
            false,
            Cardinality::default(),
            Cardinality::new(1, Some(1)),
            properties,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_grouped_counts_valid_groups() {
        // concept 1: group 1 has two statements, group 2 has one
        let properties = vec![prop(1, 10, 1), prop(1, 11, 1), prop(1, 10, 2)];
        let kept = filter_by_cardinality(
            true,
            Cardinality::new(1, Some(1)),
            Cardinality::new(1, Some(1)),
            properties.clone(),
        );
        assert_eq!(groups_of(&kept, 1), BTreeSet::from([2]));

        let rejected = filter_by_cardinality(
            true,
            Cardinality::new(2, None),
            Cardinality::new(1, Some(1)),
            properties,
        );
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_group_cardinality_rejects_too_many_groups() {
        let properties = vec![prop(1, 10, 1), prop(1, 10, 2), prop(1, 10, 3)];
        let kept = filter_by_cardinality(
            true,
            Cardinality::new(1, Some(2)),
            Cardinality::new(1, Some(1)),
            properties,
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn test_combine_groups_intersection_and_union() {
        let left = vec![prop(1, 10, 1), prop(1, 10, 2)];
        let right = vec![prop(1, 20, 2), prop(1, 20, 3)];

        let and = combine_groups(
            GroupCombination::Intersection,
            Cardinality::default(),
            left.clone(),
            right.clone(),
        );
        assert_eq!(groups_of(&and, 1), BTreeSet::from([2]));

        let or = combine_groups(GroupCombination::Union, Cardinality::default(), left, right);
        assert_eq!(groups_of(&or, 1), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_combine_groups_revalidates_group_count() {
        let left = vec![prop(1, 10, 1), prop(1, 10, 2)];
        let right = vec![prop(1, 20, 3)];
        let or = combine_groups(
            GroupCombination::Union,
            Cardinality::new(1, Some(2)),
            left,
            right,
        );
        assert!(or.is_empty());
    }

    #[test]
    fn test_intersection_requires_both_sides() {
        let left = vec![prop(1, 10, 1)];
        let and = combine_groups(
            GroupCombination::Intersection,
            Cardinality::default(),
            left,
            Vec::new(),
        );
        assert!(and.is_empty());
    }
}
