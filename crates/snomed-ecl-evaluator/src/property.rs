//! Matched statements in one normalized shape.

use snomed_ecl::{ConcreteValue, SctId};

/// The value side of a matched statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    /// Destination concept, or the source concept of a reversed attribute.
    Concept(SctId),
    /// Concrete value.
    Concrete(ConcreteValue),
}

/// One statement matched by an attribute constraint.
///
/// Relationships, OWL axiom relationships and concrete domain members are all
/// normalized to this shape, so cardinality and grouping treat them alike.
/// Equal tuples from different sources count once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    /// The concept the statement counts for: the source of a forward
    /// attribute, the destination of a reversed one.
    pub object_id: SctId,
    /// Attribute type.
    pub type_id: Option<SctId>,
    /// Destination concept or concrete value.
    pub value: Option<PropertyValue>,
    /// Role group number.
    pub group: Option<u32>,
}

impl Property {
    /// A fully known statement.
    pub fn new(object_id: SctId, type_id: SctId, value: PropertyValue, group: u32) -> Self {
        Self {
            object_id,
            type_id: Some(type_id),
            value: Some(value),
            group: Some(group),
        }
    }

    /// Role group number, `0` when ungrouped or unknown.
    pub fn group_number(&self) -> u32 {
        self.group.unwrap_or(0)
    }

    /// Destination (or reversed source) concept id.
    pub fn concept_value(&self) -> Option<SctId> {
        match &self.value {
            Some(PropertyValue::Concept(id)) => Some(*id),
            _ => None,
        }
    }
}
