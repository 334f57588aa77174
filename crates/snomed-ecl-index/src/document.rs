//! Documents returned by searches: concepts, descriptions, relationships
//! and reference set members.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use snomed_ecl::{ConcreteValue, SctId};

use crate::query::Value;
use crate::well_known;

/// An indexed concept with its derived hierarchy fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConceptDocument {
    pub id: SctId,
    pub active: bool,
    pub module_id: SctId,
    pub effective_time: Option<NaiveDate>,
    pub definition_status_id: SctId,
    /// Direct inferred parents.
    pub parents: BTreeSet<SctId>,
    /// Inferred ancestors, excluding the direct parents.
    pub ancestors: BTreeSet<SctId>,
    pub stated_parents: BTreeSet<SctId>,
    pub stated_ancestors: BTreeSet<SctId>,
    /// Reference sets with an active member referencing this concept.
    pub member_of: BTreeSet<SctId>,
}

impl ConceptDocument {
    /// An active, primitive core concept without hierarchy information.
    pub fn new(id: SctId) -> Self {
        Self {
            id,
            active: true,
            module_id: well_known::MODULE_SCT_CORE,
            effective_time: None,
            definition_status_id: well_known::PRIMITIVE,
            parents: BTreeSet::new(),
            ancestors: BTreeSet::new(),
            stated_parents: BTreeSet::new(),
            stated_ancestors: BTreeSet::new(),
            member_of: BTreeSet::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_module(mut self, module_id: SctId) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_effective_time(mut self, effective_time: NaiveDate) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    pub fn fully_defined(mut self) -> Self {
        self.definition_status_id = well_known::FULLY_DEFINED;
        self
    }
}

/// An indexed description.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DescriptionDocument {
    pub id: SctId,
    pub active: bool,
    pub module_id: SctId,
    pub effective_time: Option<NaiveDate>,
    pub concept_id: SctId,
    pub type_id: SctId,
    pub term: String,
    pub language_code: String,
    pub case_significance_id: SctId,
    /// Language reference sets in which this description is preferred.
    pub preferred_in: BTreeSet<SctId>,
    /// Language reference sets in which this description is acceptable.
    pub acceptable_in: BTreeSet<SctId>,
}

impl DescriptionDocument {
    /// An active English synonym.
    pub fn new(id: SctId, concept_id: SctId, term: impl Into<String>) -> Self {
        Self {
            id,
            active: true,
            module_id: well_known::MODULE_SCT_CORE,
            effective_time: None,
            concept_id,
            type_id: well_known::SYNONYM,
            term: term.into(),
            language_code: "en".to_string(),
            case_significance_id: well_known::ENTIRE_TERM_CASE_INSENSITIVE,
            preferred_in: BTreeSet::new(),
            acceptable_in: BTreeSet::new(),
        }
    }

    /// An active English fully specified name.
    pub fn fsn(id: SctId, concept_id: SctId, term: impl Into<String>) -> Self {
        Self::new(id, concept_id, term).with_type(well_known::FULLY_SPECIFIED_NAME)
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_type(mut self, type_id: SctId) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    pub fn with_module(mut self, module_id: SctId) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_effective_time(mut self, effective_time: NaiveDate) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    pub fn with_case_significance(mut self, case_significance_id: SctId) -> Self {
        self.case_significance_id = case_significance_id;
        self
    }

    pub fn preferred_in(mut self, refset_id: SctId) -> Self {
        self.acceptable_in.remove(&refset_id);
        self.preferred_in.insert(refset_id);
        self
    }

    pub fn acceptable_in(mut self, refset_id: SctId) -> Self {
        self.preferred_in.remove(&refset_id);
        self.acceptable_in.insert(refset_id);
        self
    }

    /// Text inside the trailing parentheses of the term, e.g. `disorder`
    /// for `Diabetes mellitus (disorder)`.
    pub fn semantic_tag(&self) -> Option<&str> {
        let term = self.term.trim_end();
        let body = term.strip_suffix(')')?;
        let open = body.rfind('(')?;
        let tag = body[open + 1..].trim();
        (!tag.is_empty()).then_some(tag)
    }
}

/// An indexed relationship, either to a destination concept or to a
/// concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationshipDocument {
    pub id: SctId,
    pub active: bool,
    pub module_id: SctId,
    pub effective_time: Option<NaiveDate>,
    pub source_id: SctId,
    pub type_id: SctId,
    pub destination_id: Option<SctId>,
    pub value: Option<ConcreteValue>,
    pub group: u32,
    pub characteristic_type_id: SctId,
}

impl RelationshipDocument {
    /// An active, ungrouped, inferred relationship to a concept.
    pub fn new(id: SctId, source_id: SctId, type_id: SctId, destination_id: SctId) -> Self {
        Self {
            id,
            active: true,
            module_id: well_known::MODULE_SCT_CORE,
            effective_time: None,
            source_id,
            type_id,
            destination_id: Some(destination_id),
            value: None,
            group: 0,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
        }
    }

    /// An active, ungrouped, inferred concrete value relationship.
    pub fn concrete(id: SctId, source_id: SctId, type_id: SctId, value: ConcreteValue) -> Self {
        Self {
            destination_id: None,
            value: Some(value),
            ..Self::new(id, source_id, type_id, 0)
        }
    }

    pub fn in_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    pub fn stated(mut self) -> Self {
        self.characteristic_type_id = well_known::STATED_RELATIONSHIP;
        self
    }

    pub fn with_characteristic_type(mut self, characteristic_type_id: SctId) -> Self {
        self.characteristic_type_id = characteristic_type_id;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A relationship parsed from an OWL class axiom.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxiomRelationship {
    pub type_id: SctId,
    pub destination_id: Option<SctId>,
    pub value: Option<ConcreteValue>,
    pub group: u32,
}

impl AxiomRelationship {
    pub fn new(type_id: SctId, destination_id: SctId, group: u32) -> Self {
        Self {
            type_id,
            destination_id: Some(destination_id),
            value: None,
            group,
        }
    }

    pub fn concrete(type_id: SctId, value: ConcreteValue, group: u32) -> Self {
        Self {
            type_id,
            destination_id: None,
            value: Some(value),
            group,
        }
    }
}

/// An indexed reference set member.
///
/// Refset specific columns live in `properties`, keyed by their RF2 column
/// name (`targetComponentId`, `mapTarget`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberDocument {
    pub id: String,
    pub active: bool,
    pub module_id: SctId,
    pub effective_time: Option<NaiveDate>,
    pub refset_id: SctId,
    pub referenced_component_id: SctId,
    pub properties: BTreeMap<String, Value>,
    /// Relationships of an OWL axiom member.
    pub class_axiom_relationships: Vec<AxiomRelationship>,
}

impl MemberDocument {
    /// An active simple member.
    pub fn new(id: impl Into<String>, refset_id: SctId, referenced_component_id: SctId) -> Self {
        Self {
            id: id.into(),
            active: true,
            module_id: well_known::MODULE_SCT_CORE,
            effective_time: None,
            refset_id,
            referenced_component_id,
            properties: BTreeMap::new(),
            class_axiom_relationships: Vec::new(),
        }
    }

    /// An active OWL axiom member for `concept_id`.
    pub fn axiom(
        id: impl Into<String>,
        concept_id: SctId,
        relationships: impl IntoIterator<Item = AxiomRelationship>,
    ) -> Self {
        Self {
            class_axiom_relationships: relationships.into_iter().collect(),
            ..Self::new(id, well_known::REFSET_OWL_AXIOM, concept_id)
        }
    }

    /// An active historical association member.
    pub fn association(
        id: impl Into<String>,
        refset_id: SctId,
        referenced_component_id: SctId,
        target_component_id: SctId,
    ) -> Self {
        Self::new(id, refset_id, referenced_component_id).with_property(
            crate::fields::TARGET_COMPONENT_ID,
            Value::Id(target_component_id),
        )
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_module(mut self, module_id: SctId) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_effective_time(mut self, effective_time: NaiveDate) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    /// Value of a refset specific column.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_tag() {
        let fsn = DescriptionDocument::fsn(1, 2, "Diabetes mellitus (disorder)");
        assert_eq!(fsn.semantic_tag(), Some("disorder"));

        let nested = DescriptionDocument::fsn(1, 2, "Structure (body (part)) (body structure)");
        assert_eq!(nested.semantic_tag(), Some("body structure"));

        let plain = DescriptionDocument::new(1, 2, "Diabetes");
        assert_eq!(plain.semantic_tag(), None);
    }

    #[test]
    fn test_acceptability_is_exclusive_per_refset() {
        let description = DescriptionDocument::new(1, 2, "Heart")
            .acceptable_in(well_known::REFSET_LANGUAGE_TYPE_UK)
            .preferred_in(well_known::REFSET_LANGUAGE_TYPE_UK);
        assert!(description.preferred_in.contains(&well_known::REFSET_LANGUAGE_TYPE_UK));
        assert!(description.acceptable_in.is_empty());
    }

    #[test]
    fn test_association_member_target() {
        let member = MemberDocument::association(
            "m1",
            well_known::REFSET_SAME_AS_ASSOCIATION,
            10,
            20,
        );
        assert_eq!(
            member.property(crate::fields::TARGET_COMPONENT_ID),
            Some(&Value::Id(20))
        );
    }
}
