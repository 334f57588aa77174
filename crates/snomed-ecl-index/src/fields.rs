//! Field names understood by [`Query`](crate::Query) clauses.
//!
//! Names follow the RF2 column names. Derived concept fields
//! (`parents`, `ancestors`, `memberOf`, ...) are maintained by the index.

/// Component identifier.
pub const ID: &str = "id";
/// Component status.
pub const ACTIVE: &str = "active";
/// Module the component belongs to.
pub const MODULE_ID: &str = "moduleId";
/// Release date of the component version.
pub const EFFECTIVE_TIME: &str = "effectiveTime";

/// Concept definition status.
pub const DEFINITION_STATUS_ID: &str = "definitionStatusId";
/// Direct inferred IS-A parents.
pub const PARENTS: &str = "parents";
/// Inferred ancestors other than the direct parents.
pub const ANCESTORS: &str = "ancestors";
/// Direct stated IS-A parents.
pub const STATED_PARENTS: &str = "statedParents";
/// Stated ancestors other than the direct stated parents.
pub const STATED_ANCESTORS: &str = "statedAncestors";
/// Reference sets with an active member referencing the concept.
pub const MEMBER_OF: &str = "memberOf";

/// Concept a description belongs to.
pub const CONCEPT_ID: &str = "conceptId";
/// Description or relationship type.
pub const TYPE_ID: &str = "typeId";
/// Description term.
pub const TERM: &str = "term";
/// Semantic tag of an FSN, the text inside the trailing parentheses.
pub const SEMANTIC_TAG: &str = "semanticTag";
/// Two letter language code of a description.
pub const LANGUAGE_CODE: &str = "languageCode";
/// Case significance of a description.
pub const CASE_SIGNIFICANCE_ID: &str = "caseSignificanceId";
/// Language reference sets in which a description is preferred.
pub const PREFERRED_IN: &str = "preferredIn";
/// Language reference sets in which a description is acceptable.
pub const ACCEPTABLE_IN: &str = "acceptableIn";

/// Relationship source concept.
pub const SOURCE_ID: &str = "sourceId";
/// Relationship destination concept.
pub const DESTINATION_ID: &str = "destinationId";
/// Concrete relationship value.
pub const VALUE: &str = "value";
/// Relationship group number.
pub const RELATIONSHIP_GROUP: &str = "relationshipGroup";
/// Relationship characteristic type.
pub const CHARACTERISTIC_TYPE_ID: &str = "characteristicTypeId";

/// Reference set a member belongs to.
pub const REFSET_ID: &str = "refsetId";
/// Component referenced by a member.
pub const REFERENCED_COMPONENT_ID: &str = "referencedComponentId";
/// Association target of a historical association member.
pub const TARGET_COMPONENT_ID: &str = "targetComponentId";
/// Relationships parsed from an OWL axiom member, queried with
/// [`Query::nested`](crate::Query::nested).
pub const CLASS_AXIOM_RELATIONSHIPS: &str = "classAxiomRelationships";
