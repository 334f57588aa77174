//! Well-known SNOMED CT concept identifiers read by the index and the evaluator.

use snomed_ecl::SctId;

/// SNOMED CT root concept.
pub const ROOT_CONCEPT: SctId = 138875005;
/// `116680003 |Is a|`
pub const IS_A: SctId = 116680003;

/// Core module.
pub const MODULE_SCT_CORE: SctId = 900000000000207008;

/// Stated relationship characteristic type.
pub const STATED_RELATIONSHIP: SctId = 900000000000010007;
/// Inferred relationship characteristic type.
pub const INFERRED_RELATIONSHIP: SctId = 900000000000011006;
/// Additional relationship characteristic type.
pub const ADDITIONAL_RELATIONSHIP: SctId = 900000000000227009;

/// Primitive definition status.
pub const PRIMITIVE: SctId = 900000000000074008;
/// Fully defined definition status.
pub const FULLY_DEFINED: SctId = 900000000000073002;

/// Fully specified name description type.
pub const FULLY_SPECIFIED_NAME: SctId = 900000000000003001;
/// Synonym description type.
pub const SYNONYM: SctId = 900000000000013009;
/// Text definition description type.
pub const TEXT_DEFINITION: SctId = 900000000000550004;

/// Entire term case insensitive.
pub const ENTIRE_TERM_CASE_INSENSITIVE: SctId = 900000000000448009;

/// GB English language reference set.
pub const REFSET_LANGUAGE_TYPE_UK: SctId = 900000000000508004;
/// US English language reference set.
pub const REFSET_LANGUAGE_TYPE_US: SctId = 900000000000509007;

/// OWL axiom reference set.
pub const REFSET_OWL_AXIOM: SctId = 733073007;

/// Root of the historical association reference sets.
pub const REFSET_HISTORICAL_ASSOCIATION: SctId = 900000000000522004;
/// SAME AS association reference set.
pub const REFSET_SAME_AS_ASSOCIATION: SctId = 900000000000527005;
/// REPLACED BY association reference set.
pub const REFSET_REPLACED_BY_ASSOCIATION: SctId = 900000000000526001;
/// WAS A association reference set.
pub const REFSET_WAS_A_ASSOCIATION: SctId = 900000000000528000;
/// PARTIALLY EQUIVALENT TO association reference set.
pub const REFSET_PARTIALLY_EQUIVALENT_TO_ASSOCIATION: SctId = 1186924009;
/// POSSIBLY EQUIVALENT TO association reference set.
pub const REFSET_POSSIBLY_EQUIVALENT_TO_ASSOCIATION: SctId = 900000000000523009;
