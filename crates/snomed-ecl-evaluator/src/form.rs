//! The two logical views of a SNOMED CT release.

use std::fmt;

use snomed_ecl_index::fields;

/// Which statements an evaluation consults.
///
/// `Inferred` reads classifier output. `Stated` reads author-asserted
/// relationships and additionally the relationships encoded in OWL axioms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalForm {
    /// Classifier-computed relationships.
    #[default]
    Inferred,
    /// Stated relationships and OWL axioms.
    Stated,
}

impl LogicalForm {
    /// Returns true for [`LogicalForm::Stated`].
    pub fn is_stated(self) -> bool {
        self == LogicalForm::Stated
    }

    /// Concept field holding the direct parents in this form.
    pub fn parents_field(self) -> &'static str {
        match self {
            LogicalForm::Inferred => fields::PARENTS,
            LogicalForm::Stated => fields::STATED_PARENTS,
        }
    }

    /// Concept field holding the indirect ancestors in this form.
    pub fn ancestors_field(self) -> &'static str {
        match self {
            LogicalForm::Inferred => fields::ANCESTORS,
            LogicalForm::Stated => fields::STATED_ANCESTORS,
        }
    }
}

impl fmt::Display for LogicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalForm::Inferred => write!(f, "inferred"),
            LogicalForm::Stated => write!(f, "stated"),
        }
    }
}
