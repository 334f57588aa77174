//! Configuration types for the ECL evaluator.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use snomed_ecl::SctId;
use snomed_ecl_index::{well_known, DEFAULT_LIMIT};

use crate::form::LogicalForm;

/// `123005000 |Part of|`
pub const PART_OF: SctId = 123005000;
/// `272741003 |Laterality|`
pub const LATERALITY: SctId = 272741003;
/// `127489000 |Has active ingredient|`
pub const HAS_ACTIVE_INGREDIENT: SctId = 127489000;
/// `411116001 |Has manufactured dose form|`
pub const HAS_DOSE_FORM: SctId = 411116001;

/// Configuration for the ECL evaluator.
///
/// Concept ids that differ between SNOMED CT editions are configuration,
/// not constants: the never-grouped attributes, the OWL axiom refset, the
/// characteristic types and the historical association refsets.
///
/// # Example
///
/// ```rust
/// use snomed_ecl_evaluator::{CacheConfig, EvaluatorConfig};
/// use std::time::Duration;
///
/// let config = EvaluatorConfig::builder()
///     .with_cache(CacheConfig::default())
///     .with_page_size(5_000)
///     .with_timeout(Duration::from_secs(30))
///     .build();
/// assert_eq!(config.page_size, 5_000);
/// ```
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Page size used when scrolling through search results.
    pub page_size: usize,
    /// Budget for nested resolutions another step depends on.
    pub resolve_timeout: Duration,
    /// Budget for a whole evaluation (None = no timeout).
    pub timeout: Option<Duration>,
    /// Attributes whose ungrouped (group 0) statements take part in grouped
    /// evaluation.
    pub never_grouped_attributes: BTreeSet<SctId>,
    /// Reference set holding OWL axioms.
    pub axiom_refset_id: SctId,
    /// Characteristic types read in the inferred form.
    pub inferred_characteristic_types: BTreeSet<SctId>,
    /// Characteristic types read in the stated form.
    pub stated_characteristic_types: BTreeSet<SctId>,
    /// Historical association reference sets used by `+HISTORY` supplements.
    pub history: HistoryConfig,
    /// Dialect alias (lowercase) to language reference set id.
    pub dialect_aliases: BTreeMap<String, SctId>,
    /// Resolver cache (None = caching disabled).
    pub cache: Option<CacheConfig>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_LIMIT,
            resolve_timeout: Duration::from_secs(60),
            timeout: None,
            never_grouped_attributes: BTreeSet::from([
                PART_OF,
                LATERALITY,
                HAS_ACTIVE_INGREDIENT,
                HAS_DOSE_FORM,
            ]),
            axiom_refset_id: well_known::REFSET_OWL_AXIOM,
            inferred_characteristic_types: BTreeSet::from([well_known::INFERRED_RELATIONSHIP]),
            stated_characteristic_types: BTreeSet::from([
                well_known::STATED_RELATIONSHIP,
                well_known::ADDITIONAL_RELATIONSHIP,
            ]),
            history: HistoryConfig::default(),
            dialect_aliases: BTreeMap::from([
                ("en-gb".to_string(), well_known::REFSET_LANGUAGE_TYPE_UK),
                ("en-us".to_string(), well_known::REFSET_LANGUAGE_TYPE_US),
            ]),
            cache: None,
        }
    }
}

impl EvaluatorConfig {
    /// Creates a new builder for EvaluatorConfig.
    pub fn builder() -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::default()
    }

    /// Characteristic types consulted in `form`.
    pub fn characteristic_types(&self, form: LogicalForm) -> &BTreeSet<SctId> {
        match form {
            LogicalForm::Inferred => &self.inferred_characteristic_types,
            LogicalForm::Stated => &self.stated_characteristic_types,
        }
    }

    /// Language reference set for a dialect alias, matched case-insensitively.
    pub fn dialect(&self, alias: &str) -> Option<SctId> {
        self.dialect_aliases.get(&alias.to_ascii_lowercase()).copied()
    }
}

/// Builder for EvaluatorConfig.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfigBuilder {
    config: EvaluatorConfig,
}

impl EvaluatorConfigBuilder {
    /// Enables caching of resolvers with the given configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = Some(cache);
        self
    }

    /// Sets the page size of collaborator searches.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size.max(1);
        self
    }

    /// Sets the budget for nested resolutions.
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.config.resolve_timeout = timeout;
        self
    }

    /// Sets the evaluation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Replaces the never-grouped attribute ids.
    pub fn with_never_grouped_attributes(
        mut self,
        attributes: impl IntoIterator<Item = SctId>,
    ) -> Self {
        self.config.never_grouped_attributes = attributes.into_iter().collect();
        self
    }

    /// Sets the OWL axiom reference set.
    pub fn with_axiom_refset(mut self, refset_id: SctId) -> Self {
        self.config.axiom_refset_id = refset_id;
        self
    }

    /// Replaces the characteristic types consulted in `form`.
    pub fn with_characteristic_types(
        mut self,
        form: LogicalForm,
        types: impl IntoIterator<Item = SctId>,
    ) -> Self {
        let types = types.into_iter().collect();
        match form {
            LogicalForm::Inferred => self.config.inferred_characteristic_types = types,
            LogicalForm::Stated => self.config.stated_characteristic_types = types,
        }
        self
    }

    /// Sets the historical association configuration.
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    /// Adds or replaces a dialect alias.
    pub fn with_dialect_alias(mut self, alias: impl Into<String>, refset_id: SctId) -> Self {
        self.config
            .dialect_aliases
            .insert(alias.into().to_ascii_lowercase(), refset_id);
        self
    }

    /// Builds the EvaluatorConfig.
    pub fn build(self) -> EvaluatorConfig {
        self.config
    }
}

/// Historical association reference sets per supplement profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Root of the historical association refsets. `MAX` uses every
    /// descendant of it.
    pub association_root: SctId,
    /// Refsets of the `MIN` profile.
    pub min: BTreeSet<SctId>,
    /// Refsets of the `MOD` profile.
    pub moderate: BTreeSet<SctId>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            association_root: well_known::REFSET_HISTORICAL_ASSOCIATION,
            min: BTreeSet::from([well_known::REFSET_SAME_AS_ASSOCIATION]),
            moderate: BTreeSet::from([
                well_known::REFSET_SAME_AS_ASSOCIATION,
                well_known::REFSET_REPLACED_BY_ASSOCIATION,
                well_known::REFSET_WAS_A_ASSOCIATION,
                well_known::REFSET_PARTIALLY_EQUIVALENT_TO_ASSOCIATION,
            ]),
        }
    }
}

/// Configuration for the resolver cache.
///
/// # Example
///
/// ```rust
/// use snomed_ecl_evaluator::CacheConfig;
/// use std::time::Duration;
///
/// let cache = CacheConfig {
///     max_entries: 1_000,
///     ttl: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached resolvers.
    pub max_entries: usize,
    /// Time-to-live for cached resolvers.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}
