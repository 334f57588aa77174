//! Filter constraints (`{{ ... }}`) attached to expressions.

use std::fmt;

use crate::ast::{ComparisonOperator, ConcreteValue, EclExpression};
use crate::SctId;

/// Component domain a filter constraint is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterDomain {
    /// Concept filters: `{{ c ... }}`
    Concept,
    /// Description filters: `{{ d ... }}` (the default when no prefix is written)
    #[default]
    Description,
    /// Reference set member filters: `{{ M ... }}`
    Member,
}

impl fmt::Display for FilterDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterDomain::Concept => write!(f, "c"),
            FilterDomain::Description => write!(f, "d"),
            FilterDomain::Member => write!(f, "M"),
        }
    }
}

/// Term matching strategy of a typed search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TermMatchType {
    /// Every word of the search term prefixes a word of the description (default): `match:"x"`
    Match,
    /// Wildcard matching with `*`: `wild:"diab*"`
    Wild,
    /// Regular expression over the whole term: `regex:"x.*"`
    Regex,
    /// Case-insensitive equality with the whole term: `exact:"x"`
    Exact,
}

impl fmt::Display for TermMatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermMatchType::Match => write!(f, "match"),
            TermMatchType::Wild => write!(f, "wild"),
            TermMatchType::Regex => write!(f, "regex"),
            TermMatchType::Exact => write!(f, "exact"),
        }
    }
}

/// A search term with its matching strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypedTerm {
    /// How to match the term.
    pub match_type: TermMatchType,
    /// The search text.
    pub value: String,
}

impl TypedTerm {
    /// A `match:` term.
    pub fn matching(value: impl Into<String>) -> Self {
        Self {
            match_type: TermMatchType::Match,
            value: value.into(),
        }
    }

    /// A `wild:` term.
    pub fn wild(value: impl Into<String>) -> Self {
        Self {
            match_type: TermMatchType::Wild,
            value: value.into(),
        }
    }
}

impl fmt::Display for TypedTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\"{}\"", self.match_type, self.value)
    }
}

/// Description type keywords usable in `type` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptionTypeToken {
    /// Fully specified name.
    Fsn,
    /// Synonym.
    Syn,
    /// Text definition.
    Def,
}

impl DescriptionTypeToken {
    /// Concept id of the description type.
    pub fn concept_id(&self) -> SctId {
        match self {
            DescriptionTypeToken::Fsn => 900000000000003001,
            DescriptionTypeToken::Syn => 900000000000013009,
            DescriptionTypeToken::Def => 900000000000550004,
        }
    }
}

impl fmt::Display for DescriptionTypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionTypeToken::Fsn => write!(f, "fsn"),
            DescriptionTypeToken::Syn => write!(f, "syn"),
            DescriptionTypeToken::Def => write!(f, "def"),
        }
    }
}

/// Value of a description type filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptionTypeValue {
    /// `type = (syn fsn)`
    Tokens(Vec<DescriptionTypeToken>),
    /// `typeId = 900000000000013009`
    Expression(Box<EclExpression>),
}

/// Definition status keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefinitionStatusToken {
    /// Primitive concepts.
    Primitive,
    /// Fully defined concepts.
    Defined,
}

impl DefinitionStatusToken {
    /// Concept id of the definition status.
    pub fn concept_id(&self) -> SctId {
        match self {
            DefinitionStatusToken::Primitive => 900000000000074008,
            DefinitionStatusToken::Defined => 900000000000073002,
        }
    }
}

/// Value of a definition status filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefinitionStatusValue {
    /// `definitionStatus = primitive`
    Token(DefinitionStatusToken),
    /// `definitionStatusId = 900000000000074008`
    Expression(Box<EclExpression>),
}

/// Acceptability value for dialect filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterAcceptability {
    /// Preferred term only.
    Preferred,
    /// Acceptable term only.
    Acceptable,
}

impl FilterAcceptability {
    /// Maps an acceptability concept id to its keyword.
    pub fn from_concept_id(id: SctId) -> Option<Self> {
        match id {
            900000000000548007 => Some(FilterAcceptability::Preferred),
            900000000000549004 => Some(FilterAcceptability::Acceptable),
            _ => None,
        }
    }
}

impl fmt::Display for FilterAcceptability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAcceptability::Preferred => write!(f, "prefer"),
            FilterAcceptability::Acceptable => write!(f, "accept"),
        }
    }
}

/// Dialect reference in a dialect filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DialectRef {
    /// `dialect = en-gb`
    Alias(String),
    /// `dialectId = 900000000000508004`
    Expression(Box<EclExpression>),
}

/// One dialect with an optional acceptability restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DialectSpec {
    /// The dialect.
    pub dialect: DialectRef,
    /// Required acceptability, any when absent.
    pub acceptability: Option<FilterAcceptability>,
}

impl DialectSpec {
    /// A dialect given by alias.
    pub fn alias(alias: impl Into<String>, acceptability: Option<FilterAcceptability>) -> Self {
        Self {
            dialect: DialectRef::Alias(alias.into()),
            acceptability,
        }
    }

    /// A dialect given by language reference set id.
    pub fn id(refset_id: SctId, acceptability: Option<FilterAcceptability>) -> Self {
        Self {
            dialect: DialectRef::Expression(Box::new(EclExpression::concept(refset_id))),
            acceptability,
        }
    }
}

impl fmt::Display for DialectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dialect {
            DialectRef::Alias(alias) => write!(f, "{}", alias)?,
            DialectRef::Expression(expr) => write!(f, "{}", expr)?,
        }
        if let Some(acceptability) = self.acceptability {
            write!(f, " ({})", acceptability)?;
        }
        Ok(())
    }
}

/// Value of a member field filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberFieldValue {
    /// A concrete value: `mapTarget = "J45.9"`
    Concrete(ConcreteValue),
    /// A component constraint: `targetComponentId = << 404684003`
    Expression(Box<EclExpression>),
}

impl fmt::Display for MemberFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberFieldValue::Concrete(value) => write!(f, "{}", value),
            MemberFieldValue::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

/// Filter constraint tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EclFilter {
    // =========================================================================
    // Combinators
    // =========================================================================
    /// Both filters must hold: `a, b` or `a AND b`
    And(Box<EclFilter>, Box<EclFilter>),
    /// Either filter must hold: `a OR b`
    Or(Box<EclFilter>, Box<EclFilter>),
    /// Parenthesised filter.
    Nested(Box<EclFilter>),

    // =========================================================================
    // Any domain
    // =========================================================================
    /// Active filter: `active = true`
    Active(bool),

    /// Module filter: `moduleId = 900000000000207008`
    Module {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Module constraint.
        value: Box<EclExpression>,
    },

    /// Effective time filter: `effectiveTime >= "20200101"`
    EffectiveTime {
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Date in `YYYYMMDD` form.
        date: String,
    },

    /// Component id filter: `id = (123 456)`
    Id {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Component ids.
        ids: Vec<SctId>,
    },

    // =========================================================================
    // Concept domain
    // =========================================================================
    /// Definition status filter: `definitionStatus = primitive`
    DefinitionStatus {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Status keyword or constraint.
        value: DefinitionStatusValue,
    },

    // =========================================================================
    // Description domain
    // =========================================================================
    /// Term filter: `term = ("heart" wild:"card*")`, satisfied by any listed term.
    Term {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Search terms.
        terms: Vec<TypedTerm>,
    },

    /// Description type filter: `type = syn` or `typeId = 900000000000003001`
    DescriptionType {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Types to match.
        value: DescriptionTypeValue,
    },

    /// Dialect filter: `dialect = (en-gb (prefer) en-us)`
    Dialect {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Dialects, any of which satisfies the filter.
        dialects: Vec<DialectSpec>,
    },

    /// Language filter: `language = (en es)`
    Language {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// ISO 639-1 language codes.
        codes: Vec<String>,
    },

    /// Case significance filter: `caseSignificanceId = 900000000000448009`
    CaseSignificance {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Case significance constraint.
        value: Box<EclExpression>,
    },

    /// Semantic tag filter: `semanticTag = "disorder"`
    SemanticTag {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Semantic tags without parentheses.
        tags: Vec<String>,
    },

    /// Preferred in filter: `preferredIn = 900000000000509007`
    PreferredIn {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Language reference set constraint.
        value: Box<EclExpression>,
    },

    /// Acceptable in filter: `acceptableIn = 900000000000509007`
    AcceptableIn {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Language reference set constraint.
        value: Box<EclExpression>,
    },

    /// Language reference set filter: `languageRefSetId = 900000000000509007`
    LanguageRefSet {
        /// `=` or `!=`.
        operator: ComparisonOperator,
        /// Language reference set constraint.
        value: Box<EclExpression>,
    },

    // =========================================================================
    // Member domain
    // =========================================================================
    /// Member field filter: `mapTarget = "J45.9"`
    MemberField {
        /// The refset field to filter on.
        field: String,
        /// The comparison operator.
        operator: ComparisonOperator,
        /// The value to compare against.
        value: MemberFieldValue,
    },
}

impl EclFilter {
    /// Creates a conjunction.
    pub fn and(left: EclFilter, right: EclFilter) -> Self {
        EclFilter::And(Box::new(left), Box::new(right))
    }

    /// Creates a disjunction.
    pub fn or(left: EclFilter, right: EclFilter) -> Self {
        EclFilter::Or(Box::new(left), Box::new(right))
    }

    /// `moduleId = <id>`
    pub fn module(module_id: SctId) -> Self {
        EclFilter::Module {
            operator: ComparisonOperator::Equal,
            value: Box::new(EclExpression::concept(module_id)),
        }
    }

    /// `term = <terms>`
    pub fn term(terms: Vec<TypedTerm>) -> Self {
        EclFilter::Term {
            operator: ComparisonOperator::Equal,
            terms,
        }
    }

    /// Filter keyword used in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            EclFilter::And(_, _) => "AND",
            EclFilter::Or(_, _) => "OR",
            EclFilter::Nested(_) => "nested",
            EclFilter::Active(_) => "active",
            EclFilter::Module { .. } => "moduleId",
            EclFilter::EffectiveTime { .. } => "effectiveTime",
            EclFilter::Id { .. } => "id",
            EclFilter::DefinitionStatus { .. } => "definitionStatus",
            EclFilter::Term { .. } => "term",
            EclFilter::DescriptionType { .. } => "type",
            EclFilter::Dialect { .. } => "dialect",
            EclFilter::Language { .. } => "language",
            EclFilter::CaseSignificance { .. } => "caseSignificanceId",
            EclFilter::SemanticTag { .. } => "semanticTag",
            EclFilter::PreferredIn { .. } => "preferredIn",
            EclFilter::AcceptableIn { .. } => "acceptableIn",
            EclFilter::LanguageRefSet { .. } => "languageRefSetId",
            EclFilter::MemberField { .. } => "member field",
        }
    }

    /// Returns true if the leaf filter may appear in `domain`.
    ///
    /// Combinators are always allowed; their leaves are checked separately.
    pub fn is_allowed_in(&self, domain: FilterDomain) -> bool {
        match self {
            EclFilter::And(_, _)
            | EclFilter::Or(_, _)
            | EclFilter::Nested(_)
            | EclFilter::Active(_)
            | EclFilter::Module { .. }
            | EclFilter::EffectiveTime { .. }
            | EclFilter::Id { .. } => true,
            EclFilter::DefinitionStatus { .. } => domain == FilterDomain::Concept,
            EclFilter::Term { .. }
            | EclFilter::DescriptionType { .. }
            | EclFilter::Dialect { .. }
            | EclFilter::Language { .. }
            | EclFilter::CaseSignificance { .. }
            | EclFilter::SemanticTag { .. }
            | EclFilter::PreferredIn { .. }
            | EclFilter::AcceptableIn { .. }
            | EclFilter::LanguageRefSet { .. } => domain == FilterDomain::Description,
            EclFilter::MemberField { .. } => domain == FilterDomain::Member,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    if items.len() == 1 {
        return write!(f, "{}", items[0]);
    }
    let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    write!(f, "({})", rendered.join(" "))
}

impl fmt::Display for EclFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EclFilter::And(left, right) => write!(f, "{}, {}", left, right),
            EclFilter::Or(left, right) => write!(f, "{} OR {}", left, right),
            EclFilter::Nested(inner) => write!(f, "({})", inner),
            EclFilter::Active(active) => write!(f, "active = {}", active),
            EclFilter::Module { operator, value } => write!(f, "moduleId {} {}", operator, value),
            EclFilter::EffectiveTime { operator, date } => {
                write!(f, "effectiveTime {} \"{}\"", operator, date)
            }
            EclFilter::Id { operator, ids } => {
                write!(f, "id {} ", operator)?;
                write_list(f, ids)
            }
            EclFilter::DefinitionStatus { operator, value } => match value {
                DefinitionStatusValue::Token(DefinitionStatusToken::Primitive) => {
                    write!(f, "definitionStatus {} primitive", operator)
                }
                DefinitionStatusValue::Token(DefinitionStatusToken::Defined) => {
                    write!(f, "definitionStatus {} defined", operator)
                }
                DefinitionStatusValue::Expression(expr) => {
                    write!(f, "definitionStatusId {} {}", operator, expr)
                }
            },
            EclFilter::Term { operator, terms } => {
                write!(f, "term {} ", operator)?;
                write_list(f, terms)
            }
            EclFilter::DescriptionType { operator, value } => match value {
                DescriptionTypeValue::Tokens(tokens) => {
                    write!(f, "type {} ", operator)?;
                    write_list(f, tokens)
                }
                DescriptionTypeValue::Expression(expr) => write!(f, "typeId {} {}", operator, expr),
            },
            EclFilter::Dialect { operator, dialects } => {
                write!(f, "dialect {} ", operator)?;
                write_list(f, dialects)
            }
            EclFilter::Language { operator, codes } => {
                write!(f, "language {} ", operator)?;
                write_list(f, codes)
            }
            EclFilter::CaseSignificance { operator, value } => {
                write!(f, "caseSignificanceId {} {}", operator, value)
            }
            EclFilter::SemanticTag { operator, tags } => {
                let quoted: Vec<String> = tags.iter().map(|t| format!("\"{}\"", t)).collect();
                write!(f, "semanticTag {} ", operator)?;
                write_list(f, &quoted)
            }
            EclFilter::PreferredIn { operator, value } => {
                write!(f, "preferredIn {} {}", operator, value)
            }
            EclFilter::AcceptableIn { operator, value } => {
                write!(f, "acceptableIn {} {}", operator, value)
            }
            EclFilter::LanguageRefSet { operator, value } => {
                write!(f, "languageRefSetId {} {}", operator, value)
            }
            EclFilter::MemberField {
                field,
                operator,
                value,
            } => write!(f, "{} {} {}", field, operator, value),
        }
    }
}
