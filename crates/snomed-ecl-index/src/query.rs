//! Boolean search queries.
//!
//! A [`Query`] is a backend independent description of which documents a
//! search should return. Leaf clauses test a single field, [`Query::Bool`]
//! combines clauses the way search engines do:
//!
//! - every `must` and `filter` clause has to match
//! - no `must_not` clause may match
//! - when `should` clauses are present at least one of them has to match
//!
//! A bool query without clauses matches everything.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use snomed_ecl::{ConcreteValue, SctId};

use crate::fields;

/// Name of a document field.
pub type Field = Cow<'static, str>;

/// A field value inside a query or a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// SNOMED CT identifier.
    Id(SctId),
    /// Text.
    Str(String),
    /// Flag.
    Bool(bool),
    /// Integer number.
    Int(i64),
    /// Decimal number.
    Decimal(Decimal),
    /// Calendar date.
    Date(NaiveDate),
}

impl Value {
    /// Typed ordering of two values.
    ///
    /// Integers and decimals compare numerically. Values of unrelated
    /// types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Id(a), Value::Id(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Returns true if both values are equal under [`Value::compare`].
    pub fn same_as(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Returns the identifier if this is an [`Value::Id`].
    pub fn as_id(&self) -> Option<SctId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the text if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back to a concrete attribute value, when the value has one.
    pub fn to_concrete(&self) -> Option<ConcreteValue> {
        match self {
            Value::Str(s) => Some(ConcreteValue::String(s.clone())),
            Value::Bool(b) => Some(ConcreteValue::Boolean(*b)),
            Value::Int(n) => Some(ConcreteValue::Integer(*n)),
            Value::Decimal(d) => Some(ConcreteValue::Decimal(*d)),
            Value::Id(_) | Value::Date(_) => None,
        }
    }
}

impl From<SctId> for Value {
    fn from(id: SctId) -> Self {
        Value::Id(id)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::Date(date)
    }
}

impl From<ConcreteValue> for Value {
    fn from(value: ConcreteValue) -> Self {
        match value {
            ConcreteValue::Integer(n) => Value::Int(n),
            ConcreteValue::Decimal(d) => Value::Decimal(d),
            ConcreteValue::String(s) => Value::Str(s),
            ConcreteValue::Boolean(b) => Value::Bool(b),
        }
    }
}

impl From<&ConcreteValue> for Value {
    fn from(value: &ConcreteValue) -> Self {
        value.clone().into()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Id(id) => write!(f, "{}", id),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
        }
    }
}

/// A search query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Query {
    /// Matches every document.
    MatchAll,
    /// Matches no document.
    MatchNone,
    /// Field has the value.
    Term { field: Field, value: Value },
    /// Field has at least one of the values. An empty set matches nothing.
    Terms { field: Field, values: BTreeSet<Value> },
    /// Field has any value.
    Exists(Field),
    /// Field has a value inside the bounds.
    Range {
        field: Field,
        lower: Bound<Value>,
        upper: Bound<Value>,
    },
    /// Every word of `text` is a case-insensitive prefix of a word in the field.
    Match { field: Field, text: String },
    /// Case-insensitive wildcard pattern over the whole field value.
    /// `*` matches any run of characters, `?` a single character.
    Wildcard { field: Field, pattern: String },
    /// Regular expression over the whole field value.
    Regex { field: Field, pattern: String },
    /// Some nested document under `path` matches `query`.
    Nested { path: Field, query: Box<Query> },
    /// Boolean combination of clauses.
    Bool(BoolQuery),
}

/// Clauses of a [`Query::Bool`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
}

impl BoolQuery {
    fn is_filter_only(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    fn is_should_only(&self) -> bool {
        self.must.is_empty() && self.filter.is_empty() && self.must_not.is_empty()
    }

    fn is_exclusion(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }
}

impl Query {
    /// Field equals value.
    pub fn term(field: impl Into<Field>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field equals one of the values.
    pub fn terms<V: Into<Value>>(
        field: impl Into<Field>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Component id is one of `ids`.
    pub fn ids(ids: impl IntoIterator<Item = SctId>) -> Self {
        Query::terms(fields::ID, ids)
    }

    /// Field has a value.
    pub fn exists(field: impl Into<Field>) -> Self {
        Query::Exists(field.into())
    }

    /// Field value lies inside the bounds.
    pub fn range(field: impl Into<Field>, lower: Bound<Value>, upper: Bound<Value>) -> Self {
        Query::Range {
            field: field.into(),
            lower,
            upper,
        }
    }

    /// Word prefix match.
    pub fn matching(field: impl Into<Field>, text: impl Into<String>) -> Self {
        Query::Match {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Wildcard match.
    pub fn wildcard(field: impl Into<Field>, pattern: impl Into<String>) -> Self {
        Query::Wildcard {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Regular expression match.
    pub fn regex(field: impl Into<Field>, pattern: impl Into<String>) -> Self {
        Query::Regex {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Query over nested documents.
    pub fn nested(path: impl Into<Field>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Starts a [`QueryBuilder`].
    pub fn bool() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Returns true for [`Query::MatchAll`].
    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }

    /// Returns true for [`Query::MatchNone`].
    pub fn is_match_none(&self) -> bool {
        matches!(self, Query::MatchNone)
    }

    /// Conjunction of two queries.
    ///
    /// `MatchAll` is the identity and `MatchNone` absorbs. Filter-only bool
    /// queries are merged instead of nested.
    pub fn and(left: Query, right: Query) -> Query {
        match (left, right) {
            (Query::MatchNone, _) | (_, Query::MatchNone) => Query::MatchNone,
            (Query::MatchAll, query) | (query, Query::MatchAll) => query,
            (left, right) => {
                let mut builder = Query::bool();
                for side in [left, right] {
                    match side {
                        Query::Bool(inner) if inner.is_filter_only() => {
                            builder.clauses.filter.extend(inner.filter);
                        }
                        other => builder = builder.filter(other),
                    }
                }
                builder.build()
            }
        }
    }

    /// Disjunction of two queries.
    ///
    /// `MatchNone` is the identity and `MatchAll` absorbs. Should-only bool
    /// queries are merged instead of nested.
    pub fn or(left: Query, right: Query) -> Query {
        match (left, right) {
            (Query::MatchAll, _) | (_, Query::MatchAll) => Query::MatchAll,
            (Query::MatchNone, query) | (query, Query::MatchNone) => query,
            (left, right) => {
                let mut builder = Query::bool();
                for side in [left, right] {
                    match side {
                        Query::Bool(inner) if inner.is_should_only() => {
                            builder.clauses.should.extend(inner.should);
                        }
                        other => builder = builder.should(other),
                    }
                }
                builder.build()
            }
        }
    }

    /// Documents matching `left` but not `right`.
    pub fn exclude(left: Query, right: Query) -> Query {
        match (left, right) {
            (Query::MatchNone, _) | (_, Query::MatchAll) => Query::MatchNone,
            (left, Query::MatchNone) => left,
            (Query::MatchAll, right) => Query::bool().must_not(right).build(),
            (Query::Bool(inner), right) if inner.is_exclusion() => {
                let mut clauses = inner;
                clauses.must_not.push(right);
                Query::Bool(clauses)
            }
            (left, right) => Query::bool().filter(left).must_not(right).build(),
        }
    }

    /// Identifiers selected by a pure id query, if this is one.
    pub fn as_ids(&self) -> Option<BTreeSet<SctId>> {
        match self {
            Query::Term { field, value } if field == fields::ID => {
                value.as_id().map(|id| BTreeSet::from([id]))
            }
            Query::Terms { field, values } if field == fields::ID => {
                values.iter().map(Value::as_id).collect()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll => write!(f, "*:*"),
            Query::MatchNone => write!(f, "-*:*"),
            Query::Term { field, value } => write!(f, "{}:{}", field, value),
            Query::Terms { field, values } => {
                write!(f, "{}:(", field)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            Query::Exists(field) => write!(f, "_exists_:{}", field),
            Query::Range {
                field,
                lower,
                upper,
            } => {
                let (open, low) = match lower {
                    Bound::Included(v) => ("[", v.to_string()),
                    Bound::Excluded(v) => ("{", v.to_string()),
                    Bound::Unbounded => ("[", "*".to_string()),
                };
                let (high, close) = match upper {
                    Bound::Included(v) => (v.to_string(), "]"),
                    Bound::Excluded(v) => (v.to_string(), "}"),
                    Bound::Unbounded => ("*".to_string(), "]"),
                };
                write!(f, "{}:{}{} TO {}{}", field, open, low, high, close)
            }
            Query::Match { field, text } => write!(f, "{}:match(\"{}\")", field, text),
            Query::Wildcard { field, pattern } => write!(f, "{}:wild(\"{}\")", field, pattern),
            Query::Regex { field, pattern } => write!(f, "{}:/{}/", field, pattern),
            Query::Nested { path, query } => write!(f, "nested({}, {})", path, query),
            Query::Bool(clauses) => {
                write!(f, "(")?;
                let mut first = true;
                let groups = [
                    ("+", &clauses.must),
                    ("#", &clauses.filter),
                    ("", &clauses.should),
                    ("-", &clauses.must_not),
                ];
                for (prefix, queries) in groups {
                    for query in queries {
                        if !first {
                            write!(f, " ")?;
                        }
                        first = false;
                        write!(f, "{}{}", prefix, query)?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Builder for [`Query::Bool`].
///
/// # Example
///
/// ```rust
/// use snomed_ecl_index::{fields, Query};
///
/// let query = Query::bool()
///     .filter(Query::term(fields::ACTIVE, true))
///     .must_not(Query::ids([404684003]))
///     .build();
/// assert!(matches!(query, Query::Bool(_)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    clauses: BoolQuery,
}

impl QueryBuilder {
    /// Adds a required clause.
    pub fn must(mut self, query: Query) -> Self {
        self.clauses.must.push(query);
        self
    }

    /// Adds a required, non-scoring clause.
    pub fn filter(mut self, query: Query) -> Self {
        self.clauses.filter.push(query);
        self
    }

    /// Adds an alternative clause.
    pub fn should(mut self, query: Query) -> Self {
        self.clauses.should.push(query);
        self
    }

    /// Adds an excluding clause.
    pub fn must_not(mut self, query: Query) -> Self {
        self.clauses.must_not.push(query);
        self
    }

    /// Builds the query. A builder without clauses yields [`Query::MatchAll`].
    pub fn build(self) -> Query {
        let clauses = self.clauses;
        if clauses.must.is_empty()
            && clauses.filter.is_empty()
            && clauses.should.is_empty()
            && clauses.must_not.is_empty()
        {
            Query::MatchAll
        } else {
            Query::Bool(clauses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Query {
        Query::term(fields::ACTIVE, true)
    }

    #[test]
    fn test_and_identity_and_absorption() {
        assert_eq!(Query::and(Query::MatchAll, active()), active());
        assert_eq!(Query::and(active(), Query::MatchAll), active());
        assert_eq!(Query::and(active(), Query::MatchNone), Query::MatchNone);
    }

    #[test]
    fn test_and_merges_filter_only_bools() {
        let left = Query::and(active(), Query::ids([1]));
        let combined = Query::and(left, Query::ids([2]));
        match combined {
            Query::Bool(clauses) => {
                assert_eq!(clauses.filter.len(), 3);
                assert!(clauses.must_not.is_empty());
            }
            other => panic!("expected bool query, got {other}"),
        }
    }

    #[test]
    fn test_or_identity_and_absorption() {
        assert_eq!(Query::or(Query::MatchNone, active()), active());
        assert_eq!(Query::or(active(), Query::MatchAll), Query::MatchAll);
    }

    #[test]
    fn test_exclude() {
        assert_eq!(Query::exclude(active(), Query::MatchNone), active());
        assert_eq!(Query::exclude(active(), Query::MatchAll), Query::MatchNone);
        let query = Query::exclude(Query::term(fields::ACTIVE, false), Query::ids([]));
        assert_eq!(
            query,
            Query::bool()
                .filter(Query::term(fields::ACTIVE, false))
                .must_not(Query::ids([]))
                .build()
        );
    }

    #[test]
    fn test_empty_builder_is_match_all() {
        assert_eq!(Query::bool().build(), Query::MatchAll);
    }

    #[test]
    fn test_as_ids() {
        assert_eq!(Query::ids([3, 1]).as_ids(), Some(BTreeSet::from([1, 3])));
        assert_eq!(
            Query::term(fields::ID, 7u64).as_ids(),
            Some(BTreeSet::from([7]))
        );
        assert_eq!(active().as_ids(), None);
    }

    #[test]
    fn test_value_compare_numeric() {
        let int = Value::Int(5);
        let dec = Value::Decimal(Decimal::new(50, 1));
        assert!(int.same_as(&dec));
        assert_eq!(Value::Int(5).compare(&Value::Str("5".into())), None);
    }

    #[test]
    fn test_display() {
        let query = Query::bool()
            .filter(active())
            .must_not(Query::ids([1, 2]))
            .build();
        assert_eq!(query.to_string(), "(#active:true -id:(1 2))");
    }
}
