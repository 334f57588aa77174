//! In-process evaluation of [`Query`] against documents.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;

use regex::Regex;
use snomed_ecl::SctId;

use crate::document::{
    AxiomRelationship, ConceptDocument, DescriptionDocument, MemberDocument, RelationshipDocument,
};
use crate::error::{IndexError, IndexResult};
use crate::fields;
use crate::query::{Field, Query, Value};

/// Field access for documents the matcher can evaluate.
pub(crate) trait Indexed {
    fn values(&self, field: &str) -> Vec<Value>;

    fn nested(&self, _path: &str) -> Vec<&dyn Indexed> {
        Vec::new()
    }
}

fn ids<'a>(ids: impl IntoIterator<Item = &'a SctId>) -> Vec<Value> {
    ids.into_iter().map(|id| Value::Id(*id)).collect()
}

fn effective_time(date: &Option<chrono::NaiveDate>) -> Vec<Value> {
    date.iter().map(|d| Value::Date(*d)).collect()
}

impl Indexed for ConceptDocument {
    fn values(&self, field: &str) -> Vec<Value> {
        match field {
            fields::ID => vec![Value::Id(self.id)],
            fields::ACTIVE => vec![Value::Bool(self.active)],
            fields::MODULE_ID => vec![Value::Id(self.module_id)],
            fields::EFFECTIVE_TIME => effective_time(&self.effective_time),
            fields::DEFINITION_STATUS_ID => vec![Value::Id(self.definition_status_id)],
            fields::PARENTS => ids(&self.parents),
            fields::ANCESTORS => ids(&self.ancestors),
            fields::STATED_PARENTS => ids(&self.stated_parents),
            fields::STATED_ANCESTORS => ids(&self.stated_ancestors),
            fields::MEMBER_OF => ids(&self.member_of),
            _ => Vec::new(),
        }
    }
}

impl Indexed for DescriptionDocument {
    fn values(&self, field: &str) -> Vec<Value> {
        match field {
            fields::ID => vec![Value::Id(self.id)],
            fields::ACTIVE => vec![Value::Bool(self.active)],
            fields::MODULE_ID => vec![Value::Id(self.module_id)],
            fields::EFFECTIVE_TIME => effective_time(&self.effective_time),
            fields::CONCEPT_ID => vec![Value::Id(self.concept_id)],
            fields::TYPE_ID => vec![Value::Id(self.type_id)],
            fields::TERM => vec![Value::Str(self.term.clone())],
            fields::SEMANTIC_TAG => self
                .semantic_tag()
                .map(|tag| Value::Str(tag.to_string()))
                .into_iter()
                .collect(),
            fields::LANGUAGE_CODE => vec![Value::Str(self.language_code.clone())],
            fields::CASE_SIGNIFICANCE_ID => vec![Value::Id(self.case_significance_id)],
            fields::PREFERRED_IN => ids(&self.preferred_in),
            fields::ACCEPTABLE_IN => ids(&self.acceptable_in),
            _ => Vec::new(),
        }
    }
}

impl Indexed for RelationshipDocument {
    fn values(&self, field: &str) -> Vec<Value> {
        match field {
            fields::ID => vec![Value::Id(self.id)],
            fields::ACTIVE => vec![Value::Bool(self.active)],
            fields::MODULE_ID => vec![Value::Id(self.module_id)],
            fields::EFFECTIVE_TIME => effective_time(&self.effective_time),
            fields::SOURCE_ID => vec![Value::Id(self.source_id)],
            fields::TYPE_ID => vec![Value::Id(self.type_id)],
            fields::DESTINATION_ID => ids(&self.destination_id),
            fields::VALUE => self.value.iter().map(Value::from).collect(),
            fields::RELATIONSHIP_GROUP => vec![Value::Int(i64::from(self.group))],
            fields::CHARACTERISTIC_TYPE_ID => vec![Value::Id(self.characteristic_type_id)],
            _ => Vec::new(),
        }
    }
}

impl Indexed for AxiomRelationship {
    fn values(&self, field: &str) -> Vec<Value> {
        match field {
            fields::TYPE_ID => vec![Value::Id(self.type_id)],
            fields::DESTINATION_ID => ids(&self.destination_id),
            fields::VALUE => self.value.iter().map(Value::from).collect(),
            fields::RELATIONSHIP_GROUP => vec![Value::Int(i64::from(self.group))],
            _ => Vec::new(),
        }
    }
}

impl Indexed for MemberDocument {
    fn values(&self, field: &str) -> Vec<Value> {
        match field {
            fields::ID => vec![Value::Str(self.id.clone())],
            fields::ACTIVE => vec![Value::Bool(self.active)],
            fields::MODULE_ID => vec![Value::Id(self.module_id)],
            fields::EFFECTIVE_TIME => effective_time(&self.effective_time),
            fields::REFSET_ID => vec![Value::Id(self.refset_id)],
            fields::REFERENCED_COMPONENT_ID => vec![Value::Id(self.referenced_component_id)],
            other => self.properties.get(other).cloned().into_iter().collect(),
        }
    }

    fn nested(&self, path: &str) -> Vec<&dyn Indexed> {
        match path {
            fields::CLASS_AXIOM_RELATIONSHIPS => self
                .class_axiom_relationships
                .iter()
                .map(|relationship| relationship as &dyn Indexed)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A query with its patterns compiled, ready to test documents.
#[derive(Debug)]
pub(crate) enum Matcher {
    All,
    Nothing,
    Term(Field, Value),
    Terms(Field, BTreeSet<Value>),
    Exists(Field),
    Range(Field, Bound<Value>, Bound<Value>),
    Words(Field, Vec<String>),
    Pattern(Field, Regex),
    Nested(Field, Box<Matcher>),
    Bool {
        required: Vec<Matcher>,
        should: Vec<Matcher>,
        must_not: Vec<Matcher>,
    },
}

impl Matcher {
    pub fn compile(query: &Query) -> IndexResult<Self> {
        let matcher = match query {
            Query::MatchAll => Matcher::All,
            Query::MatchNone => Matcher::Nothing,
            Query::Term { field, value } => Matcher::Term(field.clone(), value.clone()),
            Query::Terms { field, values } => Matcher::Terms(field.clone(), values.clone()),
            Query::Exists(field) => Matcher::Exists(field.clone()),
            Query::Range {
                field,
                lower,
                upper,
            } => Matcher::Range(field.clone(), lower.clone(), upper.clone()),
            Query::Match { field, text } => Matcher::Words(field.clone(), words(text)),
            Query::Wildcard { field, pattern } => {
                Matcher::Pattern(field.clone(), compile_wildcard(pattern)?)
            }
            Query::Regex { field, pattern } => {
                let regex = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|e| IndexError::invalid_query(e.to_string()))?;
                Matcher::Pattern(field.clone(), regex)
            }
            Query::Nested { path, query } => {
                Matcher::Nested(path.clone(), Box::new(Matcher::compile(query)?))
            }
            Query::Bool(clauses) => Matcher::Bool {
                required: clauses
                    .must
                    .iter()
                    .chain(&clauses.filter)
                    .map(Matcher::compile)
                    .collect::<IndexResult<_>>()?,
                should: clauses
                    .should
                    .iter()
                    .map(Matcher::compile)
                    .collect::<IndexResult<_>>()?,
                must_not: clauses
                    .must_not
                    .iter()
                    .map(Matcher::compile)
                    .collect::<IndexResult<_>>()?,
            },
        };
        Ok(matcher)
    }

    pub fn matches(&self, doc: &dyn Indexed) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Nothing => false,
            Matcher::Term(field, expected) => {
                doc.values(field).iter().any(|value| value.same_as(expected))
            }
            Matcher::Terms(field, expected) => doc
                .values(field)
                .iter()
                .any(|value| contains_value(expected, value)),
            Matcher::Exists(field) => !doc.values(field).is_empty(),
            Matcher::Range(field, lower, upper) => doc
                .values(field)
                .iter()
                .any(|value| above(value, lower) && below(value, upper)),
            Matcher::Words(field, expected) => {
                !expected.is_empty()
                    && doc.values(field).iter().any(|value| {
                        value.as_str().is_some_and(|text| {
                            let candidates = words(text);
                            expected.iter().all(|word| {
                                candidates.iter().any(|candidate| candidate.starts_with(word))
                            })
                        })
                    })
            }
            Matcher::Pattern(field, regex) => doc
                .values(field)
                .iter()
                .any(|value| value.as_str().is_some_and(|text| regex.is_match(text))),
            Matcher::Nested(path, inner) => {
                doc.nested(path).into_iter().any(|nested| inner.matches(nested))
            }
            Matcher::Bool {
                required,
                should,
                must_not,
            } => {
                required.iter().all(|m| m.matches(doc))
                    && !must_not.iter().any(|m| m.matches(doc))
                    && (should.is_empty() || should.iter().any(|m| m.matches(doc)))
            }
        }
    }
}

fn contains_value(expected: &BTreeSet<Value>, value: &Value) -> bool {
    if expected.contains(value) {
        return true;
    }
    matches!(value, Value::Int(_) | Value::Decimal(_))
        && expected.iter().any(|candidate| candidate.same_as(value))
}

fn above(value: &Value, lower: &Bound<Value>) -> bool {
    match lower {
        Bound::Included(bound) => matches!(
            value.compare(bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Bound::Excluded(bound) => value.compare(bound) == Some(Ordering::Greater),
        Bound::Unbounded => true,
    }
}

fn below(value: &Value, upper: &Bound<Value>) -> bool {
    match upper {
        Bound::Included(bound) => {
            matches!(value.compare(bound), Some(Ordering::Less | Ordering::Equal))
        }
        Bound::Excluded(bound) => value.compare(bound) == Some(Ordering::Less),
        Bound::Unbounded => true,
    }
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn compile_wildcard(pattern: &str) -> IndexResult<Regex> {
    let mut source = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| IndexError::invalid_query(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known;
    use snomed_ecl::ConcreteValue;

    fn matches(query: Query, doc: &dyn Indexed) -> bool {
        Matcher::compile(&query).unwrap().matches(doc)
    }

    #[test]
    fn test_word_prefix_match() {
        let description = DescriptionDocument::new(1, 2, "Clinical finding");
        assert!(matches(Query::matching(fields::TERM, "clin find"), &description));
        assert!(matches(Query::matching(fields::TERM, "FINDING"), &description));
        assert!(!matches(Query::matching(fields::TERM, "linical"), &description));
        assert!(!matches(Query::matching(fields::TERM, ""), &description));
    }

    #[test]
    fn test_wildcard_is_case_insensitive() {
        let description = DescriptionDocument::new(1, 2, "Heart attack");
        assert!(matches(Query::wildcard(fields::TERM, "heart*"), &description));
        assert!(matches(Query::wildcard(fields::TERM, "*ATT?CK"), &description));
        assert!(!matches(Query::wildcard(fields::TERM, "heart"), &description));
    }

    #[test]
    fn test_regex_matches_whole_value() {
        let description = DescriptionDocument::new(1, 2, "Heart attack");
        assert!(matches(Query::regex(fields::TERM, "Heart.*"), &description));
        assert!(!matches(Query::regex(fields::TERM, "attack"), &description));
        assert!(Matcher::compile(&Query::regex(fields::TERM, "(")).is_err());
    }

    #[test]
    fn test_range_on_concrete_values() {
        let relationship =
            RelationshipDocument::concrete(1, 2, 3, ConcreteValue::Integer(250));
        let query = Query::range(
            fields::VALUE,
            Bound::Excluded(Value::Int(100)),
            Bound::Included(Value::Decimal(rust_decimal::Decimal::new(2500, 1))),
        );
        assert!(matches(query, &relationship));
        assert!(!matches(Query::exists(fields::DESTINATION_ID), &relationship));
    }

    #[test]
    fn test_nested_axiom_relationships() {
        let member = MemberDocument::axiom(
            "a1",
            10,
            [
                AxiomRelationship::new(well_known::IS_A, 20, 0),
                AxiomRelationship::new(363698007, 30, 1),
            ],
        );
        let query = Query::nested(
            fields::CLASS_AXIOM_RELATIONSHIPS,
            Query::bool()
                .filter(Query::term(fields::TYPE_ID, 363698007u64))
                .filter(Query::term(fields::DESTINATION_ID, 30u64))
                .build(),
        );
        assert!(matches(query, &member));

        let mismatched = Query::nested(
            fields::CLASS_AXIOM_RELATIONSHIPS,
            Query::bool()
                .filter(Query::term(fields::TYPE_ID, 363698007u64))
                .filter(Query::term(fields::DESTINATION_ID, 20u64))
                .build(),
        );
        assert!(!matches(mismatched, &member));
    }

    #[test]
    fn test_bool_should_requires_one_match() {
        let concept = ConceptDocument::new(5);
        let query = Query::bool()
            .filter(Query::term(fields::ACTIVE, true))
            .should(Query::ids([1]))
            .should(Query::ids([2]))
            .build();
        assert!(!matches(query, &concept));
        assert!(!matches(Query::ids([]), &concept));
        assert!(matches(Query::bool().must_not(Query::ids([1])).build(), &concept));
    }

    #[test]
    fn test_member_properties() {
        let member = MemberDocument::new("m1", 447562003, 10).with_property("mapTarget", "J45.9");
        assert!(matches(Query::term("mapTarget", "J45.9"), &member));
        assert!(matches(Query::term(fields::ID, "m1"), &member));
    }
}
