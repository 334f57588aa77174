//! Property tests for the canonical rewriting pass.

use proptest::prelude::*;
use snomed_ecl::{
    rewrite, AttributeConstraint, Cardinality, Comparison, ComparisonOperator, ConcreteValue,
    DescriptionTypeToken, DescriptionTypeValue, EclExpression, EclFilter, FilterDomain,
    Refinement,
};

fn leaf() -> impl Strategy<Value = EclExpression> {
    prop_oneof![
        Just(EclExpression::Any),
        (1u64..6).prop_map(EclExpression::concept),
        (1u64..6).prop_map(|id| EclExpression::concept_with_term(id, "label")),
        prop::collection::vec(1u64..6, 0..6).prop_map(EclExpression::concept_set),
    ]
}

fn token() -> impl Strategy<Value = DescriptionTypeToken> {
    prop_oneof![
        Just(DescriptionTypeToken::Fsn),
        Just(DescriptionTypeToken::Syn),
        Just(DescriptionTypeToken::Def),
    ]
}

fn expression() -> impl Strategy<Value = EclExpression> {
    leaf().prop_recursive(5, 48, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(EclExpression::descendant_of),
            inner.clone().prop_map(|e| EclExpression::MemberOf(Box::new(e))),
            inner.clone().prop_map(EclExpression::nested),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| EclExpression::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| EclExpression::or(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| EclExpression::minus(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| EclExpression::dotted(l, r)),
            (inner.clone(), inner.clone(), inner.clone(), any::<bool>(), 0usize..3).prop_map(
                |(focus, attribute, value, negate, min)| {
                    let comparison = if negate {
                        Comparison::not_equal(value)
                    } else {
                        Comparison::equal(value)
                    };
                    let constraint = AttributeConstraint::new(attribute, comparison)
                        .with_cardinality(Cardinality::new(min, None));
                    EclExpression::refined(
                        focus,
                        Refinement::group(None, Refinement::attribute(constraint)),
                    )
                }
            ),
            (inner.clone(), prop::collection::vec(token(), 1..5)).prop_map(|(focus, tokens)| {
                EclExpression::filtered(
                    focus,
                    FilterDomain::Description,
                    EclFilter::DescriptionType {
                        operator: ComparisonOperator::Equal,
                        value: DescriptionTypeValue::Tokens(tokens),
                    },
                )
            }),
            (inner, 0i64..10).prop_map(|(focus, n)| {
                EclExpression::refined(
                    focus,
                    Refinement::attribute(AttributeConstraint::new(
                        EclExpression::concept(1142135004),
                        Comparison::concrete(ComparisonOperator::NotEqual, ConcreteValue::Integer(n)),
                    )),
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn test_rewrite_is_idempotent(expr in expression()) {
        let once = rewrite(&expr);
        prop_assert_eq!(rewrite(&once), once);
    }

    #[test]
    fn test_concept_set_dedup_keeps_first_occurrence(ids in prop::collection::vec(1u64..10, 0..20)) {
        let rewritten = rewrite(&EclExpression::concept_set(ids.clone()));
        let mut expected = Vec::new();
        for id in ids {
            if !expected.contains(&id) {
                expected.push(id);
            }
        }
        prop_assert_eq!(rewritten, EclExpression::concept_set(expected));
    }

    #[test]
    fn test_rewrite_removes_all_not_equal_expression_comparisons(expr in expression()) {
        let rendered = rewrite(&expr).to_string();
        // Only concrete comparisons (`!= #n`) may keep the operator.
        let only_concrete = rendered
            .match_indices("!= ")
            .all(|(at, _)| rendered[at + 3..].starts_with('#'));
        prop_assert!(only_concrete, "{}", rendered);
    }
}
