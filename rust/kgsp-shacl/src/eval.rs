// kgsp-shacl: Constraint evaluators
// One evaluator per kind, dispatched through a flat function table;
// evaluators never fail, they return a verdict and a memory footprint

use crate::constraint::{Constraint, ConstraintKind, ConstraintParam};
use kgsp_rdf::{Interner, StringRef, Triple, TripleGraph};

/// Evaluation context for one (focus, value, constraint) application.
pub struct EvalInput<'a> {
    pub graph: &'a TripleGraph,
    pub interner: &'a Interner,
    pub focus: StringRef,
    /// The value under test; NULL for focus-level constraints.
    pub value: StringRef,
    pub constraint: &'a Constraint,
}

/// Verdict plus the memory the evaluation attributes to the focus node.
#[derive(Debug, Clone, Copy)]
pub struct EvalOutcome {
    pub conforms: bool,
    pub footprint: usize,
}

type EvalFn = fn(&EvalInput<'_>) -> EvalOutcome;

/// Dispatch table indexed by `ConstraintKind` discriminant.
static EVALUATORS: [EvalFn; ConstraintKind::COUNT] = [
    eval_class,
    eval_datatype,
    eval_node_kind,
    eval_min_count,
    eval_max_count,
    eval_min_length,
    eval_max_length,
    eval_pattern,
    eval_min_exclusive,
    eval_min_inclusive,
    eval_max_exclusive,
    eval_max_inclusive,
    eval_in,
    eval_memory_bound,
    eval_has_value,
];

/// Evaluate one constraint application. O(1) dispatch on the kind.
#[inline(always)]
pub fn dispatch(input: &EvalInput<'_>) -> EvalOutcome {
    EVALUATORS[input.constraint.kind as usize](input)
}

const BASE_FOOTPRINT: usize = std::mem::size_of::<EvalOutcome>();

#[inline(always)]
fn verdict(conforms: bool) -> EvalOutcome {
    EvalOutcome {
        conforms,
        footprint: BASE_FOOTPRINT,
    }
}

fn eval_class(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Reference(class) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(input.graph.has_type(input.value, *class))
}

fn eval_datatype(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Reference(datatype) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(input.value.is_literal() && input.value.datatype_hash == datatype.hash)
}

fn eval_node_kind(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Kind(rule) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(rule.matches(input.value.flags))
}

fn eval_min_count(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Count(min) = &input.constraint.param else {
        return verdict(false);
    };
    let count = input
        .graph
        .count_values(input.focus, input.constraint.property_path);
    verdict(count as u32 >= *min)
}

fn eval_max_count(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Count(max) = &input.constraint.param else {
        return verdict(false);
    };
    let count = input
        .graph
        .count_values(input.focus, input.constraint.property_path);
    verdict(count as u32 <= *max)
}

fn eval_min_length(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Length(min) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(input.value.len >= *min)
}

fn eval_max_length(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Length(max) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(input.value.len <= *max)
}

fn eval_pattern(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Pattern(pattern) = &input.constraint.param else {
        return verdict(false);
    };
    let Some(bytes) = input.interner.resolve(input.value) else {
        return verdict(false);
    };
    match std::str::from_utf8(&bytes) {
        Ok(text) => verdict(pattern.regex.is_match(text)),
        Err(_) => verdict(false),
    }
}

/// Parse a literal's lexical form as a decimal. Non-literals and
/// unparseable forms never conform to range constraints.
fn decimal_value(input: &EvalInput<'_>) -> Option<f64> {
    if !input.value.is_literal() {
        return None;
    }
    let bytes = input.interner.resolve(input.value)?;
    std::str::from_utf8(&bytes).ok()?.trim().parse::<f64>().ok()
}

fn eval_min_exclusive(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Decimal(bound) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(decimal_value(input).is_some_and(|v| v > *bound))
}

fn eval_min_inclusive(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Decimal(bound) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(decimal_value(input).is_some_and(|v| v >= *bound))
}

fn eval_max_exclusive(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Decimal(bound) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(decimal_value(input).is_some_and(|v| v < *bound))
}

fn eval_max_inclusive(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Decimal(bound) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(decimal_value(input).is_some_and(|v| v <= *bound))
}

fn eval_in(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::List(allowed) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(allowed.iter().any(|r| *r == input.value))
}

fn eval_memory_bound(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Memory(limit) = &input.constraint.param else {
        return verdict(false);
    };
    let footprint = focus_footprint(input.graph, input.focus);
    EvalOutcome {
        conforms: footprint <= *limit,
        footprint,
    }
}

fn eval_has_value(input: &EvalInput<'_>) -> EvalOutcome {
    let ConstraintParam::Reference(expected) = &input.constraint.param else {
        return verdict(false);
    };
    verdict(
        input
            .graph
            .contains(input.focus, input.constraint.property_path, *expected),
    )
}

/// Outcome of applying one constraint to a focus node, including the
/// per-value scan for value-based kinds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConstraintCheck {
    pub violated: bool,
    /// First offending value; NULL when none or focus-level.
    pub value: StringRef,
    pub evaluations: u64,
    pub footprint: usize,
}

/// Apply one constraint to a focus node.
///
/// Value-based kinds scan the property path's values and stop at the
/// first non-conforming one (one recorded violation per constraint);
/// focus-level kinds evaluate once. A value-based constraint with a
/// NULL path applies to the focus node itself.
pub(crate) fn check_constraint(
    graph: &TripleGraph,
    interner: &Interner,
    focus: StringRef,
    constraint: &Constraint,
) -> ConstraintCheck {
    if constraint.kind.is_value_based() {
        let mut evaluations = 0;
        let mut footprint = 0;
        if constraint.property_path.is_null() {
            let out = dispatch(&EvalInput {
                graph,
                interner,
                focus,
                value: focus,
                constraint,
            });
            return ConstraintCheck {
                violated: !out.conforms,
                value: if out.conforms { StringRef::NULL } else { focus },
                evaluations: 1,
                footprint: out.footprint,
            };
        }
        for triple in graph.values_of(focus, constraint.property_path) {
            evaluations += 1;
            let out = dispatch(&EvalInput {
                graph,
                interner,
                focus,
                value: triple.object,
                constraint,
            });
            footprint = footprint.max(out.footprint);
            if !out.conforms {
                return ConstraintCheck {
                    violated: true,
                    value: triple.object,
                    evaluations,
                    footprint,
                };
            }
        }
        ConstraintCheck {
            violated: false,
            value: StringRef::NULL,
            evaluations,
            footprint,
        }
    } else {
        let out = dispatch(&EvalInput {
            graph,
            interner,
            focus,
            value: StringRef::NULL,
            constraint,
        });
        ConstraintCheck {
            violated: !out.conforms,
            value: StringRef::NULL,
            evaluations: 1,
            footprint: out.footprint,
        }
    }
}

/// Memory attributed to a focus node: its triples plus per-triple
/// index overhead.
pub fn focus_footprint(graph: &TripleGraph, focus: StringRef) -> usize {
    let per_triple = std::mem::size_of::<Triple>() + 2 * std::mem::size_of::<u32>();
    graph.triples_of(focus).count() * per_triple
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{NodeKindRule, Severity};
    use kgsp_rdf::Vocab;
    use smallvec::smallvec;
    use test_case::test_case;

    struct Fixture {
        interner: Interner,
        vocab: Vocab,
        graph: TripleGraph,
    }

    fn fixture() -> Fixture {
        let interner = Interner::new();
        let vocab = Vocab::intern(&interner).unwrap();
        let graph = TripleGraph::new(vocab.rdf_type);
        Fixture {
            interner,
            vocab,
            graph,
        }
    }

    fn constraint(kind: ConstraintKind, path: StringRef, param: ConstraintParam) -> Constraint {
        Constraint::new(kind, path, param, Severity::Violation)
    }

    fn run(fx: &Fixture, focus: StringRef, value: StringRef, c: &Constraint) -> bool {
        dispatch(&EvalInput {
            graph: &fx.graph,
            interner: &fx.interner,
            focus,
            value,
            constraint: c,
        })
        .conforms
    }

    #[test]
    fn test_class_checks_rdf_type() {
        let mut fx = fixture();
        let alice = fx.interner.intern_iri(b"http://ex/alice").unwrap();
        let person = fx.interner.intern_iri(b"http://ex/Person").unwrap();
        fx.graph
            .insert(Triple::new(alice, fx.vocab.rdf_type, person));

        let c = constraint(
            ConstraintKind::Class,
            StringRef::NULL,
            ConstraintParam::Reference(person),
        );
        assert!(run(&fx, StringRef::NULL, alice, &c));
        let bob = fx.interner.intern_iri(b"http://ex/bob").unwrap();
        assert!(!run(&fx, StringRef::NULL, bob, &c));
    }

    #[test]
    fn test_datatype_matches_hash() {
        let fx = fixture();
        let typed = fx
            .interner
            .intern_typed_literal(b"42", fx.vocab.xsd_integer)
            .unwrap();
        let untyped = fx.interner.intern_literal(b"42").unwrap();

        let c = constraint(
            ConstraintKind::Datatype,
            StringRef::NULL,
            ConstraintParam::Reference(fx.vocab.xsd_integer),
        );
        assert!(run(&fx, StringRef::NULL, typed, &c));
        assert!(!run(&fx, StringRef::NULL, untyped, &c));
    }

    #[test]
    fn test_node_kind_iri_vs_literal() {
        let fx = fixture();
        let iri = fx.interner.intern_iri(b"http://ex/bob").unwrap();
        let lit = fx.interner.intern_literal(b"bob").unwrap();
        let c = constraint(
            ConstraintKind::NodeKind,
            StringRef::NULL,
            ConstraintParam::Kind(NodeKindRule::Iri),
        );
        assert!(run(&fx, StringRef::NULL, iri, &c));
        assert!(!run(&fx, StringRef::NULL, lit, &c));
    }

    #[test]
    fn test_counts() {
        let mut fx = fixture();
        let alice = fx.interner.intern_iri(b"http://ex/alice").unwrap();
        let name = fx.interner.intern_iri(b"http://ex/name").unwrap();
        let lit = fx.interner.intern_literal(b"Alice").unwrap();
        fx.graph.insert(Triple::new(alice, name, lit));

        let min2 = constraint(ConstraintKind::MinCount, name, ConstraintParam::Count(2));
        let max1 = constraint(ConstraintKind::MaxCount, name, ConstraintParam::Count(1));
        assert!(!run(&fx, alice, StringRef::NULL, &min2));
        assert!(run(&fx, alice, StringRef::NULL, &max1));
    }

    #[test_case("2.5", 1.0, true; "above exclusive bound")]
    #[test_case("1.0", 1.0, false; "at exclusive bound")]
    #[test_case("0.5", 1.0, false; "below exclusive bound")]
    #[test_case("not-a-number", 1.0, false; "unparseable literal")]
    fn test_min_exclusive(lexical: &str, bound: f64, expected: bool) {
        let fx = fixture();
        let value = fx.interner.intern_literal(lexical.as_bytes()).unwrap();
        let c = constraint(
            ConstraintKind::MinExclusive,
            StringRef::NULL,
            ConstraintParam::Decimal(bound),
        );
        assert_eq!(run(&fx, StringRef::NULL, value, &c), expected);
    }

    #[test]
    fn test_inclusive_bounds_accept_equal() {
        let fx = fixture();
        let value = fx.interner.intern_literal(b"7").unwrap();
        let min = constraint(
            ConstraintKind::MinInclusive,
            StringRef::NULL,
            ConstraintParam::Decimal(7.0),
        );
        let max = constraint(
            ConstraintKind::MaxInclusive,
            StringRef::NULL,
            ConstraintParam::Decimal(7.0),
        );
        assert!(run(&fx, StringRef::NULL, value, &min));
        assert!(run(&fx, StringRef::NULL, value, &max));
    }

    #[test]
    fn test_pattern() {
        let fx = fixture();
        let source = fx.interner.intern_literal(b"^[a-z]+$").unwrap();
        let c = constraint(
            ConstraintKind::Pattern,
            StringRef::NULL,
            ConstraintParam::Pattern(crate::constraint::CompiledPattern {
                source,
                regex: regex::Regex::new("^[a-z]+$").unwrap(),
            }),
        );
        let good = fx.interner.intern_literal(b"alice").unwrap();
        let bad = fx.interner.intern_literal(b"Alice42").unwrap();
        assert!(run(&fx, StringRef::NULL, good, &c));
        assert!(!run(&fx, StringRef::NULL, bad, &c));
    }

    #[test]
    fn test_lengths() {
        let fx = fixture();
        let value = fx.interner.intern_literal(b"hello").unwrap();
        let min = constraint(
            ConstraintKind::MinLength,
            StringRef::NULL,
            ConstraintParam::Length(3),
        );
        let max = constraint(
            ConstraintKind::MaxLength,
            StringRef::NULL,
            ConstraintParam::Length(4),
        );
        assert!(run(&fx, StringRef::NULL, value, &min));
        assert!(!run(&fx, StringRef::NULL, value, &max));
    }

    #[test]
    fn test_in_list() {
        let fx = fixture();
        let red = fx.interner.intern_literal(b"red").unwrap();
        let green = fx.interner.intern_literal(b"green").unwrap();
        let blue = fx.interner.intern_literal(b"blue").unwrap();
        let c = constraint(
            ConstraintKind::In,
            StringRef::NULL,
            ConstraintParam::List(smallvec![red, green]),
        );
        assert!(run(&fx, StringRef::NULL, red, &c));
        assert!(!run(&fx, StringRef::NULL, blue, &c));
    }

    #[test]
    fn test_memory_bound() {
        let mut fx = fixture();
        let alice = fx.interner.intern_iri(b"http://ex/alice").unwrap();
        let name = fx.interner.intern_iri(b"http://ex/name").unwrap();
        for i in 0..8 {
            let lit = fx
                .interner
                .intern_literal(format!("name-{}", i).as_bytes())
                .unwrap();
            fx.graph.insert(Triple::new(alice, name, lit));
        }
        let tight = constraint(
            ConstraintKind::MemoryBound,
            StringRef::NULL,
            ConstraintParam::Memory(8),
        );
        let loose = constraint(
            ConstraintKind::MemoryBound,
            StringRef::NULL,
            ConstraintParam::Memory(1 << 20),
        );
        assert!(!run(&fx, alice, StringRef::NULL, &tight));
        assert!(run(&fx, alice, StringRef::NULL, &loose));
    }

    #[test]
    fn test_has_value() {
        let mut fx = fixture();
        let alice = fx.interner.intern_iri(b"http://ex/alice").unwrap();
        let status = fx.interner.intern_iri(b"http://ex/status").unwrap();
        let active = fx.interner.intern_literal(b"active").unwrap();
        fx.graph.insert(Triple::new(alice, status, active));

        let c = constraint(
            ConstraintKind::HasValue,
            status,
            ConstraintParam::Reference(active),
        );
        assert!(run(&fx, alice, StringRef::NULL, &c));
        let bob = fx.interner.intern_iri(b"http://ex/bob").unwrap();
        assert!(!run(&fx, bob, StringRef::NULL, &c));
    }
}
