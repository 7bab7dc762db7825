// kgsp-reason: Bounded forward chaining over a fixed rule table
// Breadth-first to a configured depth or cycle budget; partial results
// are returned either way

//! # KGSP reasoner
//!
//! A lookup-table-driven RDFS/OWL reasoner. Schema axioms
//! (`rdfs:subClassOf`, `rdfs:subPropertyOf`, `rdfs:domain`,
//! `rdfs:range`) compile into a fixed rule table plus per-kind hash
//! lookups, so applying a rule to a triple is a map probe, not a graph
//! scan.
//!
//! Forward chaining runs breadth-first up to `max_depth` levels or until
//! the per-call cycle budget is exhausted, whichever comes first; the
//! result carries a `complete` flag. Derived triples land in a
//! hash-addressed cache so reruns and asserted duplicates are never
//! re-emitted.

pub mod rules;

pub use rules::{Rule, RuleKind, MAX_RULES};

use arrayvec::ArrayVec;
use kgsp_rdf::{ObjectKind, StringRef, Triple, TripleGraph, Vocab};
use kgsp_ticks::CycleSource;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReasonError {
    #[error("invalid argument on reasoner entry point")]
    InvalidArgument,
    #[error("rule table full")]
    Capacity,
}

/// Reasoner tuning. Depth clamps to 1..=12, budget to 1..=7 cycles.
#[derive(Debug, Clone, Copy)]
pub struct ReasonerConfig {
    pub max_depth: u32,
    pub budget_cycles: u64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            budget_cycles: 2,
        }
    }
}

impl ReasonerConfig {
    fn clamped(self) -> Self {
        Self {
            max_depth: self.max_depth.clamp(1, 12),
            budget_cycles: self.budget_cycles.clamp(1, 7),
        }
    }
}

/// Result of one forward-chaining call.
#[derive(Debug, Default)]
pub struct InferenceResult {
    pub derived: Vec<Triple>,
    /// False when depth or budget truncated the closure.
    pub complete: bool,
    pub depth_reached: u32,
    pub cycles_used: u64,
}

/// Confidence discount applied per derivation step.
const DERIVED_DISCOUNT: u8 = 10;

/// Push a derivation unless it is cached or asserted in the base graph.
fn emit(
    cache: &mut FxHashSet<(u32, u32, u32)>,
    graph: &TripleGraph,
    derived: Triple,
    out: &mut Vec<Triple>,
) {
    let key = derived.identity();
    if cache.contains(&key) {
        return;
    }
    if graph.contains(derived.subject, derived.predicate, derived.object) {
        return;
    }
    cache.insert(key);
    out.push(derived);
}

pub struct Reasoner {
    config: ReasonerConfig,
    vocab: Vocab,
    rules: ArrayVec<Rule, MAX_RULES>,
    /// class hash -> direct superclasses.
    super_classes: FxHashMap<u32, SmallVec<[StringRef; 4]>>,
    /// property hash -> direct superproperties.
    super_properties: FxHashMap<u32, SmallVec<[StringRef; 4]>>,
    /// property hash -> domain classes.
    domains: FxHashMap<u32, SmallVec<[StringRef; 4]>>,
    /// property hash -> range classes.
    ranges: FxHashMap<u32, SmallVec<[StringRef; 4]>>,
    /// Hash-addressed derived-triple cache.
    derived_cache: FxHashSet<(u32, u32, u32)>,
}

impl Reasoner {
    pub fn new(vocab: Vocab, config: ReasonerConfig) -> Self {
        Self {
            config: config.clamped(),
            vocab,
            rules: ArrayVec::new(),
            super_classes: FxHashMap::default(),
            super_properties: FxHashMap::default(),
            domains: FxHashMap::default(),
            ranges: FxHashMap::default(),
            derived_cache: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Compile the schema triples in `graph` into the rule table and
    /// lookup maps, replacing any previous schema.
    pub fn load_schema(&mut self, graph: &TripleGraph) -> Result<(), ReasonError> {
        self.rules.clear();
        self.super_classes.clear();
        self.super_properties.clear();
        self.domains.clear();
        self.ranges.clear();

        for triple in graph.triples() {
            let kind = if triple.predicate == self.vocab.rdfs_sub_class_of {
                RuleKind::SubClassOf
            } else if triple.predicate == self.vocab.rdfs_sub_property_of {
                RuleKind::SubPropertyOf
            } else if triple.predicate == self.vocab.rdfs_domain {
                RuleKind::Domain
            } else if triple.predicate == self.vocab.rdfs_range {
                RuleKind::Range
            } else {
                continue;
            };
            self.add_rule(Rule::new(kind, triple.subject, triple.object))?;
        }
        Ok(())
    }

    /// Register one rule and index it.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), ReasonError> {
        if rule.left.is_null() || rule.right.is_null() {
            return Err(ReasonError::InvalidArgument);
        }
        if self.rules.contains(&rule) {
            return Ok(());
        }
        self.rules.try_push(rule).map_err(|_| ReasonError::Capacity)?;
        let map = match rule.kind {
            RuleKind::SubClassOf => &mut self.super_classes,
            RuleKind::SubPropertyOf => &mut self.super_properties,
            RuleKind::Domain => &mut self.domains,
            RuleKind::Range => &mut self.ranges,
        };
        map.entry(rule.left.hash).or_default().push(rule.right);
        Ok(())
    }

    /// Forward-chain over `graph` up to the configured depth or budget.
    pub fn infer(&mut self, graph: &TripleGraph, clock: &dyn CycleSource) -> InferenceResult {
        let start = clock.now();
        let mut result = InferenceResult {
            complete: true,
            ..InferenceResult::default()
        };

        let mut frontier: Vec<Triple> = graph.triples().copied().collect();

        for depth in 1..=self.config.max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next: Vec<Triple> = Vec::new();

            for triple in &frontier {
                if clock.now().saturating_sub(start) > self.config.budget_cycles {
                    result.complete = false;
                    result.derived.extend(next);
                    result.depth_reached = depth;
                    result.cycles_used = clock.now().saturating_sub(start);
                    return result;
                }
                self.apply_rules(graph, triple, &mut next);
            }

            result.depth_reached = depth;
            result.derived.extend_from_slice(&next);
            frontier = next;
        }

        if !frontier.is_empty() {
            // Depth cap reached with work left on the frontier.
            result.complete = false;
        }
        result.cycles_used = clock.now().saturating_sub(start);
        result
    }

    /// Apply every matching rule to one triple, pushing fresh
    /// derivations (not cached, not asserted) onto `out`.
    fn apply_rules(&mut self, graph: &TripleGraph, triple: &Triple, out: &mut Vec<Triple>) {
        let confidence = triple.confidence.saturating_sub(DERIVED_DISCOUNT);
        let rdf_type = self.vocab.rdf_type;

        if triple.predicate == rdf_type {
            if let Some(supers) = self.super_classes.get(&triple.object.hash) {
                for &super_class in supers {
                    emit(
                        &mut self.derived_cache,
                        graph,
                        Triple::new(triple.subject, rdf_type, super_class)
                            .with_confidence(confidence),
                        out,
                    );
                }
            }
            return;
        }

        if let Some(supers) = self.super_properties.get(&triple.predicate.hash) {
            for &super_prop in supers {
                emit(
                    &mut self.derived_cache,
                    graph,
                    Triple::new(triple.subject, super_prop, triple.object)
                        .with_confidence(confidence),
                    out,
                );
            }
        }
        if let Some(classes) = self.domains.get(&triple.predicate.hash) {
            for &class in classes {
                emit(
                    &mut self.derived_cache,
                    graph,
                    Triple::new(triple.subject, rdf_type, class).with_confidence(confidence),
                    out,
                );
            }
        }
        if triple.object_kind != ObjectKind::Literal {
            if let Some(classes) = self.ranges.get(&triple.predicate.hash) {
                for &class in classes {
                    emit(
                        &mut self.derived_cache,
                        graph,
                        Triple::new(triple.object, rdf_type, class).with_confidence(confidence),
                        out,
                    );
                }
            }
        }
    }

    /// Clear the derived-triple cache.
    pub fn reset(&mut self) {
        self.derived_cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.derived_cache.len()
    }
}
