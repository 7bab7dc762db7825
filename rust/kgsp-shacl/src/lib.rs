// kgsp-shacl: Compiled SHACL validation
// Shapes compile to flat constraint tables; evaluation is table dispatch
// under a per-node cycle budget

//! # KGSP SHACL validator
//!
//! Validates focus nodes against compiled shapes. A shape is a bounded
//! constraint list targeting a class; each constraint evaluates through
//! a flat function table indexed by its kind, so evaluation cost is
//! O(1) dispatch plus the evaluator body.
//!
//! Budget overruns during validation are recorded on the report and the
//! remaining constraints for that node are skipped; they are never
//! raised as errors. Effectiveness tracking feeds the maintenance-only
//! evolution pass ([`Validator::maintenance`]).

pub mod constraint;
pub mod eval;
pub mod evolve;
pub mod report;
pub mod shape;

pub use constraint::{
    CompiledPattern, Constraint, ConstraintKind, ConstraintMetrics, ConstraintParam, NodeKindRule,
    Severity,
};
pub use eval::{dispatch, focus_footprint, EvalInput, EvalOutcome};
pub use evolve::{EvolutionConfig, EvolutionSummary};
pub use report::{ValidationReport, ValidationResult};
pub use shape::{Shape, ShapeTable, MAX_CONSTRAINTS};

use eval::check_constraint;
use kgsp_rdf::{Interner, StringRef, TripleGraph};
use kgsp_ticks::CycleSource;
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Validator errors. Hot-path evaluation never returns these; they
/// surface from the registration and lookup entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaclError {
    #[error("invalid argument on validator entry point")]
    InvalidArgument,
    #[error("referenced shape does not exist")]
    NotFound,
    #[error("shape IRI already loaded")]
    Duplicate,
    #[error("shape table or constraint list full")]
    Capacity,
    #[error("validator self-check failed")]
    Corruption,
}

/// Validator tuning. Mirrors the engine configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Shape table capacity; rounded up to a power of two.
    pub shape_capacity: usize,
    pub max_memory_per_node: usize,
    pub max_memory_per_graph: usize,
    /// Cycle budget per validated node. Sized for a full constraint
    /// list at the per-operation target.
    pub node_budget_cycles: u64,
    pub evolution: EvolutionConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            shape_capacity: 128,
            max_memory_per_node: 64 * 1024,
            max_memory_per_graph: 16 * 1024 * 1024,
            node_budget_cycles: kgsp_ticks::TARGET_CYCLES * MAX_CONSTRAINTS as u64,
            evolution: EvolutionConfig::default(),
        }
    }
}

const VALIDATOR_MAGIC: u32 = 0x4B47_5356; // "KGSV"

/// Compiled SHACL validator.
pub struct Validator {
    magic: u32,
    shapes: ShapeTable,
    config: ValidatorConfig,
}

impl Validator {
    pub fn create(config: ValidatorConfig) -> Self {
        Self {
            magic: VALIDATOR_MAGIC,
            shapes: ShapeTable::with_capacity(config.shape_capacity),
            config,
        }
    }

    pub fn new() -> Self {
        Self::create(ValidatorConfig::default())
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Register a shape. `Duplicate` if the IRI is already loaded,
    /// `Capacity` if the table is full.
    pub fn load_shape(&mut self, iri: StringRef, target_class: StringRef) -> Result<(), ShaclError> {
        if iri.is_null() || target_class.is_null() {
            return Err(ShaclError::InvalidArgument);
        }
        self.shapes.insert(Shape::new(iri, target_class))
    }

    /// Append a violation-severity constraint to a loaded shape.
    pub fn add_constraint(
        &mut self,
        shape_iri: StringRef,
        kind: ConstraintKind,
        property_path: StringRef,
        param: ConstraintParam,
    ) -> Result<(), ShaclError> {
        self.add_constraint_with_severity(shape_iri, kind, property_path, param, Severity::Violation)
    }

    pub fn add_constraint_with_severity(
        &mut self,
        shape_iri: StringRef,
        kind: ConstraintKind,
        property_path: StringRef,
        param: ConstraintParam,
        severity: Severity,
    ) -> Result<(), ShaclError> {
        if shape_iri.is_null() || !param.matches_kind(kind) {
            return Err(ShaclError::InvalidArgument);
        }
        let shape = self.shapes.find_mut(shape_iri).ok_or(ShaclError::NotFound)?;
        shape.push_constraint(Constraint::new(kind, property_path, param, severity))
    }

    pub fn find_shape(&self, iri: StringRef) -> Option<&Shape> {
        self.shapes.find(iri)
    }

    /// Deactivated shapes are skipped during validation but keep their
    /// table slot and metrics.
    pub fn set_shape_active(&mut self, iri: StringRef, active: bool) -> Result<(), ShaclError> {
        let shape = self.shapes.find_mut(iri).ok_or(ShaclError::NotFound)?;
        shape.active = active;
        Ok(())
    }

    /// Validate every focus node matching any shape target.
    pub fn validate_graph(
        &mut self,
        graph: &TripleGraph,
        interner: &Interner,
        clock: &dyn CycleSource,
        report: &mut ValidationReport,
    ) {
        let start = clock.now();

        // Focus nodes in first-seen order over shapes in load order.
        let mut seen = FxHashSet::default();
        let mut focus_nodes = Vec::new();
        for shape in self.shapes.iter() {
            if !shape.active {
                continue;
            }
            for subject in graph.subjects_of_type(shape.target_class) {
                if seen.insert(subject.key()) {
                    focus_nodes.push(subject);
                }
            }
        }

        for node in focus_nodes {
            self.validate_node(graph, interner, clock, node, report);
        }

        report.validation_cycles = report
            .validation_cycles
            .saturating_add(clock.now().saturating_sub(start));
        if report.peak_memory > self.config.max_memory_per_graph {
            report.budget_exceeded = true;
        }
        report.finalize();
    }

    /// Validate one node against every applicable shape.
    pub fn validate_node(
        &mut self,
        graph: &TripleGraph,
        interner: &Interner,
        clock: &dyn CycleSource,
        node: StringRef,
        report: &mut ValidationReport,
    ) {
        if node.is_null() {
            return;
        }
        report.nodes_validated += 1;

        let slots: Vec<u32> = self.shapes.slots_in_order().collect();
        for slot in slots {
            let applicable = match self.shapes.slot(slot) {
                Some(shape) => shape.active && graph.has_type(node, shape.target_class),
                None => false,
            };
            if applicable {
                self.validate_node_shape(graph, interner, clock, node, slot, report);
            }
        }
    }

    /// Validate one node against one shape's constraint list, in
    /// insertion order, under the per-node cycle budget.
    pub fn validate_node_shape(
        &mut self,
        graph: &TripleGraph,
        interner: &Interner,
        clock: &dyn CycleSource,
        node: StringRef,
        slot: u32,
        report: &mut ValidationReport,
    ) {
        let start = clock.now();
        let (shape_iri, constraint_count) = match self.shapes.slot(slot) {
            Some(shape) => (shape.iri, shape.constraints.len()),
            None => return,
        };

        let mut node_footprint = 0usize;
        for i in 0..constraint_count {
            let check = {
                let Some(shape) = self.shapes.slot(slot) else {
                    return;
                };
                let Some(constraint) = shape.constraints.get(i) else {
                    return;
                };
                check_constraint(graph, interner, node, constraint)
            };
            report.constraints_checked += 1;
            node_footprint = node_footprint.saturating_add(check.footprint);

            let alpha = self.config.evolution.ewma_alpha;
            let mut recorded = None;
            if let Some(constraint) = self
                .shapes
                .slot_mut(slot)
                .and_then(|s| s.constraints.get_mut(i))
            {
                constraint.metrics.evaluations += check.evaluations;
                if check.violated {
                    constraint.metrics.violations += 1;
                }
                if check.evaluations > 0 {
                    let affected = check.violated && constraint.severity == Severity::Violation;
                    evolve::update_effectiveness(constraint, affected, alpha);
                }
                if check.violated {
                    recorded = Some(ValidationResult {
                        focus: node,
                        shape: shape_iri,
                        constraint_kind: constraint.kind,
                        property_path: constraint.property_path,
                        value: check.value,
                        severity: constraint.severity,
                    });
                }
            }
            if let Some(result) = recorded {
                report.add_result(result);
            }

            // Budget fault: record and skip the node's remaining
            // constraints; in-flight results stand.
            let elapsed = clock.now().saturating_sub(start);
            if elapsed > self.config.node_budget_cycles {
                report.budget_exceeded = true;
                report.budget_faults += 1;
                break;
            }
        }

        if node_footprint > self.config.max_memory_per_node {
            report.add_result(ValidationResult {
                focus: node,
                shape: shape_iri,
                constraint_kind: ConstraintKind::MemoryBound,
                property_path: StringRef::NULL,
                value: StringRef::NULL,
                severity: Severity::Violation,
            });
        }
        report.peak_memory = report.peak_memory.max(node_footprint);
    }

    /// Evaluate a single (focus, value, constraint) application.
    pub fn eval_constraint(
        &self,
        graph: &TripleGraph,
        interner: &Interner,
        focus: StringRef,
        value: StringRef,
        constraint: &Constraint,
    ) -> (bool, usize) {
        let out = dispatch(&EvalInput {
            graph,
            interner,
            focus,
            value,
            constraint,
        });
        (out.conforms, out.footprint)
    }

    /// User feedback: a recorded violation for this constraint was
    /// reversed. Feeds relaxation in the maintenance pass.
    pub fn record_feedback(
        &mut self,
        shape_iri: StringRef,
        kind: ConstraintKind,
        property_path: StringRef,
    ) -> Result<(), ShaclError> {
        let shape = self.shapes.find_mut(shape_iri).ok_or(ShaclError::NotFound)?;
        let constraint = shape
            .constraints
            .iter_mut()
            .find(|c| c.kind == kind && c.property_path == property_path)
            .ok_or(ShaclError::NotFound)?;
        constraint.metrics.reversals += 1;
        Ok(())
    }

    /// Maintenance pass: prune ineffective constraints, relax
    /// chronically reversed ones. Never called from validation.
    pub fn maintenance(&mut self) -> EvolutionSummary {
        let summary = evolve::evolve(&mut self.shapes, &self.config.evolution);
        if summary.constraints_pruned > 0 || summary.constraints_relaxed > 0 {
            tracing::info!(
                pruned = summary.constraints_pruned,
                relaxed = summary.constraints_relaxed,
                "constraint evolution applied"
            );
        }
        summary
    }

    /// Structural self-check. `Corruption` here is process-local fatal.
    pub fn verify_integrity(&self) -> Result<(), ShaclError> {
        if self.magic != VALIDATOR_MAGIC {
            return Err(ShaclError::Corruption);
        }
        if !self.shapes.capacity().is_power_of_two() || self.shapes.len() > self.shapes.capacity() {
            return Err(ShaclError::Corruption);
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgsp_rdf::{Triple, Vocab};
    use kgsp_ticks::LogicalCycles;

    struct Fixture {
        interner: Interner,
        vocab: Vocab,
        graph: TripleGraph,
        validator: Validator,
        clock: LogicalCycles,
    }

    fn fixture() -> Fixture {
        let interner = Interner::new();
        let vocab = Vocab::intern(&interner).unwrap();
        let graph = TripleGraph::new(vocab.rdf_type);
        Fixture {
            interner,
            vocab,
            graph,
            validator: Validator::new(),
            clock: LogicalCycles::with_step(0),
        }
    }

    fn iri(fx: &Fixture, s: &str) -> StringRef {
        fx.interner.intern_iri(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_shape_then_find() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/PersonShape");
        let person = iri(&fx, "http://ex/Person");
        fx.validator.load_shape(shape, person).unwrap();
        assert_eq!(fx.validator.find_shape(shape).unwrap().target_class, person);
        assert_eq!(
            fx.validator.load_shape(shape, person),
            Err(ShaclError::Duplicate)
        );
    }

    #[test]
    fn test_add_constraint_capacity() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/PersonShape");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        fx.validator.load_shape(shape, person).unwrap();

        for n in 0..MAX_CONSTRAINTS as u32 {
            fx.validator
                .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(n))
                .unwrap();
            assert_eq!(
                fx.validator.find_shape(shape).unwrap().constraints.len(),
                n as usize + 1
            );
        }
        assert_eq!(
            fx.validator.add_constraint(
                shape,
                ConstraintKind::MinCount,
                name,
                ConstraintParam::Count(1)
            ),
            Err(ShaclError::Capacity)
        );
    }

    #[test]
    fn test_add_constraint_param_mismatch() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/S");
        let person = iri(&fx, "http://ex/Person");
        fx.validator.load_shape(shape, person).unwrap();
        assert_eq!(
            fx.validator.add_constraint(
                shape,
                ConstraintKind::Pattern,
                StringRef::NULL,
                ConstraintParam::Count(1)
            ),
            Err(ShaclError::InvalidArgument)
        );
    }

    #[test]
    fn test_min_count_violation() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/PersonShape");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        let alice = iri(&fx, "http://ex/alice");

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
            .unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);

        assert!(!report.conforms);
        assert_eq!(report.violation_count, 1);
        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert_eq!(r.focus, alice);
        assert_eq!(r.constraint_kind, ConstraintKind::MinCount);
        assert_eq!(report.nodes_validated, 1);
    }

    #[test]
    fn test_conforming_graph() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/PersonShape");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        let alice = iri(&fx, "http://ex/alice");
        let lit = fx.interner.intern_literal(b"Alice").unwrap();

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
            .unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));
        fx.graph.insert(Triple::new(alice, name, lit));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);
        assert!(report.conforms);
        assert_eq!(report.violation_count, 0);
    }

    #[test]
    fn test_node_kind_on_property_values() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/PersonShape");
        let person = iri(&fx, "http://ex/Person");
        let knows = iri(&fx, "http://ex/knows");
        let alice = iri(&fx, "http://ex/alice");

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(
                shape,
                ConstraintKind::NodeKind,
                knows,
                ConstraintParam::Kind(NodeKindRule::Iri),
            )
            .unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));
        let bob_lit = fx.interner.intern_literal(b"bob").unwrap();
        fx.graph.insert(Triple::new(alice, knows, bob_lit));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);
        assert!(!report.conforms);
        assert_eq!(report.results[0].value, bob_lit);

        // Replace with an IRI object: conforms.
        fx.graph.clear();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));
        let bob = iri(&fx, "http://ex/bob");
        fx.graph.insert(Triple::new(alice, knows, bob));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);
        assert!(report.conforms);
    }

    #[test]
    fn test_budget_overrun_skips_remaining_constraints() {
        let mut fx = fixture();
        // Every clock read advances 100 cycles: the first constraint
        // blows the node budget.
        fx.clock = LogicalCycles::with_step(100);
        fx.validator = Validator::create(ValidatorConfig {
            node_budget_cycles: 50,
            ..ValidatorConfig::default()
        });

        let shape = iri(&fx, "http://ex/S");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        let email = iri(&fx, "http://ex/email");
        let alice = iri(&fx, "http://ex/alice");

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
            .unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, email, ConstraintParam::Count(1))
            .unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);

        assert!(report.budget_exceeded);
        assert_eq!(report.budget_faults, 1);
        // Only the first constraint ran before the fault.
        assert_eq!(report.constraints_checked, 1);
        assert_eq!(report.violation_count, 1);
    }

    #[test]
    fn test_inactive_shape_skipped() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/S");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        let alice = iri(&fx, "http://ex/alice");

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
            .unwrap();
        fx.validator.set_shape_active(shape, false).unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);
        assert!(report.conforms);
        assert_eq!(report.nodes_validated, 0);
    }

    #[test]
    fn test_effectiveness_updates_on_validation() {
        let mut fx = fixture();
        let shape = iri(&fx, "http://ex/S");
        let person = iri(&fx, "http://ex/Person");
        let name = iri(&fx, "http://ex/name");
        let alice = iri(&fx, "http://ex/alice");

        fx.validator.load_shape(shape, person).unwrap();
        fx.validator
            .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
            .unwrap();
        fx.graph.insert(Triple::new(alice, fx.vocab.rdf_type, person));

        let mut report = ValidationReport::new();
        fx.validator
            .validate_graph(&fx.graph, &fx.interner, &fx.clock, &mut report);

        let c = &fx.validator.find_shape(shape).unwrap().constraints[0];
        assert_eq!(c.metrics.evaluations, 1);
        assert_eq!(c.metrics.violations, 1);
        assert!(c.metrics.effectiveness > 0.0 && c.metrics.effectiveness <= 1.0);
    }

    #[test]
    fn test_verify_integrity() {
        let fx = fixture();
        assert!(fx.validator.verify_integrity().is_ok());
    }
}
