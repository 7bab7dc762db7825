// kgsp-shacl: Constraint evolution
// Effectiveness EWMA drives pruning and relaxation; runs only in the
// maintenance op, never during evaluation

use crate::constraint::{Constraint, Severity};
use crate::shape::ShapeTable;

/// Tuning knobs for the maintenance pass.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionConfig {
    /// EWMA blend factor for effectiveness updates.
    pub ewma_alpha: f64,
    /// Constraints whose EWMA falls below this are removed.
    pub prune_threshold: f64,
    /// Constraints whose feedback reversal rate exceeds this are
    /// demoted one severity step.
    pub relaxation_fp_threshold: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.1,
            prune_threshold: 0.2,
            relaxation_fp_threshold: 0.3,
        }
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvolutionSummary {
    pub shapes_visited: u32,
    pub constraints_pruned: u32,
    pub constraints_relaxed: u32,
}

/// Blend one observation into a constraint's effectiveness EWMA.
/// `affected` is true when the constraint's verdict changed the report.
#[inline]
pub fn update_effectiveness(constraint: &mut Constraint, affected: bool, alpha: f64) {
    let flag = if affected { 1.0 } else { 0.0 };
    let previous = constraint.metrics.effectiveness;
    constraint.metrics.effectiveness = alpha * flag + (1.0 - alpha) * previous;
}

/// Prune ineffective constraints and relax chronically reversed ones.
pub fn evolve(table: &mut ShapeTable, config: &EvolutionConfig) -> EvolutionSummary {
    let mut summary = EvolutionSummary::default();
    let slots: Vec<u32> = table.slots_in_order().collect();

    for slot in slots {
        let Some(shape) = table.slot_mut(slot) else {
            continue;
        };
        summary.shapes_visited += 1;

        let before = shape.constraints.len();
        shape
            .constraints
            .retain(|c| c.metrics.effectiveness >= config.prune_threshold);
        summary.constraints_pruned += (before - shape.constraints.len()) as u32;

        for constraint in &mut shape.constraints {
            if constraint.severity == Severity::Violation
                && constraint.false_positive_rate() > config.relaxation_fp_threshold
            {
                constraint.severity = Severity::Warning;
                constraint.metrics.reversals = 0;
                summary.constraints_relaxed += 1;
            }
        }
    }
    summary
}
