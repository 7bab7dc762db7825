// kgsp-shacl: Validation reports
// One report per top-level validation call; conforms iff zero violations

use crate::constraint::{ConstraintKind, Severity};
use kgsp_rdf::StringRef;

/// One recorded constraint failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidationResult {
    pub focus: StringRef,
    pub shape: StringRef,
    pub constraint_kind: ConstraintKind,
    pub property_path: StringRef,
    /// The offending value; NULL for focus-level constraints.
    pub value: StringRef,
    pub severity: Severity,
}

/// Aggregate outcome of a validation call.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub conforms: bool,
    pub results: Vec<ValidationResult>,
    pub info_count: u32,
    pub warning_count: u32,
    pub violation_count: u32,
    pub memory_violation_count: u32,
    pub nodes_validated: u32,
    pub constraints_checked: u64,
    pub validation_cycles: u64,
    pub peak_memory: usize,
    /// Set when a per-node cycle budget overran and constraints were
    /// skipped for that node.
    pub budget_exceeded: bool,
    pub budget_faults: u32,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: ValidationResult) {
        match result.severity {
            Severity::Info => self.info_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Violation => self.violation_count += 1,
        }
        if result.constraint_kind == ConstraintKind::MemoryBound {
            self.memory_violation_count += 1;
        }
        self.results.push(result);
    }

    /// Seal the verdict: conforms exactly when no violation-severity
    /// result was recorded.
    pub fn finalize(&mut self) {
        self.conforms = self.violation_count == 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: ConstraintKind, severity: Severity) -> ValidationResult {
        ValidationResult {
            focus: StringRef::NULL,
            shape: StringRef::NULL,
            constraint_kind: kind,
            property_path: StringRef::NULL,
            value: StringRef::NULL,
            severity,
        }
    }

    #[test]
    fn test_conforms_tracks_violations_only() {
        let mut report = ValidationReport::new();
        report.add_result(result(ConstraintKind::MinLength, Severity::Warning));
        report.add_result(result(ConstraintKind::Pattern, Severity::Info));
        report.finalize();
        assert!(report.conforms);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.info_count, 1);

        report.add_result(result(ConstraintKind::MinCount, Severity::Violation));
        report.finalize();
        assert!(!report.conforms);
        assert_eq!(report.violation_count, 1);
    }

    #[test]
    fn test_memory_violation_double_counts() {
        let mut report = ValidationReport::new();
        report.add_result(result(ConstraintKind::MemoryBound, Severity::Violation));
        report.finalize();
        assert_eq!(report.violation_count, 1);
        assert_eq!(report.memory_violation_count, 1);
        assert!(!report.conforms);
    }
}
