// kgsp-shacl: Constraint records
// A tagged record per constraint; kind selects exactly one param variant

use kgsp_rdf::{StringRef, TypeFlags};
use regex::Regex;
use smallvec::SmallVec;

/// Closed set of constraint kinds. The discriminant indexes the
/// evaluator dispatch table.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Class = 0,
    Datatype = 1,
    NodeKind = 2,
    MinCount = 3,
    MaxCount = 4,
    MinLength = 5,
    MaxLength = 6,
    Pattern = 7,
    MinExclusive = 8,
    MinInclusive = 9,
    MaxExclusive = 10,
    MaxInclusive = 11,
    In = 12,
    MemoryBound = 13,
    HasValue = 14,
}

impl ConstraintKind {
    pub const COUNT: usize = 15;

    pub fn name(self) -> &'static str {
        match self {
            ConstraintKind::Class => "class",
            ConstraintKind::Datatype => "datatype",
            ConstraintKind::NodeKind => "nodeKind",
            ConstraintKind::MinCount => "minCount",
            ConstraintKind::MaxCount => "maxCount",
            ConstraintKind::MinLength => "minLength",
            ConstraintKind::MaxLength => "maxLength",
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::MinExclusive => "minExclusive",
            ConstraintKind::MinInclusive => "minInclusive",
            ConstraintKind::MaxExclusive => "maxExclusive",
            ConstraintKind::MaxInclusive => "maxInclusive",
            ConstraintKind::In => "in",
            ConstraintKind::MemoryBound => "memoryBound",
            ConstraintKind::HasValue => "hasValue",
        }
    }

    /// Whether the constraint applies to each value of the property
    /// path (as opposed to the focus node itself).
    #[inline(always)]
    pub fn is_value_based(self) -> bool {
        !matches!(
            self,
            ConstraintKind::MinCount
                | ConstraintKind::MaxCount
                | ConstraintKind::MemoryBound
                | ConstraintKind::HasValue
        )
    }
}

/// Node kind rule for `NodeKind` constraints.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindRule {
    Iri = 0,
    Blank = 1,
    Literal = 2,
    BlankOrIri = 3,
    BlankOrLiteral = 4,
    IriOrLiteral = 5,
    Any = 6,
}

impl NodeKindRule {
    /// Bit test against the value's interned type flags.
    #[inline(always)]
    pub fn matches(self, flags: TypeFlags) -> bool {
        let mask = match self {
            NodeKindRule::Iri => TypeFlags::IRI,
            NodeKindRule::Blank => TypeFlags::BLANK,
            NodeKindRule::Literal => TypeFlags::LITERAL,
            NodeKindRule::BlankOrIri => TypeFlags::BLANK.union(TypeFlags::IRI),
            NodeKindRule::BlankOrLiteral => TypeFlags::BLANK.union(TypeFlags::LITERAL),
            NodeKindRule::IriOrLiteral => TypeFlags::IRI.union(TypeFlags::LITERAL),
            NodeKindRule::Any => TypeFlags::all(),
        };
        flags.intersects(mask)
    }
}

/// Precompiled regular expression for `Pattern` constraints.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: StringRef,
    pub regex: Regex,
}

/// Parameter payload; exactly one variant is valid per kind.
#[derive(Debug, Clone)]
pub enum ConstraintParam {
    /// MinCount / MaxCount.
    Count(u32),
    /// MinLength / MaxLength.
    Length(u32),
    /// Range comparisons.
    Decimal(f64),
    /// Class, Datatype and HasValue targets.
    Reference(StringRef),
    /// NodeKind.
    Kind(NodeKindRule),
    /// MemoryBound limit in bytes.
    Memory(usize),
    /// In list of allowed values.
    List(SmallVec<[StringRef; 8]>),
    /// Pattern.
    Pattern(CompiledPattern),
}

impl ConstraintParam {
    /// Whether this payload variant is the one `kind` selects.
    pub fn matches_kind(&self, kind: ConstraintKind) -> bool {
        matches!(
            (kind, self),
            (ConstraintKind::MinCount | ConstraintKind::MaxCount, ConstraintParam::Count(_))
                | (
                    ConstraintKind::MinLength | ConstraintKind::MaxLength,
                    ConstraintParam::Length(_)
                )
                | (
                    ConstraintKind::MinExclusive
                        | ConstraintKind::MinInclusive
                        | ConstraintKind::MaxExclusive
                        | ConstraintKind::MaxInclusive,
                    ConstraintParam::Decimal(_)
                )
                | (
                    ConstraintKind::Class | ConstraintKind::Datatype | ConstraintKind::HasValue,
                    ConstraintParam::Reference(_)
                )
                | (ConstraintKind::NodeKind, ConstraintParam::Kind(_))
                | (ConstraintKind::MemoryBound, ConstraintParam::Memory(_))
                | (ConstraintKind::In, ConstraintParam::List(_))
                | (ConstraintKind::Pattern, ConstraintParam::Pattern(_))
        )
    }
}

/// Severity attached to a constraint's results.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Violation = 2,
}

/// Per-constraint counters and effectiveness state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintMetrics {
    pub evaluations: u64,
    pub violations: u64,
    /// EWMA of "this constraint's verdict affected the report", in
    /// [0, 1]. Fresh constraints start at 1.0 so pruning needs evidence.
    pub effectiveness: f64,
    /// Violations later reversed by user feedback.
    pub reversals: u64,
}

/// One compiled constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub property_path: StringRef,
    pub param: ConstraintParam,
    pub severity: Severity,
    pub metrics: ConstraintMetrics,
}

impl Constraint {
    pub fn new(
        kind: ConstraintKind,
        property_path: StringRef,
        param: ConstraintParam,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            property_path,
            param,
            severity,
            metrics: ConstraintMetrics {
                effectiveness: 1.0,
                ..ConstraintMetrics::default()
            },
        }
    }

    /// False-positive rate from user feedback, 0 when unevaluated.
    pub fn false_positive_rate(&self) -> f64 {
        if self.metrics.violations == 0 {
            0.0
        } else {
            self.metrics.reversals as f64 / self.metrics.violations as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_masks() {
        assert!(NodeKindRule::Iri.matches(TypeFlags::IRI));
        assert!(!NodeKindRule::Iri.matches(TypeFlags::LITERAL));
        assert!(NodeKindRule::BlankOrIri.matches(TypeFlags::BLANK));
        assert!(NodeKindRule::BlankOrIri.matches(TypeFlags::IRI));
        assert!(!NodeKindRule::BlankOrIri.matches(TypeFlags::LITERAL));
        assert!(NodeKindRule::Any.matches(TypeFlags::LITERAL));
    }

    #[test]
    fn test_param_kind_agreement() {
        assert!(ConstraintParam::Count(1).matches_kind(ConstraintKind::MinCount));
        assert!(ConstraintParam::Count(1).matches_kind(ConstraintKind::MaxCount));
        assert!(!ConstraintParam::Count(1).matches_kind(ConstraintKind::Pattern));
        assert!(ConstraintParam::Memory(1024).matches_kind(ConstraintKind::MemoryBound));
        assert!(ConstraintParam::Kind(NodeKindRule::Iri).matches_kind(ConstraintKind::NodeKind));
    }

    #[test]
    fn test_value_based_partition() {
        assert!(ConstraintKind::Datatype.is_value_based());
        assert!(ConstraintKind::Pattern.is_value_based());
        assert!(!ConstraintKind::MinCount.is_value_based());
        assert!(!ConstraintKind::MemoryBound.is_value_based());
        assert!(!ConstraintKind::HasValue.is_value_based());
    }

    #[test]
    fn test_false_positive_rate() {
        let c = Constraint::new(
            ConstraintKind::MinCount,
            StringRef::NULL,
            ConstraintParam::Count(1),
            Severity::Violation,
        );
        assert_eq!(c.false_positive_rate(), 0.0);
    }
}
