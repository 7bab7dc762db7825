// kgsp-reason: Rule encoding
// A closed rule set; each rule is a kind tag plus two operand refs

use kgsp_rdf::StringRef;

/// Maximum rules per reasoner instance.
pub const MAX_RULES: usize = 64;

/// The closed inference rule set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `x rdf:type left` ∧ `left rdfs:subClassOf right` ⇒ `x rdf:type right`
    SubClassOf = 0,
    /// `left rdfs:subPropertyOf right` ∧ `x left y` ⇒ `x right y`
    SubPropertyOf = 1,
    /// `left rdfs:domain right` ∧ `x left y` ⇒ `x rdf:type right`
    Domain = 2,
    /// `left rdfs:range right` ∧ `x left y` ⇒ `y rdf:type right`
    Range = 3,
}

/// One schema axiom compiled into the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub left: StringRef,
    pub right: StringRef,
}

impl Rule {
    pub fn new(kind: RuleKind, left: StringRef, right: StringRef) -> Self {
        Self { kind, left, right }
    }
}
