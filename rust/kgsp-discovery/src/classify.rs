// kgsp-discovery: Triple classification
// Exact predicate matches first, then per-predicate memoized heuristics

use kgsp_rdf::{vocab, Interner, ObjectKind, Triple, Vocab};
use rustc_hash::FxHashMap;

/// Pattern classes. The first five partition every classified triple;
/// the remaining tags mark discovery artifacts.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternClass {
    TypeDecl = 0,
    Label = 1,
    Property = 2,
    Hierarchy = 3,
    Other = 4,
    DspyInput = 5,
    DspyOutput = 6,
    Signature = 7,
}

impl PatternClass {
    /// Number of frequency-tracked classes.
    pub const FREQ_CLASSES: usize = 5;

    pub fn name(self) -> &'static str {
        match self {
            PatternClass::TypeDecl => "type-decl",
            PatternClass::Label => "label",
            PatternClass::Property => "property",
            PatternClass::Hierarchy => "hierarchy",
            PatternClass::Other => "other",
            PatternClass::DspyInput => "dspy-input",
            PatternClass::DspyOutput => "dspy-output",
            PatternClass::Signature => "signature",
        }
    }
}

/// Memoized predicate trait for the heuristic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredicateTrait {
    /// rdf/rdfs/owl namespace: never a domain property.
    SystemNs,
    /// Name suggests a domain property (has/contains/value).
    NamedProperty,
    Neutral,
}

/// Classifies triples into the five frequency classes.
///
/// Exact vocabulary predicates short-circuit on hash equality; every
/// other predicate resolves its name once and the verdict is memoized,
/// so the steady-state cost is two map probes.
pub struct Classifier {
    vocab: Vocab,
    traits: FxHashMap<u32, PredicateTrait>,
}

impl Classifier {
    pub fn new(vocab: Vocab) -> Self {
        Self {
            vocab,
            traits: FxHashMap::default(),
        }
    }

    /// Classify one triple. Exactly one class is returned.
    pub fn classify(&mut self, interner: &Interner, triple: &Triple) -> PatternClass {
        let p = triple.predicate;
        if p == self.vocab.rdf_type {
            return PatternClass::TypeDecl;
        }
        if p == self.vocab.rdfs_label {
            return PatternClass::Label;
        }
        if p == self.vocab.rdfs_sub_class_of || p == self.vocab.rdfs_sub_property_of {
            return PatternClass::Hierarchy;
        }

        let pred_trait = self.predicate_trait(interner, p.hash, p);
        match pred_trait {
            PredicateTrait::SystemNs => PatternClass::Other,
            _ if triple.object_kind == ObjectKind::Literal => PatternClass::Property,
            PredicateTrait::NamedProperty => PatternClass::Property,
            _ => PatternClass::Other,
        }
    }

    fn predicate_trait(
        &mut self,
        interner: &Interner,
        hash: u32,
        predicate: kgsp_rdf::StringRef,
    ) -> PredicateTrait {
        if let Some(&t) = self.traits.get(&hash) {
            return t;
        }
        let t = match interner.resolve(predicate) {
            Some(bytes) => {
                if vocab::is_system_iri(&bytes) {
                    PredicateTrait::SystemNs
                } else {
                    let lower = String::from_utf8_lossy(&bytes).to_lowercase();
                    if lower.contains("has") || lower.contains("contains") || lower.contains("value")
                    {
                        PredicateTrait::NamedProperty
                    } else {
                        PredicateTrait::Neutral
                    }
                }
            }
            None => PredicateTrait::Neutral,
        };
        self.traits.insert(hash, t);
        t
    }
}
