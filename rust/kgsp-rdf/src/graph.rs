// kgsp-rdf: Indexed append-only triple store
// Query surface for validation and reasoning: values_of, has_type,
// subjects_of_type, contains

use crate::intern::StringRef;
use crate::triple::Triple;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[inline(always)]
fn sp_key(subject: StringRef, predicate: StringRef) -> u64 {
    (u64::from(subject.hash) << 32) | u64::from(predicate.hash)
}

/// Append-only triple store with hash indexes.
///
/// Subjects, (subject, predicate) pairs and `rdf:type` assertions are
/// indexed so the validator and reasoner never scan the full store on
/// their hot paths.
pub struct TripleGraph {
    triples: Vec<Triple>,
    by_subject: FxHashMap<u32, SmallVec<[u32; 4]>>,
    by_subject_predicate: FxHashMap<u64, SmallVec<[u32; 2]>>,
    /// class hash -> indices of `rdf:type` triples asserting it.
    by_type: FxHashMap<u32, SmallVec<[u32; 4]>>,
    rdf_type: StringRef,
}

impl TripleGraph {
    /// `rdf_type` is the interned `rdf:type` predicate; the store uses
    /// it to maintain the class index.
    pub fn new(rdf_type: StringRef) -> Self {
        Self {
            triples: Vec::new(),
            by_subject: FxHashMap::default(),
            by_subject_predicate: FxHashMap::default(),
            by_type: FxHashMap::default(),
            rdf_type,
        }
    }

    /// Insert one triple. Duplicates are stored as asserted.
    pub fn insert(&mut self, triple: Triple) {
        let idx = self.triples.len() as u32;
        self.by_subject
            .entry(triple.subject.hash)
            .or_default()
            .push(idx);
        self.by_subject_predicate
            .entry(sp_key(triple.subject, triple.predicate))
            .or_default()
            .push(idx);
        if triple.predicate == self.rdf_type {
            self.by_type.entry(triple.object.hash).or_default().push(idx);
        }
        self.triples.push(triple);
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// All triples with the given subject.
    pub fn triples_of(&self, subject: StringRef) -> impl Iterator<Item = &Triple> {
        self.by_subject
            .get(&subject.hash)
            .into_iter()
            .flatten()
            .map(move |&i| &self.triples[i as usize])
    }

    /// Object values of (subject, predicate).
    pub fn values_of(
        &self,
        subject: StringRef,
        predicate: StringRef,
    ) -> impl Iterator<Item = &Triple> {
        self.by_subject_predicate
            .get(&sp_key(subject, predicate))
            .into_iter()
            .flatten()
            .map(move |&i| &self.triples[i as usize])
    }

    /// Number of object values for (subject, predicate).
    #[inline]
    pub fn count_values(&self, subject: StringRef, predicate: StringRef) -> usize {
        self.by_subject_predicate
            .get(&sp_key(subject, predicate))
            .map_or(0, SmallVec::len)
    }

    /// Whether the store asserts `node rdf:type class`.
    #[inline]
    pub fn has_type(&self, node: StringRef, class: StringRef) -> bool {
        self.values_of(node, self.rdf_type)
            .any(|t| t.object == class)
    }

    /// Subjects asserted to be instances of `class`, in insertion order.
    pub fn subjects_of_type(&self, class: StringRef) -> impl Iterator<Item = StringRef> + '_ {
        self.by_type
            .get(&class.hash)
            .into_iter()
            .flatten()
            .map(move |&i| self.triples[i as usize].subject)
    }

    /// Exact (s, p, o) membership.
    pub fn contains(&self, subject: StringRef, predicate: StringRef, object: StringRef) -> bool {
        self.values_of(subject, predicate).any(|t| t.object == object)
    }

    /// Drop every triple and index. Interned strings are unaffected.
    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_subject.clear();
        self.by_subject_predicate.clear();
        self.by_type.clear();
    }
}
