// kgsp-discovery: Candidate detection
// Recent-triple ring, field-role heuristics, weighted confidence and a
// bounded candidate buffer with least-confidence eviction

use crate::signature::{XsdType, MAX_FIELDS};
use arrayvec::ArrayVec;
use kgsp_rdf::{Interner, StringRef};
use rustc_hash::FxHashMap;

/// Role a predicate plays in an input/output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Input,
    Output,
    Neither,
}

/// Input-field keywords and their affinity strengths.
const INPUT_KEYWORDS: [(&str, f64); 5] = [
    ("input", 1.0),
    ("question", 1.0),
    ("query", 0.8),
    ("prompt", 0.9),
    ("context", 0.7),
];

/// Output-field keywords and their affinity strengths.
const OUTPUT_KEYWORDS: [(&str, f64); 5] = [
    ("output", 1.0),
    ("answer", 1.0),
    ("result", 0.8),
    ("response", 0.9),
    ("classification", 0.7),
];

/// Memoized per-predicate field-role table.
#[derive(Debug, Default)]
pub struct RoleTable {
    roles: FxHashMap<u32, (FieldRole, f64)>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Role and affinity strength for a predicate. The name scan runs
    /// once per distinct predicate.
    pub fn role_of(&mut self, interner: &Interner, predicate: StringRef) -> (FieldRole, f64) {
        if let Some(&entry) = self.roles.get(&predicate.hash) {
            return entry;
        }
        let entry = match interner.resolve(predicate) {
            Some(bytes) => {
                let lower = String::from_utf8_lossy(&bytes).to_lowercase();
                if let Some(strength) = keyword_strength(&lower, &INPUT_KEYWORDS) {
                    (FieldRole::Input, strength)
                } else if let Some(strength) = keyword_strength(&lower, &OUTPUT_KEYWORDS) {
                    (FieldRole::Output, strength)
                } else {
                    (FieldRole::Neither, 0.0)
                }
            }
            None => (FieldRole::Neither, 0.0),
        };
        self.roles.insert(predicate.hash, entry);
        entry
    }
}

fn keyword_strength(name: &str, keywords: &[(&str, f64)]) -> Option<f64> {
    keywords
        .iter()
        .filter(|(kw, _)| name.contains(kw))
        .map(|&(_, s)| s)
        .fold(None, |best, s| Some(best.map_or(s, |b: f64| b.max(s))))
}

/// One triple remembered by the recent ring.
#[derive(Debug, Clone, Copy)]
pub struct RecentEntry {
    pub subject: StringRef,
    pub predicate: StringRef,
    pub object: StringRef,
    pub role: FieldRole,
    pub strength: f64,
    pub datatype: XsdType,
    pub seq: u64,
}

/// Fixed-capacity ring of the most recent triples, keyed by subject on
/// scan.
pub struct RecentRing {
    entries: Vec<Option<RecentEntry>>,
    cursor: usize,
    seq: u64,
}

impl RecentRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity.max(1)],
            cursor: 0,
            seq: 0,
        }
    }

    /// Remember a triple, overwriting the oldest slot. Returns the
    /// sequence number assigned.
    pub fn push(&mut self, mut entry: RecentEntry) -> u64 {
        self.seq += 1;
        entry.seq = self.seq;
        self.entries[self.cursor] = Some(entry);
        self.cursor = (self.cursor + 1) % self.entries.len();
        self.seq
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Most recent input-role entry for `subject` other than the
    /// predicate just seen.
    pub fn find_input(&self, subject: StringRef, exclude_predicate: StringRef) -> Option<RecentEntry> {
        self.entries
            .iter()
            .flatten()
            .filter(|e| {
                e.role == FieldRole::Input
                    && e.subject == subject
                    && e.predicate != exclude_predicate
            })
            .max_by_key(|e| e.seq)
            .copied()
    }
}

/// One candidate field.
#[derive(Debug, Clone, Copy)]
pub struct FieldCandidate {
    pub predicate: StringRef,
    pub is_input: bool,
    pub datatype: XsdType,
    pub confidence: f64,
}

/// A signature candidate keyed by its (input, output) predicate pair.
#[derive(Debug, Clone)]
pub struct SignatureCandidate {
    pub pair_key: u64,
    pub input_predicate: StringRef,
    pub output_predicate: StringRef,
    pub confidence: f64,
    pub fields: ArrayVec<FieldCandidate, MAX_FIELDS>,
    pub discovery_seq: u64,
    pub observation_count: u32,
}

impl SignatureCandidate {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn input_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_input).count()
    }

    pub fn output_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.is_input).count()
    }
}

/// Pair identity for candidate dedup.
#[inline(always)]
pub fn pair_key(input_predicate: StringRef, output_predicate: StringRef) -> u64 {
    (u64::from(input_predicate.hash) << 32) | u64::from(output_predicate.hash)
}

/// Confidence weights; sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWeights {
    pub frequency: f64,
    pub name_affinity: f64,
    pub datatype_compat: f64,
    pub subject_pattern: f64,
    pub temporal: f64,
    pub dspy_bonus: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            frequency: 0.3,
            name_affinity: 0.2,
            datatype_compat: 0.2,
            subject_pattern: 0.1,
            temporal: 0.1,
            dspy_bonus: 0.1,
        }
    }
}

/// Score inputs gathered at detection time.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// Times this predicate pair has been seen, this sighting included.
    pub pair_count: u32,
    pub input_strength: f64,
    pub output_strength: f64,
    pub input_datatype: XsdType,
    pub output_datatype: XsdType,
    /// Subject name ends in a digit (instance-numbering pattern).
    pub subject_numbered: bool,
    /// Ring distance from the input sighting to now.
    pub ring_distance: u64,
    pub ring_capacity: usize,
}

/// Weighted candidate confidence, capped at 1.0.
pub fn score(weights: &ConfidenceWeights, inputs: &ScoreInputs) -> f64 {
    let frequency = (f64::from(inputs.pair_count) / 4.0).min(1.0);
    let affinity = (inputs.input_strength + inputs.output_strength) / 2.0;
    let datatype = if inputs.input_datatype == inputs.output_datatype {
        1.0
    } else {
        0.7
    };
    let subject = if inputs.subject_numbered { 1.0 } else { 0.5 };
    let temporal =
        (1.0 - inputs.ring_distance as f64 / inputs.ring_capacity.max(1) as f64).clamp(0.0, 1.0);
    let dspy = if inputs.input_strength >= 1.0 && inputs.output_strength >= 1.0 {
        1.0
    } else {
        0.0
    };

    let total = weights.frequency * frequency
        + weights.name_affinity * affinity
        + weights.datatype_compat * datatype
        + weights.subject_pattern * subject
        + weights.temporal * temporal
        + weights.dspy_bonus * dspy;
    total.min(1.0)
}

/// Bounded candidate buffer with least-confidence eviction.
pub struct CandidateBuffer {
    candidates: Vec<SignatureCandidate>,
    capacity: usize,
}

impl CandidateBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            candidates: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<&SignatureCandidate> {
        self.candidates.iter().find(|c| c.pair_key == key)
    }

    /// Fold one sighting into the buffer. A known pair bumps its
    /// observation count and keeps its best confidence; a new pair
    /// evicts the weakest candidate when full.
    pub fn observe(&mut self, candidate: SignatureCandidate) -> &SignatureCandidate {
        if let Some(idx) = self
            .candidates
            .iter()
            .position(|c| c.pair_key == candidate.pair_key)
        {
            let existing = &mut self.candidates[idx];
            existing.observation_count += 1;
            existing.discovery_seq = candidate.discovery_seq;
            if candidate.confidence > existing.confidence {
                existing.confidence = candidate.confidence;
                existing.fields = candidate.fields;
            }
            return &self.candidates[idx];
        }

        if self.candidates.len() == self.capacity {
            if let Some(weakest) = self
                .candidates
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    a.1.confidence
                        .partial_cmp(&b.1.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
            {
                self.candidates.swap_remove(weakest);
            }
        }
        self.candidates.push(candidate);
        let idx = self.candidates.len() - 1;
        &self.candidates[idx]
    }

    /// Drop a candidate after promotion.
    pub fn remove(&mut self, key: u64) {
        self.candidates.retain(|c| c.pair_key != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrayvec::ArrayVec;

    fn refs() -> (Interner, StringRef, StringRef) {
        let interner = Interner::new();
        let q = interner.intern_iri(b"http://ex/hasQuestion").unwrap();
        let a = interner.intern_iri(b"http://ex/hasAnswer").unwrap();
        (interner, q, a)
    }

    fn candidate(key: u64, q: StringRef, a: StringRef, confidence: f64) -> SignatureCandidate {
        SignatureCandidate {
            pair_key: key,
            input_predicate: q,
            output_predicate: a,
            confidence,
            fields: ArrayVec::new(),
            discovery_seq: 0,
            observation_count: 1,
        }
    }

    #[test]
    fn test_role_table() {
        let (interner, q, a) = refs();
        let mut roles = RoleTable::new();
        assert_eq!(roles.role_of(&interner, q), (FieldRole::Input, 1.0));
        assert_eq!(roles.role_of(&interner, a), (FieldRole::Output, 1.0));
        let other = interner.intern_iri(b"http://ex/knows").unwrap();
        assert_eq!(roles.role_of(&interner, other), (FieldRole::Neither, 0.0));
    }

    #[test]
    fn test_role_strengths_take_strongest_keyword() {
        let (interner, ..) = refs();
        let mut roles = RoleTable::new();
        let p = interner.intern_iri(b"http://ex/queryInput").unwrap();
        // "input" (1.0) beats "query" (0.8).
        assert_eq!(roles.role_of(&interner, p), (FieldRole::Input, 1.0));
    }

    #[test]
    fn test_ring_finds_most_recent_input() {
        let (interner, q, a) = refs();
        let subject = interner.intern_iri(b"http://ex/q1").unwrap();
        let obj = interner.intern_literal(b"What?").unwrap();
        let mut ring = RecentRing::with_capacity(8);
        ring.push(RecentEntry {
            subject,
            predicate: q,
            object: obj,
            role: FieldRole::Input,
            strength: 1.0,
            datatype: XsdType::String,
            seq: 0,
        });
        let found = ring.find_input(subject, a).unwrap();
        assert_eq!(found.predicate, q);

        let other_subject = interner.intern_iri(b"http://ex/q2").unwrap();
        assert!(ring.find_input(other_subject, a).is_none());
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let (interner, q, a) = refs();
        let obj = interner.intern_literal(b"x").unwrap();
        let mut ring = RecentRing::with_capacity(2);
        for i in 0..3 {
            let subject = interner
                .intern_iri(format!("http://ex/s{}", i).as_bytes())
                .unwrap();
            ring.push(RecentEntry {
                subject,
                predicate: q,
                object: obj,
                role: FieldRole::Input,
                strength: 1.0,
                datatype: XsdType::String,
                seq: 0,
            });
        }
        let s0 = interner.intern_iri(b"http://ex/s0").unwrap();
        assert!(ring.find_input(s0, a).is_none(), "oldest entry survived");
    }

    #[test]
    fn test_score_canonical_qa_pair() {
        let weights = ConfidenceWeights::default();
        let inputs = ScoreInputs {
            pair_count: 1,
            input_strength: 1.0,
            output_strength: 1.0,
            input_datatype: XsdType::String,
            output_datatype: XsdType::String,
            subject_numbered: true,
            ring_distance: 1,
            ring_capacity: 256,
        };
        let c = score(&weights, &inputs);
        assert!(c >= 0.75, "first sighting scored {}", c);
        assert!(c <= 1.0);

        let third = score(
            &weights,
            &ScoreInputs {
                pair_count: 3,
                ..inputs
            },
        );
        assert!(third > c);
    }

    #[test]
    fn test_buffer_dedups_by_pair() {
        let (_, q, a) = refs();
        let key = pair_key(q, a);
        let mut buffer = CandidateBuffer::with_capacity(4);
        buffer.observe(candidate(key, q, a, 0.8));
        let seen = buffer.observe(candidate(key, q, a, 0.9));
        assert_eq!(seen.observation_count, 2);
        assert_eq!(seen.confidence, 0.9);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_buffer_evicts_weakest() {
        let (_, q, a) = refs();
        let mut buffer = CandidateBuffer::with_capacity(2);
        buffer.observe(candidate(1, q, a, 0.9));
        buffer.observe(candidate(2, q, a, 0.3));
        buffer.observe(candidate(3, q, a, 0.7));
        assert_eq!(buffer.len(), 2);
        assert!(buffer.get(2).is_none(), "weakest candidate survived");
        assert!(buffer.get(1).is_some());
        assert!(buffer.get(3).is_some());
    }
}
