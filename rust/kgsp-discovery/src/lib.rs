// kgsp-discovery: Streaming pattern discovery
// Classification, frequency adaptation, candidate scoring and signature
// promotion over one pass of the triple stream

//! # KGSP discovery engine
//!
//! Watches the triple stream for input/output field schemas. Every
//! triple is classified against the five-class frequency model; triples
//! whose predicates look like question/answer style fields feed a
//! candidate detector backed by a ring of recent triples. Candidates
//! accumulate confidence across sightings and, once past the (auto
//! adapted) threshold with enough observations, promote into durable
//! signatures backed by synthesized SHACL shapes.

pub mod candidate;
pub mod classify;
pub mod frequency;
pub mod signature;

pub use candidate::{
    pair_key, CandidateBuffer, ConfidenceWeights, FieldCandidate, FieldRole, RecentEntry,
    RecentRing, RoleTable, ScoreInputs, SignatureCandidate,
};
pub use classify::{Classifier, PatternClass};
pub use frequency::{Adaptation, FrequencyModel, THRESHOLD_CEIL, THRESHOLD_FLOOR};
pub use signature::{DurableSignature, Field, SignatureStore, XsdType, MAX_FIELDS};

use arrayvec::ArrayVec;
use kgsp_rdf::{InternError, Interner, ObjectKind, StringRef, Triple, Vocab};
use kgsp_shacl::{ConstraintKind, ConstraintParam, ShaclError, Validator};
use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("interner failure during promotion: {0}")]
    Intern(#[from] InternError),
    #[error("shape synthesis failed: {0}")]
    Shacl(#[from] ShaclError),
}

/// Discovery tuning; defaults follow the engine configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    pub confidence_threshold: f64,
    pub min_observations: u32,
    pub ring_size: usize,
    pub max_candidates: usize,
    pub adaptation_interval: u64,
    pub drift_threshold: f64,
    pub learning_rate: f64,
    pub weights: ConfidenceWeights,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            min_observations: 3,
            ring_size: 256,
            max_candidates: 64,
            adaptation_interval: 1000,
            drift_threshold: 0.05,
            learning_rate: 0.1,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// Emitted when a candidate becomes a durable signature.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryEvent {
    pub signature_id: u64,
    pub input_predicate: StringRef,
    pub output_predicate: StringRef,
    pub confidence: f64,
    pub threshold: f64,
    pub observation_count: u32,
}

/// Per-triple observation outcome.
#[derive(Debug)]
pub struct Observation {
    pub class: PatternClass,
    pub adaptation: Option<Adaptation>,
    pub promoted: Option<DiscoveryEvent>,
}

pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    threshold: f64,
    classifier: Classifier,
    frequency: FrequencyModel,
    roles: RoleTable,
    ring: RecentRing,
    candidates: CandidateBuffer,
    signatures: SignatureStore,
    pair_counts: FxHashMap<u64, u32>,
}

impl DiscoveryEngine {
    pub fn new(vocab: Vocab, config: DiscoveryConfig) -> Self {
        Self {
            threshold: config
                .confidence_threshold
                .clamp(THRESHOLD_FLOOR, THRESHOLD_CEIL),
            classifier: Classifier::new(vocab),
            frequency: FrequencyModel::new(
                config.adaptation_interval,
                config.drift_threshold,
                config.learning_rate,
            ),
            roles: RoleTable::new(),
            ring: RecentRing::with_capacity(config.ring_size),
            candidates: CandidateBuffer::with_capacity(config.max_candidates),
            signatures: SignatureStore::new(),
            pair_counts: FxHashMap::default(),
            config,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn signatures(&self) -> &SignatureStore {
        &self.signatures
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn frequency(&self) -> &FrequencyModel {
        &self.frequency
    }

    /// Process one triple: classify it, fold it into the frequency
    /// model, and run candidate detection. Promotion synthesizes a
    /// shape on `validator` and returns the discovery event.
    pub fn observe(
        &mut self,
        interner: &Interner,
        vocab: &Vocab,
        validator: &mut Validator,
        triple: &Triple,
    ) -> Result<Observation, DiscoveryError> {
        let class = self.classifier.classify(interner, triple);

        let adaptation = if self.frequency.observe(class) {
            let adaptation = self.frequency.adapt(self.threshold);
            if adaptation.adapted {
                tracing::debug!(
                    drift = adaptation.drift,
                    threshold = adaptation.new_threshold,
                    "frequency model adapted"
                );
                self.threshold = adaptation.new_threshold;
            }
            Some(adaptation)
        } else {
            None
        };

        let promoted = self.detect(interner, vocab, validator, triple)?;

        Ok(Observation {
            class,
            adaptation,
            promoted,
        })
    }

    /// Candidate detection for one triple; returns a discovery event if
    /// the sighting tipped a candidate over the promotion gates.
    fn detect(
        &mut self,
        interner: &Interner,
        vocab: &Vocab,
        validator: &mut Validator,
        triple: &Triple,
    ) -> Result<Option<DiscoveryEvent>, DiscoveryError> {
        let (role, strength) = self.roles.role_of(interner, triple.predicate);
        let datatype = if triple.object_kind == ObjectKind::Literal {
            match interner.resolve(triple.object) {
                Some(bytes) => XsdType::infer(&bytes),
                None => XsdType::String,
            }
        } else {
            XsdType::String
        };

        let paired_input = if role == FieldRole::Output {
            self.ring.find_input(triple.subject, triple.predicate)
        } else {
            None
        };

        let seq = self.ring.push(RecentEntry {
            subject: triple.subject,
            predicate: triple.predicate,
            object: triple.object,
            role,
            strength,
            datatype,
            seq: 0,
        });

        let Some(input) = paired_input else {
            return Ok(None);
        };

        let key = pair_key(input.predicate, triple.predicate);
        let pair_count = {
            let count = self.pair_counts.entry(key).or_insert(0);
            *count += 1;
            *count
        };

        let subject_numbered = interner
            .resolve(triple.subject)
            .map(|bytes| bytes.last().is_some_and(u8::is_ascii_digit))
            .unwrap_or(false);

        let confidence = candidate::score(
            &self.config.weights,
            &ScoreInputs {
                pair_count,
                input_strength: input.strength,
                output_strength: strength,
                input_datatype: input.datatype,
                output_datatype: datatype,
                subject_numbered,
                ring_distance: seq.saturating_sub(input.seq),
                ring_capacity: self.ring.capacity(),
            },
        );

        let mut fields: ArrayVec<FieldCandidate, MAX_FIELDS> = ArrayVec::new();
        fields.push(FieldCandidate {
            predicate: input.predicate,
            is_input: true,
            datatype: input.datatype,
            confidence: input.strength,
        });
        fields.push(FieldCandidate {
            predicate: triple.predicate,
            is_input: false,
            datatype,
            confidence: strength,
        });

        let seen = self.candidates.observe(SignatureCandidate {
            pair_key: key,
            input_predicate: input.predicate,
            output_predicate: triple.predicate,
            confidence,
            fields,
            discovery_seq: seq,
            observation_count: 1,
        });

        let ready = seen.confidence >= self.threshold
            && seen.observation_count >= self.config.min_observations
            && seen.field_count() >= 2;
        if !ready {
            return Ok(None);
        }

        let candidate = seen.clone();
        let event = self.promote(interner, vocab, validator, &candidate)?;
        self.candidates.remove(key);
        Ok(Some(event))
    }

    /// Materialize a durable signature and its backing shape.
    fn promote(
        &mut self,
        interner: &Interner,
        vocab: &Vocab,
        validator: &mut Validator,
        candidate: &SignatureCandidate,
    ) -> Result<DiscoveryEvent, DiscoveryError> {
        let id = self.signatures.next_id();
        let shape_iri =
            interner.intern_iri(format!("urn:kgsp:signature:{}:shape", id).as_bytes())?;
        let class_iri =
            interner.intern_iri(format!("urn:kgsp:signature:{}:class", id).as_bytes())?;

        validator.load_shape(shape_iri, class_iri)?;
        let mut fields: ArrayVec<Field, MAX_FIELDS> = ArrayVec::new();
        for fc in &candidate.fields {
            validator.add_constraint(
                shape_iri,
                ConstraintKind::MinCount,
                fc.predicate,
                ConstraintParam::Count(1),
            )?;
            validator.add_constraint(
                shape_iri,
                ConstraintKind::Datatype,
                fc.predicate,
                ConstraintParam::Reference(fc.datatype.vocab_ref(vocab)),
            )?;
            fields.push(Field {
                predicate: fc.predicate,
                is_input: fc.is_input,
                datatype: fc.datatype,
            });
        }

        self.signatures
            .insert(DurableSignature::new(id, class_iri.hash, shape_iri, &fields));

        tracing::info!(
            signature_id = id,
            confidence = candidate.confidence,
            observations = candidate.observation_count,
            "signature promoted"
        );

        Ok(DiscoveryEvent {
            signature_id: id,
            input_predicate: candidate.input_predicate,
            output_predicate: candidate.output_predicate,
            confidence: candidate.confidence,
            threshold: self.threshold,
            observation_count: candidate.observation_count,
        })
    }

    /// Maintenance pass: rerun frequency adaptation and let the
    /// validator evolve the shapes backing promoted signatures.
    pub fn maintenance(&mut self, validator: &mut Validator) {
        let adaptation = self.frequency.adapt(self.threshold);
        if adaptation.adapted {
            self.threshold = adaptation.new_threshold;
        }
        let summary = validator.maintenance();
        if summary.constraints_pruned > 0 {
            tracing::debug!(
                pruned = summary.constraints_pruned,
                "signature shapes evolved"
            );
        }
    }
}
