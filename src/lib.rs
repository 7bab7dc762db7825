// kgsp: Knowledge Graph Stream Processor
// Deterministic semantic pipeline with tick-bounded hot paths

//! # KGSP
//!
//! A real-time semantic processing pipeline for RDF triple streams:
//! compiled SHACL validation, bounded RDFS/OWL forward chaining and
//! streaming pattern discovery, driven through a three-layer actor
//! runtime under a per-operation cycle budget.
//!
//! ## Layers
//!
//! - [`kgsp_ticks`]: cycle counting, the tick histogram and the
//!   gatekeeper report (sigma level, Cpk, DPM, throughput)
//! - [`kgsp_rdf`]: interned strings, bump arena, triples and the
//!   indexed graph
//! - [`kgsp_shacl`]: shapes, table-dispatched constraint evaluators and
//!   constraint evolution
//! - [`kgsp_reason`]: lookup-table forward chaining with bounded depth
//! - [`kgsp_discovery`]: triple classification, frequency adaptation
//!   and signature promotion
//! - [`kgsp_actors`]: bit-actor collapse, priority mailboxes and
//!   supervision
//! - [`Engine`]: the budget scheduler tying the layers together
//!
//! ## Example
//!
//! ```rust
//! use kgsp::prelude::*;
//!
//! let mut engine = Engine::new(RuntimeConfig::default())?
//!     .with_clock(Box::new(LogicalCycles::with_step(0)));
//! engine.init()?;
//!
//! let s = engine.interner().intern_iri(b"http://ex/alice")?;
//! let p = engine.interner().intern_iri(b"http://ex/age")?;
//! let o = engine.interner().intern_literal(b"30")?;
//! let outcome = engine.ingest(Triple::new(s, p, o))?;
//! assert!(outcome.routed);
//!
//! let report = engine.gatekeeper();
//! println!("{}", report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod telemetry;

pub use config::{ConfigError, RestartPolicy, RuntimeConfig, SupervisionPolicy};
pub use error::EngineError;
pub use scheduler::{Engine, IngestOutcome};
pub use telemetry::{
    init_tracing, CollectingSink, DiscoveryRecord, NullSink, OpTrace, SupervisionRecord,
    TelemetrySink, TracingSink, ValidationSummary,
};

// Re-export the layer crates.
pub use kgsp_actors;
pub use kgsp_discovery;
pub use kgsp_rdf;
pub use kgsp_reason;
pub use kgsp_shacl;
pub use kgsp_ticks;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::error::EngineError;
    pub use crate::scheduler::{Engine, IngestOutcome};
    pub use crate::telemetry::{CollectingSink, TelemetrySink};
    pub use kgsp_rdf::{Interner, ObjectKind, StringRef, Triple, TripleGraph, Vocab};
    pub use kgsp_shacl::{ConstraintKind, ConstraintParam, NodeKindRule, ValidationReport};
    pub use kgsp_ticks::{CycleSource, GatekeeperReport, LogicalCycles, TickStats};
}
