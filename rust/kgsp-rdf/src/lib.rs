// kgsp-rdf: Interned strings, arena allocation and the compact triple model
// Value types are id-sized; comparison is hash equality, never byte scans

//! # KGSP RDF substrate
//!
//! The data plane the rest of the pipeline runs on:
//!
//! - **Intern**: a thread-safe interned string table mapping every
//!   IRI/blank/literal to a stable `StringRef` (32-bit hash + length +
//!   type flags). Distinct byte strings always receive distinct refs.
//! - **Arena**: a single bump pointer with 8-byte quantum alignment and
//!   bulk reset; per-validation scratch lives here.
//! - **Triple**: the compact 3-tuple of interned references plus object
//!   kind and confidence.
//! - **Graph**: an append-only indexed triple store exposing the query
//!   surface validation and reasoning need (`values_of`, `has_type`,
//!   `subjects_of_type`, `contains`).
//! - **Vocab**: the well-known RDF/RDFS/XSD terms interned once at
//!   startup.

pub mod arena;
pub mod graph;
pub mod intern;
pub mod triple;
pub mod vocab;

pub use arena::Arena;
pub use graph::TripleGraph;
pub use intern::{InternError, Interner, StringRef, TypeFlags};
pub use triple::{ObjectKind, Triple};
pub use vocab::Vocab;
