// kgsp-ticks: Cycle counting and tick accounting for hot path operations
// Every hot path operation is measured against a ≤7 tick target

//! # KGSP Ticks
//!
//! Instrumentation substrate for the KGSP pipeline. Provides:
//!
//! - **Counter**: monotonic cycle sources (RDTSC / CNTVCT hardware
//!   counters with a logical fallback for unsupported platforms and
//!   deterministic tests)
//! - **Histogram**: a 1000-bin per-operation cycle histogram with
//!   on-demand mean, standard deviation, sigma level, Cpk, DPM and
//!   throughput derivation
//! - **Budget**: per-operation tick budgets where overruns are recorded
//!   as budget faults, never raised as errors
//! - **Gate**: the gatekeeper report comparing the observed distribution
//!   against the quality gates
//!
//! Recording an observation is itself bounded (two array writes and
//! three counter increments); all statistics are derived lazily from the
//! histogram and never touch the hot path.

pub mod budget;
pub mod counter;
pub mod gate;
pub mod histogram;

pub use budget::TickBudget;
pub use counter::{read_cycles, CycleSource, HardwareCycles, LogicalCycles};
pub use gate::{GatekeeperReport, QualityGates};
pub use histogram::{OpKind, TickRecorder, TickStats, HISTOGRAM_BINS, TARGET_CYCLES};
