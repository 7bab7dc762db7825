// kgsp: Telemetry surface
// Events are plain values handed to a sink; export backends live
// outside the core

use kgsp_actors::SupervisionDecision;
use kgsp_discovery::DiscoveryEvent;
use kgsp_shacl::ValidationReport;
use kgsp_ticks::OpKind;
use serde::Serialize;

/// One completed, timed operation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OpTrace {
    pub op: OpKind,
    pub start_cycle: u64,
    pub end_cycle: u64,
    pub elapsed_cycles: u64,
}

impl OpTrace {
    pub fn new(op: OpKind, start_cycle: u64, end_cycle: u64) -> Self {
        Self {
            op,
            start_cycle,
            end_cycle,
            elapsed_cycles: end_cycle.saturating_sub(start_cycle),
        }
    }
}

/// Compact summary of a validation report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValidationSummary {
    pub conforms: bool,
    pub violations: u32,
    pub warnings: u32,
    pub infos: u32,
    pub memory_violations: u32,
    pub nodes_validated: u32,
    pub constraints_checked: u64,
    pub validation_cycles: u64,
    pub budget_faults: u32,
}

impl From<&ValidationReport> for ValidationSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            conforms: report.conforms,
            violations: report.violation_count,
            warnings: report.warning_count,
            infos: report.info_count,
            memory_violations: report.memory_violation_count,
            nodes_validated: report.nodes_validated,
            constraints_checked: report.constraints_checked,
            validation_cycles: report.validation_cycles,
            budget_faults: report.budget_faults,
        }
    }
}

/// A signature promotion.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiscoveryRecord {
    pub signature_id: u64,
    pub confidence: f64,
    pub threshold: f64,
    pub observation_count: u32,
}

impl From<&DiscoveryEvent> for DiscoveryRecord {
    fn from(event: &DiscoveryEvent) -> Self {
        Self {
            signature_id: event.signature_id,
            confidence: event.confidence,
            threshold: event.threshold,
            observation_count: event.observation_count,
        }
    }
}

/// A supervision decision.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisionRecord {
    pub actor_id: u32,
    pub supervisor_id: u32,
    pub reason: u32,
    pub strategy: String,
    pub action: String,
    pub restarted: usize,
    pub success: bool,
}

impl From<&SupervisionDecision> for SupervisionRecord {
    fn from(decision: &SupervisionDecision) -> Self {
        Self {
            actor_id: decision.actor_id,
            supervisor_id: decision.supervisor_id,
            reason: decision.reason,
            strategy: format!("{:?}", decision.strategy),
            action: format!("{:?}", decision.action),
            restarted: decision.restarted.len(),
            success: decision.success,
        }
    }
}

/// Consumes the engine's telemetry stream.
pub trait TelemetrySink: Send {
    fn record_op(&mut self, trace: OpTrace);
    fn record_validation(&mut self, summary: ValidationSummary);
    fn record_discovery(&mut self, record: DiscoveryRecord);
    fn record_supervision(&mut self, record: SupervisionRecord);
}

/// Default sink: structured tracing events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_op(&mut self, trace: OpTrace) {
        tracing::trace!(
            op = trace.op.name(),
            elapsed = trace.elapsed_cycles,
            "op completed"
        );
    }

    fn record_validation(&mut self, summary: ValidationSummary) {
        tracing::debug!(
            conforms = summary.conforms,
            violations = summary.violations,
            nodes = summary.nodes_validated,
            "validation completed"
        );
    }

    fn record_discovery(&mut self, record: DiscoveryRecord) {
        tracing::info!(
            signature_id = record.signature_id,
            confidence = record.confidence,
            "signature discovered"
        );
    }

    fn record_supervision(&mut self, record: SupervisionRecord) {
        tracing::debug!(
            actor_id = record.actor_id,
            action = %record.action,
            success = record.success,
            "supervision decision"
        );
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record_op(&mut self, _: OpTrace) {}
    fn record_validation(&mut self, _: ValidationSummary) {}
    fn record_discovery(&mut self, _: DiscoveryRecord) {}
    fn record_supervision(&mut self, _: SupervisionRecord) {}
}

/// Buffers everything; test harness sink.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub ops: Vec<OpTrace>,
    pub validations: Vec<ValidationSummary>,
    pub discoveries: Vec<DiscoveryRecord>,
    pub supervisions: Vec<SupervisionRecord>,
}

impl TelemetrySink for CollectingSink {
    fn record_op(&mut self, trace: OpTrace) {
        self.ops.push(trace);
    }

    fn record_validation(&mut self, summary: ValidationSummary) {
        self.validations.push(summary);
    }

    fn record_discovery(&mut self, record: DiscoveryRecord) {
        self.discoveries.push(record);
    }

    fn record_supervision(&mut self, record: SupervisionRecord) {
        self.supervisions.push(record);
    }
}

/// Install the default tracing subscriber (env-filtered). Call once at
/// process startup; repeat calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
