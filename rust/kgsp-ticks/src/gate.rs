// kgsp-ticks: Gatekeeper report against the quality gates
// Gates are reported, not enforced

use crate::histogram::{TickRecorder, TickStats};
use serde::Serialize;
use std::fmt;

/// Quality gates for the observed cycle distribution.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QualityGates {
    pub min_sigma_level: f64,
    pub min_cpk: f64,
    pub max_dpm: f64,
    pub min_throughput_mops: f64,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_sigma_level: 4.0,
            min_cpk: 1.3,
            max_dpm: 63.0,
            min_throughput_mops: 10.0,
        }
    }
}

/// Aggregated tick statistics judged against the gates.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GatekeeperReport {
    pub stats: TickStats,
    pub gates: QualityGates,
    pub sigma_pass: bool,
    pub cpk_pass: bool,
    pub dpm_pass: bool,
    pub throughput_pass: bool,
}

impl GatekeeperReport {
    pub fn from_recorder(recorder: &TickRecorder, gates: QualityGates) -> Self {
        let stats = recorder.stats();
        Self {
            stats,
            gates,
            sigma_pass: stats.sigma_level >= gates.min_sigma_level,
            cpk_pass: stats.cpk >= gates.min_cpk,
            dpm_pass: stats.dpm <= gates.max_dpm,
            throughput_pass: stats.throughput_mops >= gates.min_throughput_mops,
        }
    }

    /// All gates hold.
    pub fn passed(&self) -> bool {
        self.sigma_pass && self.cpk_pass && self.dpm_pass && self.throughput_pass
    }
}

impl fmt::Display for GatekeeperReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "gatekeeper: {} ops, mean {:.2} cycles (target {})",
            self.stats.total_operations, self.stats.mean, self.stats.target_cycles
        )?;
        writeln!(
            f,
            "  sigma {:.2} [{}]  cpk {:.2} [{}]",
            self.stats.sigma_level,
            pass_str(self.sigma_pass),
            self.stats.cpk,
            pass_str(self.cpk_pass),
        )?;
        write!(
            f,
            "  dpm {:.1} [{}]  throughput {:.2} MOPS [{}]",
            self.stats.dpm,
            pass_str(self.dpm_pass),
            self.stats.throughput_mops,
            pass_str(self.throughput_pass),
        )
    }
}

fn pass_str(pass: bool) -> &'static str {
    if pass {
        "pass"
    } else {
        "FAIL"
    }
}
