// kgsp-ticks: Per-operation cycle histogram and derived process statistics
// record() is hot path; every statistic is computed on demand from the bins

use serde::Serialize;

/// Number of histogram bins. Operations at or beyond this cycle count
/// saturate into the last bin.
pub const HISTOGRAM_BINS: usize = 1000;

/// Target cycles per hot path operation.
pub const TARGET_CYCLES: u64 = 7;

/// Operation kinds tracked by the recorder.
///
/// Indexes the per-kind operation counters; the histogram itself is
/// shared across kinds so the gatekeeper judges the whole pipeline.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpKind {
    Classify = 0,
    Intern = 1,
    Route = 2,
    Collapse = 3,
    Behavior = 4,
    Validate = 5,
    Infer = 6,
    Enqueue = 7,
    Dequeue = 8,
    Supervise = 9,
    Maintenance = 10,
}

impl OpKind {
    pub const COUNT: usize = 11;

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Classify => "classify",
            OpKind::Intern => "intern",
            OpKind::Route => "route",
            OpKind::Collapse => "collapse",
            OpKind::Behavior => "behavior",
            OpKind::Validate => "validate",
            OpKind::Infer => "infer",
            OpKind::Enqueue => "enqueue",
            OpKind::Dequeue => "dequeue",
            OpKind::Supervise => "supervise",
            OpKind::Maintenance => "maintenance",
        }
    }
}

/// Cycle histogram plus running totals.
///
/// Owned by one scheduler; recording is two array increments and three
/// counter additions.
pub struct TickRecorder {
    bins: Box<[u64; HISTOGRAM_BINS]>,
    op_counts: [u64; OpKind::COUNT],
    total_operations: u64,
    total_cycles: u64,
    /// Cycles beyond bin 999 for saturated operations, so
    /// `sum(i * bins[i]) + overflow_cycles == total_cycles` always holds.
    overflow_cycles: u64,
    target_cycles: u64,
}

impl TickRecorder {
    pub fn new() -> Self {
        Self::with_target(TARGET_CYCLES)
    }

    pub fn with_target(target_cycles: u64) -> Self {
        Self {
            bins: Box::new([0; HISTOGRAM_BINS]),
            op_counts: [0; OpKind::COUNT],
            total_operations: 0,
            total_cycles: 0,
            overflow_cycles: 0,
            target_cycles,
        }
    }

    /// Record one completed operation.
    #[inline(always)]
    pub fn record(&mut self, op: OpKind, start: u64, end: u64) {
        let delta = end.saturating_sub(start);
        let bin = delta.min((HISTOGRAM_BINS - 1) as u64) as usize;
        self.bins[bin] += 1;
        if delta >= HISTOGRAM_BINS as u64 {
            self.overflow_cycles += delta - (HISTOGRAM_BINS - 1) as u64;
        }
        self.total_cycles += delta;
        self.total_operations += 1;
        self.op_counts[op as usize] += 1;
    }

    #[inline(always)]
    pub fn total_operations(&self) -> u64 {
        self.total_operations
    }

    #[inline(always)]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn overflow_cycles(&self) -> u64 {
        self.overflow_cycles
    }

    pub fn bins(&self) -> &[u64; HISTOGRAM_BINS] {
        &self.bins
    }

    pub fn op_count(&self, op: OpKind) -> u64 {
        self.op_counts[op as usize]
    }

    /// Operations whose recorded cycles exceeded the target.
    pub fn over_target(&self) -> u64 {
        self.bins
            .iter()
            .skip(self.target_cycles as usize + 1)
            .sum()
    }

    pub fn reset(&mut self) {
        self.bins.fill(0);
        self.op_counts = [0; OpKind::COUNT];
        self.total_operations = 0;
        self.total_cycles = 0;
        self.overflow_cycles = 0;
    }

    /// Derive the process statistics from the histogram.
    ///
    /// Off the hot path: called from maintenance ticks and the
    /// gatekeeper, never per-operation.
    pub fn stats(&self) -> TickStats {
        if self.total_operations == 0 {
            return TickStats {
                target_cycles: self.target_cycles,
                ..TickStats::default()
            };
        }

        let n = self.total_operations as f64;
        let mean = self.total_cycles as f64 / n;

        let mut variance = 0.0;
        for (i, &count) in self.bins.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let diff = i as f64 - mean;
            variance += diff * diff * count as f64;
        }
        variance /= n;
        let std_dev = variance.sqrt();

        let target = self.target_cycles as f64;
        let (sigma_level, cpk) = if std_dev > 0.0 {
            (
                (target - mean).abs() / std_dev,
                (target - mean) / (3.0 * std_dev),
            )
        } else {
            (0.0, 0.0)
        };

        // Upper-tail defect rate in parts per million.
        let dpm = 1_000_000.0 * (1.0 - normal_cdf(sigma_level));

        // One cycle treated as one nanosecond for throughput purposes.
        let throughput_mops = if mean > 0.0 { n / mean } else { 0.0 };

        TickStats {
            total_operations: self.total_operations,
            total_cycles: self.total_cycles,
            mean,
            std_dev,
            sigma_level,
            cpk,
            dpm,
            throughput_mops,
            target_cycles: self.target_cycles,
        }
    }
}

impl Default for TickRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived statistics snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickStats {
    pub total_operations: u64,
    pub total_cycles: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub sigma_level: f64,
    pub cpk: f64,
    pub dpm: f64,
    pub throughput_mops: f64,
    pub target_cycles: u64,
}

/// Standard normal CDF, Abramowitz-Stegun polynomial approximation.
/// Accurate to about 1e-7, more than enough for DPM reporting.
pub(crate) fn normal_cdf(z: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * z.abs());
    let d = 0.39894228 * (-z * z / 2.0).exp();
    let prob = 1.0
        - d * t
            * (0.319381530
                + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    if z > 0.0 {
        prob
    } else {
        1.0 - prob
    }
}
