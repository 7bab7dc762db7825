// kgsp-discovery: Observed vs expected frequency model
// Drift above the threshold blends expectations and tunes the
// discovery confidence threshold

use crate::classify::PatternClass;

/// Expected rates for {TypeDecl, Label, Property, Hierarchy, Other}.
const INITIAL_EXPECTED: [f64; PatternClass::FREQ_CLASSES] = [0.30, 0.20, 0.20, 0.10, 0.20];

/// Bounds for the auto-adapted confidence threshold.
pub const THRESHOLD_FLOOR: f64 = 0.5;
pub const THRESHOLD_CEIL: f64 = 0.95;

/// Streaming frequency model over the five pattern classes.
#[derive(Debug, Clone)]
pub struct FrequencyModel {
    observed: [u64; PatternClass::FREQ_CLASSES],
    expected: [f64; PatternClass::FREQ_CLASSES],
    total: u64,
    adaptation_interval: u64,
    drift_threshold: f64,
    learning_rate: f64,
}

/// Outcome of one adaptation check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adaptation {
    pub drift: f64,
    pub adapted: bool,
    pub new_threshold: f64,
}

impl FrequencyModel {
    pub fn new(adaptation_interval: u64, drift_threshold: f64, learning_rate: f64) -> Self {
        Self {
            observed: [0; PatternClass::FREQ_CLASSES],
            expected: INITIAL_EXPECTED,
            total: 0,
            adaptation_interval: adaptation_interval.max(1),
            drift_threshold,
            learning_rate,
        }
    }

    /// Count one classified triple. Returns true when the adaptation
    /// interval elapsed and [`FrequencyModel::adapt`] should run.
    #[inline]
    pub fn observe(&mut self, class: PatternClass) -> bool {
        let idx = class as usize;
        if idx < PatternClass::FREQ_CLASSES {
            self.observed[idx] += 1;
            self.total += 1;
        }
        self.total % self.adaptation_interval == 0
    }

    pub fn observed(&self, class: PatternClass) -> u64 {
        self.observed[class as usize]
    }

    pub fn expected_rate(&self, class: PatternClass) -> f64 {
        self.expected[class as usize]
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Total L1 drift between observed rates and expectations.
    pub fn drift(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        self.observed
            .iter()
            .zip(self.expected.iter())
            .map(|(&obs, &exp)| (obs as f64 / n - exp).abs())
            .sum()
    }

    /// Blend expectations toward observations when drift exceeds the
    /// threshold, and tighten or loosen the discovery confidence
    /// threshold accordingly.
    pub fn adapt(&mut self, current_threshold: f64) -> Adaptation {
        let drift = self.drift();
        if drift <= self.drift_threshold || self.total == 0 {
            return Adaptation {
                drift,
                adapted: false,
                new_threshold: current_threshold,
            };
        }

        let n = self.total as f64;
        let eta = self.learning_rate;
        for (expected, &observed) in self.expected.iter_mut().zip(self.observed.iter()) {
            let rate = observed as f64 / n;
            *expected = (1.0 - eta) * *expected + eta * rate;
        }

        let new_threshold =
            (current_threshold * (1.0 - 0.1 * drift)).clamp(THRESHOLD_FLOOR, THRESHOLD_CEIL);
        Adaptation {
            drift,
            adapted: true,
            new_threshold,
        }
    }
}

impl Default for FrequencyModel {
    fn default() -> Self {
        Self::new(1000, 0.05, 0.1)
    }
}
