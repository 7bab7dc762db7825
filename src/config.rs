// kgsp: Runtime configuration
// Defaults -> struct/file -> environment overrides -> validation

use kgsp_actors::{RestartStrategy, SupervisionStrategy};
use kgsp_ticks::HISTOGRAM_BINS;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
    #[error("configuration parse error: {0}")]
    ParseError(String),
}

/// Restart policy as configured; converts into the runtime enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    Permanent,
    Temporary,
    Transient,
}

impl From<RestartPolicy> for RestartStrategy {
    fn from(policy: RestartPolicy) -> Self {
        match policy {
            RestartPolicy::Permanent => RestartStrategy::Permanent,
            RestartPolicy::Temporary => RestartStrategy::Temporary,
            RestartPolicy::Transient => RestartStrategy::Transient,
        }
    }
}

/// Supervision policy as configured; converts into the runtime enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionPolicy {
    OneForOne,
    OneForAll,
    RestForOne,
    SimpleOneForOne,
}

impl From<SupervisionPolicy> for SupervisionStrategy {
    fn from(policy: SupervisionPolicy) -> Self {
        match policy {
            SupervisionPolicy::OneForOne => SupervisionStrategy::OneForOne,
            SupervisionPolicy::OneForAll => SupervisionStrategy::OneForAll,
            SupervisionPolicy::RestForOne => SupervisionStrategy::RestForOne,
            SupervisionPolicy::SimpleOneForOne => SupervisionStrategy::SimpleOneForOne,
        }
    }
}

/// The engine configuration surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub target_cycles_per_op: u64,
    /// Histogram saturation bin; fixed at compile time, validated here.
    pub histogram_saturation: usize,
    pub l1_budget_cycles: u64,
    pub l2_budget_cycles: u64,
    pub l3_budget_cycles: u64,
    pub shape_table_capacity: usize,
    /// Fixed by the shape layout; validated here.
    pub max_constraints_per_shape: usize,
    pub max_validation_depth: usize,
    pub max_memory_per_node: usize,
    pub max_memory_per_graph: usize,
    pub discovery_confidence_threshold: f64,
    pub discovery_min_observations: u32,
    pub discovery_ring_size: usize,
    pub max_candidates: usize,
    pub mailbox_ring_capacities: [usize; 4],
    pub backpressure_fraction: f64,
    pub dead_letter_capacity: usize,
    pub max_mailboxes: usize,
    pub max_actors: usize,
    pub max_supervisors: usize,
    /// Actors pre-spawned for triple routing.
    pub worker_pool_size: usize,
    pub restart_strategy: RestartPolicy,
    pub supervision_strategy: SupervisionPolicy,
    pub max_restarts_per_window: u32,
    pub restart_window_ns: u64,
    pub reasoner_max_depth: u32,
    pub reasoner_budget_cycles: u64,
    pub effectiveness_ewma_alpha: f64,
    pub frequency_adaptation_threshold: f64,
    pub frequency_learning_rate: f64,
    /// Triples between maintenance ticks.
    pub maintenance_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            target_cycles_per_op: 7,
            histogram_saturation: HISTOGRAM_BINS,
            l1_budget_cycles: 7,
            l2_budget_cycles: 7,
            l3_budget_cycles: 14,
            shape_table_capacity: 128,
            max_constraints_per_shape: kgsp_shacl::MAX_CONSTRAINTS,
            max_validation_depth: 16,
            max_memory_per_node: 64 * 1024,
            max_memory_per_graph: 16 * 1024 * 1024,
            discovery_confidence_threshold: 0.85,
            discovery_min_observations: 3,
            discovery_ring_size: 256,
            max_candidates: 64,
            mailbox_ring_capacities: [256, 128, 64, 32],
            backpressure_fraction: 0.9,
            dead_letter_capacity: 128,
            max_mailboxes: 16,
            max_actors: 256,
            max_supervisors: 32,
            worker_pool_size: 8,
            restart_strategy: RestartPolicy::Permanent,
            supervision_strategy: SupervisionPolicy::OneForOne,
            max_restarts_per_window: 3,
            restart_window_ns: 1_000_000_000,
            reasoner_max_depth: 6,
            reasoner_budget_cycles: 2,
            effectiveness_ewma_alpha: 0.1,
            frequency_adaptation_threshold: 0.05,
            frequency_learning_rate: 0.1,
            maintenance_interval: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Apply `KGSP_`-prefixed environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::ParseError(format!("{}={}", key, value)))
        }

        for (key, value) in std::env::vars() {
            match key.as_str() {
                "KGSP_TARGET_CYCLES_PER_OP" => {
                    self.target_cycles_per_op = parse(&key, &value)?;
                }
                "KGSP_MAX_ACTORS" => self.max_actors = parse(&key, &value)?,
                "KGSP_MAX_MAILBOXES" => self.max_mailboxes = parse(&key, &value)?,
                "KGSP_WORKER_POOL_SIZE" => self.worker_pool_size = parse(&key, &value)?,
                "KGSP_REASONER_MAX_DEPTH" => self.reasoner_max_depth = parse(&key, &value)?,
                "KGSP_DISCOVERY_CONFIDENCE_THRESHOLD" => {
                    self.discovery_confidence_threshold = parse(&key, &value)?;
                }
                "KGSP_MAINTENANCE_INTERVAL" => self.maintenance_interval = parse(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate ranges and structural assumptions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_cycles_per_op == 0 {
            return Err(ConfigError::ValidationError(
                "target_cycles_per_op must be positive".into(),
            ));
        }
        if self.histogram_saturation != HISTOGRAM_BINS {
            return Err(ConfigError::ValidationError(format!(
                "histogram_saturation is fixed at {}",
                HISTOGRAM_BINS
            )));
        }
        if self.max_constraints_per_shape != kgsp_shacl::MAX_CONSTRAINTS {
            return Err(ConfigError::ValidationError(format!(
                "max_constraints_per_shape is fixed at {}",
                kgsp_shacl::MAX_CONSTRAINTS
            )));
        }
        if !self.shape_table_capacity.is_power_of_two() {
            return Err(ConfigError::ValidationError(
                "shape_table_capacity must be a power of two".into(),
            ));
        }
        if self.max_validation_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_validation_depth must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backpressure_fraction) {
            return Err(ConfigError::ValidationError(
                "backpressure_fraction must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.discovery_confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "discovery_confidence_threshold must be within [0, 1]".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.effectiveness_ewma_alpha) {
            return Err(ConfigError::ValidationError(
                "effectiveness_ewma_alpha must be within [0, 1)".into(),
            ));
        }
        for &capacity in &self.mailbox_ring_capacities {
            if !capacity.is_power_of_two() {
                return Err(ConfigError::ValidationError(
                    "mailbox ring capacities must be powers of two".into(),
                ));
            }
        }
        if self.max_mailboxes == 0 || self.max_actors == 0 || self.max_supervisors == 0 {
            return Err(ConfigError::ValidationError(
                "max_mailboxes, max_actors and max_supervisors must be positive".into(),
            ));
        }
        if self.worker_pool_size == 0
            || self.worker_pool_size > self.max_actors
            || self.worker_pool_size > kgsp_actors::MAX_MANAGED
        {
            return Err(ConfigError::ValidationError(format!(
                "worker_pool_size must be within 1..={}",
                kgsp_actors::MAX_MANAGED.min(self.max_actors)
            )));
        }
        if self.maintenance_interval == 0 {
            return Err(ConfigError::ValidationError(
                "maintenance_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Per-node validation budget: one target-cost slot per validation
    /// depth step.
    pub fn node_budget_cycles(&self) -> u64 {
        self.target_cycles_per_op * self.max_validation_depth as u64
    }
}
