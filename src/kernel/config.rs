//! Simulator configuration
//!
//! Hosts pass JSON; anything left out falls back to the variant's
//! defaults. Validation happens once, before a scheduler is built.

use super::completed::COMPLETED_CAPACITY;
use super::error::{SimError, SimResult};
use super::{MAX_CONCURRENCY, Variant};
use serde::{Deserialize, Serialize};

/// Slots per variant unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Pending items shown before collapsing into an overflow count
pub const PENDING_PREVIEW: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub variant: Variant,
    /// Number of CPU or worker slots
    pub concurrency: usize,
    /// Per-tick chance of a spontaneous item; variant default when None
    pub spawn_probability: Option<f64>,
    pub completed_capacity: usize,
    pub pending_preview: usize,
    /// Simulated milliseconds per real millisecond
    pub speed: f64,
    /// Fixed seed for reproducible runs; host time otherwise
    pub seed: Option<u64>,
}

impl SimConfig {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            concurrency: DEFAULT_CONCURRENCY,
            spawn_probability: None,
            completed_capacity: COMPLETED_CAPACITY,
            pending_preview: PENDING_PREVIEW,
            speed: 1.0,
            seed: None,
        }
    }

    /// Parse and validate host-supplied JSON
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_spawn_probability(mut self, p: f64) -> Self {
        self.spawn_probability = Some(p);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn spawn_probability(&self) -> f64 {
        self.spawn_probability
            .unwrap_or_else(|| self.variant.default_spawn_probability())
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(SimError::InvalidConcurrency(self.concurrency));
        }
        let p = self.spawn_probability();
        if !(0.0..=1.0).contains(&p) {
            return Err(SimError::InvalidConfig(format!(
                "spawn_probability {} outside [0, 1]",
                p
            )));
        }
        if self.completed_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "completed_capacity must be at least 1".into(),
            ));
        }
        validate_speed(self.speed)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}

pub(crate) fn validate_speed(speed: f64) -> SimResult<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!(
            "speed {} must be finite and positive",
            speed
        )))
    }
}
