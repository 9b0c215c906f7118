use serde::{Deserialize, Serialize};

use crate::config::FunnelEnvConfig;

/// Tunable scheduler parameters. The shapes of the formulas are fixed (and
/// property-tested); the constants here are deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelConfig {
    pub mastery: MasteryConfig,
    pub targets: TargetConfig,
    pub sourcing: SourcingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryConfig {
    /// Pseudo-count of prior correct answers. Together with `smoothing_beta`
    /// this forms a weak uniform prior: zero attempts yields
    /// alpha / (alpha + beta), the neutral midpoint.
    pub smoothing_alpha: f64,
    /// Pseudo-count of prior incorrect answers.
    pub smoothing_beta: f64,
    /// Scale of the 1/(attempts+1) bonus that prefers under-sampled concepts
    /// over confidently-weak ones of equal estimated mastery.
    pub uncertainty_weight: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 1.0,
            smoothing_beta: 1.0,
            uncertainty_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub batch_min: u32,
    pub batch_max: u32,
    /// Share of the clamped batch reserved for focus targets.
    pub focus_ratio: f64,
    /// Records at or below this attempt count still qualify as explore.
    pub explore_attempt_ceiling: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            batch_min: 3,
            batch_max: 20,
            focus_ratio: 0.6,
            explore_attempt_ceiling: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcingConfig {
    /// Upper bound on generation calls per target before the shortfall is
    /// surfaced as a soft warning.
    pub generation_max_attempts: u32,
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            generation_max_attempts: 3,
        }
    }
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            mastery: MasteryConfig::default(),
            targets: TargetConfig::default(),
            sourcing: SourcingConfig::default(),
        }
    }
}

impl FunnelConfig {
    /// Defaults overridden by whatever the environment supplied.
    pub fn from_env(env: &FunnelEnvConfig) -> Self {
        let mut config = Self::default();
        config.targets.focus_ratio = env.focus_ratio;
        config.targets.batch_min = env.batch_min;
        config.targets.batch_max = env.batch_max;
        config.sourcing.generation_max_attempts = env.generation_max_attempts;

        if let Err(reason) = config.validate() {
            tracing::warn!(reason, "Invalid funnel env config, falling back to defaults");
            return Self::default();
        }
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mastery.smoothing_alpha <= 0.0 || self.mastery.smoothing_beta <= 0.0 {
            return Err("smoothing constants must be positive".to_string());
        }
        if self.mastery.uncertainty_weight < 0.0 {
            return Err("uncertaintyWeight must be non-negative".to_string());
        }
        if self.targets.batch_min == 0 || self.targets.batch_min > self.targets.batch_max {
            return Err("batch bounds must satisfy 1 <= min <= max".to_string());
        }
        if !(0.0..=1.0).contains(&self.targets.focus_ratio) {
            return Err("focusRatio must be within [0, 1]".to_string());
        }
        if self.sourcing.generation_max_attempts == 0 {
            return Err("generationMaxAttempts must be at least 1".to_string());
        }
        Ok(())
    }
}
