//! Tunable engine constants.
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Engine configuration. Every field has a default so partial JSON overlays work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidEngineConfig {
    #[serde(default = "RaidEngineConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "RaidEngineConfig::default_resume_delay_ms")]
    pub resume_delay_ms: u64,
    /// Fraction of the spent requirements returned on cancellation.
    #[serde(default = "RaidEngineConfig::default_refund_rate")]
    pub refund_rate: f64,
    #[serde(default = "RaidEngineConfig::default_units_lost_min")]
    pub units_lost_min: u64,
    #[serde(default = "RaidEngineConfig::default_units_lost_max")]
    pub units_lost_max: u64,
    /// Duration given to a degraded definition when the save carried none.
    #[serde(default = "RaidEngineConfig::default_degraded_duration_ms")]
    pub degraded_duration_ms: u64,
    #[serde(default = "RaidEngineConfig::default_degraded_risk_percentage")]
    pub degraded_risk_percentage: u8,
    #[serde(default = "RaidEngineConfig::default_recent_history_cap")]
    pub recent_history_cap: usize,
    #[serde(default = "RaidEngineConfig::default_recent_history_keep")]
    pub recent_history_keep: usize,
    /// Master seed for per-session outcome streams.
    #[serde(default = "RaidEngineConfig::default_seed")]
    pub seed: u64,
}

impl RaidEngineConfig {
    pub const fn default_tick_interval_ms() -> u64 {
        1_000
    }

    pub const fn default_resume_delay_ms() -> u64 {
        500
    }

    pub const fn default_refund_rate() -> f64 {
        0.5
    }

    pub const fn default_units_lost_min() -> u64 {
        1
    }

    pub const fn default_units_lost_max() -> u64 {
        2
    }

    pub const fn default_degraded_duration_ms() -> u64 {
        120_000
    }

    pub const fn default_degraded_risk_percentage() -> u8 {
        20
    }

    pub const fn default_recent_history_cap() -> usize {
        50
    }

    pub const fn default_recent_history_keep() -> usize {
        25
    }

    pub const fn default_seed() -> u64 {
        0x5241_4944
    }

    /// Parse a JSON overlay; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of bounds.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Inclusive range units lost are drawn from when the risk trial hits.
    #[must_use]
    pub const fn units_lost_range(&self) -> RangeInclusive<u64> {
        self.units_lost_min..=self.units_lost_max
    }

    /// Check field bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates its documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "tick_interval_ms",
            });
        }
        if !(0.0..=1.0).contains(&self.refund_rate) {
            return Err(ConfigError::RefundRate {
                value: self.refund_rate,
            });
        }
        if self.units_lost_min > self.units_lost_max {
            return Err(ConfigError::UnitsLostRange {
                min: self.units_lost_min,
                max: self.units_lost_max,
            });
        }
        if self.degraded_duration_ms == 0 {
            return Err(ConfigError::Zero {
                field: "degraded_duration_ms",
            });
        }
        if self.degraded_risk_percentage > 100 {
            return Err(ConfigError::DegradedRisk {
                value: self.degraded_risk_percentage,
            });
        }
        if self.recent_history_keep == 0 || self.recent_history_keep > self.recent_history_cap {
            return Err(ConfigError::HistoryWindow {
                cap: self.recent_history_cap,
                keep: self.recent_history_keep,
            });
        }
        Ok(())
    }
}

impl Default for RaidEngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            resume_delay_ms: Self::default_resume_delay_ms(),
            refund_rate: Self::default_refund_rate(),
            units_lost_min: Self::default_units_lost_min(),
            units_lost_max: Self::default_units_lost_max(),
            degraded_duration_ms: Self::default_degraded_duration_ms(),
            degraded_risk_percentage: Self::default_degraded_risk_percentage(),
            recent_history_cap: Self::default_recent_history_cap(),
            recent_history_keep: Self::default_recent_history_keep(),
            seed: Self::default_seed(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("engine config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("refund_rate must be between 0.00 and 1.00 (got {value:.2})")]
    RefundRate { value: f64 },
    #[error("units lost range invalid (min {min} > max {max})")]
    UnitsLostRange { min: u64, max: u64 },
    #[error("degraded_risk_percentage must be 0-100 (got {value})")]
    DegradedRisk { value: u8 },
    #[error("history window invalid (keep {keep} must be 1..={cap})")]
    HistoryWindow { cap: usize, keep: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RaidEngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.units_lost_range(), 1..=2);
        assert_eq!(config.tick_interval_ms, 1_000);
    }

    #[test]
    fn partial_overlay_keeps_defaults() {
        let config = RaidEngineConfig::from_json(r#"{"refund_rate": 0.25, "seed": 9}"#).unwrap();
        assert!((config.refund_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.seed, 9);
        assert_eq!(config.resume_delay_ms, 500);
        assert_eq!(config.recent_history_keep, 25);
    }

    #[test]
    fn bounds_are_enforced() {
        let err = RaidEngineConfig::from_json(r#"{"refund_rate": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::RefundRate { .. }));
        let err = RaidEngineConfig::from_json(r#"{"units_lost_min": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnitsLostRange { min: 3, max: 2 }));
        let err = RaidEngineConfig::from_json(r#"{"recent_history_keep": 60}"#).unwrap_err();
        assert!(matches!(err, ConfigError::HistoryWindow { .. }));
        let err = RaidEngineConfig::from_json(r#"{"tick_interval_ms": 0}"#).unwrap_err();
        assert_eq!(err.to_string(), "tick_interval_ms must be greater than zero");
        assert!(matches!(
            RaidEngineConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
