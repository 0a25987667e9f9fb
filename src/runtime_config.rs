// =============================================================================
// Runtime Configuration — screener settings with atomic save
// =============================================================================
//
// Every tunable of the screening engine lives here: window length, indicator
// periods, curve breakpoints, grade thresholds, weight bounds, calibration,
// universe filter, market adjustment, upstream pacing and worker count.
//
// All sections carry serde defaults so an older or partial config file keeps
// loading. Persistence uses the tmp + rename pattern.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ScreenError;
use crate::indicators::{DegenerateFallbacks, IndicatorParams};
use crate::persist::save_json_atomic;
use crate::scoring::{GradeThresholds, PolicyKind, RegionParams};
use crate::screening::market::MarketAdjustmentParams;
use crate::screening::rate_limit::RetryPolicy;
use crate::screening::universe::UniverseFilter;
use crate::screening::window::LookbackConfig;
use crate::weights::{CalibrationConfig, WeightBounds};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_top_k() -> usize {
    5
}

fn default_min_call_interval_ms() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_num_workers() -> usize {
    4
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score-formula generation; `region` unless a caller opts into `legacy`.
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default)]
    pub region: RegionParams,
}

/// Upstream pacing for the real-time path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,
    /// Retries for transient provider errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: default_min_call_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl RealtimeConfig {
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Size of the bounded rayon pool.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
        }
    }
}

// =============================================================================
// ScreenerConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default)]
    pub lookback: LookbackConfig,

    #[serde(default)]
    pub indicators: IndicatorParams,

    /// Values substituted for degenerate indicator cases (flat CCI, no-loss RSI).
    #[serde(default)]
    pub fallbacks: DegenerateFallbacks,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub grades: GradeThresholds,

    #[serde(default)]
    pub weight_bounds: WeightBounds,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub universe: UniverseFilter,

    #[serde(default)]
    pub market_adjustment: MarketAdjustmentParams,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,

    /// Size of the reported top list; also the rank cut for calibration
    /// samples when `calibration.top_k_only` is set.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Include the per-stock failure list in batch summaries.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            lookback: LookbackConfig::default(),
            indicators: IndicatorParams::default(),
            fallbacks: DegenerateFallbacks::default(),
            scoring: ScoringConfig::default(),
            grades: GradeThresholds::default(),
            weight_bounds: WeightBounds::default(),
            calibration: CalibrationConfig::default(),
            universe: UniverseFilter::default(),
            market_adjustment: MarketAdjustmentParams::default(),
            realtime: RealtimeConfig::default(),
            backfill: BackfillConfig::default(),
            top_k: default_top_k(),
            verbose: false,
        }
    }
}

impl ScreenerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Parsing only. Call [`ScreenerConfig::validate`] once any overrides
    /// have been applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read screener config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse screener config from {}", path.display()))?;

        info!(
            path = %path.display(),
            policy = %config.scoring.policy,
            window = config.lookback.window_len(),
            top_k = config.top_k,
            "screener config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        save_json_atomic(path, self)
            .with_context(|| format!("failed to save screener config to {}", path.display()))?;
        info!(path = %path.display(), "screener config saved (atomic)");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        let required = self.indicators.required_bars();
        if self.lookback.min_lookback < required {
            return Err(ScreenError::Config(format!(
                "lookback.min_lookback {} is below the {} bars the indicator set needs",
                self.lookback.min_lookback, required
            )));
        }
        if self.top_k == 0 {
            return Err(ScreenError::Config("top_k must be >= 1".into()));
        }
        if self.backfill.num_workers == 0 {
            return Err(ScreenError::Config("backfill.num_workers must be >= 1".into()));
        }
        if !(self.universe.min_change_rate < self.universe.max_change_rate) {
            return Err(ScreenError::Config(
                "universe.min_change_rate must be below max_change_rate".into(),
            ));
        }
        self.scoring.region.validate()?;
        self.grades.validate()?;
        self.weight_bounds.validate()?;
        self.calibration.validate()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = ScreenerConfig::default();
        assert_eq!(cfg.lookback.window_len(), 60);
        assert_eq!(cfg.scoring.policy, PolicyKind::Region);
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.realtime.min_call_interval_ms, 120);
        assert_eq!(cfg.realtime.max_retries, 3);
        assert_eq!(cfg.backfill.num_workers, 4);
        assert_eq!(cfg.calibration.min_sample_count, 30);
        assert!((cfg.weight_bounds.min - 0.5).abs() < f64::EPSILON);
        assert!((cfg.weight_bounds.max - 5.0).abs() < f64::EPSILON);
        assert!(!cfg.verbose);
        cfg.validate().unwrap();
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ScreenerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ScreenerConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "top_k": 10, "scoring": { "policy": "legacy" }, "lookback": { "margin": 10 } }"#;
        let cfg: ScreenerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.top_k, 10);
        assert_eq!(cfg.scoring.policy, PolicyKind::Legacy);
        assert_eq!(cfg.lookback.min_lookback, 20);
        assert_eq!(cfg.lookback.window_len(), 30);
        assert_eq!(cfg.realtime.retry_base_delay_ms, 1000);
    }

    #[test]
    fn short_lookback_is_rejected() {
        let mut cfg = ScreenerConfig::default();
        cfg.lookback.min_lookback = 10;
        assert!(matches!(cfg.validate(), Err(ScreenError::Config(_))));
    }

    #[test]
    fn retry_policy_from_config() {
        let p = RealtimeConfig::default().retry_policy();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screener.json");
        let mut cfg = ScreenerConfig::default();
        cfg.top_k = 7;
        cfg.verbose = true;
        cfg.save(&path).unwrap();
        let loaded = ScreenerConfig::load(&path).unwrap();
        assert_eq!(loaded.top_k, 7);
        assert!(loaded.verbose);
        assert_eq!(loaded.lookback, cfg.lookback);
    }

    #[test]
    fn load_leaves_validation_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screener.json");
        std::fs::write(&path, r#"{ "top_k": 0 }"#).unwrap();
        let mut loaded = ScreenerConfig::load(&path).unwrap();
        assert!(loaded.validate().is_err());
        loaded.top_k = 3;
        loaded.validate().unwrap();
    }
}
