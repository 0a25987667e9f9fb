// =============================================================================
// Weight Calibrator — correlation-driven, bounded weight steps
// =============================================================================
//
// Per calibration cycle:
//   1. Group samples by indicator; groups under `min_sample_count` keep their
//      weight.
//   2. Pearson correlation between sub-score and forward return per group.
//   3. Normalise by Σ|corr| over the calibrated indicators.
//   4. delta = clamp(norm_corr * learning_rate * max_step, ±max_step)
//   5. new = clamp(old + delta, bounds)
//
// Degenerate input never errors; the worst case is a logged no-op.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::samples::CorrelationSample;
use super::store::WeightChange;
use super::vector::WeightVector;
use crate::error::ScreenError;

pub const MIN_LEARNING_SAMPLES: usize = 30;
pub const MAX_WEIGHT_STEP: f64 = 0.2;

fn default_min_sample_count() -> usize {
    MIN_LEARNING_SAMPLES
}
fn default_learning_rate() -> f64 {
    0.5
}
fn default_max_step() -> f64 {
    MAX_WEIGHT_STEP
}
fn default_window_days() -> usize {
    30
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_min_sample_count")]
    pub min_sample_count: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Largest absolute weight change per indicator per cycle.
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    /// Number of most recent evaluation dates samples are drawn from.
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    /// Only learn from records that made the top-K.
    #[serde(default = "default_true")]
    pub top_k_only: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_sample_count: default_min_sample_count(),
            learning_rate: default_learning_rate(),
            max_step: default_max_step(),
            window_days: default_window_days(),
            top_k_only: true,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.min_sample_count < 3 {
            return Err(ScreenError::Config("calibration.min_sample_count must be >= 3".into()));
        }
        if !(self.max_step > 0.0 && self.learning_rate > 0.0) {
            return Err(ScreenError::Config(
                "calibration.max_step and learning_rate must be positive".into(),
            ));
        }
        if self.window_days == 0 {
            return Err(ScreenError::Config("calibration.window_days must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientSamples {
        indicator: String,
        count: usize,
        required: usize,
    },
    /// Every calibrated indicator had zero correlation.
    NoSignal,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientSamples {
                indicator,
                count,
                required,
            } => write!(f, "{indicator}: {count} samples < {required}"),
            Self::NoSignal => write!(f, "all correlations are zero"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorCorrelation {
    pub correlation: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub new_weights: WeightVector,
    pub changes: Vec<WeightChange>,
    pub correlations: BTreeMap<String, IndicatorCorrelation>,
    pub skipped: Vec<SkipReason>,
    pub summary: String,
}

impl CalibrationOutcome {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Pearson correlation with sample (n - 1) statistics, clamped to [-1, 1].
///
/// Returns 0 for fewer than 3 pairs, mismatched lengths, or a zero-variance
/// series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n < 3 || n != ys.len() {
        return 0.0;
    }
    let nf = n as f64;
    let mx = xs.iter().sum::<f64>() / nf;
    let my = ys.iter().sum::<f64>() / nf;

    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    let sx = (vx / (nf - 1.0)).sqrt();
    let sy = (vy / (nf - 1.0)).sqrt();
    if sx == 0.0 || sy == 0.0 {
        return 0.0;
    }

    let r = (cov / (nf - 1.0)) / (sx * sy);
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightCalibrator {
    config: CalibrationConfig,
}

impl WeightCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn calibrate(&self, samples: &[CorrelationSample], current: &WeightVector) -> CalibrationOutcome {
        let cfg = &self.config;

        // ── Step 1: group, dropping non-finite pairs ────────────────────
        let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        let mut dropped = 0usize;
        for s in samples {
            if !s.sub_score.is_finite() || !s.forward_return.is_finite() {
                dropped += 1;
                continue;
            }
            let g = groups.entry(s.indicator.as_str()).or_default();
            g.0.push(s.sub_score);
            g.1.push(s.forward_return);
        }
        if dropped > 0 {
            warn!(dropped, "non-finite correlation samples ignored");
        }

        let mut skipped = Vec::new();
        let mut correlations = BTreeMap::new();
        for (indicator, (scores, returns)) in &groups {
            if scores.len() < cfg.min_sample_count {
                skipped.push(SkipReason::InsufficientSamples {
                    indicator: indicator.to_string(),
                    count: scores.len(),
                    required: cfg.min_sample_count,
                });
                continue;
            }
            // ── Step 2: correlation ─────────────────────────────────────
            correlations.insert(
                indicator.to_string(),
                IndicatorCorrelation {
                    correlation: pearson(scores, returns),
                    sample_size: scores.len(),
                },
            );
        }

        // ── Step 3: normalise ───────────────────────────────────────────
        let abs_sum: f64 = correlations.values().map(|c| c.correlation.abs()).sum();
        let mut new_weights = current.clone();
        let mut changes = Vec::new();

        if correlations.is_empty() || abs_sum == 0.0 {
            if !correlations.is_empty() {
                skipped.push(SkipReason::NoSignal);
            }
            let summary = if skipped.is_empty() {
                "no samples".to_string()
            } else {
                format!(
                    "no-op: {}",
                    skipped.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
                )
            };
            info!(samples = samples.len(), reason = %summary, "weight calibration skipped");
            return CalibrationOutcome {
                new_weights,
                changes,
                correlations,
                skipped,
                summary,
            };
        }

        // ── Steps 4-5: bounded step per indicator ───────────────────────
        for (indicator, c) in &correlations {
            let normalized = c.correlation / abs_sum;
            let delta = (normalized * cfg.learning_rate * cfg.max_step).clamp(-cfg.max_step, cfg.max_step);
            let old = current.get(indicator);
            let new = current.bounds().clamp(old + delta);
            if new == old {
                continue;
            }
            new_weights.set(indicator.clone(), new);
            let clamped = if (new - (old + delta)).abs() > 1e-12 { " (clamped at bound)" } else { "" };
            changes.push(WeightChange {
                indicator: indicator.clone(),
                old_weight: old,
                new_weight: new,
                correlation: c.correlation,
                sample_size: c.sample_size,
                reason: format!(
                    "corr {:+.3} over {} samples, normalized {:+.3}, delta {:+.4}{clamped}",
                    c.correlation, c.sample_size, normalized, delta
                ),
            });
        }

        let summary = summarize(&correlations, &changes);
        info!(
            indicators = correlations.len(),
            changes = changes.len(),
            skipped = skipped.len(),
            summary = %summary,
            "weight calibration complete"
        );

        CalibrationOutcome {
            new_weights,
            changes,
            correlations,
            skipped,
            summary,
        }
    }
}

fn summarize(correlations: &BTreeMap<String, IndicatorCorrelation>, changes: &[WeightChange]) -> String {
    let best = correlations
        .iter()
        .max_by(|a, b| a.1.correlation.total_cmp(&b.1.correlation));
    let worst = correlations
        .iter()
        .min_by(|a, b| a.1.correlation.total_cmp(&b.1.correlation));
    let largest = changes.iter().max_by(|a, b| {
        (a.new_weight - a.old_weight)
            .abs()
            .total_cmp(&(b.new_weight - b.old_weight).abs())
    });

    let mut parts = Vec::new();
    if let Some((name, c)) = best {
        parts.push(format!("best {name} ({:+.3})", c.correlation));
    }
    if let Some((name, c)) = worst {
        parts.push(format!("worst {name} ({:+.3})", c.correlation));
    }
    match largest {
        Some(ch) => parts.push(format!(
            "largest change {} {:.3} -> {:.3}",
            ch.indicator, ch.old_weight, ch.new_weight
        )),
        None => parts.push("no weight moved".to_string()),
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::vector::{WeightBounds, MAX_WEIGHT, MIN_WEIGHT};
    use chrono::NaiveDate;

    fn samples(indicator: &str, n: usize, f: impl Fn(usize) -> (f64, f64)) -> Vec<CorrelationSample> {
        let d = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        (0..n)
            .map(|i| {
                let (s, r) = f(i);
                CorrelationSample {
                    indicator: indicator.into(),
                    sub_score: s,
                    forward_return: r,
                    eval_date: d,
                }
            })
            .collect()
    }

    #[test]
    fn pearson_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[5.0; 4]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(pearson(&x, &[1.0]), 0.0);
    }

    #[test]
    fn below_threshold_is_exact_noop() {
        let mut current = WeightVector::default();
        current.set("cci_value", 1.37);
        let s = samples("cci_value", 29, |i| (i as f64, i as f64));
        let out = WeightCalibrator::default().calibrate(&s, &current);
        assert_eq!(out.new_weights, current);
        assert!(out.is_noop());
        assert_eq!(
            out.skipped,
            vec![SkipReason::InsufficientSamples {
                indicator: "cci_value".into(),
                count: 29,
                required: 30
            }]
        );
    }

    #[test]
    fn positive_and_negative_correlation_move_opposite_ways() {
        let mut s = samples("cci_value", 40, |i| (i as f64, i as f64 * 0.1));
        s.extend(samples("volume", 40, |i| (i as f64, -(i as f64) * 0.1)));
        let out = WeightCalibrator::default().calibrate(&s, &WeightVector::default());
        // normalised corr = ±0.5, delta = ±0.5 * 0.5 * 0.2 = ±0.05
        assert!((out.new_weights.get("cci_value") - 1.05).abs() < 1e-12);
        assert!((out.new_weights.get("volume") - 0.95).abs() < 1e-12);
        assert_eq!(out.changes.len(), 2);
        assert!(out.summary.contains("best cci_value"));
        assert!(out.summary.contains("worst volume"));
    }

    #[test]
    fn step_never_exceeds_max_step() {
        let cfg = CalibrationConfig {
            learning_rate: 50.0,
            ..CalibrationConfig::default()
        };
        let s = samples("candle", 35, |i| (i as f64, i as f64));
        let out = WeightCalibrator::new(cfg).calibrate(&s, &WeightVector::default());
        assert!((out.new_weights.get("candle") - 1.2).abs() < 1e-12);
    }

    #[test]
    fn weights_stay_within_bounds() {
        let mut current = WeightVector::new(WeightBounds::default());
        current.set("a", 4.99);
        current.set("b", 0.51);
        let mut s = samples("a", 30, |i| (i as f64, i as f64));
        s.extend(samples("b", 30, |i| (i as f64, -(i as f64))));
        let cfg = CalibrationConfig {
            learning_rate: 1.0,
            ..CalibrationConfig::default()
        };
        let out = WeightCalibrator::new(cfg).calibrate(&s, &current);
        for (_, w) in out.new_weights.iter() {
            assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&w));
        }
        assert_eq!(out.new_weights.get("a"), MAX_WEIGHT);
        assert_eq!(out.new_weights.get("b"), MIN_WEIGHT);
        assert!(out.changes.iter().all(|c| c.reason.contains("clamped")));
    }

    #[test]
    fn zero_variance_everywhere_is_noop() {
        let s = samples("cci_slope", 50, |_| (7.5, 1.0));
        let out = WeightCalibrator::default().calibrate(&s, &WeightVector::default());
        assert!(out.is_noop());
        assert_eq!(out.skipped, vec![SkipReason::NoSignal]);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut s = samples("change", 30, |i| (i as f64, i as f64));
        s.push(CorrelationSample {
            indicator: "change".into(),
            sub_score: f64::NAN,
            forward_return: 1.0,
            eval_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        });
        let out = WeightCalibrator::default().calibrate(&s, &WeightVector::default());
        assert_eq!(out.correlations["change"].sample_size, 30);
    }
}
