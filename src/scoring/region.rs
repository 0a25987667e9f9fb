// =============================================================================
// Region-optimized policy — inverted-U sub-scores on a 100-point scale
// =============================================================================
//
// Six weighted sub-scores of up to 15 points each, plus additive bonuses:
//
//   cci_value   inverted-U, plateau 160–200, steeper tail above the plateau
//   cci_slope   linear around a neutral 7.5; falling slopes cost double once
//               CCI is overheated
//   ma20_slope  monotonic, saturating at ±1 %
//   candle      bearish = 0; bullish = wick term + distance-above-MA20 term
//   change      inverted-U, full marks for a 2–8 % day
//   volume      exclude-today ratio, best around 2x
//
// An optional seventh sub-score, consecutive_up, rewards a short run of
// bullish candles and fades out after a week. It is off unless
// `score_consecutive_up` is set.
//
//   total = clamp(Σ score_i · weight_i + Σ bonus, 0, 100)
//
// Overheat, gap-up and MA20 deviation only ever cost points here; they never
// exclude a stock.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::curve::PiecewiseCurve;
use super::detail::{BonusItem, RawIndicators, ScoreDetail, SubScore};
use super::policy::{
    ScoringPolicy, CANDLE, CCI_SLOPE, CCI_VALUE, CHANGE, CONSECUTIVE_UP, MA20_SLOPE, VOLUME,
};
use crate::error::ScreenError;
use crate::indicators::candle::CandleMetrics;
use crate::indicators::IndicatorSet;
use crate::weights::WeightVector;

pub const SCORE_PER_INDICATOR: f64 = 15.0;

pub const BONUS_CCI_RISING: &str = "cci_rising";
pub const BONUS_MA20_RISE: &str = "ma20_rise";
pub const BONUS_STRONG_CLOSE: &str = "strong_close";
pub const PENALTY_GAP_UP: &str = "gap_up_penalty";

// =============================================================================
// Parameters
// =============================================================================

/// Linear slope scoring around a neutral midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeParams {
    /// Score at slope 0.
    pub neutral: f64,
    /// Slope at which the score reaches the maximum.
    pub rise_saturation: f64,
    /// Absolute falling slope at which the score reaches 0.
    pub fall_saturation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverheatParams {
    /// CCI at or above which the market is treated as overheated.
    pub level: f64,
    /// Multiplier on the falling-slope penalty while overheated.
    pub penalty_multiplier: f64,
}

fn default_cci_rising_tiers() -> Vec<(f64, f64)> {
    vec![(20.0, 4.0), (10.0, 3.5), (5.0, 3.0), (0.0, 2.5)]
}
fn default_ma20_full_days() -> usize {
    2
}
fn default_ma20_full_points() -> f64 {
    3.0
}
fn default_ma20_partial_days() -> usize {
    1
}
fn default_ma20_partial_points() -> f64 {
    1.5
}
fn default_strong_close_tolerance_pct() -> f64 {
    0.5
}
fn default_strong_close_points() -> f64 {
    3.0
}
fn default_gap_penalty_threshold_pct() -> f64 {
    7.0
}
fn default_gap_penalty_points() -> f64 {
    3.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusParams {
    /// (rise strictly above, points), checked in order.
    #[serde(default = "default_cci_rising_tiers")]
    pub cci_rising_tiers: Vec<(f64, f64)>,
    /// Day-over-day MA20 increases, ending today, needed for full points.
    /// Two increases means the last three MA20 values strictly rise.
    #[serde(default = "default_ma20_full_days")]
    pub ma20_full_days: usize,
    #[serde(default = "default_ma20_full_points")]
    pub ma20_full_points: f64,
    #[serde(default = "default_ma20_partial_days")]
    pub ma20_partial_days: usize,
    #[serde(default = "default_ma20_partial_points")]
    pub ma20_partial_points: f64,
    /// Max (high - close) / close in percent for a strong close.
    #[serde(default = "default_strong_close_tolerance_pct")]
    pub strong_close_tolerance_pct: f64,
    #[serde(default = "default_strong_close_points")]
    pub strong_close_points: f64,
    #[serde(default = "default_gap_penalty_threshold_pct")]
    pub gap_penalty_threshold_pct: f64,
    #[serde(default = "default_gap_penalty_points")]
    pub gap_penalty_points: f64,
}

impl Default for BonusParams {
    fn default() -> Self {
        Self {
            cci_rising_tiers: default_cci_rising_tiers(),
            ma20_full_days: default_ma20_full_days(),
            ma20_full_points: default_ma20_full_points(),
            ma20_partial_days: default_ma20_partial_days(),
            ma20_partial_points: default_ma20_partial_points(),
            strong_close_tolerance_pct: default_strong_close_tolerance_pct(),
            strong_close_points: default_strong_close_points(),
            gap_penalty_threshold_pct: default_gap_penalty_threshold_pct(),
            gap_penalty_points: default_gap_penalty_points(),
        }
    }
}

fn default_cci_value_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (-100.0, 0.0),
        (0.0, 2.0),
        (100.0, 5.0),
        (140.0, 10.0),
        (160.0, 15.0),
        (200.0, 15.0),
        (220.0, 9.0),
        (250.0, 3.0),
        (280.0, 0.0),
    ])
}
fn default_cci_slope() -> SlopeParams {
    SlopeParams {
        neutral: 7.5,
        rise_saturation: 20.0,
        fall_saturation: 20.0,
    }
}
fn default_cci_overheat() -> OverheatParams {
    OverheatParams {
        level: 200.0,
        penalty_multiplier: 2.0,
    }
}
fn default_ma20_slope() -> SlopeParams {
    SlopeParams {
        neutral: 7.5,
        rise_saturation: 1.0,
        fall_saturation: 1.0,
    }
}
fn default_candle_wick_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (0.0, 9.0),
        (0.1, 9.0),
        (0.2, 7.5),
        (0.3, 6.0),
        (0.5, 4.0),
        (1.0, 1.0),
        (2.0, 0.0),
    ])
}
fn default_candle_distance_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (-5.0, 0.0),
        (0.0, 2.0),
        (2.0, 6.0),
        (5.0, 6.0),
        (8.0, 4.0),
        (12.0, 1.5),
        (20.0, 0.0),
    ])
}
fn default_change_rate_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (0.0, 3.0),
        (1.0, 9.0),
        (2.0, 15.0),
        (8.0, 15.0),
        (10.0, 12.0),
        (15.0, 6.0),
        (20.0, 2.0),
        (25.0, 0.0),
    ])
}
fn default_consecutive_up_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (0.0, 8.0),
        (1.0, 12.0),
        (2.0, 15.0),
        (3.0, 15.0),
        (4.0, 12.0),
        (5.0, 8.0),
        (6.0, 5.0),
        (7.0, 3.0),
        (10.0, 0.0),
    ])
}
fn default_volume_ratio_curve() -> PiecewiseCurve {
    PiecewiseCurve::preset(&[
        (0.0, 0.0),
        (0.5, 5.0),
        (1.0, 10.0),
        (1.5, 14.0),
        (2.0, 15.0),
        (3.0, 14.0),
        (5.0, 10.0),
        (8.0, 5.0),
        (15.0, 0.0),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionParams {
    #[serde(default = "default_cci_value_curve")]
    pub cci_value: PiecewiseCurve,
    #[serde(default = "default_cci_slope")]
    pub cci_slope: SlopeParams,
    #[serde(default = "default_cci_overheat")]
    pub cci_overheat: OverheatParams,
    #[serde(default = "default_ma20_slope")]
    pub ma20_slope: SlopeParams,
    #[serde(default = "default_candle_wick_curve")]
    pub candle_wick: PiecewiseCurve,
    #[serde(default = "default_candle_distance_curve")]
    pub candle_distance: PiecewiseCurve,
    #[serde(default = "default_change_rate_curve")]
    pub change_rate: PiecewiseCurve,
    #[serde(default = "default_volume_ratio_curve")]
    pub volume_ratio: PiecewiseCurve,
    /// Run of bullish candles ending today -> points.
    #[serde(default = "default_consecutive_up_curve")]
    pub consecutive_up: PiecewiseCurve,
    #[serde(default)]
    pub score_consecutive_up: bool,
    #[serde(default)]
    pub bonuses: BonusParams,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            cci_value: default_cci_value_curve(),
            cci_slope: default_cci_slope(),
            cci_overheat: default_cci_overheat(),
            ma20_slope: default_ma20_slope(),
            candle_wick: default_candle_wick_curve(),
            candle_distance: default_candle_distance_curve(),
            change_rate: default_change_rate_curve(),
            volume_ratio: default_volume_ratio_curve(),
            consecutive_up: default_consecutive_up_curve(),
            score_consecutive_up: false,
            bonuses: BonusParams::default(),
        }
    }
}

impl RegionParams {
    pub fn validate(&self) -> Result<(), ScreenError> {
        for (name, curve) in [
            ("cci_value", &self.cci_value),
            ("candle_wick", &self.candle_wick),
            ("candle_distance", &self.candle_distance),
            ("change_rate", &self.change_rate),
            ("volume_ratio", &self.volume_ratio),
            ("consecutive_up", &self.consecutive_up),
        ] {
            curve
                .validate(SCORE_PER_INDICATOR)
                .map_err(|e| ScreenError::Config(format!("{name}: {e}")))?;
        }
        for (name, s) in [("cci_slope", &self.cci_slope), ("ma20_slope", &self.ma20_slope)] {
            if !(s.rise_saturation > 0.0 && s.fall_saturation > 0.0)
                || !(0.0..=SCORE_PER_INDICATOR).contains(&s.neutral)
            {
                return Err(ScreenError::Config(format!(
                    "{name}: saturations must be positive and neutral within [0, {SCORE_PER_INDICATOR}]"
                )));
            }
        }
        if self.cci_overheat.penalty_multiplier < 1.0 {
            return Err(ScreenError::Config(
                "cci_overheat.penalty_multiplier must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Policy
// =============================================================================

const INDICATORS: &[&str] = &[CCI_VALUE, CCI_SLOPE, MA20_SLOPE, CANDLE, CHANGE, VOLUME];
const INDICATORS_WITH_CONSECUTIVE: &[&str] =
    &[CCI_VALUE, CCI_SLOPE, MA20_SLOPE, CANDLE, CHANGE, VOLUME, CONSECUTIVE_UP];

#[derive(Debug, Clone, Default)]
pub struct RegionOptimizedPolicy {
    params: RegionParams,
}

fn clamp_sub(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, SCORE_PER_INDICATOR)
    } else {
        0.0
    }
}

fn slope_score(params: &SlopeParams, slope: f64, penalty_multiplier: f64) -> f64 {
    let n = params.neutral;
    if slope >= 0.0 {
        n + (SCORE_PER_INDICATOR - n) * (slope / params.rise_saturation).min(1.0)
    } else {
        n - n * (slope.abs() * penalty_multiplier / params.fall_saturation).min(1.0)
    }
}

impl RegionOptimizedPolicy {
    pub fn new(params: RegionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RegionParams {
        &self.params
    }

    pub fn cci_value_score(&self, cci: f64) -> f64 {
        clamp_sub(self.params.cci_value.eval(cci))
    }

    pub fn cci_slope_score(&self, slope: f64, cci: f64) -> f64 {
        let m = if cci >= self.params.cci_overheat.level {
            self.params.cci_overheat.penalty_multiplier
        } else {
            1.0
        };
        clamp_sub(slope_score(&self.params.cci_slope, slope, m))
    }

    pub fn ma20_slope_score(&self, slope: f64) -> f64 {
        clamp_sub(slope_score(&self.params.ma20_slope, slope, 1.0))
    }

    pub fn candle_score(&self, candle: &CandleMetrics) -> f64 {
        if !candle.is_bullish {
            return 0.0;
        }
        clamp_sub(
            self.params.candle_wick.eval(candle.upper_wick_ratio)
                + self.params.candle_distance.eval(candle.ma20_position),
        )
    }

    pub fn change_score(&self, change_rate: f64) -> f64 {
        clamp_sub(self.params.change_rate.eval(change_rate))
    }

    pub fn volume_score(&self, ratio: f64) -> f64 {
        clamp_sub(self.params.volume_ratio.eval(ratio))
    }

    pub fn consecutive_up_score(&self, days: u32) -> f64 {
        clamp_sub(self.params.consecutive_up.eval(f64::from(days)))
    }

    fn bonuses(&self, set: &IndicatorSet) -> Vec<BonusItem> {
        let b = &self.params.bonuses;

        let cci_rising = match set.previous_cci() {
            Some(prev) if set.cci > prev => {
                let rise = set.cci - prev;
                b.cci_rising_tiers
                    .iter()
                    .find(|(above, _)| rise > *above)
                    .map(|(_, pts)| *pts)
                    .unwrap_or(0.0)
            }
            _ => 0.0,
        };

        let rising_days = set.ma20_rising_days();
        let ma20_rise = if rising_days >= b.ma20_full_days {
            b.ma20_full_points
        } else if rising_days >= b.ma20_partial_days {
            b.ma20_partial_points
        } else {
            0.0
        };

        let close_gap_pct = if set.close > 0.0 {
            (set.high - set.close) / set.close * 100.0
        } else {
            f64::INFINITY
        };
        let strong_close = if set.candle.is_bullish && close_gap_pct <= b.strong_close_tolerance_pct {
            b.strong_close_points
        } else {
            0.0
        };

        let gap_penalty = if set.gap_rate > b.gap_penalty_threshold_pct {
            -b.gap_penalty_points
        } else {
            0.0
        };

        [
            (BONUS_CCI_RISING, cci_rising),
            (BONUS_MA20_RISE, ma20_rise),
            (BONUS_STRONG_CLOSE, strong_close),
            (PENALTY_GAP_UP, gap_penalty),
        ]
        .into_iter()
        .map(|(name, points)| BonusItem {
            name: name.to_string(),
            points,
        })
        .collect()
    }
}

impl ScoringPolicy for RegionOptimizedPolicy {
    fn name(&self) -> &'static str {
        "region"
    }

    fn indicators(&self) -> &'static [&'static str] {
        if self.params.score_consecutive_up {
            INDICATORS_WITH_CONSECUTIVE
        } else {
            INDICATORS
        }
    }

    fn score(&self, set: &IndicatorSet, weights: &WeightVector) -> ScoreDetail {
        let consecutive = self
            .params
            .score_consecutive_up
            .then(|| (CONSECUTIVE_UP, self.consecutive_up_score(set.consecutive_up_days)));
        let sub_scores: Vec<SubScore> = [
            (CCI_VALUE, self.cci_value_score(set.cci)),
            (CCI_SLOPE, self.cci_slope_score(set.cci_slope, set.cci)),
            (MA20_SLOPE, self.ma20_slope_score(set.ma20_slope)),
            (CANDLE, self.candle_score(&set.candle)),
            (CHANGE, self.change_score(set.change_rate)),
            (VOLUME, self.volume_score(set.volume_ratio)),
        ]
        .into_iter()
        .chain(consecutive)
        .map(|(name, score)| SubScore::new(name, score, weights.get(name)))
        .collect();

        let bonuses = self.bonuses(set);
        let base = sub_scores.iter().map(|s| s.weighted).sum::<f64>()
            + bonuses.iter().map(|b| b.points).sum::<f64>();

        ScoreDetail::new(
            self.name(),
            SCORE_PER_INDICATOR,
            sub_scores,
            bonuses,
            base,
            RawIndicators::from(set),
        )
    }
}
