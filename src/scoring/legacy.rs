// =============================================================================
// Legacy fixed-scale policy — 10 points per indicator, weight-normalised
// =============================================================================
//
//   total = Σ(score_i · weight_i) / (Σ weight_i · 10) · 100
//
// Step-table scoring, no bonuses, no volume term. Kept so historical runs
// can be re-scored under the formula they were produced with.
// =============================================================================

use super::detail::{RawIndicators, ScoreDetail, SubScore};
use super::policy::{ScoringPolicy, CANDLE, CCI_SLOPE, CCI_VALUE, CHANGE, MA20_SLOPE};
use crate::indicators::IndicatorSet;
use crate::weights::WeightVector;

pub const LEGACY_SCORE_PER_INDICATOR: f64 = 10.0;

const INDICATORS: &[&str] = &[CCI_VALUE, CCI_SLOPE, MA20_SLOPE, CANDLE, CHANGE];

/// (min inclusive, max exclusive, score), searched in order.
const CCI_RANGES: &[(f64, f64, f64)] = &[
    (165.0, 175.0, 10.0),
    (160.0, 165.0, 9.5),
    (175.0, 180.0, 9.5),
    (150.0, 160.0, 8.5),
    (180.0, 190.0, 8.0),
    (140.0, 150.0, 7.5),
    (190.0, 200.0, 6.5),
    (130.0, 140.0, 6.5),
    (120.0, 130.0, 5.5),
    (200.0, 220.0, 5.0),
    (100.0, 120.0, 4.5),
    (220.0, 250.0, 4.0),
    (50.0, 100.0, 3.0),
    (250.0, 300.0, 2.5),
    (0.0, 50.0, 2.0),
    (300.0, 500.0, 1.5),
];

const CCI_EXTREME_HIGH: f64 = 300.0;
const CCI_SLOPE_WARNING_LEVEL: f64 = 200.0;

/// (slope at least, score), searched in order.
const MA20_SLOPE_TIERS: &[(f64, f64)] = &[
    (2.0, 9.5),
    (1.0, 8.5),
    (0.5, 7.5),
    (0.2, 6.5),
    (0.0, 5.5),
    (-0.5, 4.0),
    (-1.0, 2.5),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFixedScalePolicy;

pub fn cci_value_score(cci: f64) -> f64 {
    if !cci.is_finite() {
        return 0.0;
    }
    if cci > CCI_EXTREME_HIGH {
        return 1.0;
    }
    if cci < 0.0 {
        return 2.0;
    }
    CCI_RANGES
        .iter()
        .find(|(lo, hi, _)| *lo <= cci && cci < *hi)
        .map(|(_, _, s)| *s)
        .unwrap_or(1.0)
}

pub fn cci_slope_score(set: &IndicatorSet) -> f64 {
    let Some(prev) = set.previous_cci() else {
        return 5.0;
    };
    let rising = set.cci > prev;
    if set.cci > CCI_SLOPE_WARNING_LEVEL && set.cci < prev {
        return 2.0;
    }
    match (rising, set.cci < CCI_SLOPE_WARNING_LEVEL) {
        (true, true) => 10.0,
        (true, false) => 8.5,
        (false, _) => 4.0,
    }
}

pub fn ma20_slope_score(set: &IndicatorSet) -> f64 {
    if set.ma20_values.len() >= 3 {
        let recent = &set.ma20_values[set.ma20_values.len() - 3..];
        if recent.windows(2).all(|w| w[1] > w[0]) {
            return 10.0;
        }
    }
    MA20_SLOPE_TIERS
        .iter()
        .find(|(at_least, _)| set.ma20_slope >= *at_least)
        .map(|(_, s)| *s)
        .unwrap_or(1.0)
}

pub fn candle_score(set: &IndicatorSet) -> f64 {
    let c = &set.candle;
    if !c.is_bullish {
        return 2.0;
    }

    let wick: f64 = match c.upper_wick_ratio {
        r if r <= 0.1 => 10.0,
        r if r <= 0.2 => 8.5,
        r if r <= 0.3 => 6.5,
        r if r <= 0.5 => 4.5,
        _ => 2.5,
    };

    let pos = c.ma20_position;
    let position: f64 = if set.close > set.ma20 {
        match pos {
            p if (0.0..=2.0).contains(&p) => 2.0,
            p if p <= 5.0 => 1.0,
            p if p <= 8.0 => 0.0,
            _ => -2.0,
        }
    } else if pos >= -2.0 {
        -1.0
    } else {
        -3.0
    };

    (wick + position).clamp(0.0, LEGACY_SCORE_PER_INDICATOR)
}

impl ScoringPolicy for LegacyFixedScalePolicy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn indicators(&self) -> &'static [&'static str] {
        INDICATORS
    }

    fn score(&self, set: &IndicatorSet, weights: &WeightVector) -> ScoreDetail {
        let sub_scores: Vec<SubScore> = [
            (CCI_VALUE, cci_value_score(set.cci)),
            (CCI_SLOPE, cci_slope_score(set)),
            (MA20_SLOPE, ma20_slope_score(set)),
            (CANDLE, candle_score(set)),
            (CHANGE, 5.0),
        ]
        .into_iter()
        .map(|(name, score)| SubScore::new(name, score, weights.get(name)))
        .collect();

        let weighted: f64 = sub_scores.iter().map(|s| s.weighted).sum();
        let weight_sum: f64 = sub_scores.iter().map(|s| s.weight).sum();
        let base = if weight_sum > 0.0 {
            weighted / (weight_sum * LEGACY_SCORE_PER_INDICATOR) * 100.0
        } else {
            0.0
        };

        ScoreDetail::new(
            self.name(),
            LEGACY_SCORE_PER_INDICATOR,
            sub_scores,
            Vec::new(),
            base,
            RawIndicators::from(set),
        )
    }
}
