// =============================================================================
// Score detail — explainable breakdown of one evaluation
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// One weighted sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub indicator: String,
    pub score: f64,
    pub weight: f64,
    pub weighted: f64,
}

impl SubScore {
    pub fn new(indicator: &str, score: f64, weight: f64) -> Self {
        Self {
            indicator: indicator.to_string(),
            score,
            weight,
            weighted: score * weight,
        }
    }
}

/// An additive, unweighted bonus (negative for penalties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusItem {
    pub name: String,
    pub points: f64,
}

/// Raw indicator values carried for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIndicators {
    pub cci: f64,
    pub cci_slope: f64,
    pub ma20: f64,
    pub ma20_slope: f64,
    pub rsi: Option<f64>,
    pub macd_hist: Option<f64>,
    pub volume_ratio: f64,
    pub upper_wick_ratio: f64,
    pub ma20_position: f64,
    pub change_rate: f64,
    pub gap_rate: f64,
    pub consecutive_up_days: u32,
    pub is_bullish: bool,
}

impl From<&IndicatorSet> for RawIndicators {
    fn from(set: &IndicatorSet) -> Self {
        Self {
            cci: set.cci,
            cci_slope: set.cci_slope,
            ma20: set.ma20,
            ma20_slope: set.ma20_slope,
            rsi: set.rsi,
            macd_hist: set.macd.map(|m| m.hist),
            volume_ratio: set.volume_ratio,
            upper_wick_ratio: set.candle.upper_wick_ratio,
            ma20_position: set.candle.ma20_position,
            change_rate: set.change_rate,
            gap_rate: set.gap_rate,
            consecutive_up_days: set.consecutive_up_days,
            is_bullish: set.candle.is_bullish,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub policy: String,
    pub max_sub_score: f64,
    pub sub_scores: Vec<SubScore>,
    pub bonuses: Vec<BonusItem>,
    /// Policy result before the market adjustment and final clamp.
    pub base: f64,
    pub market_adjustment: f64,
    pub raw: RawIndicators,
    pub total: f64,
}

fn clamp_total(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(SCORE_MIN, SCORE_MAX)
    } else {
        SCORE_MIN
    }
}

impl ScoreDetail {
    pub fn new(
        policy: &str,
        max_sub_score: f64,
        sub_scores: Vec<SubScore>,
        bonuses: Vec<BonusItem>,
        base: f64,
        raw: RawIndicators,
    ) -> Self {
        Self {
            policy: policy.to_string(),
            max_sub_score,
            sub_scores,
            bonuses,
            base,
            market_adjustment: 0.0,
            raw,
            total: clamp_total(base),
        }
    }

    /// Replaces the market adjustment and recomputes the clamped total.
    pub fn with_market_adjustment(mut self, points: f64) -> Self {
        self.market_adjustment = points;
        self.total = clamp_total(self.base + points);
        self
    }

    pub fn sub_score(&self, indicator: &str) -> Option<f64> {
        self.sub_scores
            .iter()
            .find(|s| s.indicator == indicator)
            .map(|s| s.score)
    }

    pub fn bonus(&self, name: &str) -> Option<f64> {
        self.bonuses.iter().find(|b| b.name == name).map(|b| b.points)
    }

    pub fn bonus_total(&self) -> f64 {
        self.bonuses.iter().map(|b| b.points).sum()
    }
}
