// =============================================================================
// Scoring Module
// =============================================================================
//
// IndicatorSet + WeightVector -> sub-scores, bonuses, total, grade, rank.

pub mod calculator;
pub mod curve;
pub mod detail;
pub mod grade;
pub mod legacy;
pub mod policy;
pub mod ranking;
pub mod region;

pub use calculator::ScoreCalculator;
pub use curve::PiecewiseCurve;
pub use detail::{BonusItem, ScoreDetail, SubScore, SCORE_MAX, SCORE_MIN};
pub use grade::{Grade, GradeThresholds, SellStrategy};
pub use legacy::LegacyFixedScalePolicy;
pub use policy::{build_policy, PolicyKind, ScoringPolicy};
pub use ranking::{rank_scores, top_k, StockScore, MAX_BONUS};
pub use region::{RegionOptimizedPolicy, RegionParams, SCORE_PER_INDICATOR};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::indicators::candle::CandleMetrics;
    use crate::indicators::IndicatorSet;

    /// A healthy bullish setup: CCI 170 and rising, MA20 rising four days,
    /// 3 % up day on double volume, closing near the high.
    pub fn base_set() -> IndicatorSet {
        IndicatorSet {
            as_of: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            open: 1000.0,
            high: 1031.0,
            low: 995.0,
            close: 1030.0,
            prev_close: 1000.0,
            trading_value: 5e9,
            change_rate: 3.0,
            gap_rate: 0.0,
            cci: 170.0,
            cci_slope: 8.0,
            cci_values: vec![120.0, 135.0, 148.0, 158.0, 170.0],
            ma20: 1001.0,
            ma20_slope: 0.6,
            ma20_values: vec![990.0, 992.0, 995.0, 998.0, 1001.0],
            rsi: Some(62.0),
            macd: None,
            bollinger: None,
            candle: CandleMetrics {
                is_bullish: true,
                body_size: 30.0,
                upper_wick_ratio: 1.0 / 30.0,
                lower_wick_ratio: 5.0 / 30.0,
                ma20_position: 2.9,
            },
            consecutive_up_days: 2,
            volume_ratio: 2.0,
            fallbacks: Vec::new(),
        }
    }
}
