// =============================================================================
// Candle analysis
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleMetrics {
    pub is_bullish: bool,
    pub body_size: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,
    /// (close - ma20) / ma20 * 100.
    pub ma20_position: f64,
}

/// Body, wick ratios and distance from the 20-day average for one bar.
///
/// Wick ratios are relative to body size. With a zero body, any non-zero wick
/// has ratio 1.0 and a zero wick 0.0. The second value reports whether the
/// zero-body rule fired.
pub fn analyze_candle(bar: &PriceBar, ma20: f64) -> (CandleMetrics, bool) {
    let body_size = (bar.close - bar.open).abs();
    let upper_wick = bar.high - bar.open.max(bar.close);
    let lower_wick = bar.open.min(bar.close) - bar.low;

    let zero_body = body_size == 0.0;
    let ratio = |wick: f64| {
        if zero_body {
            if wick > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            wick / body_size
        }
    };

    let ma20_position = if ma20 != 0.0 {
        (bar.close - ma20) / ma20 * 100.0
    } else {
        0.0
    };

    (
        CandleMetrics {
            is_bullish: bar.is_bullish(),
            body_size,
            upper_wick_ratio: ratio(upper_wick),
            lower_wick_ratio: ratio(lower_wick),
            ma20_position,
        },
        zero_body,
    )
}

/// Trailing run of bullish candles ending at the last bar.
pub fn consecutive_up_days(bars: &[PriceBar]) -> u32 {
    bars.iter().rev().take_while(|b| b.is_bullish()).count() as u32
}
