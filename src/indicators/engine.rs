// =============================================================================
// Indicator Engine — one evaluation window in, one IndicatorSet out
// =============================================================================
//
// Stateless and call-context independent: the same window always produces a
// bit-identical `IndicatorSet`. Both the real-time and the backfill paths go
// through `IndicatorEngine::compute`.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bollinger::{calculate_bollinger, BollingerResult};
use super::candle::{analyze_candle, consecutive_up_days, CandleMetrics};
use super::cci::cci_series;
use super::macd::{calculate_macd, MacdResult};
use super::moving_average::{sma_series, warmup_sma_tail};
use super::rsi::calculate_rsi;
use super::slope::{percent_change_slope, regression_slope};
use super::volume::{volume_ratio, VolumeRatioMode};
use crate::error::ScreenError;
use crate::types::{PriceBar, StockId};

/// Number of trailing CCI / MA20 values kept on the set for bonus rules.
const TAIL_LEN: usize = 5;

/// CCI value used when the window's mean absolute deviation is zero.
pub const CCI_FLAT_FALLBACK: f64 = 0.0;
/// RSI value used when the average loss is zero.
pub const RSI_NO_LOSS_FALLBACK: f64 = 100.0;

// =============================================================================
// Parameters
// =============================================================================

fn default_cci_period() -> usize {
    14
}
fn default_cci_slope_period() -> usize {
    2
}
fn default_ma_period() -> usize {
    20
}
fn default_ma_slope_period() -> usize {
    3
}
fn default_rsi_period() -> usize {
    14
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_bollinger_period() -> usize {
    20
}
fn default_bollinger_k() -> f64 {
    2.0
}
fn default_volume_period() -> usize {
    20
}
fn default_cci_flat() -> f64 {
    CCI_FLAT_FALLBACK
}
fn default_rsi_no_loss() -> f64 {
    RSI_NO_LOSS_FALLBACK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_cci_period")]
    pub cci_period: usize,
    /// Number of CCI values the regression slope is fitted over.
    #[serde(default = "default_cci_slope_period")]
    pub cci_slope_period: usize,
    #[serde(default = "default_ma_period")]
    pub ma_period: usize,
    /// Number of MA values the percent-change slope spans.
    #[serde(default = "default_ma_slope_period")]
    pub ma_slope_period: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,
    #[serde(default = "default_volume_period")]
    pub volume_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            cci_period: default_cci_period(),
            cci_slope_period: default_cci_slope_period(),
            ma_period: default_ma_period(),
            ma_slope_period: default_ma_slope_period(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_bollinger_period(),
            bollinger_k: default_bollinger_k(),
            volume_period: default_volume_period(),
        }
    }
}

impl IndicatorParams {
    /// Fewest bars that yield every scored indicator. MACD and Bollinger are
    /// optional and do not count. One full MA period is enough: a shorter MA
    /// history is topped up with warm-up averages for the slope.
    pub fn required_bars(&self) -> usize {
        [
            self.cci_period + self.cci_slope_period.saturating_sub(1),
            self.ma_period,
            self.rsi_period + 1,
            self.volume_period,
            2,
        ]
        .into_iter()
        .max()
        .unwrap_or(2)
    }
}

/// Values substituted for degenerate inputs instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegenerateFallbacks {
    #[serde(default = "default_cci_flat")]
    pub cci_flat: f64,
    #[serde(default = "default_rsi_no_loss")]
    pub rsi_no_loss: f64,
}

impl Default for DegenerateFallbacks {
    fn default() -> Self {
        Self {
            cci_flat: CCI_FLAT_FALLBACK,
            rsi_no_loss: RSI_NO_LOSS_FALLBACK,
        }
    }
}

/// Which degenerate-input fallbacks fired for a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    CciFlat,
    RsiNoLoss,
    ZeroBody,
    /// MA slope span reached back before the first full moving average.
    MaWarmUp,
}

// =============================================================================
// IndicatorSet
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub as_of: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub trading_value: f64,
    /// (close - prev_close) / prev_close * 100.
    pub change_rate: f64,
    /// (open - prev_close) / prev_close * 100.
    pub gap_rate: f64,

    pub cci: f64,
    pub cci_slope: f64,
    /// Trailing CCI values, oldest first, last = `cci`.
    pub cci_values: Vec<f64>,
    pub ma20: f64,
    pub ma20_slope: f64,
    /// Trailing MA20 values, oldest first, last = `ma20`.
    pub ma20_values: Vec<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdResult>,
    pub bollinger: Option<BollingerResult>,
    pub candle: CandleMetrics,
    pub consecutive_up_days: u32,
    /// Exclude-today volume ratio.
    pub volume_ratio: f64,
    pub fallbacks: Vec<FallbackKind>,
}

impl IndicatorSet {
    pub fn previous_cci(&self) -> Option<f64> {
        self.cci_values.len().checked_sub(2).map(|i| self.cci_values[i])
    }

    /// Consecutive day-over-day MA20 increases ending at the last value.
    pub fn ma20_rising_days(&self) -> usize {
        self.ma20_values
            .windows(2)
            .rev()
            .take_while(|w| w[1] > w[0])
            .count()
    }
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 0.0;
    }
    (to - from) / from * 100.0
}

fn tail(values: &[f64], n: usize) -> Vec<f64> {
    values[values.len().saturating_sub(n)..].to_vec()
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    fallbacks: DegenerateFallbacks,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams, fallbacks: DegenerateFallbacks) -> Self {
        Self { params, fallbacks }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Compute every indicator for the window ending at `as_of`.
    ///
    /// The last bar of `window` must be dated `as_of`.
    pub fn compute(
        &self,
        stock_id: &StockId,
        window: &[PriceBar],
        as_of: NaiveDate,
    ) -> Result<IndicatorSet, ScreenError> {
        let p = &self.params;
        let required = p.required_bars();
        if window.len() < required {
            return Err(ScreenError::InsufficientData {
                stock_id: stock_id.clone(),
                required,
                available: window.len(),
            });
        }

        let (today, prev) = match window {
            [.., prev, today] => (today, prev),
            _ => {
                return Err(ScreenError::InsufficientData {
                    stock_id: stock_id.clone(),
                    required,
                    available: window.len(),
                })
            }
        };
        if today.date != as_of {
            return Err(ScreenError::UpstreamData {
                stock_id: stock_id.clone(),
                reason: format!("window ends at {} instead of {as_of}", today.date),
            });
        }

        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let mut fallbacks = Vec::new();

        // ── Step 1: CCI + regression slope ──────────────────────────────
        let (cci_all, cci_flat_count) = cci_series(window, p.cci_period, self.fallbacks.cci_flat);
        if cci_flat_count > 0 {
            fallbacks.push(FallbackKind::CciFlat);
        }
        let cci = cci_all.last().copied().unwrap_or(self.fallbacks.cci_flat);
        let cci_slope = regression_slope(&cci_all, p.cci_slope_period);

        // ── Step 2: MA20 + percent-change slope ─────────────────────────
        let ma_all = sma_series(&closes, p.ma_period);
        let ma20 = ma_all.last().copied().unwrap_or(today.close);
        let ma20_slope = if ma_all.len() >= p.ma_slope_period {
            percent_change_slope(&ma_all, p.ma_slope_period)
        } else {
            fallbacks.push(FallbackKind::MaWarmUp);
            percent_change_slope(&warmup_sma_tail(&closes, p.ma_period, p.ma_slope_period), p.ma_slope_period)
        };

        // ── Step 3: oscillators / bands ─────────────────────────────────
        let rsi = calculate_rsi(&closes, p.rsi_period, self.fallbacks.rsi_no_loss).map(
            |(value, fallback)| {
                if fallback {
                    fallbacks.push(FallbackKind::RsiNoLoss);
                }
                value
            },
        );
        let macd = calculate_macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let bollinger = calculate_bollinger(&closes, p.bollinger_period, p.bollinger_k);

        // ── Step 4: candle / volume ─────────────────────────────────────
        let (candle, zero_body) = analyze_candle(today, ma20);
        if zero_body {
            fallbacks.push(FallbackKind::ZeroBody);
        }
        let up_days = consecutive_up_days(window);
        let vol_ratio = volume_ratio(window, p.volume_period, VolumeRatioMode::ExcludeToday);

        if !fallbacks.is_empty() {
            debug!(stock = %stock_id, date = %as_of, fallbacks = ?fallbacks, "degenerate indicator fallback applied");
        }

        Ok(IndicatorSet {
            as_of,
            open: today.open,
            high: today.high,
            low: today.low,
            close: today.close,
            prev_close: prev.close,
            trading_value: today.trading_value,
            change_rate: pct_change(prev.close, today.close),
            gap_rate: pct_change(prev.close, today.open),
            cci,
            cci_slope,
            cci_values: tail(&cci_all, TAIL_LEN),
            ma20,
            ma20_slope,
            ma20_values: tail(&ma_all, TAIL_LEN),
            rsi,
            macd,
            bollinger,
            candle,
            consecutive_up_days: up_days,
            volume_ratio: vol_ratio,
            fallbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::{flat_series, series_from_closes};

    #[test]
    fn required_bars_default() {
        let p = IndicatorParams::default();
        assert_eq!(p.cci_slope_period, 2);
        assert_eq!(p.ma_slope_period, 3);
        assert_eq!(p.required_bars(), 20);
    }

    #[test]
    fn twenty_bars_are_enough() {
        let closes: Vec<f64> = (0..20).map(|i| 1000.0 * 1.01f64.powi(i)).collect();
        let s = series_from_closes("MIN", &closes);
        let last = s.bars().last().unwrap().date;
        let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), last).unwrap();
        assert!(set.fallbacks.contains(&FallbackKind::MaWarmUp));
        assert!(set.ma20_slope > 1.0, "slope {}", set.ma20_slope);
        assert_eq!(set.ma20_values.len(), 1);

        let err = IndicatorEngine::default()
            .compute(s.stock_id(), &s.bars()[1..], last)
            .unwrap_err();
        assert!(matches!(err, ScreenError::InsufficientData { required: 20, available: 19, .. }));
    }

    #[test]
    fn full_ma_history_skips_warm_up() {
        let closes: Vec<f64> = (0..22).map(|i| 1000.0 * 1.01f64.powi(i)).collect();
        let s = series_from_closes("FULL", &closes);
        let last = s.bars().last().unwrap().date;
        let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), last).unwrap();
        assert!(!set.fallbacks.contains(&FallbackKind::MaWarmUp));
        assert!((set.ma20_slope - (1.01f64.powi(2) - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_uses_fallbacks() {
        let s = flat_series("FLAT", 10_000.0, 30);
        let last = s.bars().last().unwrap().date;
        let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), last).unwrap();
        assert_eq!(set.cci, 0.0);
        assert_eq!(set.rsi, Some(100.0));
        assert_eq!(set.change_rate, 0.0);
        assert!(set.fallbacks.contains(&FallbackKind::CciFlat));
        assert!(set.fallbacks.contains(&FallbackKind::RsiNoLoss));
        assert!(set.fallbacks.contains(&FallbackKind::ZeroBody));
        assert!(set.macd.is_none());
    }

    #[test]
    fn rejects_short_window() {
        let s = flat_series("S", 100.0, 10);
        let last = s.bars().last().unwrap().date;
        let err = IndicatorEngine::default().compute(s.stock_id(), s.bars(), last).unwrap_err();
        assert_eq!(
            err,
            ScreenError::InsufficientData {
                stock_id: StockId::new("S"),
                required: 20,
                available: 10
            }
        );
    }

    #[test]
    fn rejects_wrong_end_date() {
        let s = flat_series("S", 100.0, 30);
        let wrong = s.bars()[10].date;
        let err = IndicatorEngine::default().compute(s.stock_id(), s.bars(), wrong).unwrap_err();
        assert!(matches!(err, ScreenError::UpstreamData { .. }));
    }

    #[test]
    fn compounding_series_metrics() {
        let closes: Vec<f64> = (0..60).map(|i| 1000.0 * 1.01f64.powi(i)).collect();
        let s = series_from_closes("UP", &closes);
        let last = s.bars().last().unwrap().date;
        let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), last).unwrap();
        assert!((set.change_rate - 1.0).abs() < 1e-9);
        assert!(set.ma20_slope > 1.9);
        assert!(set.candle.is_bullish);
        assert_eq!(set.consecutive_up_days, 59);
        assert_eq!(set.ma20_rising_days(), 4);
        assert!(set.macd.is_some());
        assert_eq!(set.cci_values.len(), 5);
        assert_eq!(*set.cci_values.last().unwrap(), set.cci);
    }

    #[test]
    fn compute_is_deterministic() {
        let closes: Vec<f64> = (0..60).map(|i| 500.0 + ((i * 37) % 11) as f64 * 3.0).collect();
        let s = series_from_closes("D", &closes);
        let last = s.bars().last().unwrap().date;
        let engine = IndicatorEngine::default();
        let a = engine.compute(s.stock_id(), s.bars(), last).unwrap();
        let b = engine.compute(s.stock_id(), s.bars(), last).unwrap();
        assert_eq!(a, b);
    }
}
