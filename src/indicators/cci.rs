// =============================================================================
// Commodity Channel Index (CCI)
// =============================================================================
//
//   TP      = (high + low + close) / 3
//   CCI     = (TP - SMA(TP, n)) / (0.015 * MeanAbsDev(TP, n))
//
// A flat window has MeanAbsDev = 0; the caller-supplied fallback is returned
// for that bar instead of dividing by zero.
// =============================================================================

use crate::types::PriceBar;

/// Lambert's constant.
const CCI_SCALE: f64 = 0.015;

/// CCI series over `bars`, one value per bar starting at index `period - 1`.
///
/// The second element of the tuple counts how many values used `flat_fallback`.
pub fn cci_series(bars: &[PriceBar], period: usize, flat_fallback: f64) -> (Vec<f64>, usize) {
    if period == 0 || bars.len() < period {
        return (Vec::new(), 0);
    }

    let tp: Vec<f64> = bars.iter().map(PriceBar::typical_price).collect();
    let p = period as f64;
    let mut fallbacks = 0;

    let values = tp
        .windows(period)
        .map(|w| {
            let mean = w.iter().sum::<f64>() / p;
            let mean_dev = w.iter().map(|x| (x - mean).abs()).sum::<f64>() / p;
            let current = w[period - 1];
            if mean_dev == 0.0 {
                fallbacks += 1;
                flat_fallback
            } else {
                (current - mean) / (CCI_SCALE * mean_dev)
            }
        })
        .collect();

    (values, fallbacks)
}
