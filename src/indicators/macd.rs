// =============================================================================
// MACD (12, 26, 9)
// =============================================================================
//
//   line   = EMA(fast) - EMA(slow)
//   signal = EMA(line, signal_period)
//   hist   = line - signal

use serde::{Deserialize, Serialize};

use super::moving_average::ema_series;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub line: f64,
    pub signal: f64,
    pub hist: f64,
}

/// Latest MACD values, or `None` when fewer than `slow + signal - 1` closes
/// are available.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    if fast == 0 || slow <= fast || signal == 0 {
        return None;
    }
    if closes.len() < slow + signal - 1 {
        return None;
    }

    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // fast_ema starts at index fast-1, slow_ema at slow-1; align on slow.
    let offset = slow - fast;
    if fast_ema.len() < offset + slow_ema.len() {
        return None;
    }
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_series = ema_series(&line, signal);
    let line_last = *line.last()?;
    let signal_last = *signal_series.last()?;

    Some(MacdResult {
        line: line_last,
        signal: signal_last,
        hist: line_last - signal_last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient() {
        let closes: Vec<f64> = (1..=33).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
    }

    #[test]
    fn macd_flat_is_zero() {
        let m = calculate_macd(&[50.0; 60], 12, 26, 9).unwrap();
        assert!(m.line.abs() < 1e-10);
        assert!(m.signal.abs() < 1e-10);
        assert!(m.hist.abs() < 1e-10);
    }

    #[test]
    fn macd_uptrend_positive_line() {
        let closes: Vec<f64> = (1..=60).map(|x| 100.0 * 1.01f64.powi(x)).collect();
        let m = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(m.line > 0.0);
        assert!((m.hist - (m.line - m.signal)).abs() < 1e-12);
    }

    #[test]
    fn macd_rejects_bad_periods() {
        assert!(calculate_macd(&[1.0; 60], 26, 12, 9).is_none());
    }
}
