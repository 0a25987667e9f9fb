// =============================================================================
// RSI with Wilder smoothing
// =============================================================================
//
// The first `period` deltas seed plain averages of gains and losses; every
// later delta folds in as avg = (avg * (period - 1) + x) / period. Only the
// last value is needed for scoring, so no series is kept.
//
// A window with no losses at all (a flat one included) has no defined RS and
// yields the caller's `no_loss_fallback`, 100.0 in production.
// =============================================================================

fn split(delta: f64) -> (f64, f64) {
    (delta.max(0.0), (-delta).max(0.0))
}

/// Most recent RSI value, plus whether the no-loss fallback produced it.
///
/// Returns `None` when fewer than `period + 1` closes are available or the
/// computation turns non-finite.
pub fn calculate_rsi(closes: &[f64], period: usize, no_loss_fallback: f64) -> Option<(f64, bool)> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let n = period as f64;
    let mut deltas = closes.windows(2).map(|w| w[1] - w[0]);

    let (mut gain, mut loss) = deltas
        .by_ref()
        .take(period)
        .map(split)
        .fold((0.0, 0.0), |(g, l), (up, down)| (g + up, l + down));
    gain /= n;
    loss /= n;

    for (up, down) in deltas.map(split) {
        gain = (gain * (n - 1.0) + up) / n;
        loss = (loss * (n - 1.0) + down) / n;
    }

    if loss == 0.0 {
        return Some((no_loss_fallback, true));
    }
    let rsi = 100.0 * gain / (gain + loss);
    rsi.is_finite().then_some((rsi, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_insufficient_data() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(calculate_rsi(&closes, 14, 100.0).is_none());
        assert!(calculate_rsi(&closes, 0, 100.0).is_none());
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let (v, fallback) = calculate_rsi(&closes, 14, 100.0).unwrap();
        assert!((v - 100.0).abs() < 1e-10);
        assert!(fallback);
    }

    #[test]
    fn rsi_flat_market_hits_fallback() {
        let (v, fallback) = calculate_rsi(&[100.0; 30], 14, 100.0).unwrap();
        assert!((v - 100.0).abs() < 1e-10);
        assert!(fallback);
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let (v, fallback) = calculate_rsi(&closes, 14, 100.0).unwrap();
        assert!(v.abs() < 1e-10);
        assert!(!fallback);
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let (v, _) = calculate_rsi(&closes, 14, 100.0).unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
    }
}
