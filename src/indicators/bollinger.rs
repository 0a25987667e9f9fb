// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(period), bands = middle ± k·σ with the population σ of the
// same window. Only exposed for explainability; no sub-score reads it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

/// Bollinger Bands over the last `period` closes.
///
/// Returns `None` when fewer than `period` closes are available or the result
/// is non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let n = period as f64;
    let mid = window.iter().sum::<f64>() / n;
    let sigma = (window.iter().map(|x| (x - mid) * (x - mid)).sum::<f64>() / n).sqrt();
    let half_width = num_std * sigma;

    let bands = BollingerResult {
        upper: mid + half_width,
        mid,
        lower: mid - half_width,
    };
    (bands.upper.is_finite() && bands.lower.is_finite()).then_some(bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!((bb.mid - 10.5).abs() < 1e-10);
        assert!(bb.upper > bb.mid);
        assert!(bb.lower < bb.mid);
        assert!(((bb.upper - bb.mid) - (bb.mid - bb.lower)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat_collapses() {
        let bb = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert!((bb.upper - bb.lower).abs() < 1e-10);
    }
}
