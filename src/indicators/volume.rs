// =============================================================================
// Volume ratio
// =============================================================================
//
// One function, two explicit modes. Scoring only ever uses `ExcludeToday`;
// `IncludeToday` exists for display.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeRatioMode {
    /// Today's volume over the average of the prior `period - 1` bars.
    ExcludeToday,
    /// Today's volume over the average of the last `period` bars.
    IncludeToday,
}

/// Neutral ratio returned when there is no usable baseline.
const NEUTRAL_RATIO: f64 = 1.0;

pub fn volume_ratio(bars: &[PriceBar], period: usize, mode: VolumeRatioMode) -> f64 {
    let Some(today) = bars.last() else {
        return NEUTRAL_RATIO;
    };
    if period < 2 || bars.len() < period {
        return NEUTRAL_RATIO;
    }

    let tail = &bars[bars.len() - period..];
    let baseline = match mode {
        VolumeRatioMode::ExcludeToday => &tail[..period - 1],
        VolumeRatioMode::IncludeToday => tail,
    };

    let avg = baseline.iter().map(|b| b.volume as f64).sum::<f64>() / baseline.len() as f64;
    if avg == 0.0 {
        return NEUTRAL_RATIO;
    }
    today.volume as f64 / avg
}
