// =============================================================================
// Evaluation window selection + fingerprint
// =============================================================================
//
// Both call paths cut the window here: the bars ending exactly at the
// evaluation date, `min_lookback + margin` long, or fewer as long as at least
// `min_lookback` bars exist. EMA-seeded indicators depend on where the window
// starts, so the length rule is part of the parity contract.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ScreenError;
use crate::types::{PriceBar, PriceSeries};

fn default_min_lookback() -> usize {
    20
}
fn default_margin() -> usize {
    40
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackConfig {
    /// Fewest bars a stock needs to be scored at all.
    #[serde(default = "default_min_lookback")]
    pub min_lookback: usize,
    /// Extra bars requested on top of `min_lookback`.
    #[serde(default = "default_margin")]
    pub margin: usize,
}

impl Default for LookbackConfig {
    fn default() -> Self {
        Self {
            min_lookback: default_min_lookback(),
            margin: default_margin(),
        }
    }
}

impl LookbackConfig {
    pub fn window_len(&self) -> usize {
        self.min_lookback + self.margin
    }
}

/// Bars of `series` ending at `as_of`, cut to the configured window length.
pub fn select_window<'a>(
    series: &'a PriceSeries,
    as_of: NaiveDate,
    lookback: &LookbackConfig,
) -> Result<&'a [PriceBar], ScreenError> {
    let bars = series.bars();
    let end = match series.position_of(as_of) {
        Some(idx) => idx + 1,
        None => {
            // No bar on the date: either the history stops short of it or
            // the stock did not trade. Count what exists up to the date.
            let available = bars.partition_point(|b| b.date < as_of);
            return Err(if available < lookback.min_lookback {
                ScreenError::InsufficientData {
                    stock_id: series.stock_id().clone(),
                    required: lookback.min_lookback,
                    available,
                }
            } else {
                ScreenError::UpstreamData {
                    stock_id: series.stock_id().clone(),
                    reason: format!("no bar on {as_of}"),
                }
            });
        }
    };

    if end < lookback.min_lookback {
        return Err(ScreenError::InsufficientData {
            stock_id: series.stock_id().clone(),
            required: lookback.min_lookback,
            available: end,
        });
    }

    let start = end.saturating_sub(lookback.window_len());
    Ok(&bars[start..end])
}

/// Hex SHA-256 over the window's dates and raw OHLCV bits.
pub fn window_digest(window: &[PriceBar]) -> String {
    let mut hasher = Sha256::new();
    for b in window {
        hasher.update(b.date.to_string().as_bytes());
        for v in [b.open, b.high, b.low, b.close, b.trading_value] {
            hasher.update(v.to_bits().to_le_bytes());
        }
        hasher.update(b.volume.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
