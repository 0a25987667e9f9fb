// =============================================================================
// Shared types used across the screening engine
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ScreenError;

/// Exchange-level stock identifier (e.g. "005930").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockId(pub String);

impl StockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default)]
    pub trading_value: f64,
}

impl PriceBar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Typical price (H + L + C) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Checks high >= max(open, close) >= min(open, close) >= low >= 0 and
    /// finite prices / trading value.
    fn sanity_error(&self) -> Option<String> {
        let fields = [self.open, self.high, self.low, self.close, self.trading_value];
        if fields.iter().any(|v| !v.is_finite()) {
            return Some(format!("{}: non-finite price field", self.date));
        }
        let body_top = self.open.max(self.close);
        let body_bottom = self.open.min(self.close);
        if self.high < body_top {
            return Some(format!("{}: high {} below body top {}", self.date, self.high, body_top));
        }
        if self.low > body_bottom {
            return Some(format!("{}: low {} above body bottom {}", self.date, self.low, body_bottom));
        }
        if self.low < 0.0 {
            return Some(format!("{}: negative low {}", self.date, self.low));
        }
        if self.trading_value < 0.0 {
            return Some(format!("{}: negative trading value", self.date));
        }
        None
    }
}

/// Validated daily history for one stock, oldest bar first.
///
/// Dates are strictly increasing and every bar passes the OHLC sanity check.
/// The only way to build one is [`PriceSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    stock_id: StockId,
    name: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(
        stock_id: StockId,
        name: impl Into<String>,
        bars: Vec<PriceBar>,
    ) -> Result<Self, ScreenError> {
        for (i, bar) in bars.iter().enumerate() {
            if let Some(reason) = bar.sanity_error() {
                return Err(ScreenError::UpstreamData { stock_id, reason });
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(ScreenError::UpstreamData {
                    stock_id,
                    reason: format!(
                        "dates not strictly increasing at {} (previous {})",
                        bar.date,
                        bars[i - 1].date
                    ),
                });
            }
        }

        Ok(Self {
            stock_id,
            name: name.into(),
            bars,
        })
    }

    pub fn stock_id(&self) -> &StockId {
        &self.stock_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar dated exactly `date`, if present.
    pub fn bar_on(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.position_of(date).map(|i| &self.bars[i])
    }

    /// Index of the bar dated exactly `date`.
    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// The last `max_bars` bars dated on or before `as_of`.
    pub fn truncated(&self, as_of: NaiveDate, max_bars: usize) -> PriceSeries {
        let end = self.bars.partition_point(|b| b.date <= as_of);
        let start = end.saturating_sub(max_bars);
        PriceSeries {
            stock_id: self.stock_id.clone(),
            name: self.name.clone(),
            bars: self.bars[start..end].to_vec(),
        }
    }

    /// Bar immediately preceding `date`.
    pub fn previous_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        let idx = self.position_of(date)?;
        idx.checked_sub(1).map(|i| &self.bars[i])
    }
}

/// Which call path produced a stored score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Realtime,
    Backfill,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime => write!(f, "realtime"),
            Self::Backfill => write!(f, "backfill"),
        }
    }
}
