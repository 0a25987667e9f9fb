// =============================================================================
// Universe resolution — which stocks are screened on a date
// =============================================================================
//
// A point-in-time eligibility snapshot for the date is authoritative. Without
// one, the same fallback filter runs for every caller:
//
//   1. trading value >= min_trading_value, close >= min_price
//   2. name matches none of the exclusion patterns (ETF, ETN, SPAC, ...)
//   3. min_change_rate <= change rate < max_change_rate
//   4. top `volume_top_n` by volume (ties by stock id)
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{PriceSeries, StockId};

/// Per-stock facts for the evaluation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseCandidate {
    pub stock_id: StockId,
    pub name: String,
    pub close: f64,
    pub change_rate: f64,
    pub volume: u64,
    pub trading_value: f64,
}

impl UniverseCandidate {
    /// Candidate facts from the bar on `date`; `None` if the stock has no bar
    /// that day.
    pub fn from_series(series: &PriceSeries, date: NaiveDate) -> Option<Self> {
        let bar = series.bar_on(date)?;
        let change_rate = match series.previous_bar(date) {
            Some(prev) if prev.close > 0.0 => (bar.close - prev.close) / prev.close * 100.0,
            _ => 0.0,
        };
        Some(Self {
            stock_id: series.stock_id().clone(),
            name: series.name().to_string(),
            close: bar.close,
            change_rate,
            volume: bar.volume,
            trading_value: bar.trading_value,
        })
    }
}

fn default_min_trading_value() -> f64 {
    20_000_000_000.0
}
fn default_min_price() -> f64 {
    1000.0
}
fn default_min_change_rate() -> f64 {
    1.0
}
fn default_max_change_rate() -> f64 {
    29.0
}
fn default_volume_top_n() -> usize {
    150
}
fn default_exclude_patterns() -> Vec<String> {
    [
        "KODEX", "TIGER", "KBSTAR", "ARIRANG", "HANARO", "KOSEF", "KINDEX", "TIMEFOLIO", "ETF",
        "ETN", "인버스", "레버리지", "선물", "스팩",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseFilter {
    #[serde(default = "default_min_trading_value")]
    pub min_trading_value: f64,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    #[serde(default = "default_min_change_rate")]
    pub min_change_rate: f64,
    #[serde(default = "default_max_change_rate")]
    pub max_change_rate: f64,
    #[serde(default = "default_volume_top_n")]
    pub volume_top_n: usize,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            min_trading_value: default_min_trading_value(),
            min_price: default_min_price(),
            min_change_rate: default_min_change_rate(),
            max_change_rate: default_max_change_rate(),
            volume_top_n: default_volume_top_n(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl UniverseFilter {
    fn excluded_name(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.exclude_patterns
            .iter()
            .any(|p| upper.contains(&p.to_uppercase()))
    }

    pub fn apply(&self, candidates: &[UniverseCandidate]) -> Vec<StockId> {
        let mut passed: Vec<&UniverseCandidate> = candidates
            .iter()
            .filter(|c| c.trading_value >= self.min_trading_value && c.close >= self.min_price)
            .filter(|c| !self.excluded_name(&c.name))
            .filter(|c| c.change_rate >= self.min_change_rate && c.change_rate < self.max_change_rate)
            .collect();

        passed.sort_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.stock_id.cmp(&b.stock_id)));
        passed.truncate(self.volume_top_n);

        let mut ids: Vec<StockId> = passed.into_iter().map(|c| c.stock_id.clone()).collect();
        ids.sort();
        ids
    }
}

/// Where a resolved universe came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseSource {
    Snapshot,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUniverse {
    pub source: UniverseSource,
    /// Sorted, de-duplicated.
    pub stock_ids: Vec<StockId>,
}

#[derive(Debug, Clone, Default)]
pub struct UniverseResolver {
    snapshots: BTreeMap<NaiveDate, BTreeSet<StockId>>,
    filter: UniverseFilter,
}

impl UniverseResolver {
    pub fn new(filter: UniverseFilter) -> Self {
        Self {
            snapshots: BTreeMap::new(),
            filter,
        }
    }

    pub fn add_snapshot(&mut self, date: NaiveDate, stock_ids: impl IntoIterator<Item = StockId>) {
        self.snapshots.insert(date, stock_ids.into_iter().collect());
    }

    /// Loads `{ "YYYY-MM-DD": ["id", ...], ... }`.
    pub fn load_snapshots(&mut self, path: &Path) -> anyhow::Result<usize> {
        let raw: BTreeMap<NaiveDate, Vec<StockId>> = crate::persist::load_json(path)?;
        let n = raw.len();
        for (date, ids) in raw {
            self.add_snapshot(date, ids);
        }
        Ok(n)
    }

    pub fn resolve(&self, date: NaiveDate, candidates: &[UniverseCandidate]) -> ResolvedUniverse {
        if let Some(snapshot) = self.snapshots.get(&date) {
            debug!(%date, size = snapshot.len(), "universe from eligibility snapshot");
            return ResolvedUniverse {
                source: UniverseSource::Snapshot,
                stock_ids: snapshot.iter().cloned().collect(),
            };
        }
        let stock_ids = self.filter.apply(candidates);
        debug!(%date, candidates = candidates.len(), size = stock_ids.len(), "universe from fallback filter");
        ResolvedUniverse {
            source: UniverseSource::Fallback,
            stock_ids,
        }
    }
}
