// =============================================================================
// Market-wide adjustment from the overnight global session
// =============================================================================
//
// Uses the latest global observation strictly before the evaluation date
// (US markets close before the local session opens):
//
//   NASDAQ <= crash_threshold            -> +crash_points  (rebound setup)
//   NASDAQ > 0 and USD/KRW < 0           -> +tailwind_points
//   otherwise                            -> 0
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalObservation {
    pub date: NaiveDate,
    /// NASDAQ composite daily change, percent.
    pub nasdaq_change: f64,
    /// USD/KRW daily change, percent.
    pub usdkrw_change: f64,
}

pub trait GlobalMarketFeed: Send + Sync {
    /// Latest observation dated strictly before `date`.
    fn observation_before(&self, date: NaiveDate) -> Option<GlobalObservation>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGlobalFeed {
    observations: BTreeMap<NaiveDate, GlobalObservation>,
}

impl InMemoryGlobalFeed {
    pub fn new(observations: impl IntoIterator<Item = GlobalObservation>) -> Self {
        Self {
            observations: observations.into_iter().map(|o| (o.date, o)).collect(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let rows: Vec<GlobalObservation> = crate::persist::load_json(path)?;
        Ok(Self::new(rows))
    }
}

impl GlobalMarketFeed for InMemoryGlobalFeed {
    fn observation_before(&self, date: NaiveDate) -> Option<GlobalObservation> {
        self.observations.range(..date).next_back().map(|(_, o)| *o)
    }
}

fn default_true() -> bool {
    true
}
fn default_crash_threshold() -> f64 {
    -2.0
}
fn default_crash_points() -> f64 {
    5.0
}
fn default_tailwind_points() -> f64 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketAdjustmentParams {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_crash_threshold")]
    pub crash_threshold: f64,
    #[serde(default = "default_crash_points")]
    pub crash_points: f64,
    #[serde(default = "default_tailwind_points")]
    pub tailwind_points: f64,
}

impl Default for MarketAdjustmentParams {
    fn default() -> Self {
        Self {
            enabled: true,
            crash_threshold: default_crash_threshold(),
            crash_points: default_crash_points(),
            tailwind_points: default_tailwind_points(),
        }
    }
}

impl MarketAdjustmentParams {
    pub fn points_for(&self, obs: &GlobalObservation) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        if obs.nasdaq_change <= self.crash_threshold {
            self.crash_points
        } else if obs.nasdaq_change > 0.0 && obs.usdkrw_change < 0.0 {
            self.tailwind_points
        } else {
            0.0
        }
    }

    /// Adjustment for `date`; 0 without a feed or a prior observation.
    pub fn resolve(&self, feed: Option<&dyn GlobalMarketFeed>, date: NaiveDate) -> f64 {
        feed.and_then(|f| f.observation_before(date))
            .map(|obs| self.points_for(&obs))
            .unwrap_or(0.0)
    }
}
