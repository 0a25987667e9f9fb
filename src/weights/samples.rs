// =============================================================================
// Correlation samples — stored scores joined with next-session outcomes
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::screening::store::ScoreRecord;
use crate::types::StockId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSample {
    pub indicator: String,
    pub sub_score: f64,
    pub forward_return: f64,
    pub eval_date: NaiveDate,
}

/// Forward-return source keyed by (stock, evaluation date).
pub trait OutcomeFeed: Send + Sync {
    /// Next-session return in percent for a pick made on `eval_date`.
    fn forward_return(&self, stock_id: &StockId, eval_date: NaiveDate) -> Option<f64>;
}

/// Next-open gap in percent relative to the evaluation-day close.
pub fn gap_return(close: f64, next_open: f64) -> Option<f64> {
    if close <= 0.0 || !close.is_finite() || !next_open.is_finite() {
        return None;
    }
    Some((next_open - close) / close * 100.0)
}

/// One observed outcome row as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub stock_id: StockId,
    pub eval_date: NaiveDate,
    pub close: f64,
    pub next_open: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOutcomeFeed {
    returns: HashMap<(StockId, NaiveDate), f64>,
}

impl InMemoryOutcomeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stock_id: StockId, eval_date: NaiveDate, forward_return: f64) {
        self.returns.insert((stock_id, eval_date), forward_return);
    }

    pub fn from_rows(rows: &[OutcomeRow]) -> Self {
        let mut feed = Self::new();
        for r in rows {
            if let Some(ret) = gap_return(r.close, r.next_open) {
                feed.insert(r.stock_id.clone(), r.eval_date, ret);
            }
        }
        feed
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let rows: Vec<OutcomeRow> = crate::persist::load_json(path)?;
        Ok(Self::from_rows(&rows))
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

impl OutcomeFeed for InMemoryOutcomeFeed {
    fn forward_return(&self, stock_id: &StockId, eval_date: NaiveDate) -> Option<f64> {
        self.returns.get(&(stock_id.clone(), eval_date)).copied()
    }
}

/// One sample per sub-score of every record that has an outcome.
///
/// With `top_k = Some(k)` only records ranked 1..=k contribute.
pub fn collect_samples(
    records: &[ScoreRecord],
    feed: &dyn OutcomeFeed,
    top_k: Option<usize>,
) -> Vec<CorrelationSample> {
    records
        .iter()
        .filter(|r| match top_k {
            Some(k) => r.score.rank >= 1 && r.score.rank <= k,
            None => true,
        })
        .filter_map(|r| {
            feed.forward_return(&r.stock_id, r.eval_date)
                .map(|ret| (r, ret))
        })
        .flat_map(|(r, ret)| {
            r.score.detail.sub_scores.iter().map(move |s| CorrelationSample {
                indicator: s.indicator.clone(),
                sub_score: s.score,
                forward_return: ret,
                eval_date: r.eval_date,
            })
        })
        .collect()
}
