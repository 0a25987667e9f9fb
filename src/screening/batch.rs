// =============================================================================
// Batch results — one screening run for one evaluation date
// =============================================================================
//
// Status rules:
//   fatal error (e.g. weights unavailable)          -> FAILED
//   no per-stock failures                           -> SUCCESS
//   failures but at least one stock evaluated       -> PARTIAL
//   every stock failed                              -> FAILED
//
// `total_count` is the number of scored stocks.
//
// Excluded stocks (non-positive change rate) are not failures.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::context::Evaluation;
use super::store::ScoreRecord;
use crate::error::ScreenError;
use crate::persist::{load_json, save_json_atomic};
use crate::scoring::{rank_scores, top_k, StockScore};
use crate::types::{DataSource, StockId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub stock_id: StockId,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub eval_date: NaiveDate,
    pub source: DataSource,
    pub status: BatchStatus,
    /// Stocks that were scored. Failed and excluded stocks are counted
    /// separately.
    pub total_count: usize,
    pub failed_count: usize,
    pub excluded_count: usize,
    pub failures: Vec<FailureEntry>,
    /// Every scored stock, ranked.
    pub scores: Vec<StockScore>,
    pub top: Vec<StockScore>,
    pub weights_version: Option<u64>,
    pub market_adjustment: f64,
    pub fatal_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Compact view for logs and the REST surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub eval_date: NaiveDate,
    pub source: DataSource,
    pub status: BatchStatus,
    pub total_count: usize,
    pub failed_count: usize,
    pub excluded_count: usize,
    pub top: Vec<StockScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<FailureEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl BatchResult {
    /// A run that could not start at all.
    pub fn failed(eval_date: NaiveDate, source: DataSource, reason: impl std::fmt::Display) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            eval_date,
            source,
            status: BatchStatus::Failed,
            total_count: 0,
            failed_count: 0,
            excluded_count: 0,
            failures: Vec::new(),
            scores: Vec::new(),
            top: Vec::new(),
            weights_version: None,
            market_adjustment: 0.0,
            fatal_error: Some(reason.to_string()),
            started_at: now,
            finished_at: now,
        }
    }

    /// Persist the batch (write `.tmp`, then rename) so `serve` can report it.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        save_json_atomic(path, self)
            .with_context(|| format!("failed to save batch result to {}", path.display()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        load_json(path)
    }

    /// Failure detail is included only when `verbose`.
    pub fn summary(&self, verbose: bool) -> BatchSummary {
        BatchSummary {
            run_id: self.run_id,
            eval_date: self.eval_date,
            source: self.source,
            status: self.status,
            total_count: self.total_count,
            failed_count: self.failed_count,
            excluded_count: self.excluded_count,
            top: self.top.clone(),
            failures: verbose.then(|| self.failures.clone()),
            fatal_error: self.fatal_error.clone(),
        }
    }
}

fn status_for(evaluated: usize, failed: usize) -> BatchStatus {
    if failed == 0 {
        BatchStatus::Success
    } else if evaluated == 0 {
        BatchStatus::Failed
    } else {
        BatchStatus::Partial
    }
}

/// Collects per-stock outcomes for one date, then ranks them.
pub struct BatchBuilder {
    run_id: Uuid,
    eval_date: NaiveDate,
    source: DataSource,
    weights_version: u64,
    market_adjustment: f64,
    started_at: DateTime<Utc>,
    scored: Vec<StockScore>,
    digests: HashMap<StockId, String>,
    failures: Vec<FailureEntry>,
    excluded: usize,
}

impl BatchBuilder {
    pub fn new(eval_date: NaiveDate, source: DataSource, weights_version: u64, market_adjustment: f64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            eval_date,
            source,
            weights_version,
            market_adjustment,
            started_at: Utc::now(),
            scored: Vec::new(),
            digests: HashMap::new(),
            failures: Vec::new(),
            excluded: 0,
        }
    }

    pub fn record(&mut self, stock_id: &StockId, outcome: Result<Evaluation, ScreenError>) {
        match outcome {
            Ok(Evaluation::Scored(e)) => {
                self.digests.insert(e.score.stock_id.clone(), e.window_digest);
                self.scored.push(e.score);
            }
            Ok(Evaluation::Excluded { change_rate, .. }) => {
                debug!(stock = %stock_id, date = %self.eval_date, change_rate, "excluded: non-positive change");
                self.excluded += 1;
            }
            Err(e) => {
                warn!(stock = %stock_id, date = %self.eval_date, kind = e.kind(), error = %e, "stock skipped");
                self.failures.push(FailureEntry {
                    stock_id: stock_id.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Ranks the batch. Returns the result and one store record per scored
    /// stock, carrying its final rank.
    pub fn finish(mut self, top_n: usize) -> (BatchResult, Vec<ScoreRecord>) {
        rank_scores(&mut self.scored);
        self.failures.sort_by(|a, b| a.stock_id.cmp(&b.stock_id));

        let recorded_at = Utc::now();
        let records = self
            .scored
            .iter()
            .map(|s| ScoreRecord {
                eval_date: self.eval_date,
                stock_id: s.stock_id.clone(),
                source: self.source,
                score: s.clone(),
                window_digest: self.digests.remove(&s.stock_id).unwrap_or_default(),
                weights_version: self.weights_version,
                recorded_at,
            })
            .collect();

        let failed = self.failures.len();
        let total = self.scored.len();
        let result = BatchResult {
            run_id: self.run_id,
            eval_date: self.eval_date,
            source: self.source,
            status: status_for(total + self.excluded, failed),
            total_count: total,
            failed_count: failed,
            excluded_count: self.excluded,
            failures: self.failures,
            top: top_k(&self.scored, top_n),
            scores: self.scored,
            weights_version: Some(self.weights_version),
            market_adjustment: self.market_adjustment,
            fatal_error: None,
            started_at: self.started_at,
            finished_at: recorded_at,
        };
        (result, records)
    }
}
