// =============================================================================
// Central Application State — screening API server
// =============================================================================
//
// Ties the stores together for the read-only HTTP surface. Reads go straight
// to the stores; the latest batch summary is kept here, either recorded in
// process or loaded from the file the last CLI run wrote.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the mutable shared fields.
//   - Stores manage their own interior mutability behind `Arc<dyn ...>`.
// =============================================================================

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::runtime_config::ScreenerConfig;
use crate::screening::{BatchResult, ResultStore, ScoreRecord};
use crate::weights::WeightStore;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Shared across all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Bumped whenever a new batch lands.
    pub state_version: AtomicU64,

    pub config: Arc<RwLock<ScreenerConfig>>,

    pub weight_store: Arc<dyn WeightStore>,
    pub result_store: Arc<dyn ResultStore>,

    pub latest_batch: RwLock<Option<BatchResult>>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ScreenerConfig, weight_store: Arc<dyn WeightStore>, result_store: Arc<dyn ResultStore>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config: Arc::new(RwLock::new(config)),
            weight_store,
            result_store,
            latest_batch: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Batches ─────────────────────────────────────────────────────────

    pub fn record_batch(&self, batch: BatchResult) {
        if let Some(err) = &batch.fatal_error {
            self.push_error(format!("{} batch {}: {err}", batch.source, batch.eval_date));
        }
        *self.latest_batch.write() = Some(batch);
        self.increment_version();
    }

    /// Records the batch saved at `path`, if there is one. Returns whether a
    /// batch was loaded.
    pub fn load_last_batch(&self, path: &Path) -> anyhow::Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let batch = BatchResult::load(path)?;
        info!(
            path = %path.display(),
            eval_date = %batch.eval_date,
            status = %batch.status,
            "last batch loaded"
        );
        self.record_batch(batch);
        Ok(true)
    }

    /// Stored records for `date`, best rank first.
    pub fn ranked_records(&self, date: NaiveDate) -> Vec<ScoreRecord> {
        let mut records = self.result_store.records_between(date, date);
        records.sort_by(|a, b| {
            a.score
                .rank
                .cmp(&b.score.rank)
                .then_with(|| a.stock_id.cmp(&b.stock_id))
        });
        records
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.result_store.dates().last().copied()
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Ring buffer capped at [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String) {
        let mut errors = self.recent_errors.write();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        errors.push(ErrorRecord {
            message: msg,
            at: chrono::Utc::now().to_rfc3339(),
        });
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
