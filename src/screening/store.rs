// =============================================================================
// Result store — score records keyed by (evaluation date, stock)
// =============================================================================
//
// Realtime writes upsert. Backfill writes go through `insert_if_absent`, which
// checks and inserts under one write lock, so a backfill can never replace a
// record that already exists for the same key.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ScreenError;
use crate::persist::{load_json, save_json_atomic};
use crate::scoring::StockScore;
use crate::types::{DataSource, StockId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub eval_date: NaiveDate,
    pub stock_id: StockId,
    pub source: DataSource,
    pub score: StockScore,
    /// SHA-256 of the evaluation window.
    pub window_digest: String,
    pub weights_version: u64,
    pub recorded_at: DateTime<Utc>,
}

pub trait ResultStore: Send + Sync {
    fn upsert(&self, record: ScoreRecord);

    /// Inserts only when no record exists for the key. Returns whether it did.
    fn insert_if_absent(&self, record: ScoreRecord) -> bool;

    fn get(&self, date: NaiveDate, stock_id: &StockId) -> Option<ScoreRecord>;

    /// Records with `from <= eval_date <= to`, ordered by (date, stock).
    fn records_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<ScoreRecord>;

    /// Distinct evaluation dates with at least one record, ascending.
    fn dates(&self) -> Vec<NaiveDate>;

    /// Makes buffered writes durable. A no-op for purely in-memory stores.
    fn flush(&self) -> Result<(), ScreenError>;
}

#[derive(Default)]
pub struct InMemoryResultStore {
    records: RwLock<BTreeMap<(NaiveDate, StockId), ScoreRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_records(records: Vec<ScoreRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| ((r.eval_date, r.stock_id.clone()), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    fn all(&self) -> Vec<ScoreRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ResultStore for InMemoryResultStore {
    fn upsert(&self, record: ScoreRecord) {
        self.records
            .write()
            .insert((record.eval_date, record.stock_id.clone()), record);
    }

    fn insert_if_absent(&self, record: ScoreRecord) -> bool {
        let mut map = self.records.write();
        let key = (record.eval_date, record.stock_id.clone());
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, record);
        true
    }

    fn get(&self, date: NaiveDate, stock_id: &StockId) -> Option<ScoreRecord> {
        self.records.read().get(&(date, stock_id.clone())).cloned()
    }

    fn records_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<ScoreRecord> {
        if from > to {
            return Vec::new();
        }
        self.records
            .read()
            .iter()
            .filter(|((d, _), _)| *d >= from && *d <= to)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn dates(&self) -> Vec<NaiveDate> {
        self.records
            .read()
            .keys()
            .map(|(d, _)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn flush(&self) -> Result<(), ScreenError> {
        Ok(())
    }
}

/// In-memory store persisted as one JSON array on `flush`.
pub struct FileResultStore {
    path: PathBuf,
    inner: InMemoryResultStore,
}

impl FileResultStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScreenError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let records: Vec<ScoreRecord> =
                load_json(&path).map_err(|e| ScreenError::Persistence(format!("{e:#}")))?;
            InMemoryResultStore::from_records(records)
        } else {
            InMemoryResultStore::new()
        };
        info!(path = %path.display(), records = inner.len(), "result store opened");
        Ok(Self { path, inner })
    }
}

impl ResultStore for FileResultStore {
    fn upsert(&self, record: ScoreRecord) {
        self.inner.upsert(record)
    }

    fn insert_if_absent(&self, record: ScoreRecord) -> bool {
        self.inner.insert_if_absent(record)
    }

    fn get(&self, date: NaiveDate, stock_id: &StockId) -> Option<ScoreRecord> {
        self.inner.get(date, stock_id)
    }

    fn records_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<ScoreRecord> {
        self.inner.records_between(from, to)
    }

    fn dates(&self) -> Vec<NaiveDate> {
        self.inner.dates()
    }

    fn flush(&self) -> Result<(), ScreenError> {
        let records = self.inner.all();
        save_json_atomic(&self.path, &records).map_err(|e| ScreenError::Persistence(format!("{e:#}")))?;
        info!(path = %self.path.display(), records = records.len(), "result store flushed");
        Ok(())
    }
}
