// =============================================================================
// Weight ledger — versioned, append-only audit log of weight changes
// =============================================================================
//
// The current weight of an indicator is the `new_weight` of its latest audit
// record, or the initial weight when it has none. Scoring runs read an
// immutable `WeightSnapshot`; a commit swaps in a new snapshot and never
// touches one already handed out.
//
// Commits are all-or-nothing: every change is validated, and for file-backed
// ledgers the new ledger is persisted, before the in-memory state moves.
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::vector::{WeightBounds, WeightVector};
use crate::error::ScreenError;
use crate::persist::{load_json, save_json_atomic};

/// One proposed weight change, before it is stamped into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightChange {
    pub indicator: String,
    pub old_weight: f64,
    pub new_weight: f64,
    pub correlation: f64,
    pub sample_size: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAuditRecord {
    pub id: Uuid,
    pub cycle_id: Uuid,
    /// Ledger version this record belongs to; one version per commit.
    pub version: u64,
    pub indicator: String,
    pub old_weight: f64,
    pub new_weight: f64,
    pub correlation: f64,
    pub sample_size: usize,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLedger {
    #[serde(default)]
    pub bounds: WeightBounds,
    #[serde(default)]
    pub records: Vec<WeightAuditRecord>,
}

impl WeightLedger {
    pub fn new(bounds: WeightBounds) -> Self {
        Self {
            bounds,
            records: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.records.last().map(|r| r.version).unwrap_or(0)
    }

    /// Replays the log: latest record per indicator wins.
    pub fn current(&self) -> WeightVector {
        let mut w = WeightVector::new(self.bounds);
        for r in &self.records {
            w.set(r.indicator.clone(), r.new_weight);
        }
        w
    }

    fn validate(&self, changes: &[WeightChange]) -> Result<(), ScreenError> {
        for c in changes {
            if c.indicator.is_empty() {
                return Err(ScreenError::Persistence("weight change without indicator".into()));
            }
            if !c.new_weight.is_finite() || c.new_weight < self.bounds.min || c.new_weight > self.bounds.max {
                return Err(ScreenError::Persistence(format!(
                    "weight {} for {} outside [{}, {}]",
                    c.new_weight, c.indicator, self.bounds.min, self.bounds.max
                )));
            }
        }
        Ok(())
    }

    /// Ledger with `changes` appended as one new version.
    fn appended(&self, cycle_id: Uuid, changes: Vec<WeightChange>) -> Result<Self, ScreenError> {
        self.validate(&changes)?;
        let version = self.version() + 1;
        let timestamp = Utc::now();
        let mut next = self.clone();
        next.records.extend(changes.into_iter().map(|c| WeightAuditRecord {
            id: Uuid::new_v4(),
            cycle_id,
            version,
            indicator: c.indicator,
            old_weight: c.old_weight,
            new_weight: c.new_weight,
            correlation: c.correlation,
            sample_size: c.sample_size,
            reason: c.reason,
            timestamp,
        }));
        Ok(next)
    }
}

/// Immutable view of the weights at one ledger version.
#[derive(Debug, Clone)]
pub struct WeightSnapshot {
    pub version: u64,
    pub weights: Arc<WeightVector>,
}

pub trait WeightStore: Send + Sync {
    fn snapshot(&self) -> Result<WeightSnapshot, ScreenError>;

    /// Appends all changes as one version, or none of them. Returns the new
    /// version (the current one when `changes` is empty).
    fn commit(&self, cycle_id: Uuid, changes: Vec<WeightChange>) -> Result<u64, ScreenError>;

    fn audit_trail(&self) -> Vec<WeightAuditRecord>;
}

struct LedgerState {
    ledger: WeightLedger,
    snapshot: WeightSnapshot,
}

impl LedgerState {
    fn new(ledger: WeightLedger) -> Self {
        let snapshot = WeightSnapshot {
            version: ledger.version(),
            weights: Arc::new(ledger.current()),
        };
        Self { ledger, snapshot }
    }
}

/// Ledger-backed weight store, optionally persisted to a JSON file.
pub struct LedgerWeightStore {
    path: Option<PathBuf>,
    state: RwLock<LedgerState>,
}

impl LedgerWeightStore {
    pub fn in_memory(bounds: WeightBounds) -> Self {
        Self {
            path: None,
            state: RwLock::new(LedgerState::new(WeightLedger::new(bounds))),
        }
    }

    /// Opens the ledger at `path`, starting an empty one if the file does not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>, bounds: WeightBounds) -> Result<Self, ScreenError> {
        let path = path.as_ref().to_path_buf();
        let ledger = if path.exists() {
            let mut ledger: WeightLedger = load_json(&path)
                .map_err(|e| ScreenError::WeightsUnavailable(format!("{e:#}")))?;
            ledger.bounds = bounds;
            ledger
        } else {
            WeightLedger::new(bounds)
        };
        info!(
            path = %path.display(),
            version = ledger.version(),
            records = ledger.records.len(),
            "weight ledger opened"
        );
        Ok(Self {
            path: Some(path),
            state: RwLock::new(LedgerState::new(ledger)),
        })
    }
}

impl WeightStore for LedgerWeightStore {
    fn snapshot(&self) -> Result<WeightSnapshot, ScreenError> {
        Ok(self.state.read().snapshot.clone())
    }

    fn commit(&self, cycle_id: Uuid, changes: Vec<WeightChange>) -> Result<u64, ScreenError> {
        let mut state = self.state.write();
        if changes.is_empty() {
            return Ok(state.ledger.version());
        }

        let count = changes.len();
        let next = state.ledger.appended(cycle_id, changes)?;
        if let Some(path) = &self.path {
            save_json_atomic(path, &next).map_err(|e| ScreenError::Persistence(format!("{e:#}")))?;
        }
        *state = LedgerState::new(next);

        info!(
            cycle = %cycle_id,
            version = state.snapshot.version,
            changes = count,
            "weight ledger committed"
        );
        Ok(state.snapshot.version)
    }

    fn audit_trail(&self) -> Vec<WeightAuditRecord> {
        self.state.read().ledger.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(indicator: &str, old: f64, new: f64) -> WeightChange {
        WeightChange {
            indicator: indicator.into(),
            old_weight: old,
            new_weight: new,
            correlation: 0.3,
            sample_size: 40,
            reason: "test".into(),
        }
    }

    #[test]
    fn fresh_store_uses_defaults() {
        let store = LedgerWeightStore::in_memory(WeightBounds::default());
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.version, 0);
        assert_eq!(snap.weights.get("cci_value"), 1.0);
        assert!(store.audit_trail().is_empty());
    }

    #[test]
    fn commit_appends_and_latest_wins() {
        let store = LedgerWeightStore::in_memory(WeightBounds::default());
        let c1 = Uuid::new_v4();
        assert_eq!(store.commit(c1, vec![change("cci_value", 1.0, 1.1)]).unwrap(), 1);
        let c2 = Uuid::new_v4();
        assert_eq!(store.commit(c2, vec![change("cci_value", 1.1, 1.2), change("volume", 1.0, 0.9)]).unwrap(), 2);

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.version, 2);
        assert!((snap.weights.get("cci_value") - 1.2).abs() < 1e-12);
        assert!((snap.weights.get("volume") - 0.9).abs() < 1e-12);

        let trail = store.audit_trail();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].cycle_id, c1);
        assert_eq!(trail[2].version, 2);
    }

    #[test]
    fn snapshot_is_frozen_across_commits() {
        let store = LedgerWeightStore::in_memory(WeightBounds::default());
        let before = store.snapshot().unwrap();
        store.commit(Uuid::new_v4(), vec![change("candle", 1.0, 2.0)]).unwrap();
        assert_eq!(before.weights.get("candle"), 1.0);
        assert_eq!(store.snapshot().unwrap().weights.get("candle"), 2.0);
    }

    #[test]
    fn invalid_change_rejects_whole_commit() {
        let store = LedgerWeightStore::in_memory(WeightBounds::default());
        let err = store
            .commit(Uuid::new_v4(), vec![change("a", 1.0, 1.1), change("b", 1.0, 9.0)])
            .unwrap_err();
        assert!(matches!(err, ScreenError::Persistence(_)));
        assert!(store.audit_trail().is_empty());
        assert_eq!(store.snapshot().unwrap().version, 0);
    }

    #[test]
    fn file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        {
            let store = LedgerWeightStore::open(&path, WeightBounds::default()).unwrap();
            store.commit(Uuid::new_v4(), vec![change("ma20_slope", 1.0, 1.15)]).unwrap();
        }
        let store = LedgerWeightStore::open(&path, WeightBounds::default()).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.version, 1);
        assert!((snap.weights.get("ma20_slope") - 1.15).abs() < 1e-12);
    }

    #[test]
    fn corrupt_ledger_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = LedgerWeightStore::open(&path, WeightBounds::default()).err().unwrap();
        assert!(matches!(err, ScreenError::WeightsUnavailable(_)));
    }
}
