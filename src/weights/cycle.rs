// =============================================================================
// Calibration cycle — stored scores + outcomes -> committed weight changes
// =============================================================================
//
//   1. Freeze the current weight snapshot.
//   2. Take the last `window_days` evaluation dates strictly before `as_of`.
//   3. Join their records with the outcome feed (top-K only when configured).
//   4. Calibrate against the frozen weights.
//   5. Commit all changes as one ledger version, or none.
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::calibrator::{CalibrationOutcome, WeightCalibrator};
use super::samples::{collect_samples, OutcomeFeed};
use super::store::WeightStore;
use crate::error::ScreenError;
use crate::screening::store::ResultStore;

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub as_of: NaiveDate,
    pub base_version: u64,
    pub committed_version: u64,
    pub dates_used: Vec<NaiveDate>,
    pub record_count: usize,
    pub sample_count: usize,
    pub outcome: CalibrationOutcome,
}

pub struct CalibrationCycle {
    calibrator: WeightCalibrator,
    weights: Arc<dyn WeightStore>,
    results: Arc<dyn ResultStore>,
    top_k: usize,
}

impl CalibrationCycle {
    pub fn new(
        calibrator: WeightCalibrator,
        weights: Arc<dyn WeightStore>,
        results: Arc<dyn ResultStore>,
        top_k: usize,
    ) -> Self {
        Self {
            calibrator,
            weights,
            results,
            top_k,
        }
    }

    pub fn run(&self, as_of: NaiveDate, feed: &dyn OutcomeFeed) -> Result<CycleReport, ScreenError> {
        let cfg = self.calibrator.config();
        let snapshot = self.weights.snapshot()?;

        let mut dates: Vec<NaiveDate> = self.results.dates().into_iter().filter(|d| *d < as_of).collect();
        let skip = dates.len().saturating_sub(cfg.window_days);
        dates.drain(..skip);

        let records = match (dates.first(), dates.last()) {
            (Some(&from), Some(&to)) => self.results.records_between(from, to),
            _ => Vec::new(),
        };
        let top_k = cfg.top_k_only.then_some(self.top_k);
        let samples = collect_samples(&records, feed, top_k);

        let outcome = self.calibrator.calibrate(&samples, &snapshot.weights);

        let cycle_id = Uuid::new_v4();
        let committed_version = self.weights.commit(cycle_id, outcome.changes.clone())?;

        info!(
            cycle = %cycle_id,
            %as_of,
            dates = dates.len(),
            records = records.len(),
            samples = samples.len(),
            base_version = snapshot.version,
            committed_version,
            changes = outcome.changes.len(),
            "calibration cycle finished"
        );

        Ok(CycleReport {
            cycle_id,
            as_of,
            base_version: snapshot.version,
            committed_version,
            dates_used: dates,
            record_count: records.len(),
            sample_count: samples.len(),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::store::test_support::record;
    use crate::screening::store::InMemoryResultStore;
    use crate::types::{DataSource, StockId};
    use crate::weights::samples::InMemoryOutcomeFeed;
    use crate::weights::store::LedgerWeightStore;
    use crate::weights::vector::WeightBounds;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn cycle(results: Arc<InMemoryResultStore>, weights: Arc<LedgerWeightStore>) -> CalibrationCycle {
        CalibrationCycle::new(WeightCalibrator::default(), weights, results, 5)
    }

    #[test]
    fn too_few_samples_commits_nothing() {
        let results = Arc::new(InMemoryResultStore::new());
        let weights = Arc::new(LedgerWeightStore::in_memory(WeightBounds::default()));
        let mut feed = InMemoryOutcomeFeed::new();
        for d in 1..=5 {
            results.upsert(record("A", day(d), DataSource::Realtime, 1));
            feed.insert(StockId::new("A"), day(d), 1.0);
        }

        let report = cycle(results, weights.clone()).run(day(20), &feed).unwrap();
        assert!(report.outcome.is_noop());
        assert_eq!(report.committed_version, 0);
        assert_eq!(report.sample_count, 30);
        assert!(weights.audit_trail().is_empty());
    }

    #[test]
    fn window_excludes_as_of_and_older_dates() {
        let results = Arc::new(InMemoryResultStore::new());
        let weights = Arc::new(LedgerWeightStore::in_memory(WeightBounds::default()));
        for d in 1..=10 {
            results.upsert(record("A", day(d), DataSource::Realtime, 1));
        }
        let calibrator = WeightCalibrator::new(crate::weights::CalibrationConfig {
            window_days: 3,
            ..Default::default()
        });
        let report = CalibrationCycle::new(calibrator, weights, results, 5)
            .run(day(9), &InMemoryOutcomeFeed::new())
            .unwrap();
        assert_eq!(report.dates_used, vec![day(6), day(7), day(8)]);
        assert_eq!(report.record_count, 3);
        assert_eq!(report.sample_count, 0);
    }
}
