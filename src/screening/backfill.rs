// =============================================================================
// Backfill runner — historical dates scored on a bounded worker pool
// =============================================================================
//
// Every (date, stock) pair is an independent partition evaluated through the
// same `ScreeningContext` the real-time path uses, on a rayon pool of
// `num_workers` threads over read-only history. After the pool joins, each
// date is ranked and written with `insert_if_absent`, so records that already
// exist (real-time ones in particular) are never replaced.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::batch::{BatchBuilder, BatchResult};
use super::context::ScreeningContext;
use super::market::GlobalMarketFeed;
use super::store::ResultStore;
use super::universe::{UniverseCandidate, UniverseResolver};
use crate::error::ScreenError;
use crate::runtime_config::ScreenerConfig;
use crate::types::{DataSource, PriceSeries, StockId};
use crate::weights::WeightStore;

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub run_id: Uuid,
    pub weights_version: u64,
    pub date_count: usize,
    pub evaluated: usize,
    pub inserted: usize,
    /// Records left alone because one already existed for the key.
    pub kept_existing: usize,
    pub failed: usize,
    pub excluded: usize,
    pub batches: Vec<BatchResult>,
}

struct WorkItem<'a> {
    date: NaiveDate,
    stock_id: StockId,
    series: Option<&'a PriceSeries>,
}

pub struct BackfillRunner {
    config: ScreenerConfig,
    weights: Arc<dyn WeightStore>,
    results: Arc<dyn ResultStore>,
    universe: UniverseResolver,
    global_feed: Option<Arc<dyn GlobalMarketFeed>>,
}

impl BackfillRunner {
    pub fn new(config: ScreenerConfig, weights: Arc<dyn WeightStore>, results: Arc<dyn ResultStore>) -> Self {
        let universe = UniverseResolver::new(config.universe.clone());
        Self {
            config,
            weights,
            results,
            universe,
            global_feed: None,
        }
    }

    pub fn with_universe(mut self, universe: UniverseResolver) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_global_feed(mut self, feed: Arc<dyn GlobalMarketFeed>) -> Self {
        self.global_feed = Some(feed);
        self
    }

    pub fn run(&self, history: &[PriceSeries], dates: &[NaiveDate]) -> Result<BackfillReport, ScreenError> {
        let snapshot = self.weights.snapshot()?;
        let ctx = ScreeningContext::from_config(&self.config, snapshot, self.global_feed.clone());
        let dates: BTreeSet<NaiveDate> = dates.iter().copied().collect();

        let by_id: HashMap<&StockId, &PriceSeries> = history.iter().map(|s| (s.stock_id(), s)).collect();

        // ── Partition: one item per (date, universe member) ─────────────
        let mut work = Vec::new();
        let mut builders = BTreeMap::new();
        for &date in &dates {
            let candidates: Vec<UniverseCandidate> =
                history.iter().filter_map(|s| UniverseCandidate::from_series(s, date)).collect();
            let universe = self.universe.resolve(date, &candidates);
            for stock_id in universe.stock_ids {
                let series = by_id.get(&stock_id).copied();
                work.push(WorkItem { date, stock_id, series });
            }
            builders.insert(
                date,
                BatchBuilder::new(date, DataSource::Backfill, ctx.weights_version(), ctx.market_adjustment(date)),
            );
        }

        info!(
            dates = dates.len(),
            partitions = work.len(),
            workers = self.config.backfill.num_workers,
            weights_version = ctx.weights_version(),
            "backfill started"
        );

        // ── Evaluate on the bounded pool ────────────────────────────────
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.backfill.num_workers)
            .build()
            .map_err(|e| ScreenError::Config(format!("backfill worker pool: {e}")))?;

        let outcomes: Vec<_> = pool.install(|| {
            work.par_iter()
                .map(|item| {
                    let outcome = match item.series {
                        Some(series) => ctx.evaluate(series, item.date),
                        None => Err(ScreenError::UpstreamData {
                            stock_id: item.stock_id.clone(),
                            reason: "no price history".into(),
                        }),
                    };
                    (item.date, &item.stock_id, outcome)
                })
                .collect()
        });

        // ── Join: rank per date, fill gaps only ─────────────────────────
        for (date, stock_id, outcome) in outcomes {
            if let Some(b) = builders.get_mut(&date) {
                b.record(stock_id, outcome);
            }
        }

        let mut report = BackfillReport {
            run_id: Uuid::new_v4(),
            weights_version: ctx.weights_version(),
            date_count: dates.len(),
            evaluated: work.len(),
            inserted: 0,
            kept_existing: 0,
            failed: 0,
            excluded: 0,
            batches: Vec::with_capacity(builders.len()),
        };
        for (date, builder) in builders {
            let (result, records) = builder.finish(self.config.top_k);
            let mut inserted = 0;
            for record in records {
                if self.results.insert_if_absent(record) {
                    inserted += 1;
                } else {
                    report.kept_existing += 1;
                }
            }
            info!(
                %date,
                status = %result.status,
                scored = result.total_count,
                inserted,
                failed = result.failed_count,
                "backfill date complete"
            );
            report.inserted += inserted;
            report.failed += result.failed_count;
            report.excluded += result.excluded_count;
            report.batches.push(result);
        }

        self.results.flush()?;

        if report.kept_existing > 0 {
            warn!(kept = report.kept_existing, "backfill left existing records untouched");
        }
        info!(
            dates = report.date_count,
            evaluated = report.evaluated,
            inserted = report.inserted,
            failed = report.failed,
            "backfill complete"
        );
        Ok(report)
    }
}
