// =============================================================================
// Real-time screener — one paced provider call per stock, then evaluate
// =============================================================================
//
// Runs sequentially on the tokio runtime:
//   1. Freeze the weight snapshot (failure here fails the whole batch).
//   2. Resolve the universe for the date.
//   3. Per stock: pace, fetch with retries, evaluate through the shared
//      context. A failing stock is recorded and skipped.
//   4. Rank, upsert every record as `realtime`, flush.
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::batch::{BatchBuilder, BatchResult, BatchStatus};
use super::context::ScreeningContext;
use super::market::GlobalMarketFeed;
use super::provider::PriceProvider;
use super::rate_limit::{with_retries, MinIntervalLimiter, RetryPolicy};
use super::store::ResultStore;
use super::universe::UniverseResolver;
use crate::error::ScreenError;
use crate::runtime_config::ScreenerConfig;
use crate::types::DataSource;
use crate::weights::WeightStore;

pub struct RealtimeScreener {
    config: ScreenerConfig,
    provider: Arc<dyn PriceProvider>,
    weights: Arc<dyn WeightStore>,
    results: Arc<dyn ResultStore>,
    universe: UniverseResolver,
    global_feed: Option<Arc<dyn GlobalMarketFeed>>,
    limiter: MinIntervalLimiter,
    retry: RetryPolicy,
}

impl RealtimeScreener {
    pub fn new(
        config: ScreenerConfig,
        provider: Arc<dyn PriceProvider>,
        weights: Arc<dyn WeightStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        let limiter = MinIntervalLimiter::new(config.realtime.min_call_interval());
        let retry = config.realtime.retry_policy();
        let universe = UniverseResolver::new(config.universe.clone());
        Self {
            config,
            provider,
            weights,
            results,
            universe,
            global_feed: None,
            limiter,
            retry,
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

    pub async fn run(&self, as_of: NaiveDate) -> BatchResult {
        // ── Step 1: frozen weights ──────────────────────────────────────
        let snapshot = match self.weights.snapshot() {
            Ok(s) => s,
            Err(e) => {
                error!(date = %as_of, error = %e, "realtime batch aborted: weights unavailable");
                return BatchResult::failed(as_of, DataSource::Realtime, &e);
            }
        };
        let ctx = ScreeningContext::from_config(&self.config, snapshot, self.global_feed.clone());

        // ── Step 2: universe ────────────────────────────────────────────
        let candidates = match self.provider.candidates(as_of).await {
            Ok(c) => c,
            Err(e) => {
                error!(date = %as_of, error = %e, "realtime batch aborted: no candidate list");
                return BatchResult::failed(as_of, DataSource::Realtime, format!("candidate list: {e}"));
            }
        };
        let universe = self.universe.resolve(as_of, &candidates);
        info!(
            date = %as_of,
            source = ?universe.source,
            stocks = universe.stock_ids.len(),
            weights_version = ctx.weights_version(),
            "realtime batch started"
        );

        // ── Step 3: per-stock evaluation ────────────────────────────────
        let market_adjustment = ctx.market_adjustment(as_of);
        let mut batch = BatchBuilder::new(as_of, DataSource::Realtime, ctx.weights_version(), market_adjustment);
        let bars = ctx.lookback().window_len();
        for stock_id in &universe.stock_ids {
            let fetched = with_retries(&self.retry, stock_id, move || async move {
                self.limiter.acquire().await;
                self.provider.fetch_series(stock_id, as_of, bars).await
            })
            .await;

            let outcome = fetched
                .map_err(|source| ScreenError::Provider {
                    stock_id: stock_id.clone(),
                    source,
                })
                .and_then(|series| ctx.evaluate(&series, as_of));
            batch.record(stock_id, outcome);
        }

        // ── Step 4: rank + persist ──────────────────────────────────────
        let (mut result, records) = batch.finish(self.config.top_k);
        for record in records {
            self.results.upsert(record);
        }
        if let Err(e) = self.results.flush() {
            error!(date = %as_of, error = %e, "realtime results not persisted");
            result.status = BatchStatus::Failed;
            result.fatal_error = Some(e.to_string());
        }

        if result.status != BatchStatus::Success {
            warn!(
                date = %as_of,
                status = %result.status,
                failed = result.failed_count,
                "realtime batch finished with failures"
            );
        }
        info!(
            date = %as_of,
            status = %result.status,
            total = result.total_count,
            failed = result.failed_count,
            excluded = result.excluded_count,
            top = ?result.top.iter().map(|s| s.stock_id.as_str()).collect::<Vec<_>>(),
            "realtime batch complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::screening::provider::InMemoryPriceProvider;
    use crate::screening::store::InMemoryResultStore;
    use crate::screening::universe::UniverseCandidate;
    use crate::types::test_support::series_from_closes;
    use crate::types::{PriceSeries, StockId};
    use crate::weights::{LedgerWeightStore, WeightAuditRecord, WeightBounds, WeightChange, WeightSnapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn fast_config() -> ScreenerConfig {
        let mut cfg = ScreenerConfig::default();
        cfg.realtime.min_call_interval_ms = 0;
        cfg.realtime.retry_base_delay_ms = 1;
        cfg
    }

    fn rising(id: &str, n: usize, step: f64) -> PriceSeries {
        let closes: Vec<f64> = (0..n).map(|i| 1000.0 * step.powi(i as i32)).collect();
        series_from_closes(id, &closes)
    }

    fn universe_of(as_of: NaiveDate, ids: &[&str]) -> UniverseResolver {
        let mut u = UniverseResolver::default();
        u.add_snapshot(as_of, ids.iter().map(|s| StockId::new(*s)));
        u
    }

    /// Times out twice for one stock before answering.
    struct FlakyProvider {
        inner: InMemoryPriceProvider,
        flaky: StockId,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl PriceProvider for FlakyProvider {
        async fn candidates(&self, date: NaiveDate) -> Result<Vec<UniverseCandidate>, ProviderError> {
            self.inner.candidates(date).await
        }

        async fn fetch_series(
            &self,
            stock_id: &StockId,
            as_of: NaiveDate,
            bars: usize,
        ) -> Result<PriceSeries, ProviderError> {
            if *stock_id == self.flaky
                && self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(ProviderError::Timeout);
            }
            self.inner.fetch_series(stock_id, as_of, bars).await
        }
    }

    struct BrokenWeights;

    impl WeightStore for BrokenWeights {
        fn snapshot(&self) -> Result<WeightSnapshot, ScreenError> {
            Err(ScreenError::WeightsUnavailable("ledger corrupt".into()))
        }
        fn commit(&self, _: Uuid, _: Vec<WeightChange>) -> Result<u64, ScreenError> {
            Err(ScreenError::WeightsUnavailable("ledger corrupt".into()))
        }
        fn audit_trail(&self) -> Vec<WeightAuditRecord> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn partial_batch_retries_and_skips() {
        let a = rising("A", 70, 1.01);
        let as_of = a.bars()[69].date;
        let provider = FlakyProvider {
            inner: InMemoryPriceProvider::new([a, rising("B", 70, 1.02), rising("SHORT", 10, 1.01)]),
            flaky: StockId::new("B"),
            failures_left: AtomicU32::new(2),
        };
        let results = Arc::new(InMemoryResultStore::new());
        let screener = RealtimeScreener::new(
            fast_config(),
            Arc::new(provider),
            Arc::new(LedgerWeightStore::in_memory(WeightBounds::default())),
            results.clone(),
        )
        .with_universe(universe_of(as_of, &["A", "B", "MISSING", "SHORT"]));

        let result = screener.run(as_of).await;
        assert_eq!(result.status, BatchStatus::Partial);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.failed_count, 2);
        let kinds: Vec<&str> = result.failures.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(kinds, vec!["provider", "insufficient_data"]);

        let stored = results.get(as_of, &StockId::new("B")).unwrap();
        assert_eq!(stored.source, DataSource::Realtime);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn weights_failure_fails_batch() {
        let a = rising("A", 70, 1.01);
        let as_of = a.bars()[69].date;
        let results = Arc::new(InMemoryResultStore::new());
        let screener = RealtimeScreener::new(
            fast_config(),
            Arc::new(InMemoryPriceProvider::new([a])),
            Arc::new(BrokenWeights),
            results.clone(),
        );
        let result = screener.run(as_of).await;
        assert_eq!(result.status, BatchStatus::Failed);
        assert!(result.fatal_error.unwrap().contains("ledger corrupt"));
        assert!(results.is_empty());
    }
}
