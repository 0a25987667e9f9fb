// =============================================================================
// Screening context — the single evaluation routine behind both call paths
// =============================================================================
//
// One context is built per run from one frozen weight snapshot. Real-time and
// backfill evaluations both go through `ScreeningContext::evaluate`:
//
//   window -> indicators -> hard filters -> score -> market adjustment -> grade
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDate;

use super::market::{GlobalMarketFeed, MarketAdjustmentParams};
use super::window::{select_window, window_digest, LookbackConfig};
use crate::error::ScreenError;
use crate::indicators::IndicatorEngine;
use crate::runtime_config::ScreenerConfig;
use crate::scoring::{build_policy, ScoreCalculator, StockScore};
use crate::types::{PriceSeries, StockId};
use crate::weights::WeightSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub score: StockScore,
    pub window_digest: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Scored(Box<Evaluated>),
    /// Dropped before scoring by the non-positive change-rate rule.
    Excluded { stock_id: StockId, change_rate: f64 },
}

pub struct ScreeningContext {
    engine: IndicatorEngine,
    calculator: ScoreCalculator,
    lookback: LookbackConfig,
    weights: WeightSnapshot,
    market: MarketAdjustmentParams,
    global_feed: Option<Arc<dyn GlobalMarketFeed>>,
}

impl ScreeningContext {
    pub fn new(
        engine: IndicatorEngine,
        calculator: ScoreCalculator,
        lookback: LookbackConfig,
        weights: WeightSnapshot,
    ) -> Self {
        Self {
            engine,
            calculator,
            lookback,
            weights,
            market: MarketAdjustmentParams::default(),
            global_feed: None,
        }
    }

    pub fn from_config(
        config: &ScreenerConfig,
        weights: WeightSnapshot,
        global_feed: Option<Arc<dyn GlobalMarketFeed>>,
    ) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone(), config.fallbacks);
        let policy = build_policy(config.scoring.policy, &config.scoring.region);
        let calculator = ScoreCalculator::new(policy, config.grades);
        Self::new(engine, calculator, config.lookback, weights)
            .with_market(config.market_adjustment, global_feed)
    }

    pub fn with_market(
        mut self,
        params: MarketAdjustmentParams,
        feed: Option<Arc<dyn GlobalMarketFeed>>,
    ) -> Self {
        self.market = params;
        self.global_feed = feed;
        self
    }

    pub fn lookback(&self) -> &LookbackConfig {
        &self.lookback
    }

    pub fn weights_version(&self) -> u64 {
        self.weights.version
    }

    pub fn market_adjustment(&self, date: NaiveDate) -> f64 {
        self.market.resolve(self.global_feed.as_deref(), date)
    }

    pub fn evaluate(&self, series: &PriceSeries, as_of: NaiveDate) -> Result<Evaluation, ScreenError> {
        let window = select_window(series, as_of, &self.lookback)?;
        let set = self.engine.compute(series.stock_id(), window, as_of)?;

        if set.change_rate <= 0.0 {
            return Ok(Evaluation::Excluded {
                stock_id: series.stock_id().clone(),
                change_rate: set.change_rate,
            });
        }

        let detail = self
            .calculator
            .score(&set, &self.weights.weights)
            .with_market_adjustment(self.market_adjustment(as_of));
        let score = self
            .calculator
            .to_stock_score(series.stock_id(), series.name(), &set, detail);

        Ok(Evaluation::Scored(Box::new(Evaluated {
            score,
            window_digest: window_digest(window),
        })))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::screening::market::{GlobalObservation, InMemoryGlobalFeed};
    use crate::types::test_support::{flat_series, series_from_closes};

    fn rising(id: &str, n: usize) -> PriceSeries {
        let closes: Vec<f64> = (0..n).map(|i| 1000.0 * 1.01f64.powi(i as i32)).collect();
        series_from_closes(id, &closes)
    }

    #[test]
    fn scores_rising_stock() {
        let s = rising("UP", 70);
        let d = s.bars()[69].date;
        match context().evaluate(&s, d).unwrap() {
            Evaluation::Scored(e) => {
                assert!(e.score.total_score > 0.0);
                assert!(e.score.detail.sub_score("ma20_slope").is_some());
                assert_eq!(e.score.rank, 0);
                assert_eq!(e.window_digest.len(), 64);
            }
            other => panic!("expected a score, got {other:?}"),
        }
    }

    #[test]
    fn flat_stock_is_excluded_not_failed() {
        let s = flat_series("FLAT", 10_000.0, 30);
        let d = s.bars()[29].date;
        let e = context().evaluate(&s, d).unwrap();
        assert!(matches!(e, Evaluation::Excluded { change_rate, .. } if change_rate == 0.0));
    }

    #[test]
    fn short_history_fails() {
        let s = rising("SHORT", 15);
        let d = s.bars()[14].date;
        assert!(matches!(
            context().evaluate(&s, d),
            Err(ScreenError::InsufficientData { .. })
        ));
    }

    #[test]
    fn market_adjustment_flows_into_total() {
        let s = rising("UP", 70);
        let d = s.bars()[69].date;
        let feed: Arc<dyn GlobalMarketFeed> = Arc::new(InMemoryGlobalFeed::new([GlobalObservation {
            date: d - chrono::Duration::days(1),
            nasdaq_change: -3.0,
            usdkrw_change: 0.5,
        }]));
        let plain = context().evaluate(&s, d).unwrap();
        let adjusted = context()
            .with_market(MarketAdjustmentParams::default(), Some(feed))
            .evaluate(&s, d)
            .unwrap();
        match (plain, adjusted) {
            (Evaluation::Scored(a), Evaluation::Scored(b)) => {
                assert_eq!(b.score.detail.market_adjustment, 5.0);
                assert!((b.score.total_score - (a.score.total_score + 5.0).min(100.0)).abs() < 1e-10);
            }
            _ => panic!("expected scores"),
        }
    }
}
