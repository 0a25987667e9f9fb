// =============================================================================
// End-to-end screening scenarios through the public API
// =============================================================================

use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use closing_bell::indicators::IndicatorEngine;
use closing_bell::scoring::{
    build_policy, Grade, GradeThresholds, LegacyFixedScalePolicy, PolicyKind, RegionParams, ScoreCalculator,
    ScoringPolicy,
};
use closing_bell::screening::{
    BackfillRunner, BatchStatus, InMemoryPriceProvider, InMemoryResultStore, RealtimeScreener, ResultStore,
    UniverseResolver,
};
use closing_bell::weights::{
    CorrelationSample, LedgerWeightStore, WeightBounds, WeightCalibrator, WeightStore, WeightVector,
};
use closing_bell::{DataSource, PriceBar, PriceSeries, ScreenerConfig, StockId};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

/// Consecutive daily bars ending on `end`; open is the previous close.
fn series_ending(id: &str, closes: &[f64], end: NaiveDate) -> PriceSeries {
    let start = end - Duration::days(closes.len() as i64 - 1);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: start + Duration::days(i as i64),
                open,
                high: open.max(close) * 1.004,
                low: open.min(close) * 0.996,
                close,
                volume: 200_000 + (i as u64 % 5) * 15_000,
                trading_value: close * 200_000.0,
            }
        })
        .collect();
    PriceSeries::new(StockId::new(id), format!("Sample {id}"), bars).unwrap()
}

fn compounding(n: usize, base: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| base * step.powi(i as i32)).collect()
}

/// Drifts upward with a sawtooth so RSI and CCI stay off their fallbacks,
/// and always closes the last bar higher.
fn wavy(n: usize, base: f64, seed: usize) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..n)
        .map(|i| base * 1.003f64.powi(i as i32) * (1.0 + ((i * 7 + seed) % 5) as f64 * 0.006))
        .collect();
    if let [.., prev, last] = closes.as_mut_slice() {
        *last = *prev * 1.018;
    }
    closes
}

fn fast_config() -> ScreenerConfig {
    let mut cfg = ScreenerConfig::default();
    cfg.realtime.min_call_interval_ms = 0;
    cfg.realtime.retry_base_delay_ms = 1;
    cfg
}

fn universe(dates: &[NaiveDate], history: &[PriceSeries]) -> UniverseResolver {
    let mut u = UniverseResolver::default();
    for d in dates {
        u.add_snapshot(*d, history.iter().map(|s| s.stock_id().clone()));
    }
    u
}

fn weight_store() -> Arc<dyn WeightStore> {
    Arc::new(LedgerWeightStore::in_memory(WeightBounds::default()))
}

// ── Indicators on degenerate and trending input ──────────────────────────

#[test]
fn flat_prices_use_documented_fallbacks() {
    let end = day(29);
    let bars: Vec<PriceBar> = (0..30)
        .map(|i| PriceBar {
            date: end - Duration::days(29 - i),
            open: 10_000.0,
            high: 10_000.0,
            low: 10_000.0,
            close: 10_000.0,
            volume: 10_000,
            trading_value: 100_000_000.0,
        })
        .collect();
    let set = IndicatorEngine::default()
        .compute(&StockId::new("FLAT"), &bars, end)
        .unwrap();
    assert_eq!(set.cci, 0.0);
    assert_eq!(set.rsi, Some(100.0));
}

#[test]
fn steady_rise_saturates_ma20_slope() {
    let end = day(20);
    let s = series_ending("UP", &compounding(20, 1000.0, 1.01), end);
    let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), end).unwrap();

    let calculator = ScoreCalculator::new(
        build_policy(PolicyKind::Region, &RegionParams::default()),
        GradeThresholds::default(),
    );
    let detail = calculator.score(&set, &WeightVector::default());
    assert_eq!(detail.sub_score("ma20_slope"), Some(15.0));
}

// ── Scoring ──────────────────────────────────────────────────────────────

#[test]
fn grade_boundaries_are_inclusive() {
    let g = GradeThresholds::default();
    assert_eq!(g.grade(85.0), Grade::S);
    assert_eq!(g.grade(84.99), Grade::A);
}

#[test]
fn legacy_total_ignores_uniform_weight_scale() {
    let end = day(28);
    let s = series_ending("L", &wavy(45, 2000.0, 1), end);
    let set = IndicatorEngine::default().compute(s.stock_id(), s.bars(), end).unwrap();

    let policy = LegacyFixedScalePolicy;
    let unit = WeightVector::default();
    let mut doubled = WeightVector::default();
    for name in policy.indicators() {
        doubled.set(*name, 2.0);
    }
    let a = policy.score(&set, &unit);
    let b = policy.score(&set, &doubled);
    assert!((a.total - b.total).abs() < 1e-9);
    assert!(a.total >= 0.0 && a.total <= 100.0);
}

#[test]
fn scoring_is_deterministic() {
    let end = day(28);
    let s = series_ending("D", &wavy(60, 3000.0, 2), end);
    let engine = IndicatorEngine::default();
    let calculator = ScoreCalculator::new(
        build_policy(PolicyKind::Region, &RegionParams::default()),
        GradeThresholds::default(),
    );
    let w = WeightVector::default();
    let first = calculator.score(&engine.compute(s.stock_id(), s.bars(), end).unwrap(), &w);
    let second = calculator.score(&engine.compute(s.stock_id(), s.bars(), end).unwrap(), &w);
    assert_eq!(first, second);
}

// ── Calibration ──────────────────────────────────────────────────────────

#[test]
fn calibration_below_threshold_is_a_noop() {
    let samples: Vec<CorrelationSample> = (0..29i64)
        .map(|i| CorrelationSample {
            indicator: "cci_value".into(),
            sub_score: i as f64 * 0.5,
            forward_return: i as f64 * 0.1,
            eval_date: day(1) + Duration::days(i),
        })
        .collect();
    let current = WeightVector::default();
    let outcome = WeightCalibrator::default().calibrate(&samples, &current);
    assert!(outcome.is_noop());
    assert_eq!(outcome.new_weights, current);
}

#[test]
fn repeated_calibration_stays_within_bounds() {
    let samples: Vec<CorrelationSample> = (0..40)
        .flat_map(|i| {
            let x = i as f64;
            [
                CorrelationSample {
                    indicator: "cci_value".into(),
                    sub_score: x,
                    forward_return: x * 0.2,
                    eval_date: day(1),
                },
                CorrelationSample {
                    indicator: "volume".into(),
                    sub_score: x,
                    forward_return: -x * 0.2,
                    eval_date: day(1),
                },
            ]
        })
        .collect();
    let calibrator = WeightCalibrator::default();
    let mut weights = WeightVector::default();
    for _ in 0..100 {
        weights = calibrator.calibrate(&samples, &weights).new_weights;
    }
    let bounds = WeightBounds::default();
    assert_eq!(weights.get("cci_value"), bounds.max);
    assert_eq!(weights.get("volume"), bounds.min);
}

// ── Real-time / backfill ─────────────────────────────────────────────────

#[tokio::test]
async fn realtime_and_backfill_agree_exactly() {
    let as_of = day(28);
    let history: Vec<PriceSeries> = (0..6)
        .map(|i| series_ending(&format!("P{i}"), &wavy(70, 1500.0 + i as f64 * 400.0, i), as_of))
        .collect();
    let univ = universe(&[as_of], &history);
    let weights = weight_store();

    let rt_store = Arc::new(InMemoryResultStore::new());
    let batch = RealtimeScreener::new(
        fast_config(),
        Arc::new(InMemoryPriceProvider::new(history.clone())),
        weights.clone(),
        rt_store.clone(),
    )
    .with_universe(univ.clone())
    .run(as_of)
    .await;
    assert_eq!(batch.status, BatchStatus::Success);
    assert_eq!(batch.total_count, 6);

    let bf_store = Arc::new(InMemoryResultStore::new());
    let report = BackfillRunner::new(fast_config(), weights, bf_store.clone())
        .with_universe(univ)
        .run(&history, &[as_of])
        .unwrap();
    assert_eq!(report.inserted, 6);

    for s in &history {
        let rt = rt_store.get(as_of, s.stock_id()).unwrap();
        let bf = bf_store.get(as_of, s.stock_id()).unwrap();
        assert_eq!(rt.source, DataSource::Realtime);
        assert_eq!(bf.source, DataSource::Backfill);
        assert_eq!(rt.window_digest, bf.window_digest);
        assert_eq!(rt.score, bf.score);
        assert_eq!(rt.score.total_score.to_bits(), bf.score.total_score.to_bits());
    }
}

#[tokio::test]
async fn short_histories_fail_individually() {
    let as_of = day(28);
    let mut history: Vec<PriceSeries> = (0..7)
        .map(|i| series_ending(&format!("OK{i}"), &compounding(40, 1000.0 + i as f64 * 100.0, 1.01), as_of))
        .collect();
    history.extend((0..3).map(|i| series_ending(&format!("SHORT{i}"), &compounding(19, 1200.0, 1.01), as_of)));
    history.push(series_ending("EDGE", &compounding(20, 1200.0, 1.01), as_of));

    let batch = RealtimeScreener::new(
        fast_config(),
        Arc::new(InMemoryPriceProvider::new(history.clone())),
        weight_store(),
        Arc::new(InMemoryResultStore::new()),
    )
    .with_universe(universe(&[as_of], &history))
    .run(as_of)
    .await;

    assert_eq!(batch.status, BatchStatus::Partial);
    assert_eq!(batch.total_count, 8);
    assert!(batch.scores.iter().any(|s| s.stock_id.as_str() == "EDGE"));
    assert_eq!(batch.failed_count, 3);
    assert!(batch.failures.iter().all(|f| f.kind == "insufficient_data"));
    assert!(batch.failures.iter().all(|f| f.stock_id.as_str().starts_with("SHORT")));
}

#[tokio::test]
async fn backfill_never_replaces_realtime_records() {
    let end = day(25);
    let dates: Vec<NaiveDate> = (0..5).map(|i| end - Duration::days(4 - i)).collect();
    let history: Vec<PriceSeries> = (0..4)
        .map(|i| series_ending(&format!("X{i}"), &compounding(45, 2000.0 + i as f64 * 250.0, 1.01), end))
        .collect();
    let univ = universe(&dates, &history);
    let weights = weight_store();
    let store = Arc::new(InMemoryResultStore::new());

    let day3 = dates[2];
    let batch = RealtimeScreener::new(
        fast_config(),
        Arc::new(InMemoryPriceProvider::new(history.clone())),
        weights.clone(),
        store.clone(),
    )
    .with_universe(univ.clone())
    .run(day3)
    .await;
    assert_eq!(batch.total_count, 4);
    let before: Vec<_> = store.records_between(day3, day3);

    let report = BackfillRunner::new(fast_config(), weights, store.clone())
        .with_universe(univ)
        .run(&history, &dates)
        .unwrap();
    assert_eq!(report.evaluated, 20);
    assert_eq!(report.kept_existing, 4);
    assert_eq!(report.inserted, 16);

    assert_eq!(store.records_between(day3, day3), before);
    for d in dates.iter().filter(|d| **d != day3) {
        let records = store.records_between(*d, *d);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.source == DataSource::Backfill));
    }
}
