// =============================================================================
// Closing Bell — Main Entry Point
// =============================================================================
//
//   screen     score one evaluation date through the real-time path
//   backfill   score a historical date range on the worker pool
//   calibrate  run one weight calibration cycle
//   serve      expose stored scores and weights over HTTP
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use closing_bell::api;
use closing_bell::app_state::AppState;
use closing_bell::runtime_config::ScreenerConfig;
use closing_bell::screening::{
    BackfillRunner, FileResultStore, GlobalMarketFeed, InMemoryGlobalFeed, JsonDirProvider, RealtimeScreener,
    ResultStore, UniverseResolver,
};
use closing_bell::weights::{CalibrationCycle, InMemoryOutcomeFeed, LedgerWeightStore, WeightCalibrator, WeightStore};

#[derive(Parser, Debug)]
#[command(name = "closing-bell", about = "End-of-day equity screening engine")]
struct Cli {
    /// Screener config file (overridden by CLOSING_BELL_CONFIG).
    #[arg(long, default_value = "screener_config.json")]
    config: PathBuf,

    /// Weight ledger file.
    #[arg(long, default_value = "weights_ledger.json")]
    weights: PathBuf,

    /// Score result store file.
    #[arg(long, default_value = "score_results.json")]
    results: PathBuf,

    /// Latest batch result, written by screen/backfill and read by serve.
    #[arg(long, default_value = "last_batch.json")]
    last_batch: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one evaluation date
    Screen {
        #[arg(long)]
        date: NaiveDate,
        /// Directory of `<stock_id>.json` price files
        #[arg(long)]
        data_dir: PathBuf,
        /// Point-in-time eligibility snapshots
        #[arg(long)]
        snapshots: Option<PathBuf>,
        /// Global market observations
        #[arg(long)]
        global: Option<PathBuf>,
    },
    /// Score every trading date in [from, to]
    Backfill {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        snapshots: Option<PathBuf>,
        #[arg(long)]
        global: Option<PathBuf>,
    },
    /// Run one calibration cycle
    Calibrate {
        /// Samples are drawn from dates strictly before this one
        #[arg(long)]
        as_of: NaiveDate,
        /// Outcome rows: stock_id, eval_date, close, next_open
        #[arg(long)]
        outcomes: PathBuf,
    },
    /// Serve the read-only REST API
    Serve {
        /// Listen address (overridden by CLOSING_BELL_BIND_ADDR)
        #[arg(long, default_value = "0.0.0.0:3001")]
        bind: String,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<ScreenerConfig> {
    let path = std::env::var("CLOSING_BELL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| cli.config.clone());

    let mut config = if path.exists() {
        ScreenerConfig::load(&path)?
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        ScreenerConfig::default()
    };

    if let Ok(raw) = std::env::var("CLOSING_BELL_TOP_K") {
        config.top_k = raw
            .trim()
            .parse()
            .with_context(|| format!("CLOSING_BELL_TOP_K is not a number: {raw}"))?;
    }
    config
        .validate()
        .with_context(|| format!("invalid screener config ({})", path.display()))?;
    Ok(config)
}

fn load_universe(config: &ScreenerConfig, snapshots: Option<&PathBuf>) -> anyhow::Result<UniverseResolver> {
    let mut universe = UniverseResolver::new(config.universe.clone());
    if let Some(path) = snapshots {
        let n = universe.load_snapshots(path)?;
        info!(path = %path.display(), dates = n, "eligibility snapshots loaded");
    }
    Ok(universe)
}

fn load_global(path: Option<&PathBuf>) -> anyhow::Result<Option<Arc<dyn GlobalMarketFeed>>> {
    match path {
        Some(p) => {
            let feed: Arc<dyn GlobalMarketFeed> = Arc::new(InMemoryGlobalFeed::load(p)?);
            Ok(Some(feed))
        }
        None => Ok(None),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // ── 2. Stores ────────────────────────────────────────────────────────
    let weights: Arc<dyn WeightStore> = Arc::new(LedgerWeightStore::open(&cli.weights, config.weight_bounds)?);
    let results: Arc<dyn ResultStore> = Arc::new(FileResultStore::open(&cli.results)?);

    // ── 3. Command ───────────────────────────────────────────────────────
    match &cli.command {
        Command::Screen {
            date,
            data_dir,
            snapshots,
            global,
        } => {
            let universe = load_universe(&config, snapshots.as_ref())?;
            let verbose = config.verbose;
            let mut screener = RealtimeScreener::new(
                config,
                Arc::new(JsonDirProvider::new(data_dir)),
                weights,
                results,
            )
            .with_universe(universe);
            if let Some(feed) = load_global(global.as_ref())? {
                screener = screener.with_global_feed(feed);
            }
            let batch = screener.run(*date).await;
            batch.save(&cli.last_batch)?;
            print_json(&batch.summary(verbose))?;
            if let Some(err) = batch.fatal_error {
                bail!("screening failed: {err}");
            }
        }

        Command::Backfill {
            from,
            to,
            data_dir,
            snapshots,
            global,
        } => {
            if from > to {
                bail!("--from {from} is after --to {to}");
            }
            let history = JsonDirProvider::new(data_dir).load_all().await?;
            let dates: Vec<NaiveDate> = history
                .iter()
                .flat_map(|s| s.bars().iter().map(|b| b.date))
                .filter(|d| d >= from && d <= to)
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            info!(%from, %to, trading_dates = dates.len(), stocks = history.len(), "backfill range resolved");

            let universe = load_universe(&config, snapshots.as_ref())?;
            let mut runner = BackfillRunner::new(config, weights, results).with_universe(universe);
            if let Some(feed) = load_global(global.as_ref())? {
                runner = runner.with_global_feed(feed);
            }
            // Rayon blocks; keep it off the async workers.
            let report = tokio::task::spawn_blocking(move || runner.run(&history, &dates)).await??;
            if let Some(last) = report.batches.last() {
                last.save(&cli.last_batch)?;
            }
            print_json(&report)?;
        }

        Command::Calibrate { as_of, outcomes } => {
            let feed = InMemoryOutcomeFeed::load(outcomes)?;
            info!(path = %outcomes.display(), outcomes = feed.len(), "outcome feed loaded");
            let cycle = CalibrationCycle::new(
                WeightCalibrator::new(config.calibration.clone()),
                weights,
                results,
                config.top_k,
            );
            let report = cycle.run(*as_of, &feed)?;
            print_json(&report)?;
        }

        Command::Serve { bind } => {
            let bind_addr = std::env::var("CLOSING_BELL_BIND_ADDR").unwrap_or_else(|_| bind.clone());
            let state = Arc::new(AppState::new(config, weights, results));
            if !state.load_last_batch(&cli.last_batch)? {
                info!(path = %cli.last_batch.display(), "no saved batch yet");
            }
            let app = api::rest::router(state);
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
            info!(addr = %bind_addr, "API server listening");
            axum::serve(listener, app).await.context("API server failed")?;
        }
    }

    Ok(())
}
