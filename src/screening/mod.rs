// =============================================================================
// Screening Module
// =============================================================================
//
// Everything between a price history and a stored, ranked batch. The
// real-time and backfill paths share the window rule, the universe resolver,
// the market adjustment and `ScreeningContext::evaluate`; they differ only in
// how history is fetched and how results are written.

pub mod backfill;
pub mod batch;
pub mod context;
pub mod market;
pub mod provider;
pub mod rate_limit;
pub mod realtime;
pub mod store;
pub mod universe;
pub mod window;

pub use backfill::{BackfillReport, BackfillRunner};
pub use batch::{BatchBuilder, BatchResult, BatchStatus, BatchSummary, FailureEntry};
pub use context::{Evaluated, Evaluation, ScreeningContext};
pub use market::{GlobalMarketFeed, GlobalObservation, InMemoryGlobalFeed, MarketAdjustmentParams};
pub use provider::{InMemoryPriceProvider, JsonDirProvider, PriceProvider};
pub use rate_limit::{with_retries, MinIntervalLimiter, RetryPolicy};
pub use realtime::RealtimeScreener;
pub use store::{FileResultStore, InMemoryResultStore, ResultStore, ScoreRecord};
pub use universe::{ResolvedUniverse, UniverseCandidate, UniverseFilter, UniverseResolver, UniverseSource};
pub use window::{select_window, window_digest, LookbackConfig};
