// =============================================================================
// Closing Bell — end-of-day equity screening engine
// =============================================================================
//
// Daily price history -> indicators -> region-optimised scores -> ranked,
// graded batches, with correlation-calibrated indicator weights. The
// real-time and backfill paths share one evaluation routine so the same
// (stock, date) always scores the same.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod error;
pub mod indicators;
pub mod persist;
pub mod runtime_config;
pub mod scoring;
pub mod screening;
pub mod types;
pub mod weights;

pub use error::{ProviderError, ScreenError};
pub use runtime_config::ScreenerConfig;
pub use types::{DataSource, PriceBar, PriceSeries, StockId};
