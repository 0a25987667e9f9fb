// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions over daily bars, plus the
// `IndicatorEngine` that assembles them into one `IndicatorSet` per
// evaluation window. Short inputs yield empty series / `None` / a named
// fallback, never a panic.

pub mod bollinger;
pub mod candle;
pub mod cci;
pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod slope;
pub mod volume;

pub use engine::{DegenerateFallbacks, FallbackKind, IndicatorEngine, IndicatorParams, IndicatorSet};
pub use volume::VolumeRatioMode;
