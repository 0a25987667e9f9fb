// =============================================================================
// Weights Module
// =============================================================================
//
// Versioned per-indicator weights, the correlation calibrator that moves them,
// and the cycle that feeds it stored scores joined with outcomes.

pub mod calibrator;
pub mod cycle;
pub mod samples;
pub mod store;
pub mod vector;

pub use calibrator::{
    pearson, CalibrationConfig, CalibrationOutcome, IndicatorCorrelation, SkipReason, WeightCalibrator,
    MAX_WEIGHT_STEP, MIN_LEARNING_SAMPLES,
};
pub use cycle::{CalibrationCycle, CycleReport};
pub use samples::{collect_samples, gap_return, CorrelationSample, InMemoryOutcomeFeed, OutcomeFeed, OutcomeRow};
pub use store::{LedgerWeightStore, WeightAuditRecord, WeightChange, WeightLedger, WeightSnapshot, WeightStore};
pub use vector::{WeightBounds, WeightVector, DEFAULT_WEIGHT, MAX_WEIGHT, MIN_WEIGHT};
