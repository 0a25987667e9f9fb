// =============================================================================
// Scoring policies
// =============================================================================
//
// Each score-formula generation is one `ScoringPolicy`. Callers pick one
// explicitly; all of them read the same `IndicatorSet`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::detail::ScoreDetail;
use super::legacy::LegacyFixedScalePolicy;
use super::region::{RegionOptimizedPolicy, RegionParams};
use crate::indicators::IndicatorSet;
use crate::weights::WeightVector;

pub const CCI_VALUE: &str = "cci_value";
pub const CCI_SLOPE: &str = "cci_slope";
pub const MA20_SLOPE: &str = "ma20_slope";
pub const CANDLE: &str = "candle";
pub const CHANGE: &str = "change";
pub const VOLUME: &str = "volume";
pub const CONSECUTIVE_UP: &str = "consecutive_up";

pub trait ScoringPolicy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Indicator names this policy produces weighted sub-scores for.
    fn indicators(&self) -> &'static [&'static str];

    fn score(&self, set: &IndicatorSet, weights: &WeightVector) -> ScoreDetail;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Region,
    Legacy,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Region => write!(f, "region"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

pub fn build_policy(kind: PolicyKind, region: &RegionParams) -> Arc<dyn ScoringPolicy> {
    match kind {
        PolicyKind::Region => Arc::new(RegionOptimizedPolicy::new(region.clone())),
        PolicyKind::Legacy => Arc::new(LegacyFixedScalePolicy),
    }
}
