// =============================================================================
// Weight vector
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ScreenError;

pub const MIN_WEIGHT: f64 = 0.5;
pub const MAX_WEIGHT: f64 = 5.0;
pub const DEFAULT_WEIGHT: f64 = 1.0;

fn default_min() -> f64 {
    MIN_WEIGHT
}
fn default_max() -> f64 {
    MAX_WEIGHT
}
fn default_initial() -> f64 {
    DEFAULT_WEIGHT
}

/// Allowed weight range and the value every indicator starts at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default = "default_initial")]
    pub initial: f64,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self {
            min: MIN_WEIGHT,
            max: MAX_WEIGHT,
            initial: DEFAULT_WEIGHT,
        }
    }
}

impl WeightBounds {
    pub fn clamp(&self, w: f64) -> f64 {
        if !w.is_finite() {
            return self.initial;
        }
        w.clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if !(self.min > 0.0 && self.min <= self.initial && self.initial <= self.max) {
            return Err(ScreenError::Config(format!(
                "weight bounds must satisfy 0 < min <= initial <= max (got {} / {} / {})",
                self.min, self.initial, self.max
            )));
        }
        Ok(())
    }
}

/// Indicator name -> weight. Indicators without an entry weigh `initial`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
    bounds: WeightBounds,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::new(WeightBounds::default())
    }
}

impl WeightVector {
    pub fn new(bounds: WeightBounds) -> Self {
        Self {
            weights: BTreeMap::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> &WeightBounds {
        &self.bounds
    }

    pub fn get(&self, indicator: &str) -> f64 {
        self.weights
            .get(indicator)
            .copied()
            .unwrap_or(self.bounds.initial)
    }

    /// Sets a weight, clamped into bounds. Returns the stored value.
    pub fn set(&mut self, indicator: impl Into<String>, weight: f64) -> f64 {
        let w = self.bounds.clamp(weight);
        self.weights.insert(indicator.into(), w);
        w
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
