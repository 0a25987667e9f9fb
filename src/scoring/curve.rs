// =============================================================================
// Piecewise-linear scoring curve
// =============================================================================
//
// Breakpoints (x, score) with strictly increasing x. Between breakpoints the
// score is linearly interpolated; beyond either end it stays flat at the end
// value. Non-finite input scores 0.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ScreenError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PiecewiseCurve {
    points: Vec<(f64, f64)>,
}

impl PiecewiseCurve {
    /// Validated constructor for configured curves.
    pub fn new(points: Vec<(f64, f64)>, max_score: f64) -> Result<Self, ScreenError> {
        let curve = Self { points };
        curve.validate(max_score)?;
        Ok(curve)
    }

    pub(crate) fn preset(points: &[(f64, f64)]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn validate(&self, max_score: f64) -> Result<(), ScreenError> {
        if self.points.is_empty() {
            return Err(ScreenError::Config("curve has no breakpoints".into()));
        }
        for (i, &(x, y)) in self.points.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() {
                return Err(ScreenError::Config(format!("non-finite breakpoint #{i}")));
            }
            if !(0.0..=max_score).contains(&y) {
                return Err(ScreenError::Config(format!(
                    "breakpoint #{i} score {y} outside [0, {max_score}]"
                )));
            }
            if i > 0 && self.points[i - 1].0 >= x {
                return Err(ScreenError::Config(format!(
                    "breakpoint x values must be strictly increasing (#{i})"
                )));
            }
        }
        Ok(())
    }

    pub fn eval(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return 0.0,
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        // First breakpoint strictly right of x; x > first.0 so idx >= 1.
        let idx = self.points.partition_point(|&(px, _)| px <= x);
        let (x0, y0) = self.points[idx - 1];
        let (x1, y1) = self.points[idx];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    /// Highest-scoring breakpoint (first one on ties).
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, p| match best {
                Some(b) if b.1 >= p.1 => Some(b),
                _ => Some(p),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tent() -> PiecewiseCurve {
        PiecewiseCurve::new(vec![(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)], 10.0).unwrap()
    }

    #[test]
    fn interpolates_between_points() {
        let c = tent();
        assert!((c.eval(5.0) - 5.0).abs() < 1e-10);
        assert!((c.eval(15.0) - 5.0).abs() < 1e-10);
        assert!((c.eval(10.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn flat_beyond_ends() {
        let c = PiecewiseCurve::new(vec![(0.0, 3.0), (1.0, 9.0)], 10.0).unwrap();
        assert_eq!(c.eval(-100.0), 3.0);
        assert_eq!(c.eval(1e9), 9.0);
    }

    #[test]
    fn non_finite_scores_zero() {
        assert_eq!(tent().eval(f64::NAN), 0.0);
        assert_eq!(tent().eval(f64::INFINITY), 0.0);
    }

    #[test]
    fn rejects_unordered_or_out_of_range() {
        assert!(PiecewiseCurve::new(vec![(1.0, 1.0), (1.0, 2.0)], 10.0).is_err());
        assert!(PiecewiseCurve::new(vec![(0.0, 11.0)], 10.0).is_err());
        assert!(PiecewiseCurve::new(vec![], 10.0).is_err());
    }

    #[test]
    fn peak_is_first_max() {
        let c = PiecewiseCurve::new(vec![(0.0, 1.0), (2.0, 5.0), (3.0, 5.0), (4.0, 0.0)], 10.0).unwrap();
        assert_eq!(c.peak(), Some((2.0, 5.0)));
    }

    #[test]
    fn serializes_as_pairs() {
        let json = serde_json::to_string(&tent()).unwrap();
        assert_eq!(json, "[[0.0,0.0],[10.0,10.0],[20.0,0.0]]");
    }
}
