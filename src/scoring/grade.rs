// =============================================================================
// Grade bands
// =============================================================================
//
// S > A > B > C > D from fixed thresholds (>= semantics). Each grade carries
// an advisory sell strategy; nothing in the engine acts on it.

use serde::{Deserialize, Serialize};

use crate::error::ScreenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    D,
    C,
    B,
    A,
    S,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(s)
    }
}

/// Advisory exit parameters for a grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellStrategy {
    /// Fraction of the position to sell at the next open.
    pub entry_reduction: f64,
    pub target_pct: f64,
    pub stop_loss_pct: f64,
}

impl Grade {
    pub fn sell_strategy(&self) -> SellStrategy {
        let (entry_reduction, target_pct, stop_loss_pct) = match self {
            Self::S => (0.30, 4.0, -3.0),
            Self::A => (0.40, 3.0, -2.5),
            Self::B => (0.50, 2.5, -2.0),
            Self::C => (0.70, 2.0, -1.5),
            Self::D => (1.00, 1.0, -1.0),
        };
        SellStrategy {
            entry_reduction,
            target_pct,
            stop_loss_pct,
        }
    }
}

fn default_s() -> f64 {
    85.0
}
fn default_a() -> f64 {
    75.0
}
fn default_b() -> f64 {
    65.0
}
fn default_c() -> f64 {
    55.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    #[serde(default = "default_s")]
    pub s: f64,
    #[serde(default = "default_a")]
    pub a: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_c")]
    pub c: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            s: default_s(),
            a: default_a(),
            b: default_b(),
            c: default_c(),
        }
    }
}

impl GradeThresholds {
    pub fn grade(&self, total: f64) -> Grade {
        if total >= self.s {
            Grade::S
        } else if total >= self.a {
            Grade::A
        } else if total >= self.b {
            Grade::B
        } else if total >= self.c {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.s > self.a && self.a > self.b && self.b > self.c {
            Ok(())
        } else {
            Err(ScreenError::Config(
                "grade thresholds must be strictly decreasing from S to C".into(),
            ))
        }
    }
}
