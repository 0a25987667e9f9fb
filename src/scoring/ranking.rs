// =============================================================================
// StockScore + batch ranking
// =============================================================================

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::detail::{ScoreDetail, SCORE_MAX};
use super::grade::{Grade, SellStrategy};
use crate::types::StockId;

/// Upper bound on the opaque order-flow bonus.
pub const MAX_BONUS: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockScore {
    pub stock_id: StockId,
    pub name: String,
    pub current_price: f64,
    pub change_rate: f64,
    pub trading_value: f64,
    pub detail: ScoreDetail,
    pub total_score: f64,
    /// 1-based position inside a ranked batch; 0 until ranked.
    pub rank: usize,
    pub grade: Grade,
    pub sell_strategy: SellStrategy,
    /// Post-hoc order-flow bonus, never read by ranking or calibration.
    pub external_bonus: Option<u8>,
}

impl StockScore {
    pub fn apply_external_bonus(&mut self, bonus: Option<u8>) {
        self.external_bonus = bonus.map(|b| b.min(MAX_BONUS));
    }

    pub fn adjusted_total(&self) -> f64 {
        let bonus = self.external_bonus.map(f64::from).unwrap_or(0.0);
        (self.total_score + bonus).min(SCORE_MAX)
    }
}

/// Descending total, then descending trading value, then ascending stock id.
fn rank_order(a: &StockScore, b: &StockScore) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| b.trading_value.total_cmp(&a.trading_value))
        .then_with(|| a.stock_id.cmp(&b.stock_id))
}

/// Sorts the batch and assigns ranks 1..=N.
pub fn rank_scores(scores: &mut [StockScore]) {
    scores.sort_by(rank_order);
    for (i, s) in scores.iter_mut().enumerate() {
        s.rank = i + 1;
    }
}

/// First `k` of an already ranked batch.
pub fn top_k(scores: &[StockScore], k: usize) -> Vec<StockScore> {
    scores.iter().take(k).cloned().collect()
}
