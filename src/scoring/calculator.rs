// =============================================================================
// ScoreCalculator — policy + grading bundled for one scoring run
// =============================================================================

use std::sync::Arc;

use super::detail::ScoreDetail;
use super::grade::GradeThresholds;
use super::policy::ScoringPolicy;
use super::ranking::StockScore;
use crate::indicators::IndicatorSet;
use crate::types::StockId;
use crate::weights::WeightVector;

#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    policy: Arc<dyn ScoringPolicy>,
    grades: GradeThresholds,
}

impl ScoreCalculator {
    pub fn new(policy: Arc<dyn ScoringPolicy>, grades: GradeThresholds) -> Self {
        Self { policy, grades }
    }

    pub fn policy(&self) -> &dyn ScoringPolicy {
        self.policy.as_ref()
    }

    pub fn score(&self, set: &IndicatorSet, weights: &WeightVector) -> ScoreDetail {
        self.policy.score(set, weights)
    }

    /// Graded, unranked `StockScore` from a finished detail.
    pub fn to_stock_score(
        &self,
        stock_id: &StockId,
        name: &str,
        set: &IndicatorSet,
        detail: ScoreDetail,
    ) -> StockScore {
        let grade = self.grades.grade(detail.total);
        StockScore {
            stock_id: stock_id.clone(),
            name: name.to_string(),
            current_price: set.close,
            change_rate: set.change_rate,
            trading_value: set.trading_value,
            total_score: detail.total,
            detail,
            rank: 0,
            grade,
            sell_strategy: grade.sell_strategy(),
            external_bonus: None,
        }
    }
}
