use std::collections::BTreeMap;

use tracing::warn;

use crate::config::{CategoryWeights, ScoreBounds, ScoringConfig};

use super::domain::{Category, CategoryScore, ProgressResult};
use super::scoring::CategoryOutcome;

/// Combines category scores with the configured weights into a clamped final score.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    weights: CategoryWeights,
    enabled: BTreeMap<Category, bool>,
    bounds: ScoreBounds,
}

impl ScoreAggregator {
    pub fn new(weights: CategoryWeights, bounds: ScoreBounds) -> Self {
        Self {
            weights,
            enabled: Category::ALL.iter().map(|c| (*c, true)).collect(),
            bounds,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            enabled: Category::ALL
                .iter()
                .map(|c| (*c, config.is_enabled(*c)))
                .collect(),
            bounds: config.bounds,
        }
    }

    pub fn with_disabled(mut self, category: Category) -> Self {
        self.enabled.insert(category, false);
        self
    }

    pub fn bounds(&self) -> ScoreBounds {
        self.bounds
    }

    fn is_enabled(&self, category: Category) -> bool {
        self.enabled.get(&category).copied().unwrap_or(true)
    }

    /// `clamp(sum(score * weight / 100) - penalty)` over enabled categories.
    /// The breakdown always lists all six categories; disabled or missing ones read 0.
    pub fn combine(&self, scores: &[CategoryScore], penalty: f64) -> ProgressResult {
        let penalty = if penalty.is_finite() {
            penalty.max(0.0)
        } else {
            0.0
        };

        let mut weighted_total = 0.0;
        let categories: Vec<CategoryScore> = Category::ALL
            .iter()
            .map(|category| {
                let score = scores
                    .iter()
                    .find(|score| score.category == *category)
                    .filter(|_| self.is_enabled(*category))
                    .map(|score| CategoryScore::new(*category, score.value))
                    .unwrap_or_else(|| CategoryScore::zero(*category));
                weighted_total += score.value * self.weights.weight(*category) / 100.0;
                score
            })
            .collect();

        let total_before_clamp = weighted_total - penalty;
        ProgressResult {
            final_score: self.bounds.clamp(total_before_clamp),
            weighted_total,
            total_before_clamp,
            categories,
            penalty_applied: penalty,
        }
    }

    /// Like [`combine`](Self::combine), but takes raw formula outcomes. Failed categories
    /// are logged and contribute zero.
    pub fn aggregate(&self, outcomes: &[CategoryOutcome], penalty: f64) -> ProgressResult {
        let scores: Vec<CategoryScore> = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(value) => CategoryScore::new(outcome.category, *value),
                Err(err) => {
                    warn!(category = %outcome.category, error = %err, "category scoring failed; using 0");
                    CategoryScore::zero(outcome.category)
                }
            })
            .collect();
        self.combine(&scores, penalty)
    }
}
