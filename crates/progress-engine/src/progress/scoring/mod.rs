//! Stateless category formulas. Each maps one slice of a snapshot to `[0, 100]`.

pub mod custom;
pub mod equipment;
pub mod experience;
pub mod milestones;
pub mod statistics;
pub mod wealth;

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ScoringConfig;

use super::domain::Category;
use super::snapshot::CategorySnapshot;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("no {0} data was available for this recompute")]
    SnapshotUnavailable(Category),
    #[error("{category} formula produced a non-finite value ({value})")]
    NonFinite { category: Category, value: f64 },
}

/// Balance state for one recompute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WealthSignal {
    /// No wealth provider is configured; the category is skipped.
    Absent,
    Unavailable,
    Balance(f64),
}

/// Everything the formulas read during one recompute.
#[derive(Debug, Clone, Copy)]
pub struct SignalInputs<'a> {
    pub snapshot: Option<&'a CategorySnapshot>,
    pub wealth: WealthSignal,
    pub completed_milestones: &'a BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub category: Category,
    pub result: Result<f64, ScoringError>,
}

#[derive(Debug, Clone)]
pub struct CategoryScorer {
    config: Arc<ScoringConfig>,
}

impl CategoryScorer {
    pub fn new(config: Arc<ScoringConfig>) -> Self {
        Self { config }
    }

    /// Run every enabled formula. A failed category is reported, not dropped, so the
    /// aggregator can log it and substitute zero.
    pub fn evaluate(&self, inputs: &SignalInputs<'_>) -> Vec<CategoryOutcome> {
        Category::ALL
            .iter()
            .copied()
            .filter(|category| self.config.is_enabled(*category))
            .filter_map(|category| {
                self.score_category(category, inputs)
                    .map(|result| CategoryOutcome {
                        category,
                        result: result.and_then(|value| finite(category, value)),
                    })
            })
            .collect()
    }

    fn score_category(
        &self,
        category: Category,
        inputs: &SignalInputs<'_>,
    ) -> Option<Result<f64, ScoringError>> {
        let config = &self.config;
        let missing = || ScoringError::SnapshotUnavailable(category);
        let snapshot = inputs.snapshot;

        let result = match category {
            Category::Milestones => snapshot
                .and_then(|s| s.milestones.as_ref())
                .map(|m| milestones::score(m, &config.milestones))
                .ok_or_else(missing),
            Category::Experience => snapshot
                .and_then(|s| s.experience)
                .map(|e| experience::score(e.level, &config.experience))
                .ok_or_else(missing),
            Category::Equipment => snapshot
                .and_then(|s| s.equipment.as_ref())
                .map(|e| equipment::score(e, &config.equipment))
                .ok_or_else(missing),
            Category::Statistics => snapshot
                .and_then(|s| s.statistics.as_ref())
                .map(|s| statistics::score(s, &config.statistics))
                .ok_or_else(missing),
            Category::Wealth => match inputs.wealth {
                WealthSignal::Absent => return None,
                WealthSignal::Unavailable => Err(missing()),
                WealthSignal::Balance(balance) => Ok(wealth::score(balance, &config.wealth)),
            },
            Category::CustomMilestones => Ok(custom::score(
                inputs.completed_milestones,
                &config.custom_milestones,
            )),
        };
        Some(result)
    }
}

fn finite(category: Category, value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScoringError::NonFinite { category, value })
    }
}
