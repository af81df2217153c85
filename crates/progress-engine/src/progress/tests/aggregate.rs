use super::common::*;

use crate::config::{CategoryWeights, ScoreBounds};
use crate::progress::aggregate::ScoreAggregator;
use crate::progress::domain::{Category, CategoryScore};
use crate::progress::scoring::{CategoryOutcome, ScoringError};

fn uniform(value: f64) -> Vec<CategoryScore> {
    Category::ALL
        .iter()
        .map(|category| CategoryScore::new(*category, value))
        .collect()
}

fn aggregator() -> ScoreAggregator {
    ScoreAggregator::new(CategoryWeights::default(), ScoreBounds::default())
}

#[test]
fn weighted_total_scales_with_category_scores() {
    let aggregator = aggregator();

    let full = aggregator.combine(&uniform(100.0), 0.0);
    assert!(approx(full.weighted_total, 100.0));
    assert_eq!(full.final_score, 100.0);

    let half = aggregator.combine(&uniform(50.0), 0.0);
    assert!(approx(half.final_score, 50.0));
    assert_eq!(half.categories.len(), 6);
}

#[test]
fn penalty_is_subtracted_before_clamping() {
    let aggregator = aggregator();

    let result = aggregator.combine(&uniform(50.0), 12.5);
    assert!(approx(result.final_score, 37.5));
    assert!(approx(result.total_before_clamp, 37.5));
    assert_eq!(result.penalty_applied, 12.5);

    let crushed = aggregator.combine(&uniform(50.0), 1_000.0);
    assert_eq!(crushed.final_score, 1.0);
    assert!(crushed.total_before_clamp < 0.0);
}

#[test]
fn negative_or_nan_penalty_counts_as_zero() {
    let aggregator = aggregator();

    assert!(approx(aggregator.combine(&uniform(40.0), -5.0).final_score, 40.0));
    let result = aggregator.combine(&uniform(40.0), f64::NAN);
    assert_eq!(result.penalty_applied, 0.0);
}

#[test]
fn disabled_and_missing_categories_read_zero() {
    let aggregator = aggregator().with_disabled(Category::Wealth);
    let scores = vec![
        CategoryScore::new(Category::Experience, 80.0),
        CategoryScore::new(Category::Wealth, 100.0),
    ];

    let result = aggregator.combine(&scores, 0.0);

    assert_eq!(result.score_for(Category::Wealth), 0.0);
    assert_eq!(result.score_for(Category::Milestones), 0.0);
    assert_eq!(result.score_for(Category::Experience), 80.0);
    assert!(approx(result.final_score, 12.0));
}

#[test]
fn failed_categories_contribute_zero() {
    let aggregator = aggregator();
    let outcomes = vec![
        CategoryOutcome {
            category: Category::Experience,
            result: Ok(100.0),
        },
        CategoryOutcome {
            category: Category::Equipment,
            result: Err(ScoringError::SnapshotUnavailable(Category::Equipment)),
        },
    ];

    let result = aggregator.aggregate(&outcomes, 0.0);

    assert_eq!(result.score_for(Category::Equipment), 0.0);
    assert!(approx(result.final_score, 15.0));
}

#[test]
fn final_score_never_drops_below_minimum() {
    let result = aggregator().combine(&[], 0.0);
    assert_eq!(result.final_score, 1.0);
    assert_eq!(result.weighted_total, 0.0);
}
