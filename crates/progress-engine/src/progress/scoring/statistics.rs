use std::collections::BTreeMap;

use crate::config::{StatisticKind, StatisticsConfig};
use crate::progress::snapshot::StatisticsSnapshot;

const RARE_KILL_CAP: f64 = 25.0;
const RARE_KILL_FACTOR: f64 = 0.1;
const VALUABLE_BLOCK_CAP: f64 = 20.0;
const VALUABLE_BLOCK_FACTOR: f64 = 0.05;

fn sqrt_law(count: f64, max: f64) -> f64 {
    (count.sqrt() / max.sqrt() * 100.0).min(100.0)
}

fn log_law(value: f64, max: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    ((value + 1.0).ln() / (max + 1.0).ln() * 100.0).min(100.0)
}

fn counted_bonus(counts: &BTreeMap<String, u64>, bonuses: &BTreeMap<String, f64>) -> f64 {
    counts
        .iter()
        .filter_map(|(kind, count)| bonuses.get(kind).map(|bonus| *count as f64 * bonus))
        .filter(|points| *points > 0.0)
        .sum()
}

pub fn kill_score(snapshot: &StatisticsSnapshot, config: &StatisticsConfig) -> f64 {
    let base = sqrt_law(snapshot.total_kills() as f64, config.max_kills);
    let bonus = (counted_bonus(&snapshot.kills, &config.rare_kill_bonuses) * RARE_KILL_FACTOR)
        .min(RARE_KILL_CAP);
    (base + bonus).min(100.0)
}

pub fn block_score(snapshot: &StatisticsSnapshot, config: &StatisticsConfig) -> f64 {
    let base = sqrt_law(snapshot.total_blocks() as f64, config.max_blocks);
    let bonus = (counted_bonus(&snapshot.blocks_mined, &config.valuable_block_bonuses)
        * VALUABLE_BLOCK_FACTOR)
        .min(VALUABLE_BLOCK_CAP);
    (base + bonus).min(100.0)
}

pub fn sub_scores(
    snapshot: &StatisticsSnapshot,
    config: &StatisticsConfig,
) -> BTreeMap<StatisticKind, f64> {
    BTreeMap::from([
        (StatisticKind::MobKills, kill_score(snapshot, config)),
        (StatisticKind::BlocksMined, block_score(snapshot, config)),
        (
            StatisticKind::DistanceTraveled,
            log_law(snapshot.distance_blocks, config.max_distance),
        ),
        (
            StatisticKind::Playtime,
            log_law(snapshot.playtime_hours(), config.max_playtime_hours),
        ),
    ])
}

/// Weighted average of the sub-scores, ignoring kinds weighted at zero.
pub fn score(snapshot: &StatisticsSnapshot, config: &StatisticsConfig) -> f64 {
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for (kind, value) in sub_scores(snapshot, config) {
        let weight = config.weight(kind);
        if weight > 0.0 {
            weighted += value * weight;
            weight_total += weight;
        }
    }
    if weight_total > 0.0 {
        weighted / weight_total
    } else {
        0.0
    }
}
