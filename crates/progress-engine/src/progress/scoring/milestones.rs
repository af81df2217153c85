use std::collections::BTreeMap;

use crate::config::MilestoneConfig;
use crate::progress::snapshot::MilestoneSnapshot;

const GROUPS: [&str; 5] = ["story", "nether", "end", "adventure", "husbandry"];

/// Group a milestone key belongs to, or `None` for recipe unlocks.
pub fn group_of(key: &str) -> Option<&'static str> {
    if key.contains("recipes/") {
        return None;
    }
    let group = GROUPS
        .iter()
        .find(|group| key.contains(&format!("{group}/")))
        .copied()
        .unwrap_or("other");
    Some(group)
}

/// Weighted completion over the configured groups plus the capped headline bonus.
pub fn score(snapshot: &MilestoneSnapshot, config: &MilestoneConfig) -> f64 {
    let mut totals: BTreeMap<&str, u32> = BTreeMap::new();
    let mut completed: BTreeMap<&str, u32> = BTreeMap::new();
    let mut bonus = 0.0;

    for entry in &snapshot.entries {
        let Some(group) = group_of(&entry.key) else {
            continue;
        };
        *totals.entry(group).or_default() += 1;
        if entry.completed {
            *completed.entry(group).or_default() += 1;
            bonus += config
                .headline_bonuses
                .get(&entry.key)
                .copied()
                .filter(|value| *value > 0.0)
                .unwrap_or(0.0);
        }
    }

    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for (group, weight) in config.group_weights.iter().filter(|(_, w)| **w > 0.0) {
        let total = totals.get(group.as_str()).copied().unwrap_or(0);
        let percent = if total == 0 {
            0.0
        } else {
            f64::from(completed.get(group.as_str()).copied().unwrap_or(0)) / f64::from(total)
                * 100.0
        };
        weighted += percent * weight;
        weight_total += weight;
    }

    let base = if weight_total > 0.0 {
        weighted / weight_total
    } else {
        0.0
    };
    (base + bonus.min(config.bonus_cap)).min(100.0)
}
