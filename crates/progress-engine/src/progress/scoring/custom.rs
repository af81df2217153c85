use std::collections::{BTreeMap, BTreeSet};

/// Share of defined custom milestone points the participant has earned.
pub fn score(completed: &BTreeSet<String>, defined: &BTreeMap<String, f64>) -> f64 {
    let total: f64 = defined.values().filter(|points| **points > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let earned: f64 = completed
        .iter()
        .filter_map(|id| defined.get(id))
        .filter(|points| **points > 0.0)
        .sum();
    (earned / total * 100.0).min(100.0)
}
