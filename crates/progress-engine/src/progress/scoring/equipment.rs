use std::collections::BTreeMap;

use crate::config::EquipmentConfig;
use crate::progress::snapshot::{EquipmentSnapshot, ItemStack};

const ARMOR_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    Armor,
    Tools,
    Weapons,
    Special,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Armor, Bucket::Tools, Bucket::Weapons, Bucket::Special];

    pub fn key(&self) -> &'static str {
        match self {
            Bucket::Armor => "armor",
            Bucket::Tools => "tools",
            Bucket::Weapons => "weapons",
            Bucket::Special => "special",
        }
    }
}

fn special_score(kind: &str, config: &EquipmentConfig) -> Option<f64> {
    config
        .special_items
        .get(kind)
        .copied()
        .filter(|score| *score > 0.0)
}

pub fn bucket_of(kind: &str, config: &EquipmentConfig) -> Option<Bucket> {
    if special_score(kind, config).is_some() {
        return Some(Bucket::Special);
    }
    if ["_HELMET", "_CHESTPLATE", "_LEGGINGS", "_BOOTS"]
        .iter()
        .any(|suffix| kind.ends_with(suffix))
    {
        return Some(Bucket::Armor);
    }
    if ["_PICKAXE", "_AXE", "_SHOVEL", "_HOE"]
        .iter()
        .any(|suffix| kind.ends_with(suffix))
    {
        return Some(Bucket::Tools);
    }
    if kind.ends_with("_SWORD") || matches!(kind, "BOW" | "CROSSBOW" | "TRIDENT") {
        return Some(Bucket::Weapons);
    }
    if matches!(kind, "ELYTRA" | "SHIELD" | "TOTEM_OF_UNDYING") {
        return Some(Bucket::Special);
    }
    None
}

pub fn material_of(kind: &str) -> Option<&'static str> {
    const PREFIXES: [(&str, &str); 9] = [
        ("NETHERITE_", "NETHERITE"),
        ("DIAMOND_", "DIAMOND"),
        ("IRON_", "IRON"),
        ("GOLDEN_", "GOLDEN"),
        ("STONE_", "STONE"),
        ("WOODEN_", "WOOD"),
        ("WOOD_", "WOOD"),
        ("LEATHER_", "LEATHER"),
        ("CHAINMAIL_", "CHAINMAIL"),
    ];
    PREFIXES
        .iter()
        .find(|(prefix, _)| kind.starts_with(prefix))
        .map(|(_, material)| *material)
}

pub fn enchantment_multiplier(item: &ItemStack, config: &EquipmentConfig) -> f64 {
    item.enchantments.iter().fold(1.0, |multiplier, (id, level)| {
        let value = config
            .enchantment_values
            .get(&id.to_ascii_uppercase())
            .copied()
            .unwrap_or(1.0);
        multiplier + config.enchantment_base_multiplier * f64::from(*level) * value
    })
}

/// `material * enchantments * durability`, or the fixed special-item score.
pub fn item_score(item: &ItemStack, config: &EquipmentConfig) -> f64 {
    if let Some(score) = special_score(&item.kind, config) {
        return score;
    }
    let base = material_of(&item.kind)
        .and_then(|material| config.material_scores.get(material).copied())
        .unwrap_or(0.0);
    if base <= 0.0 {
        return 0.0;
    }

    let durability_percent = item.durability_fraction() * 100.0;
    let durability_factor = if durability_percent < config.durability_threshold_percent {
        config.low_durability_penalty
    } else {
        1.0
    };

    base * enchantment_multiplier(item, config) * durability_factor
}

pub fn bucket_scores(snapshot: &EquipmentSnapshot, config: &EquipmentConfig) -> BTreeMap<Bucket, f64> {
    let mut buckets: BTreeMap<Bucket, f64> = Bucket::ALL.iter().map(|b| (*b, 0.0)).collect();

    if config.include_armor {
        let mut armor: f64 = snapshot
            .equipped_armor
            .iter()
            .map(|item| item_score(item, config))
            .sum();
        if snapshot.equipped_armor.len() == ARMOR_SLOTS {
            armor *= config.full_set_bonus;
        }
        buckets.insert(Bucket::Armor, armor);
    }

    let mut add_contents = |items: &[ItemStack]| {
        for item in items {
            if let Some(bucket) = bucket_of(&item.kind, config) {
                *buckets.entry(bucket).or_default() += item_score(item, config);
            }
        }
    };
    if config.include_inventory {
        add_contents(&snapshot.inventory);
    }
    if config.include_ender_chest {
        add_contents(&snapshot.ender_chest);
    }

    for score in buckets.values_mut() {
        *score = score.min(100.0);
    }
    buckets
}

/// Weighted average of the capped component buckets.
pub fn score(snapshot: &EquipmentSnapshot, config: &EquipmentConfig) -> f64 {
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for (bucket, value) in bucket_scores(snapshot, config) {
        let weight = config
            .component_weights
            .get(bucket.key())
            .copied()
            .unwrap_or(0.0);
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
