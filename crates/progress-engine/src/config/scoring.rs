use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ConfigError;
use crate::progress::{Category, TriggerSource};

const WEIGHT_SUM_TARGET: f64 = 100.0;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
const MAX_HEADLINE_BONUS_CAP: f64 = 20.0;

/// Complete scoring configuration. `weights` is mandatory when read from a file;
/// every other section falls back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,
    #[serde(default = "default_enabled")]
    pub enabled: BTreeMap<Category, bool>,
    #[serde(default)]
    pub bounds: ScoreBounds,
    #[serde(default)]
    pub milestones: MilestoneConfig,
    #[serde(default)]
    pub experience: ExperienceConfig,
    #[serde(default)]
    pub equipment: EquipmentConfig,
    #[serde(default)]
    pub wealth: WealthConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// Custom milestone id -> points awarded when completed.
    #[serde(default)]
    pub custom_milestones: BTreeMap<String, f64>,
    #[serde(default)]
    pub penalty: PenaltyConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default = "default_true")]
    pub allow_external_modifications: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            enabled: default_enabled(),
            bounds: ScoreBounds::default(),
            milestones: MilestoneConfig::default(),
            experience: ExperienceConfig::default(),
            equipment: EquipmentConfig::default(),
            wealth: WealthConfig::default(),
            statistics: StatisticsConfig::default(),
            custom_milestones: BTreeMap::new(),
            penalty: PenaltyConfig::default(),
            debounce: DebounceConfig::default(),
            events: EventConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            allow_external_modifications: true,
        }
    }
}

impl ScoringConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ScoringFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::ScoringFormat { source })
    }

    /// Categories missing from `enabled` count as enabled.
    pub fn is_enabled(&self, category: Category) -> bool {
        self.enabled.get(&category).copied().unwrap_or(true)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (category, value) in self.weights.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    category: category.to_string(),
                    value,
                });
            }
        }

        let sum = self.weights.total();
        if (sum - WEIGHT_SUM_TARGET).abs() > WEIGHT_SUM_TOLERANCE {
            warn!(
                weight_sum = sum,
                "category weights do not sum to 100; scores stay valid but read unintuitively"
            );
        }

        let bounds = &self.bounds;
        if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min >= bounds.max {
            return Err(ConfigError::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }

        non_negative("events.threshold", self.events.threshold)?;
        positive("experience.max_level", f64::from(self.experience.max_level))?;
        positive("statistics.max_kills", self.statistics.max_kills)?;
        positive("statistics.max_blocks", self.statistics.max_blocks)?;
        positive("statistics.max_distance", self.statistics.max_distance)?;
        positive(
            "statistics.max_playtime_hours",
            self.statistics.max_playtime_hours,
        )?;
        positive("penalty.scale_constant", self.penalty.scale_constant)?;
        positive("penalty.hard_expiry_secs", self.penalty.hard_expiry_secs as f64)?;
        non_negative("penalty.per_loss", self.penalty.per_loss)?;
        non_negative("penalty.max_flat", self.penalty.max_flat)?;
        non_negative(
            "equipment.durability_threshold_percent",
            self.equipment.durability_threshold_percent,
        )?;
        within(
            "equipment.low_durability_penalty",
            self.equipment.low_durability_penalty,
            0.0,
            1.0,
        )?;
        non_negative(
            "equipment.enchantment_base_multiplier",
            self.equipment.enchantment_base_multiplier,
        )?;
        all_non_negative(
            "equipment.enchantment_values",
            self.equipment.enchantment_values.values(),
        )?;
        all_non_negative(
            "equipment.special_items",
            self.equipment.special_items.values(),
        )?;
        // Below 1.0 a completed set would score less than three pieces.
        if !self.equipment.full_set_bonus.is_finite() || self.equipment.full_set_bonus < 1.0 {
            return Err(ConfigError::InvalidThreshold {
                field: "equipment.full_set_bonus",
                value: self.equipment.full_set_bonus,
            });
        }
        within(
            "milestones.bonus_cap",
            self.milestones.bonus_cap,
            0.0,
            MAX_HEADLINE_BONUS_CAP,
        )?;
        all_non_negative(
            "experience.level_bonuses",
            self.experience.level_bonuses.values(),
        )?;
        rising_bonuses(
            "wealth.thresholds",
            self.wealth
                .thresholds
                .iter()
                .map(|threshold| (threshold.balance, threshold.bonus)),
        )?;

        // log10(1) is zero, so the wealth curve needs a ceiling above one.
        if !self.wealth.max_balance.is_finite() || self.wealth.max_balance <= 1.0 {
            return Err(ConfigError::InvalidThreshold {
                field: "wealth.max_balance",
                value: self.wealth.max_balance,
            });
        }

        self.penalty.validate_schedule()
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

fn all_non_negative<'a>(
    field: &'static str,
    values: impl IntoIterator<Item = &'a f64>,
) -> Result<(), ConfigError> {
    values
        .into_iter()
        .try_for_each(|value| non_negative(field, *value))
}

/// Only the highest threshold reached pays out, so bonuses must not shrink as the
/// threshold grows.
fn rising_bonuses(
    field: &'static str,
    pairs: impl Iterator<Item = (f64, f64)>,
) -> Result<(), ConfigError> {
    let mut pairs: Vec<(f64, f64)> = pairs.collect();
    for (threshold, bonus) in &pairs {
        if !threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold {
                field,
                value: *threshold,
            });
        }
        non_negative(field, *bonus)?;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    match pairs.windows(2).find(|pair| pair[1].1 < pair[0].1) {
        Some(pair) => Err(ConfigError::InvalidThreshold {
            field,
            value: pair[1].1,
        }),
        None => Ok(()),
    }
}

fn default_true() -> bool {
    true
}

fn default_enabled() -> BTreeMap<Category, bool> {
    Category::ALL.iter().map(|category| (*category, true)).collect()
}

fn string_map<const N: usize>(entries: [(&str, f64); N]) -> BTreeMap<String, f64> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Category weights in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(BTreeMap<Category, f64>);

impl CategoryWeights {
    pub fn new(weights: BTreeMap<Category, f64>) -> Self {
        Self(weights)
    }

    /// Missing categories weigh zero.
    pub fn weight(&self, category: Category) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, category: Category, value: f64) {
        self.0.insert(category, value);
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(category, value)| (*category, *value))
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Category::Milestones, 25.0),
            (Category::Experience, 15.0),
            (Category::Equipment, 20.0),
            (Category::Wealth, 15.0),
            (Category::Statistics, 15.0),
            (Category::CustomMilestones, 10.0),
        ]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBounds {
    pub min: f64,
    pub max: f64,
    /// Score given to a participant that has never been computed.
    pub initial: f64,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 100.0,
            initial: 1.0,
        }
    }
}

impl ScoreBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneConfig {
    /// Milestone group (story, nether, end, adventure, husbandry, other) -> weight.
    pub group_weights: BTreeMap<String, f64>,
    /// Headline milestone key -> bonus points.
    pub headline_bonuses: BTreeMap<String, f64>,
    pub bonus_cap: f64,
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            group_weights: string_map([
                ("story", 30.0),
                ("nether", 20.0),
                ("end", 20.0),
                ("adventure", 15.0),
                ("husbandry", 15.0),
            ]),
            headline_bonuses: string_map([
                ("minecraft:end/kill_dragon", 10.0),
                ("minecraft:nether/summon_wither", 5.0),
                ("minecraft:nether/create_full_beacon", 5.0),
                ("minecraft:end/elytra", 3.0),
            ]),
            bonus_cap: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    pub max_level: u32,
    pub diminishing_returns: bool,
    /// Level threshold -> bonus; the highest threshold reached applies.
    pub level_bonuses: BTreeMap<u32, f64>,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            max_level: 100,
            diminishing_returns: true,
            level_bonuses: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentConfig {
    pub include_armor: bool,
    pub include_inventory: bool,
    pub include_ender_chest: bool,
    /// Bucket (armor, tools, weapons, special) -> weight.
    pub component_weights: BTreeMap<String, f64>,
    /// Material prefix (NETHERITE, DIAMOND, ...) -> base score.
    pub material_scores: BTreeMap<String, f64>,
    pub enchantment_base_multiplier: f64,
    /// Enchantment id -> value factor; unlisted enchantments count 1.0.
    pub enchantment_values: BTreeMap<String, f64>,
    /// Item kind -> fixed score replacing the material computation.
    pub special_items: BTreeMap<String, f64>,
    pub full_set_bonus: f64,
    pub durability_threshold_percent: f64,
    pub low_durability_penalty: f64,
}

impl Default for EquipmentConfig {
    fn default() -> Self {
        Self {
            include_armor: true,
            include_inventory: true,
            include_ender_chest: true,
            component_weights: string_map([
                ("armor", 35.0),
                ("tools", 25.0),
                ("weapons", 25.0),
                ("special", 15.0),
            ]),
            material_scores: string_map([
                ("NETHERITE", 25.0),
                ("DIAMOND", 20.0),
                ("IRON", 12.0),
                ("CHAINMAIL", 10.0),
                ("GOLDEN", 8.0),
                ("STONE", 5.0),
                ("LEATHER", 3.0),
                ("WOOD", 2.0),
            ]),
            enchantment_base_multiplier: 0.15,
            enchantment_values: string_map([
                ("MENDING", 2.0),
                ("PROTECTION", 1.5),
                ("SHARPNESS", 1.5),
                ("FORTUNE", 1.5),
                ("LOOTING", 1.5),
                ("SILK_TOUCH", 1.3),
                ("EFFICIENCY", 1.2),
                ("UNBREAKING", 1.2),
            ]),
            special_items: string_map([
                ("ELYTRA", 40.0),
                ("TRIDENT", 35.0),
                ("TOTEM_OF_UNDYING", 25.0),
            ]),
            full_set_bonus: 1.15,
            durability_threshold_percent: 20.0,
            low_durability_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WealthThreshold {
    pub balance: f64,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WealthConfig {
    pub max_balance: f64,
    pub thresholds: Vec<WealthThreshold>,
}

impl Default for WealthConfig {
    fn default() -> Self {
        Self {
            max_balance: 1_000_000.0,
            thresholds: Vec::new(),
        }
    }
}

impl WealthConfig {
    /// Bonus of the highest threshold the balance reaches.
    pub fn bonus_for(&self, balance: f64) -> f64 {
        self.thresholds
            .iter()
            .filter(|threshold| balance >= threshold.balance)
            .max_by(|a, b| a.balance.total_cmp(&b.balance))
            .map(|threshold| threshold.bonus)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    MobKills,
    BlocksMined,
    DistanceTraveled,
    Playtime,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 4] = [
        StatisticKind::MobKills,
        StatisticKind::BlocksMined,
        StatisticKind::DistanceTraveled,
        StatisticKind::Playtime,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub weights: BTreeMap<StatisticKind, f64>,
    pub max_kills: f64,
    pub max_blocks: f64,
    pub max_distance: f64,
    pub max_playtime_hours: f64,
    /// Creature kind -> bonus per kill.
    pub rare_kill_bonuses: BTreeMap<String, f64>,
    /// Block kind -> bonus per block mined.
    pub valuable_block_bonuses: BTreeMap<String, f64>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (StatisticKind::MobKills, 30.0),
                (StatisticKind::BlocksMined, 30.0),
                (StatisticKind::DistanceTraveled, 20.0),
                (StatisticKind::Playtime, 20.0),
            ]),
            max_kills: 10_000.0,
            max_blocks: 100_000.0,
            max_distance: 1_000_000.0,
            max_playtime_hours: 500.0,
            rare_kill_bonuses: string_map([
                ("ENDER_DRAGON", 50.0),
                ("WITHER", 40.0),
                ("WARDEN", 30.0),
                ("ELDER_GUARDIAN", 20.0),
            ]),
            valuable_block_bonuses: string_map([
                ("ANCIENT_DEBRIS", 10.0),
                ("DIAMOND_ORE", 5.0),
                ("DEEPSLATE_DIAMOND_ORE", 5.0),
                ("EMERALD_ORE", 4.0),
            ]),
        }
    }
}

impl StatisticsConfig {
    pub fn weight(&self, kind: StatisticKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyMode {
    /// Timed loss records that recover on the decay schedule.
    Decaying,
    /// `min(max_flat, per_loss * total_loss_events)`.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayStep {
    pub offset_secs: u64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub mode: PenaltyMode,
    pub scale_constant: f64,
    pub hard_expiry_secs: u64,
    pub decay_schedule: Vec<DecayStep>,
    pub per_loss: f64,
    pub max_flat: f64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            mode: PenaltyMode::Decaying,
            scale_constant: 1000.0,
            hard_expiry_secs: 3600,
            decay_schedule: vec![
                DecayStep {
                    offset_secs: 60,
                    fraction: 0.3,
                },
                DecayStep {
                    offset_secs: 180,
                    fraction: 0.3,
                },
                DecayStep {
                    offset_secs: 300,
                    fraction: 0.4,
                },
            ],
            per_loss: 0.5,
            max_flat: 50.0,
        }
    }
}

impl PenaltyConfig {
    pub fn hard_expiry(&self) -> Duration {
        Duration::from_secs(self.hard_expiry_secs)
    }

    fn validate_schedule(&self) -> Result<(), ConfigError> {
        if self.decay_schedule.is_empty() {
            return Err(ConfigError::InvalidDecaySchedule(
                "at least one decay step is required".to_string(),
            ));
        }

        let mut previous: Option<u64> = None;
        let mut sum = 0.0;
        for step in &self.decay_schedule {
            if previous.is_some_and(|offset| step.offset_secs <= offset) {
                return Err(ConfigError::InvalidDecaySchedule(format!(
                    "offsets must be strictly increasing (saw {}s after {}s)",
                    step.offset_secs,
                    previous.unwrap_or_default()
                )));
            }
            if !step.fraction.is_finite() || step.fraction <= 0.0 || step.fraction > 1.0 {
                return Err(ConfigError::InvalidDecaySchedule(format!(
                    "fraction {} at {}s must lie in (0, 1]",
                    step.fraction, step.offset_secs
                )));
            }
            previous = Some(step.offset_secs);
            sum += step.fraction;
        }

        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::InvalidDecaySchedule(format!(
                "fractions must sum to 1 (got {sum})"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub default_ms: u64,
    pub overrides: BTreeMap<TriggerSource, u64>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            default_ms: 1000,
            overrides: BTreeMap::from([
                (TriggerSource::Milestone, 500),
                (TriggerSource::Experience, 250),
                (TriggerSource::Inventory, 1000),
                (TriggerSource::ItemBreak, 500),
                (TriggerSource::Statistics, 5000),
                (TriggerSource::Join, 1000),
                (TriggerSource::LossDecay, 250),
                (TriggerSource::Admin, 250),
                (TriggerSource::Periodic, 1000),
            ]),
        }
    }
}

impl DebounceConfig {
    pub fn delay_for(&self, trigger: TriggerSource) -> Duration {
        let millis = self
            .overrides
            .get(&trigger)
            .copied()
            .unwrap_or(self.default_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub threshold: f64,
    pub emit: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            emit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub eviction_enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction_enabled: true,
            ttl_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_concurrent_recomputes: usize,
    pub snapshot_timeout_ms: u64,
    pub autosave_interval_secs: u64,
    /// Zero disables the periodic recalculation pass.
    pub recalculation_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub history_retention_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_recomputes: 8,
            snapshot_timeout_ms: 2000,
            autosave_interval_secs: 300,
            recalculation_interval_secs: 60,
            sweep_interval_secs: 60,
            history_retention_days: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_sum_to_one_hundred() {
        let config = ScoringConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.weights.total(), 100.0);
        assert!(Category::ALL.iter().all(|c| config.is_enabled(*c)));
    }

    #[test]
    fn weights_are_mandatory_in_files() {
        let err = ScoringConfig::from_json_str(r#"{"bounds": {"min": 1, "max": 100}}"#)
            .expect_err("weights missing");
        assert!(matches!(err, ConfigError::ScoringFormat { .. }));
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let config = ScoringConfig::from_json_str(
            r#"{
                "weights": {"experience": 60, "wealth": 40},
                "events": {"threshold": 2.0},
                "debounce": {"overrides": {"join": 10}}
            }"#,
        )
        .expect("parses");

        assert_eq!(config.weights.weight(Category::Experience), 60.0);
        assert_eq!(config.weights.weight(Category::Milestones), 0.0);
        assert_eq!(config.events.threshold, 2.0);
        assert!(config.events.emit);
        assert_eq!(
            config.debounce.delay_for(TriggerSource::Join),
            Duration::from_millis(10)
        );
        assert_eq!(
            config.debounce.delay_for(TriggerSource::Statistics),
            Duration::from_millis(1000)
        );
        assert_eq!(config.penalty, PenaltyConfig::default());
        config.validate().expect("valid");
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = ScoringConfig::default();
        config.weights.set(Category::Wealth, -5.0);
        match config.validate() {
            Err(ConfigError::InvalidWeight { category, value }) => {
                assert_eq!(category, "wealth");
                assert_eq!(value, -5.0);
            }
            other => panic!("expected invalid weight, got {other:?}"),
        }
    }

    #[test]
    fn weight_sum_mismatch_only_warns() {
        let mut config = ScoringConfig::default();
        config.weights.set(Category::Wealth, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut config = ScoringConfig::default();
        config.bounds.min = 90.0;
        config.bounds.max = 10.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        let mut config = ScoringConfig::default();
        config.events.threshold = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                field: "events.threshold",
                ..
            })
        ));
    }

    #[test]
    fn decay_schedule_must_cover_the_full_loss() {
        let mut config = ScoringConfig::default();
        config.penalty.decay_schedule.pop();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecaySchedule(_))
        ));

        let mut config = ScoringConfig::default();
        config.penalty.decay_schedule[1].offset_secs = 30;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecaySchedule(_))
        ));
    }

    #[test]
    fn settings_that_break_monotonic_scoring_are_rejected() {
        let field_of = |config: ScoringConfig| match config.validate() {
            Err(ConfigError::InvalidThreshold { field, .. }) => field,
            other => panic!("expected invalid threshold, got {other:?}"),
        };

        let mut config = ScoringConfig::default();
        config.milestones.bonus_cap = 35.0;
        assert_eq!(field_of(config), "milestones.bonus_cap");

        let mut config = ScoringConfig::default();
        config.equipment.enchantment_base_multiplier = -0.1;
        assert_eq!(field_of(config), "equipment.enchantment_base_multiplier");

        let mut config = ScoringConfig::default();
        config
            .equipment
            .enchantment_values
            .insert("CURSE".to_string(), -2.0);
        assert_eq!(field_of(config), "equipment.enchantment_values");

        let mut config = ScoringConfig::default();
        config.equipment.full_set_bonus = -1.15;
        assert_eq!(field_of(config), "equipment.full_set_bonus");

        let mut config = ScoringConfig::default();
        config.equipment.low_durability_penalty = 1.5;
        assert_eq!(field_of(config), "equipment.low_durability_penalty");

        let mut config = ScoringConfig::default();
        config.experience.level_bonuses.insert(30, -5.0);
        assert_eq!(field_of(config), "experience.level_bonuses");

        let mut config = ScoringConfig::default();
        config.wealth.thresholds = vec![WealthThreshold {
            balance: 1_000.0,
            bonus: -3.0,
        }];
        assert_eq!(field_of(config), "wealth.thresholds");
    }

    #[test]
    fn wealth_bonuses_must_not_shrink_at_higher_thresholds() {
        let mut config = ScoringConfig::default();
        config.wealth.thresholds = vec![
            WealthThreshold {
                balance: 100_000.0,
                bonus: 2.0,
            },
            WealthThreshold {
                balance: 1_000.0,
                bonus: 5.0,
            },
        ];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                field: "wealth.thresholds",
                ..
            })
        ));

        config.wealth.thresholds[0].bonus = 8.0;
        config.validate().expect("rising bonuses are valid");

        config.milestones.bonus_cap = 20.0;
        config.validate().expect("cap at the limit is valid");
    }

    #[test]
    fn wealth_bonus_uses_highest_threshold_reached() {
        let wealth = WealthConfig {
            max_balance: 1_000_000.0,
            thresholds: vec![
                WealthThreshold {
                    balance: 1_000.0,
                    bonus: 2.0,
                },
                WealthThreshold {
                    balance: 100_000.0,
                    bonus: 8.0,
                },
                WealthThreshold {
                    balance: 10_000.0,
                    bonus: 5.0,
                },
            ],
        };
        assert_eq!(wealth.bonus_for(500.0), 0.0);
        assert_eq!(wealth.bonus_for(20_000.0), 5.0);
        assert_eq!(wealth.bonus_for(250_000.0), 8.0);
    }

    #[test]
    fn bounds_clamp_nan_to_minimum() {
        let bounds = ScoreBounds::default();
        assert_eq!(bounds.clamp(f64::NAN), 1.0);
        assert_eq!(bounds.clamp(250.0), 100.0);
        assert_eq!(bounds.clamp(-4.0), 1.0);
    }
}
