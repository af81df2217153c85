use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::ParticipantId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("participant {0} is not known to the host")]
    UnknownParticipant(ParticipantId),
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of a participant's world state, pulled fresh for every recompute.
/// A missing section means the host could not supply it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySnapshot {
    pub milestones: Option<MilestoneSnapshot>,
    pub experience: Option<ExperienceSnapshot>,
    pub equipment: Option<EquipmentSnapshot>,
    pub statistics: Option<StatisticsSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneSnapshot {
    /// Every milestone the host knows about, completed or not.
    pub entries: Vec<MilestoneEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEntry {
    pub key: String,
    pub completed: bool,
}

impl MilestoneEntry {
    pub fn new(key: impl Into<String>, completed: bool) -> Self {
        Self {
            key: key.into(),
            completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceSnapshot {
    pub level: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentSnapshot {
    pub equipped_armor: Vec<ItemStack>,
    pub inventory: Vec<ItemStack>,
    pub ender_chest: Vec<ItemStack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Upper-case item kind, e.g. `DIAMOND_SWORD`.
    pub kind: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default)]
    pub enchantments: BTreeMap<String, u32>,
    #[serde(default)]
    pub durability: Option<Durability>,
}

fn default_amount() -> u32 {
    1
}

impl ItemStack {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            amount: 1,
            enchantments: BTreeMap::new(),
            durability: None,
        }
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_enchantment(mut self, id: impl Into<String>, level: u32) -> Self {
        self.enchantments.insert(id.into(), level);
        self
    }

    pub fn with_durability(mut self, max: u32, damage: u32) -> Self {
        self.durability = Some(Durability { max, damage });
        self
    }

    /// Remaining durability as a fraction in `[0, 1]`; items without durability count as intact.
    pub fn durability_fraction(&self) -> f64 {
        match self.durability {
            Some(Durability { max, damage }) if max > 0 => {
                f64::from(max.saturating_sub(damage)) / f64::from(max)
            }
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durability {
    pub max: u32,
    pub damage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsSnapshot {
    /// Creature kind -> kill count.
    pub kills: BTreeMap<String, u64>,
    /// Block kind -> mined count.
    pub blocks_mined: BTreeMap<String, u64>,
    pub distance_blocks: f64,
    pub playtime_seconds: u64,
}

impl StatisticsSnapshot {
    /// Saturates rather than overflowing on host-supplied counts.
    pub fn total_kills(&self) -> u64 {
        self.kills.values().copied().fold(0, u64::saturating_add)
    }

    pub fn total_blocks(&self) -> u64 {
        self.blocks_mined.values().copied().fold(0, u64::saturating_add)
    }

    pub fn playtime_hours(&self) -> f64 {
        self.playtime_seconds as f64 / 3600.0
    }
}

/// Supplies world-state snapshots. Called from any worker lane; may return stale data.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, participant: ParticipantId) -> Result<CategorySnapshot, SnapshotError>;
}

/// Optional balance source. Without one the wealth category is skipped.
#[async_trait]
pub trait WealthProvider: Send + Sync {
    async fn balance(&self, participant: ParticipantId) -> Result<f64, SnapshotError>;
}
