use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a scored participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// The six weighted signal groups that feed the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Milestones,
    Experience,
    Equipment,
    Wealth,
    Statistics,
    CustomMilestones,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Milestones,
        Category::Experience,
        Category::Equipment,
        Category::Wealth,
        Category::Statistics,
        Category::CustomMilestones,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Milestones => "milestones",
            Category::Experience => "experience",
            Category::Equipment => "equipment",
            Category::Wealth => "wealth",
            Category::Statistics => "statistics",
            Category::CustomMilestones => "custom_milestones",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Host event kinds that ask for a recompute. Each selects its own debounce delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Milestone,
    Experience,
    Inventory,
    ItemBreak,
    Statistics,
    Join,
    LossDecay,
    Admin,
    Periodic,
    Other,
}

impl TriggerSource {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerSource::Milestone => "milestone",
            TriggerSource::Experience => "experience",
            TriggerSource::Inventory => "inventory",
            TriggerSource::ItemBreak => "item_break",
            TriggerSource::Statistics => "statistics",
            TriggerSource::Join => "join",
            TriggerSource::LossDecay => "loss_decay",
            TriggerSource::Admin => "admin",
            TriggerSource::Periodic => "periodic",
            TriggerSource::Other => "other",
        }
    }
}

/// One category's contribution to a recompute, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub value: f64,
}

impl CategoryScore {
    /// Clamps into `[0, 100]`; non-finite input becomes 0.
    pub fn new(category: Category, value: f64) -> Self {
        let value = if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self { category, value }
    }

    pub fn zero(category: Category) -> Self {
        Self {
            category,
            value: 0.0,
        }
    }
}

/// Immutable outcome of one recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResult {
    pub final_score: f64,
    /// Weighted category sum before the penalty is subtracted.
    pub weighted_total: f64,
    /// `weighted_total - penalty_applied`, before clamping.
    pub total_before_clamp: f64,
    pub categories: Vec<CategoryScore>,
    pub penalty_applied: f64,
}

impl ProgressResult {
    pub fn score_for(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|score| score.category == category)
            .map(|score| score.value)
            .unwrap_or(0.0)
    }
}

/// Long-lived cached state for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub current_progress: f64,
    pub previous_progress: f64,
    pub last_update: DateTime<Utc>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub completed_milestones: BTreeSet<String>,
    #[serde(default)]
    pub last_equipment_value: f64,
    #[serde(default)]
    pub total_loss_events: u32,
}

impl ParticipantRecord {
    pub fn new(participant_id: ParticipantId, initial_progress: f64, now: DateTime<Utc>) -> Self {
        Self {
            participant_id,
            current_progress: initial_progress,
            previous_progress: initial_progress,
            last_update: now,
            first_seen: None,
            last_seen: now,
            completed_milestones: BTreeSet::new(),
            last_equipment_value: 0.0,
            total_loss_events: 0,
        }
    }

    /// Shift the current score into `previous_progress` and store the new one.
    pub fn apply_score(&mut self, score: f64, now: DateTime<Utc>) {
        self.previous_progress = self.current_progress;
        self.current_progress = score;
        self.last_update = now;
    }

    pub fn progress_delta(&self) -> f64 {
        self.current_progress - self.previous_progress
    }

    pub fn has_significant_change(&self, threshold: f64) -> bool {
        self.progress_delta().abs() >= threshold
    }

    pub fn mark_seen(&mut self, now: DateTime<Utc>) {
        if self.first_seen.map(|first| first > now).unwrap_or(true) {
            self.first_seen = Some(now);
        }
        self.last_seen = now;
    }
}

/// Notification payload describing a significant score movement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressChange {
    pub participant_id: ParticipantId,
    pub old_score: f64,
    pub new_score: f64,
    pub breakdown: ProgressResult,
}

impl ProgressChange {
    pub fn delta(&self) -> f64 {
        self.new_score - self.old_score
    }

    pub fn is_increase(&self) -> bool {
        self.new_score > self.old_score
    }

    pub fn is_decrease(&self) -> bool {
        self.new_score < self.old_score
    }
}

/// Persisted score sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub participant_id: ParticipantId,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    pub score: f64,
}
