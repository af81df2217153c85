use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PenaltyConfig;

use super::domain::ParticipantId;
use super::snapshot::ItemStack;

const RECOVERY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossId(pub Uuid);

impl fmt::Display for LossId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One timed loss. `0 <= recovered_value <= total_value` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct LossRecord {
    pub id: LossId,
    pub created_at: Instant,
    pub total_value: f64,
    pub recovered_value: f64,
}

impl LossRecord {
    fn new(total_value: f64) -> Self {
        Self {
            id: LossId(Uuid::new_v4()),
            created_at: Instant::now(),
            total_value,
            recovered_value: 0.0,
        }
    }

    pub fn remaining_fraction(&self) -> f64 {
        (1.0 - self.recovered_value / self.total_value).clamp(0.0, 1.0)
    }

    pub fn penalty(&self, scale_constant: f64) -> f64 {
        self.total_value / scale_constant * self.remaining_fraction()
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered_value >= self.total_value * (1.0 - RECOVERY_EPSILON)
    }

    fn recover(&mut self, amount: f64) {
        let next = self.recovered_value + amount;
        if next > self.total_value * (1.0 + RECOVERY_EPSILON) {
            warn!(
                loss = %self.id,
                recovered = next,
                total = self.total_value,
                "recovered value exceeded loss total; clamping"
            );
        }
        self.recovered_value = next.clamp(0.0, self.total_value);
    }

    fn is_expired(&self, now: Instant, hard_expiry: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= hard_expiry
    }
}

/// Read-only view of a live loss, for inspection surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossSummary {
    pub id: LossId,
    pub total_value: f64,
    pub recovered_value: f64,
    pub recovered_percent: f64,
    pub penalty: f64,
    pub age_secs: u64,
}

/// Receives a participant id every time a decay step changes that participant's penalty.
pub type DecayNotices = mpsc::UnboundedReceiver<ParticipantId>;

/// Per-participant timed loss records whose penalty decays on a fixed schedule.
pub struct PenaltyDecayTracker {
    records: DashMap<ParticipantId, HashMap<LossId, LossRecord>>,
    config: PenaltyConfig,
    notices: mpsc::UnboundedSender<ParticipantId>,
}

impl PenaltyDecayTracker {
    pub fn new(config: PenaltyConfig) -> (Arc<Self>, DecayNotices) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let tracker = Arc::new(Self {
            records: DashMap::new(),
            config,
            notices,
        });
        (tracker, receiver)
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    /// Record a loss and schedule its decay steps. Zero, negative and non-finite
    /// values are ignored.
    pub fn register_loss(self: &Arc<Self>, participant: ParticipantId, value: f64) -> Option<LossId> {
        if !value.is_finite() || value <= 0.0 {
            debug!(participant = %participant, value, "ignoring empty loss");
            return None;
        }

        let record = LossRecord::new(value);
        let id = record.id;
        self.records.entry(participant).or_default().insert(id, record);
        info!(
            participant = %participant,
            loss = %id,
            value,
            penalty = value / self.config.scale_constant,
            "loss registered"
        );

        for step in &self.config.decay_schedule {
            let tracker: Weak<Self> = Arc::downgrade(self);
            let offset = Duration::from_secs(step.offset_secs);
            let fraction = step.fraction;
            tokio::spawn(async move {
                tokio::time::sleep(offset).await;
                if let Some(tracker) = tracker.upgrade() {
                    tracker.apply_decay(participant, id, fraction);
                }
            });
        }
        Some(id)
    }

    /// Returns false when the record is already gone; no notice is sent in that case.
    fn apply_decay(&self, participant: ParticipantId, id: LossId, fraction: f64) -> bool {
        let applied = {
            let Some(mut losses) = self.records.get_mut(&participant) else {
                return false;
            };
            let Some(record) = losses.get_mut(&id) else {
                return false;
            };
            record.recover(record.total_value * fraction);
            debug!(
                participant = %participant,
                loss = %id,
                recovered = record.recovered_value,
                "decay step applied"
            );
            if record.is_recovered() {
                losses.remove(&id);
            }
            true
        };

        self.records
            .remove_if(&participant, |_, losses| losses.is_empty());

        if applied && self.notices.send(participant).is_err() {
            debug!(participant = %participant, "decay notice dropped; no listener");
        }
        applied
    }

    fn evict_expired(&self, participant: ParticipantId) {
        let now = Instant::now();
        let hard_expiry = self.config.hard_expiry();
        if let Some(mut losses) = self.records.get_mut(&participant) {
            losses.retain(|id, record| {
                let keep = !record.is_expired(now, hard_expiry);
                if !keep {
                    debug!(participant = %participant, loss = %id, "loss expired");
                }
                keep
            });
        }
        self.records
            .remove_if(&participant, |_, losses| losses.is_empty());
    }

    /// Sum of the remaining penalty over live records, after dropping expired ones.
    pub fn current_penalty(&self, participant: ParticipantId) -> f64 {
        self.evict_expired(participant);
        self.records
            .get(&participant)
            .map(|losses| {
                losses
                    .values()
                    .map(|record| record.penalty(self.config.scale_constant))
                    .sum()
            })
            .unwrap_or(0.0)
    }

    pub fn active_losses(&self, participant: ParticipantId) -> Vec<LossSummary> {
        self.evict_expired(participant);
        let now = Instant::now();
        let mut summaries: Vec<LossSummary> = self
            .records
            .get(&participant)
            .map(|losses| {
                losses
                    .values()
                    .map(|record| LossSummary {
                        id: record.id,
                        total_value: record.total_value,
                        recovered_value: record.recovered_value,
                        recovered_percent: (1.0 - record.remaining_fraction()) * 100.0,
                        penalty: record.penalty(self.config.scale_constant),
                        age_secs: now.saturating_duration_since(record.created_at).as_secs(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        summaries.sort_by(|a, b| b.age_secs.cmp(&a.age_secs));
        summaries
    }

    pub fn loss_count(&self, participant: ParticipantId) -> usize {
        self.records
            .get(&participant)
            .map(|losses| losses.len())
            .unwrap_or(0)
    }

    pub fn clear(&self, participant: ParticipantId) {
        self.records.remove(&participant);
    }
}

/// Penalty for the flat model: `min(max_flat, per_loss * loss_events)`.
pub fn flat_penalty(loss_events: u32, config: &PenaltyConfig) -> f64 {
    (config.per_loss * f64::from(loss_events)).min(config.max_flat)
}

/// Value of dropped items, used as the total of a loss record.
pub fn estimate_loss_value(items: &[ItemStack]) -> f64 {
    items.iter().map(item_loss_value).sum()
}

fn item_loss_value(item: &ItemStack) -> f64 {
    let kind = item.kind.as_str();
    let material = if kind.contains("NETHERITE") {
        100.0
    } else if kind.contains("DIAMOND") {
        75.0
    } else if kind.contains("GOLDEN") {
        50.0
    } else if kind.contains("IRON") {
        30.0
    } else if kind.contains("STONE") || kind.contains("CHAINMAIL") {
        15.0
    } else if kind.contains("LEATHER") || kind.contains("WOODEN") {
        5.0
    } else {
        0.0
    };
    let special = match kind {
        "ELYTRA" => 150.0,
        "TRIDENT" => 120.0,
        "TOTEM_OF_UNDYING" => 200.0,
        "NETHER_STAR" => 250.0,
        _ => 0.0,
    };
    let enchantments: f64 = item
        .enchantments
        .values()
        .map(|level| f64::from(*level) * 10.0)
        .sum();

    (material + special + enchantments) * item.durability_fraction() * f64::from(item.amount)
}
