use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{PenaltyMode, ScoringConfig};

use super::domain::{
    HistoryEntry, LeaderboardEntry, ParticipantId, ParticipantRecord, ProgressResult,
    TriggerSource,
};
use super::orchestrator::{
    Collaborators, OrchestratorStats, RecomputeError, UpdateOrchestrator,
};
use super::penalty::{
    estimate_loss_value, flat_penalty, LossId, LossSummary, PenaltyDecayTracker,
};
use super::repository::{PersistenceError, PersistenceStore};
use super::snapshot::ItemStack;
use super::store::RecordStore;

/// Error raised by the progress service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("external modifications are disabled")]
    ModificationsDisabled,
    #[error("score must be a finite number (got {0})")]
    InvalidScore(f64),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Recompute(#[from] RecomputeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub cached_participants: usize,
    #[serde(flatten)]
    pub orchestrator: OrchestratorStats,
}

/// Facade composing the record cache, penalty tracker and update orchestrator.
#[derive(Clone)]
pub struct ProgressService {
    config: Arc<ScoringConfig>,
    store: Arc<RecordStore>,
    penalties: Arc<PenaltyDecayTracker>,
    orchestrator: UpdateOrchestrator,
    persistence: Arc<dyn PersistenceStore>,
    decay_listener: Arc<JoinHandle<()>>,
}

impl ProgressService {
    /// Wire the engine. Spawns the decay listener, so a Tokio runtime must be running.
    pub fn new(config: ScoringConfig, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        let persistence = Arc::clone(&collaborators.persistence);
        let store = Arc::new(RecordStore::new(
            Arc::clone(&persistence),
            config.cache.clone(),
            config.bounds.initial,
        ));
        let (penalties, notices) = PenaltyDecayTracker::new(config.penalty.clone());
        let orchestrator = UpdateOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&penalties),
            collaborators,
        );
        let decay_listener = Arc::new(orchestrator.spawn_decay_listener(notices));

        Self {
            config,
            store,
            penalties,
            orchestrator,
            persistence,
            decay_listener,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    fn ensure_modifiable(&self) -> Result<(), ServiceError> {
        if self.config.allow_external_modifications {
            Ok(())
        } else {
            Err(ServiceError::ModificationsDisabled)
        }
    }

    /// Bring a participant into the cache and schedule a `join` recompute.
    pub async fn observe(&self, participant: ParticipantId) -> ParticipantRecord {
        let record = {
            let _gate = self.orchestrator.lock_participant(participant).await;
            self.store.load(participant).await;
            self.store.touch(participant);
            let now = Utc::now();
            self.store
                .update(participant, |record| {
                    record.mark_seen(now);
                    record.clone()
                })
                .unwrap_or_else(|| self.store.default_record(participant))
        };
        self.orchestrator
            .request_update(participant, TriggerSource::Join, false);
        record
    }

    /// Fire-and-forget update request from a host event.
    pub fn request_update(
        &self,
        participant: ParticipantId,
        trigger: TriggerSource,
        immediate: bool,
    ) {
        self.orchestrator
            .request_update(participant, trigger, immediate);
    }

    pub async fn get_record(&self, participant: ParticipantId) -> ParticipantRecord {
        let _gate = self.orchestrator.lock_participant(participant).await;
        let record = self.store.load(participant).await;
        self.store.touch(participant);
        record
    }

    pub async fn get_score(&self, participant: ParticipantId) -> f64 {
        self.get_record(participant).await.current_progress
    }

    pub async fn force_recalculate(
        &self,
        participant: ParticipantId,
    ) -> Result<ProgressResult, ServiceError> {
        Ok(self.orchestrator.force_recalculate(participant).await?)
    }

    /// Overwrite the score directly, clamped to the configured bounds.
    pub async fn set_score(
        &self,
        participant: ParticipantId,
        value: f64,
    ) -> Result<f64, ServiceError> {
        self.ensure_modifiable()?;
        if !value.is_finite() {
            return Err(ServiceError::InvalidScore(value));
        }
        let score = self.config.bounds.clamp(value);

        let _gate = self.orchestrator.lock_participant(participant).await;
        let mut record = self.store.load(participant).await;
        record.apply_score(score, Utc::now());
        self.store.replace(record);
        self.store.touch(participant);
        self.store.save(participant).await?;
        info!(participant = %participant, score, "score set");
        Ok(score)
    }

    /// Wipe score, milestones and losses back to a fresh record.
    pub async fn reset_participant(&self, participant: ParticipantId) -> Result<(), ServiceError> {
        self.ensure_modifiable()?;
        let _gate = self.orchestrator.lock_participant(participant).await;
        let previous = self.store.load(participant).await;
        let mut record = self.store.default_record(participant);
        record.first_seen = previous.first_seen;
        record.last_seen = previous.last_seen;
        self.store.replace(record);
        self.store.touch(participant);
        self.penalties.clear(participant);
        self.store.save(participant).await?;
        info!(participant = %participant, "participant reset");
        Ok(())
    }

    /// Returns false when the milestone was already held.
    pub async fn grant_milestone(
        &self,
        participant: ParticipantId,
        key: &str,
    ) -> Result<bool, ServiceError> {
        self.ensure_modifiable()?;
        let changed = self
            .mutate_record(participant, |record| {
                record.completed_milestones.insert(key.to_string())
            })
            .await;
        if changed {
            self.orchestrator
                .request_update(participant, TriggerSource::Admin, false);
        }
        Ok(changed)
    }

    /// Returns false when the milestone was not held.
    pub async fn revoke_milestone(
        &self,
        participant: ParticipantId,
        key: &str,
    ) -> Result<bool, ServiceError> {
        self.ensure_modifiable()?;
        let changed = self
            .mutate_record(participant, |record| record.completed_milestones.remove(key))
            .await;
        if changed {
            self.orchestrator
                .request_update(participant, TriggerSource::Admin, false);
        }
        Ok(changed)
    }

    pub async fn has_milestone(&self, participant: ParticipantId, key: &str) -> bool {
        self.get_record(participant)
            .await
            .completed_milestones
            .contains(key)
    }

    async fn mutate_record<R>(
        &self,
        participant: ParticipantId,
        apply: impl FnOnce(&mut ParticipantRecord) -> R,
    ) -> R {
        let _gate = self.orchestrator.lock_participant(participant).await;
        let mut record = self.store.load(participant).await;
        let outcome = apply(&mut record);
        self.store.replace(record);
        self.store.touch(participant);
        outcome
    }

    /// Register a loss of the given value. Never waits: the loss counter is bumped on a
    /// spawned task under the participant's gate. In flat mode no decaying record is
    /// created and `None` is returned.
    pub fn register_loss(&self, participant: ParticipantId, value: f64) -> Option<LossId> {
        let service = self.clone();
        let flat = self.config.penalty.mode == PenaltyMode::Flat;
        tokio::spawn(async move {
            service
                .mutate_record(participant, |record| {
                    record.total_loss_events = record.total_loss_events.saturating_add(1);
                })
                .await;
            if flat {
                service
                    .orchestrator
                    .request_update(participant, TriggerSource::LossDecay, false);
            }
        });

        match self.config.penalty.mode {
            PenaltyMode::Decaying => self.penalties.register_loss(participant, value),
            PenaltyMode::Flat => None,
        }
    }

    /// Value the dropped items and register the total as one loss.
    pub fn register_item_loss(
        &self,
        participant: ParticipantId,
        items: &[ItemStack],
    ) -> Option<LossId> {
        let value = estimate_loss_value(items);
        self.register_loss(participant, value)
    }

    pub async fn current_penalty(&self, participant: ParticipantId) -> f64 {
        match self.config.penalty.mode {
            PenaltyMode::Decaying => self.penalties.current_penalty(participant),
            PenaltyMode::Flat => {
                let record = self.get_record(participant).await;
                flat_penalty(record.total_loss_events, &self.config.penalty)
            }
        }
    }

    pub fn active_losses(&self, participant: ParticipantId) -> Vec<LossSummary> {
        self.penalties.active_losses(participant)
    }

    pub async fn history(
        &self,
        participant: ParticipantId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        Ok(self.persistence.history(participant, limit).await?)
    }

    pub async fn top_participants(
        &self,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        Ok(self.persistence.top_n(limit).await?)
    }

    pub async fn prune_history(&self, older_than: DateTime<Utc>) -> Result<usize, ServiceError> {
        Ok(self.persistence.prune_history(older_than).await?)
    }

    /// Flush and evict a participant, dropping any update still scheduled for them.
    /// A failed flush keeps the record cached and its schedule intact.
    pub async fn unload(&self, participant: ParticipantId) -> Result<(), ServiceError> {
        {
            let _gate = self.orchestrator.lock_participant(participant).await;
            self.store.evict(participant).await?;
            self.orchestrator.cancel(participant);
        }
        self.orchestrator.forget(participant);
        Ok(())
    }

    /// Save every cached record, returning how many were written.
    pub async fn flush_all(&self) -> usize {
        let mut saved = 0;
        for participant in self.store.participants() {
            let _gate = self.orchestrator.lock_participant(participant).await;
            match self.store.save(participant).await {
                Ok(()) => saved += 1,
                Err(err) => {
                    warn!(participant = %participant, error = %err, "auto-save failed")
                }
            }
        }
        saved
    }

    /// Queue a `periodic` recompute for everyone in the cache.
    pub fn recalculate_all(&self) -> usize {
        let participants = self.store.participants();
        for participant in &participants {
            self.orchestrator
                .request_update(*participant, TriggerSource::Periodic, false);
        }
        participants.len()
    }

    /// Unload participants with no participant-driven activity for longer than the cache
    /// TTL. Periodic and decay recomputes do not count as activity.
    pub async fn evict_idle(&self) -> usize {
        let mut evicted = 0;
        for participant in self.store.expired(Instant::now()) {
            match self.unload(participant).await {
                Ok(()) => evicted += 1,
                Err(err) => {
                    warn!(participant = %participant, error = %err, "idle eviction failed")
                }
            }
        }
        evicted
    }

    pub fn cached_participants(&self) -> usize {
        self.store.len()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cached_participants: self.store.len(),
            orchestrator: self.orchestrator.stats(),
        }
    }

    /// Stop scheduling, then flush what is cached.
    pub async fn shutdown(&self) -> usize {
        self.orchestrator.shutdown();
        self.decay_listener.abort();
        self.flush_all().await
    }
}
