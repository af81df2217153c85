//! Per-participant debounce and recompute scheduling.
//!
//! Every participant owns a lane: a small synchronous state machine
//! (`Idle -> Pending -> Running -> Idle`) plus an async gate held for the full
//! recompute. Requests in `Pending` restart the debounce timer; requests in
//! `Running` collapse into one follow-up. A global semaphore caps how many
//! recomputes run at once across all participants.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{PenaltyMode, ScoringConfig};

use super::aggregate::ScoreAggregator;
use super::domain::{Category, ParticipantId, ProgressChange, ProgressResult, TriggerSource};
use super::penalty::{flat_penalty, DecayNotices, PenaltyDecayTracker};
use super::repository::{ChangeNotifier, PersistenceStore};
use super::scoring::{CategoryScorer, SignalInputs, WealthSignal};
use super::snapshot::{CategorySnapshot, SnapshotProvider, WealthProvider};
use super::store::RecordStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecomputeError {
    #[error("recompute scheduler has shut down")]
    Closed,
}

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub persistence: Arc<dyn PersistenceStore>,
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub wealth: Option<Arc<dyn WealthProvider>>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanePhase {
    Idle,
    Pending,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub requests: u64,
    pub coalesced: u64,
    pub recomputes_started: u64,
    pub recomputes_completed: u64,
    pub notifications: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    coalesced: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    notifications: AtomicU64,
}

struct LaneState {
    phase: LanePhase,
    /// Debounce delay for the single follow-up collected while running.
    follow_up: Option<Duration>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Lane {
    state: Mutex<LaneState>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Lane {
    fn new() -> Self {
        Self {
            state: Mutex::new(LaneState {
                phase: LanePhase::Idle,
                follow_up: None,
                generation: 0,
                timer: None,
            }),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    // Never held across an await.
    fn lock_state(&self) -> MutexGuard<'_, LaneState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Inner {
    lanes: DashMap<ParticipantId, Arc<Lane>>,
    store: Arc<RecordStore>,
    scorer: CategoryScorer,
    aggregator: ScoreAggregator,
    penalties: Arc<PenaltyDecayTracker>,
    collaborators: Collaborators,
    config: Arc<ScoringConfig>,
    permits: Semaphore,
    counters: Counters,
}

impl Inner {
    fn lane(&self, participant: ParticipantId) -> Arc<Lane> {
        Arc::clone(
            self.lanes
                .entry(participant)
                .or_insert_with(|| Arc::new(Lane::new()))
                .value(),
        )
    }
}

/// Debounces update requests and drives at most one recompute per participant.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    inner: Arc<Inner>,
}

impl UpdateOrchestrator {
    pub fn new(
        config: Arc<ScoringConfig>,
        store: Arc<RecordStore>,
        penalties: Arc<PenaltyDecayTracker>,
        collaborators: Collaborators,
    ) -> Self {
        let permits = Semaphore::new(config.scheduler.max_concurrent_recomputes.max(1));
        Self {
            inner: Arc::new(Inner {
                lanes: DashMap::new(),
                store,
                scorer: CategoryScorer::new(Arc::clone(&config)),
                aggregator: ScoreAggregator::from_config(&config),
                penalties,
                collaborators,
                config,
                permits,
                counters: Counters::default(),
            }),
        }
    }

    /// Ask for a recompute. Never waits; must be called inside a Tokio runtime.
    pub fn request_update(
        &self,
        participant: ParticipantId,
        trigger: TriggerSource,
        immediate: bool,
    ) {
        let counters = &self.inner.counters;
        counters.requests.fetch_add(1, Ordering::Relaxed);

        let delay = if immediate {
            Duration::ZERO
        } else {
            self.inner.config.debounce.delay_for(trigger)
        };

        let lane = self.inner.lane(participant);
        let mut state = lane.lock_state();
        match state.phase {
            LanePhase::Running => {
                if state.follow_up.replace(delay).is_some() {
                    counters.coalesced.fetch_add(1, Ordering::Relaxed);
                }
            }
            LanePhase::Pending => {
                counters.coalesced.fetch_add(1, Ordering::Relaxed);
                self.arm(&lane, &mut state, participant, delay);
            }
            LanePhase::Idle => self.arm(&lane, &mut state, participant, delay),
        }
        debug!(
            participant = %participant,
            trigger = trigger.label(),
            delay_ms = delay.as_millis() as u64,
            "update requested"
        );
    }

    fn arm(
        &self,
        lane: &Arc<Lane>,
        state: &mut LaneState,
        participant: ParticipantId,
        delay: Duration,
    ) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.phase = LanePhase::Pending;

        let generation = state.generation;
        let this = self.clone();
        let lane = Arc::clone(lane);
        state.timer = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            this.fire(participant, lane, generation).await;
        }));
    }

    async fn fire(&self, participant: ParticipantId, lane: Arc<Lane>, generation: u64) {
        {
            let mut state = lane.lock_state();
            if state.generation != generation || state.phase != LanePhase::Pending {
                return;
            }
            state.phase = LanePhase::Running;
            // Detach: nothing may abort a running recompute.
            state.timer = None;
        }

        let outcome = {
            let _gate = lane.gate.lock().await;
            let cancelled = lane.lock_state().generation != generation;
            if cancelled {
                debug!(participant = %participant, "scheduled recompute cancelled");
                return;
            }
            self.run_locked(participant).await
        };
        if let Err(err) = outcome {
            warn!(participant = %participant, error = %err, "scheduled recompute skipped");
        }

        let mut state = lane.lock_state();
        if state.generation != generation {
            return;
        }
        match state.follow_up.take() {
            Some(delay) => self.arm(&lane, &mut state, participant, delay),
            None => state.phase = LanePhase::Idle,
        }
    }

    /// Bypass the debounce and wait for a recompute. A pending timer is cancelled
    /// since this run subsumes it.
    pub async fn force_recalculate(
        &self,
        participant: ParticipantId,
    ) -> Result<ProgressResult, RecomputeError> {
        let lane = self.inner.lane(participant);
        {
            let mut state = lane.lock_state();
            if state.phase == LanePhase::Pending {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                state.generation += 1;
                state.phase = LanePhase::Idle;
            }
        }
        self.run_gated(participant, &lane).await
    }

    async fn run_gated(
        &self,
        participant: ParticipantId,
        lane: &Lane,
    ) -> Result<ProgressResult, RecomputeError> {
        let _gate = lane.gate.lock().await;
        self.run_locked(participant).await
    }

    // Caller holds the participant's gate.
    async fn run_locked(
        &self,
        participant: ParticipantId,
    ) -> Result<ProgressResult, RecomputeError> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| RecomputeError::Closed)?;
        Ok(self.recompute(participant).await)
    }

    async fn recompute(&self, participant: ParticipantId) -> ProgressResult {
        let inner = &self.inner;
        let config = &inner.config;
        inner.counters.started.fetch_add(1, Ordering::Relaxed);

        let mut record = inner.store.load(participant).await;
        let snapshot = self.pull_snapshot(participant).await;
        let wealth = self.pull_balance(participant).await;

        let penalty = match config.penalty.mode {
            PenaltyMode::Decaying => inner.penalties.current_penalty(participant),
            PenaltyMode::Flat => flat_penalty(record.total_loss_events, &config.penalty),
        };

        let outcomes = inner.scorer.evaluate(&SignalInputs {
            snapshot: snapshot.as_ref(),
            wealth,
            completed_milestones: &record.completed_milestones,
        });
        let result = inner.aggregator.aggregate(&outcomes, penalty);

        let now = Utc::now();
        let old_score = record.current_progress;
        record.apply_score(result.final_score, now);
        record.last_equipment_value = result.score_for(Category::Equipment);
        let significant = record.has_significant_change(config.events.threshold);
        inner.store.replace(record);

        if significant {
            if config.events.emit {
                info!(
                    participant = %participant,
                    old = old_score,
                    new = result.final_score,
                    "progress changed"
                );
                inner.collaborators.notifier.emit(ProgressChange {
                    participant_id: participant,
                    old_score,
                    new_score: result.final_score,
                    breakdown: result.clone(),
                });
                inner.counters.notifications.fetch_add(1, Ordering::Relaxed);
            }
            if let Err(err) = inner
                .collaborators
                .persistence
                .append_history(participant, result.final_score, now)
                .await
            {
                warn!(participant = %participant, error = %err, "history append failed");
            }
        }

        if let Err(err) = inner.store.save(participant).await {
            warn!(
                participant = %participant,
                error = %err,
                "record save failed; next recompute retries"
            );
        }

        inner.counters.completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            participant = %participant,
            score = result.final_score,
            penalty = result.penalty_applied,
            "recompute finished"
        );
        result
    }

    async fn pull_snapshot(&self, participant: ParticipantId) -> Option<CategorySnapshot> {
        let timeout = self.inner.config.scheduler.snapshot_timeout();
        let provider = &self.inner.collaborators.snapshots;
        match tokio::time::timeout(timeout, provider.snapshot(participant)).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(err)) => {
                warn!(participant = %participant, error = %err, "snapshot unavailable");
                None
            }
            Err(_) => {
                warn!(
                    participant = %participant,
                    timeout_ms = timeout.as_millis() as u64,
                    "snapshot timed out"
                );
                None
            }
        }
    }

    async fn pull_balance(&self, participant: ParticipantId) -> WealthSignal {
        let Some(provider) = &self.inner.collaborators.wealth else {
            return WealthSignal::Absent;
        };
        let timeout = self.inner.config.scheduler.snapshot_timeout();
        match tokio::time::timeout(timeout, provider.balance(participant)).await {
            Ok(Ok(balance)) => WealthSignal::Balance(balance),
            Ok(Err(err)) => {
                warn!(participant = %participant, error = %err, "balance unavailable");
                WealthSignal::Unavailable
            }
            Err(_) => {
                warn!(participant = %participant, "balance lookup timed out");
                WealthSignal::Unavailable
            }
        }
    }

    /// Hold the participant's gate, e.g. for admin mutations of the cached record.
    pub async fn lock_participant(&self, participant: ParticipantId) -> OwnedMutexGuard<()> {
        let lane = self.inner.lane(participant);
        Arc::clone(&lane.gate).lock_owned().await
    }

    /// Turn decay notices into `loss_decay` update requests.
    pub fn spawn_decay_listener(&self, mut notices: DecayNotices) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(participant) = notices.recv().await {
                // The loss keeps decaying; it is applied when the participant is next loaded.
                if !this.inner.store.contains(participant) {
                    debug!(participant = %participant, "decay step for unloaded participant");
                    continue;
                }
                this.request_update(participant, TriggerSource::LossDecay, false);
            }
            debug!("decay notice channel closed");
        })
    }

    pub fn phase(&self, participant: ParticipantId) -> LanePhase {
        self.inner
            .lanes
            .get(&participant)
            .map(|lane| {
                let state = lane.lock_state();
                state.phase
            })
            .unwrap_or(LanePhase::Idle)
    }

    /// Disarm the lane: abort a pending timer and drop a coalesced follow-up. A timer
    /// that already fired and is waiting on the gate sees the new generation and skips.
    /// Call while holding the participant's gate.
    pub fn cancel(&self, participant: ParticipantId) {
        let Some(lane) = self
            .inner
            .lanes
            .get(&participant)
            .map(|lane| Arc::clone(lane.value()))
        else {
            return;
        };
        let mut state = lane.lock_state();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.follow_up = None;
        state.generation += 1;
        state.phase = LanePhase::Idle;
    }

    /// Drop an idle lane. Lanes with pending or running work are kept.
    pub fn forget(&self, participant: ParticipantId) -> bool {
        self.inner
            .lanes
            .remove_if(&participant, |_, lane| {
                let state = lane.lock_state();
                state.phase == LanePhase::Idle
                    && Arc::strong_count(lane) == 1
                    && Arc::strong_count(&lane.gate) == 1
            })
            .is_some()
    }

    /// Cancel pending timers and refuse new recomputes.
    pub fn shutdown(&self) {
        self.inner.permits.close();
        for lane in self.inner.lanes.iter() {
            let mut state = lane.lock_state();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            if state.phase == LanePhase::Pending {
                state.phase = LanePhase::Idle;
            }
            state.follow_up = None;
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        let counters = &self.inner.counters;
        OrchestratorStats {
            requests: counters.requests.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            recomputes_started: counters.started.load(Ordering::Relaxed),
            recomputes_completed: counters.completed.load(Ordering::Relaxed),
            notifications: counters.notifications.load(Ordering::Relaxed),
        }
    }
}
