use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::progress::domain::{
    Category, HistoryEntry, LeaderboardEntry, ParticipantId, ParticipantRecord, ProgressChange,
};
use crate::progress::orchestrator::Collaborators;
use crate::progress::repository::{ChangeNotifier, PersistenceError, PersistenceStore};
use crate::progress::service::ProgressService;
use crate::progress::snapshot::{
    CategorySnapshot, ExperienceSnapshot, SnapshotError, SnapshotProvider, WealthProvider,
};

#[derive(Default, Clone)]
pub(super) struct MemoryPersistence {
    records: Arc<Mutex<HashMap<ParticipantId, ParticipantRecord>>>,
    history: Arc<Mutex<Vec<HistoryEntry>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryPersistence {
    pub(super) fn stored(&self, participant: ParticipantId) -> Option<ParticipantRecord> {
        self.records
            .lock()
            .expect("records mutex poisoned")
            .get(&participant)
            .cloned()
    }

    pub(super) fn seed(&self, record: ParticipantRecord) {
        self.records
            .lock()
            .expect("records mutex poisoned")
            .insert(record.participant_id, record);
    }

    pub(super) fn history_len(&self) -> usize {
        self.history.lock().expect("history mutex poisoned").len()
    }

    pub(super) fn seed_history(&self, entry: HistoryEntry) {
        self.history
            .lock()
            .expect("history mutex poisoned")
            .push(entry);
    }

    pub(super) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceStore for MemoryPersistence {
    async fn load(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError> {
        Ok(self.stored(participant))
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<(), PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.seed(record.clone());
        Ok(())
    }

    async fn append_history(
        &self,
        participant: ParticipantId,
        score: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.seed_history(HistoryEntry {
            participant_id: participant,
            score,
            recorded_at,
        });
        Ok(())
    }

    async fn history(
        &self,
        participant: ParticipantId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let guard = self.history.lock().expect("history mutex poisoned");
        let mut entries: Vec<HistoryEntry> = guard
            .iter()
            .filter(|entry| entry.participant_id == participant)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn top_n(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, PersistenceError> {
        let guard = self.records.lock().expect("records mutex poisoned");
        let mut entries: Vec<LeaderboardEntry> = guard
            .values()
            .map(|record| LeaderboardEntry {
                participant_id: record.participant_id,
                score: record.current_progress,
            })
            .collect();
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn prune_history(&self, older_than: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut guard = self.history.lock().expect("history mutex poisoned");
        let before = guard.len();
        guard.retain(|entry| entry.recorded_at >= older_than);
        Ok(before - guard.len())
    }
}

pub(super) struct UnavailablePersistence;

#[async_trait]
impl PersistenceStore for UnavailablePersistence {
    async fn load(
        &self,
        _participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }

    async fn save(&self, _record: &ParticipantRecord) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }

    async fn append_history(
        &self,
        _participant: ParticipantId,
        _score: f64,
        _recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }

    async fn history(
        &self,
        _participant: ParticipantId,
        _limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }

    async fn top_n(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>, PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }

    async fn prune_history(&self, _older_than: DateTime<Utc>) -> Result<usize, PersistenceError> {
        Err(PersistenceError::Unavailable("database offline".to_string()))
    }
}

/// Snapshot provider that counts calls and tracks how many run at once.
pub(super) struct ScriptedSnapshots {
    snapshot: Mutex<CategorySnapshot>,
    delay: Option<Duration>,
    failing: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSnapshots {
    pub(super) fn new(snapshot: CategorySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            delay: None,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(super) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(super) fn set(&self, snapshot: CategorySnapshot) {
        *self.snapshot.lock().expect("snapshot mutex poisoned") = snapshot;
    }

    pub(super) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotProvider for ScriptedSnapshots {
    async fn snapshot(&self, participant: ParticipantId) -> Result<CategorySnapshot, SnapshotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(SnapshotError::UnknownParticipant(participant));
        }
        Ok(self.snapshot.lock().expect("snapshot mutex poisoned").clone())
    }
}

pub(super) struct FixedWealth(pub(super) f64);

#[async_trait]
impl WealthProvider for FixedWealth {
    async fn balance(&self, _participant: ParticipantId) -> Result<f64, SnapshotError> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    changes: Mutex<Vec<ProgressChange>>,
}

impl RecordingNotifier {
    pub(super) fn changes(&self) -> Vec<ProgressChange> {
        self.changes.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn emit(&self, change: ProgressChange) {
        self.changes
            .lock()
            .expect("notifier mutex poisoned")
            .push(change);
    }
}

pub(super) fn level_snapshot(level: u32) -> CategorySnapshot {
    CategorySnapshot {
        experience: Some(ExperienceSnapshot { level }),
        ..CategorySnapshot::default()
    }
}

/// Config where only experience counts, so final scores are easy to predict.
pub(super) fn experience_only_config() -> ScoringConfig {
    let mut config = ScoringConfig::default();
    for category in Category::ALL {
        config.weights.set(category, 0.0);
    }
    config.weights.set(Category::Experience, 100.0);
    config
}

pub(super) struct Harness {
    pub(super) service: ProgressService,
    pub(super) persistence: MemoryPersistence,
    pub(super) snapshots: Arc<ScriptedSnapshots>,
    pub(super) notifier: Arc<RecordingNotifier>,
}

pub(super) fn harness(config: ScoringConfig, snapshots: ScriptedSnapshots) -> Harness {
    harness_with_wealth(config, snapshots, None)
}

pub(super) fn harness_with_wealth(
    config: ScoringConfig,
    snapshots: ScriptedSnapshots,
    wealth: Option<Arc<dyn WealthProvider>>,
) -> Harness {
    let persistence = MemoryPersistence::default();
    let snapshots = Arc::new(snapshots);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = ProgressService::new(
        config,
        Collaborators {
            persistence: Arc::new(persistence.clone()),
            snapshots: snapshots.clone(),
            wealth,
            notifier: notifier.clone(),
        },
    );
    Harness {
        service,
        persistence,
        snapshots,
        notifier,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}
