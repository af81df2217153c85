use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use progress_engine::progress::{
    CategorySnapshot, ChangeNotifier, HistoryEntry, LeaderboardEntry, ParticipantId,
    ParticipantRecord, PersistenceError, PersistenceStore, ProgressChange, ProgressService,
    SnapshotError, SnapshotProvider, WealthProvider,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) host: Arc<InMemoryHost>,
    pub(crate) progress: Arc<ProgressService>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPersistence {
    records: Arc<Mutex<HashMap<ParticipantId, ParticipantRecord>>>,
    history: Arc<Mutex<Vec<HistoryEntry>>>,
}

#[async_trait]
impl PersistenceStore for InMemoryPersistence {
    async fn load(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(&participant).cloned())
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<(), PersistenceError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(record.participant_id, record.clone());
        Ok(())
    }

    async fn append_history(
        &self,
        participant: ParticipantId,
        score: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut guard = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(HistoryEntry {
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
        let guard = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .iter()
            .rev()
            .filter(|entry| entry.participant_id == participant)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn top_n(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, PersistenceError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
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
        let mut guard = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|entry| entry.recorded_at >= older_than);
        Ok(before - guard.len())
    }
}

/// Stand-in for the game host: snapshots and balances are pushed over HTTP or by the demo.
#[derive(Default)]
pub(crate) struct InMemoryHost {
    snapshots: Mutex<HashMap<ParticipantId, CategorySnapshot>>,
    balances: Mutex<HashMap<ParticipantId, f64>>,
}

impl InMemoryHost {
    pub(crate) fn set_snapshot(&self, participant: ParticipantId, snapshot: CategorySnapshot) {
        let mut guard = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(participant, snapshot);
    }

    pub(crate) fn set_balance(&self, participant: ParticipantId, balance: f64) {
        let mut guard = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(participant, balance);
    }
}

#[async_trait]
impl SnapshotProvider for InMemoryHost {
    async fn snapshot(&self, participant: ParticipantId) -> Result<CategorySnapshot, SnapshotError> {
        let guard = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&participant)
            .cloned()
            .ok_or(SnapshotError::UnknownParticipant(participant))
    }
}

#[async_trait]
impl WealthProvider for InMemoryHost {
    // Accounts that were never funded hold nothing.
    async fn balance(&self, participant: ParticipantId) -> Result<f64, SnapshotError> {
        let guard = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(&participant).copied().unwrap_or(0.0))
    }
}

/// Publishes significant score changes to the log stream.
pub(crate) struct LoggingNotifier;

impl ChangeNotifier for LoggingNotifier {
    fn emit(&self, change: ProgressChange) {
        info!(
            participant = %change.participant_id,
            old = change.old_score,
            new = change.new_score,
            delta = change.delta(),
            "progress changed"
        );
    }
}
