use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    HistoryEntry, LeaderboardEntry, ParticipantId, ParticipantRecord, ProgressChange,
};

/// Storage abstraction for participant records and score history.
///
/// Saves for different participants may run concurrently; saves for one participant
/// only happen under that participant's gate.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError>;
    async fn save(&self, record: &ParticipantRecord) -> Result<(), PersistenceError>;
    async fn append_history(
        &self,
        participant: ParticipantId,
        score: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;
    /// Most recent entries first.
    async fn history(
        &self,
        participant: ParticipantId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, PersistenceError>;
    /// Highest scores first.
    async fn top_n(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, PersistenceError>;
    /// Drops history recorded before `older_than`, returning how many entries went.
    async fn prune_history(&self, older_than: DateTime<Utc>) -> Result<usize, PersistenceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("record not found")]
    NotFound,
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    #[error("record could not be encoded: {0}")]
    Serialization(String),
}

/// Fire-and-forget sink for significant score changes.
pub trait ChangeNotifier: Send + Sync {
    fn emit(&self, change: ProgressChange);
}

/// Notifier that drops every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl ChangeNotifier for SilentNotifier {
    fn emit(&self, _change: ProgressChange) {}
}
