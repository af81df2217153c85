use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;

use super::domain::{ParticipantId, ParticipantRecord};
use super::repository::{PersistenceError, PersistenceStore};

struct CachedRecord {
    record: ParticipantRecord,
    /// Last participant-driven access. Engine recomputes leave it alone.
    touched: Instant,
}

/// In-memory participant cache backed by the persistence collaborator.
///
/// Callers hold the participant's gate around every read-modify-write.
pub struct RecordStore {
    records: DashMap<ParticipantId, CachedRecord>,
    persistence: Arc<dyn PersistenceStore>,
    cache: CacheConfig,
    initial_progress: f64,
}

impl RecordStore {
    pub fn new(
        persistence: Arc<dyn PersistenceStore>,
        cache: CacheConfig,
        initial_progress: f64,
    ) -> Self {
        Self {
            records: DashMap::new(),
            persistence,
            cache,
            initial_progress,
        }
    }

    pub fn default_record(&self, participant: ParticipantId) -> ParticipantRecord {
        ParticipantRecord::new(participant, self.initial_progress, Utc::now())
    }

    /// Cached copy, loading from persistence on a miss. A failed load falls back to a
    /// fresh in-memory record.
    pub async fn load(&self, participant: ParticipantId) -> ParticipantRecord {
        if let Some(cached) = self.records.get(&participant) {
            return cached.record.clone();
        }

        let record = match self.persistence.load(participant).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(PersistenceError::NotFound) => {
                debug!(participant = %participant, "no stored record; starting fresh");
                self.default_record(participant)
            }
            Err(err) => {
                warn!(
                    participant = %participant,
                    error = %err,
                    "record load failed; using in-memory default"
                );
                self.default_record(participant)
            }
        };

        self.records
            .entry(participant)
            .or_insert_with(|| CachedRecord {
                record,
                touched: Instant::now(),
            })
            .record
            .clone()
    }

    pub fn get(&self, participant: ParticipantId) -> Option<ParticipantRecord> {
        self.records
            .get(&participant)
            .map(|cached| cached.record.clone())
    }

    /// Mutate a cached record in place; `None` when the participant is not cached.
    pub fn update<R>(
        &self,
        participant: ParticipantId,
        apply: impl FnOnce(&mut ParticipantRecord) -> R,
    ) -> Option<R> {
        self.records
            .get_mut(&participant)
            .map(|mut cached| apply(&mut cached.record))
    }

    /// Store a record, keeping the idle clock of an already cached participant.
    pub fn replace(&self, record: ParticipantRecord) {
        match self.records.entry(record.participant_id) {
            Entry::Occupied(mut entry) => entry.get_mut().record = record,
            Entry::Vacant(entry) => {
                entry.insert(CachedRecord {
                    record,
                    touched: Instant::now(),
                });
            }
        }
    }

    /// Restart the idle clock after activity by or on behalf of the participant.
    pub fn touch(&self, participant: ParticipantId) {
        if let Some(mut cached) = self.records.get_mut(&participant) {
            cached.touched = Instant::now();
        }
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.records.contains_key(&participant)
    }

    /// Write the cached record through to persistence. Uncached participants are a no-op.
    pub async fn save(&self, participant: ParticipantId) -> Result<(), PersistenceError> {
        match self.get(participant) {
            Some(record) => self.persistence.save(&record).await,
            None => Ok(()),
        }
    }

    /// Flush then drop the cached record. On a failed flush the record stays cached.
    pub async fn evict(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError> {
        self.save(participant).await?;
        Ok(self
            .records
            .remove(&participant)
            .map(|(_, cached)| cached.record))
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.records.iter().map(|entry| *entry.key()).collect()
    }

    /// Participants untouched for longer than the cache TTL; empty when eviction is off.
    pub fn expired(&self, now: Instant) -> Vec<ParticipantId> {
        if !self.cache.eviction_enabled {
            return Vec::new();
        }
        let ttl = self.cache.ttl();
        self.records
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.touched) >= ttl)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
