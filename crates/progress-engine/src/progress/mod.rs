//! Progress scoring engine: category formulas, weighted aggregation, a decaying loss
//! penalty, and the per-participant debounce/recompute orchestration around them.

pub mod aggregate;
pub mod domain;
pub mod maintenance;
pub mod orchestrator;
pub mod penalty;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use aggregate::ScoreAggregator;
pub use domain::{
    Category, CategoryScore, HistoryEntry, LeaderboardEntry, ParticipantId, ParticipantRecord,
    ProgressChange, ProgressResult, TriggerSource,
};
pub use maintenance::{spawn_maintenance, MaintenanceTasks};
pub use orchestrator::{
    Collaborators, LanePhase, OrchestratorStats, RecomputeError, UpdateOrchestrator,
};
pub use penalty::{
    estimate_loss_value, flat_penalty, DecayNotices, LossId, LossRecord, LossSummary,
    PenaltyDecayTracker,
};
pub use repository::{ChangeNotifier, PersistenceError, PersistenceStore, SilentNotifier};
pub use router::progress_router;
pub use scoring::{CategoryOutcome, CategoryScorer, ScoringError, SignalInputs, WealthSignal};
pub use service::{ProgressService, ServiceError, ServiceStats};
pub use snapshot::{
    CategorySnapshot, Durability, EquipmentSnapshot, ExperienceSnapshot, ItemStack,
    MilestoneEntry, MilestoneSnapshot, SnapshotError, SnapshotProvider, StatisticsSnapshot,
    WealthProvider,
};
pub use store::RecordStore;
