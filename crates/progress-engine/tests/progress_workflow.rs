use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_engine::config::ScoringConfig;
use progress_engine::progress::{
    CategorySnapshot, ChangeNotifier, Collaborators, EquipmentSnapshot, ExperienceSnapshot,
    HistoryEntry, ItemStack, LeaderboardEntry, MilestoneEntry, MilestoneSnapshot,
    ParticipantId, ParticipantRecord, PersistenceError, PersistenceStore, ProgressChange,
    ProgressService, SnapshotError, SnapshotProvider, StatisticsSnapshot, TriggerSource,
    WealthProvider,
};

#[derive(Default)]
struct Records {
    records: Mutex<HashMap<ParticipantId, ParticipantRecord>>,
    history: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl PersistenceStore for Records {
    async fn load(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .expect("records mutex poisoned")
            .get(&participant)
            .cloned())
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .expect("records mutex poisoned")
            .insert(record.participant_id, record.clone());
        Ok(())
    }

    async fn append_history(
        &self,
        participant: ParticipantId,
        score: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.history
            .lock()
            .expect("history mutex poisoned")
            .push(HistoryEntry {
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
        Ok(self
            .history
            .lock()
            .expect("history mutex poisoned")
            .iter()
            .rev()
            .filter(|entry| entry.participant_id == participant)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn top_n(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, PersistenceError> {
        let mut entries: Vec<LeaderboardEntry> = self
            .records
            .lock()
            .expect("records mutex poisoned")
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
        let mut history = self.history.lock().expect("history mutex poisoned");
        let before = history.len();
        history.retain(|entry| entry.recorded_at >= older_than);
        Ok(before - history.len())
    }
}

#[derive(Default)]
struct World {
    snapshots: Mutex<HashMap<ParticipantId, CategorySnapshot>>,
    balances: Mutex<HashMap<ParticipantId, f64>>,
}

impl World {
    fn set_snapshot(&self, participant: ParticipantId, snapshot: CategorySnapshot) {
        self.snapshots
            .lock()
            .expect("world mutex poisoned")
            .insert(participant, snapshot);
    }

    fn set_balance(&self, participant: ParticipantId, balance: f64) {
        self.balances
            .lock()
            .expect("world mutex poisoned")
            .insert(participant, balance);
    }
}

#[async_trait]
impl SnapshotProvider for World {
    async fn snapshot(&self, participant: ParticipantId) -> Result<CategorySnapshot, SnapshotError> {
        self.snapshots
            .lock()
            .expect("world mutex poisoned")
            .get(&participant)
            .cloned()
            .ok_or(SnapshotError::UnknownParticipant(participant))
    }
}

#[async_trait]
impl WealthProvider for World {
    async fn balance(&self, participant: ParticipantId) -> Result<f64, SnapshotError> {
        self.balances
            .lock()
            .expect("world mutex poisoned")
            .get(&participant)
            .copied()
            .ok_or(SnapshotError::UnknownParticipant(participant))
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<ProgressChange>>);

impl ChangeNotifier for Inbox {
    fn emit(&self, change: ProgressChange) {
        self.0.lock().expect("inbox mutex poisoned").push(change);
    }
}

fn veteran_snapshot() -> CategorySnapshot {
    CategorySnapshot {
        milestones: Some(MilestoneSnapshot {
            entries: vec![
                MilestoneEntry::new("minecraft:story/root", true),
                MilestoneEntry::new("minecraft:nether/root", true),
                MilestoneEntry::new("minecraft:end/root", true),
                MilestoneEntry::new("minecraft:end/kill_dragon", true),
                MilestoneEntry::new("minecraft:adventure/root", false),
                MilestoneEntry::new("minecraft:husbandry/root", true),
            ],
        }),
        experience: Some(ExperienceSnapshot { level: 45 }),
        equipment: Some(EquipmentSnapshot {
            equipped_armor: vec![
                ItemStack::new("DIAMOND_HELMET").with_enchantment("PROTECTION", 4),
                ItemStack::new("DIAMOND_CHESTPLATE").with_enchantment("PROTECTION", 4),
                ItemStack::new("DIAMOND_LEGGINGS"),
                ItemStack::new("DIAMOND_BOOTS"),
            ],
            inventory: vec![
                ItemStack::new("NETHERITE_PICKAXE").with_enchantment("EFFICIENCY", 5),
                ItemStack::new("DIAMOND_SWORD").with_enchantment("SHARPNESS", 5),
                ItemStack::new("ELYTRA"),
            ],
            ender_chest: Vec::new(),
        }),
        statistics: Some(StatisticsSnapshot {
            kills: BTreeMap::from([
                ("ZOMBIE".to_string(), 800),
                ("ENDER_DRAGON".to_string(), 1),
            ]),
            blocks_mined: BTreeMap::from([
                ("STONE".to_string(), 20_000),
                ("DIAMOND_ORE".to_string(), 40),
            ]),
            distance_blocks: 150_000.0,
            playtime_seconds: 80 * 3600,
        }),
    }
}

struct Setup {
    service: ProgressService,
    world: Arc<World>,
    inbox: Arc<Inbox>,
    records: Arc<Records>,
}

fn setup(config: ScoringConfig) -> Setup {
    let world = Arc::new(World::default());
    let inbox = Arc::new(Inbox::default());
    let records = Arc::new(Records::default());
    let service = ProgressService::new(
        config,
        Collaborators {
            persistence: records.clone(),
            snapshots: world.clone(),
            wealth: Some(world.clone()),
            notifier: inbox.clone(),
        },
    );
    Setup {
        service,
        world,
        inbox,
        records,
    }
}

#[tokio::test(start_paused = true)]
async fn veteran_scores_across_every_category() {
    let setup = setup(ScoringConfig::default());
    let veteran = ParticipantId::new();
    setup.world.set_snapshot(veteran, veteran_snapshot());
    setup.world.set_balance(veteran, 50_000.0);

    setup.service.observe(veteran).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let record = setup.service.get_record(veteran).await;
    assert!(record.current_progress > 40.0, "got {}", record.current_progress);
    assert!(record.current_progress < 100.0);
    assert!(record.last_equipment_value > 0.0);

    let changes = setup.inbox.0.lock().expect("inbox mutex poisoned").clone();
    assert_eq!(changes.len(), 1);
    let breakdown = &changes[0].breakdown;
    assert_eq!(breakdown.categories.len(), 6);
    assert!(breakdown
        .categories
        .iter()
        .filter(|score| score.category != progress_engine::progress::Category::CustomMilestones)
        .all(|score| score.value > 0.0));
}

#[tokio::test(start_paused = true)]
async fn newcomer_gains_progress_and_drops_after_death() {
    let setup = setup(ScoringConfig::default());
    let newcomer = ParticipantId::new();
    setup.world.set_snapshot(
        newcomer,
        CategorySnapshot {
            experience: Some(ExperienceSnapshot { level: 5 }),
            ..CategorySnapshot::default()
        },
    );

    setup.service.observe(newcomer).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let starting = setup.service.get_score(newcomer).await;

    setup.world.set_snapshot(newcomer, veteran_snapshot());
    setup
        .service
        .request_update(newcomer, TriggerSource::Inventory, false);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let geared = setup.service.get_score(newcomer).await;
    assert!(geared > starting);

    let loss = setup
        .service
        .register_item_loss(newcomer, &veteran_snapshot().equipment.unwrap_or_default().inventory);
    assert!(loss.is_some());
    setup
        .service
        .request_update(newcomer, TriggerSource::ItemBreak, true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_death = setup.service.get_score(newcomer).await;
    assert!(after_death < geared);

    tokio::time::sleep(Duration::from_secs(400)).await;
    let recovered = setup.service.get_score(newcomer).await;
    assert!((recovered - geared).abs() < 1e-9);

    let history = setup.service.history(newcomer, 50).await.expect("history");
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn flushed_records_survive_a_restart() {
    let first = setup(ScoringConfig::default());
    let participant = ParticipantId::new();
    first.world.set_snapshot(participant, veteran_snapshot());

    let result = first
        .service
        .force_recalculate(participant)
        .await
        .expect("recompute runs");
    first
        .service
        .grant_milestone(participant, "server:first_build")
        .await
        .expect("grant");
    assert_eq!(first.service.shutdown().await, 1);

    let restarted = ProgressService::new(
        ScoringConfig::default(),
        Collaborators {
            persistence: first.records.clone(),
            snapshots: first.world.clone(),
            wealth: None,
            notifier: Arc::new(Inbox::default()),
        },
    );
    let record = restarted.get_record(participant).await;
    assert_eq!(record.current_progress, result.final_score);
    assert!(record.completed_milestones.contains("server:first_build"));
}
