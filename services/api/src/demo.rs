use crate::infra::{InMemoryHost, InMemoryPersistence, LoggingNotifier};
use clap::Args;
use progress_engine::config::ScoringConfig;
use progress_engine::error::AppError;
use progress_engine::progress::{
    CategorySnapshot, Collaborators, EquipmentSnapshot, ExperienceSnapshot, ItemStack,
    MilestoneEntry, MilestoneSnapshot, ParticipantId, ProgressResult, ProgressService,
    StatisticsSnapshot,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Scoring configuration file (JSON). Defaults to the built-in weights.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Print each breakdown as JSON instead of a table.
    #[arg(long)]
    pub(crate) json: bool,
    /// Skip the death-and-recovery portion of the demo.
    #[arg(long)]
    pub(crate) skip_loss: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Newcomer,
    Settler,
    Veteran,
}

impl Tier {
    const ALL: [Tier; 3] = [Tier::Newcomer, Tier::Settler, Tier::Veteran];

    fn label(&self) -> &'static str {
        match self {
            Tier::Newcomer => "newcomer",
            Tier::Settler => "settler",
            Tier::Veteran => "veteran",
        }
    }

    fn balance(&self) -> f64 {
        match self {
            Tier::Newcomer => 40.0,
            Tier::Settler => 6_500.0,
            Tier::Veteran => 250_000.0,
        }
    }
}

fn milestones_for(tier: Tier) -> MilestoneSnapshot {
    let keys = [
        ("minecraft:story/root", Tier::Newcomer),
        ("minecraft:story/mine_stone", Tier::Newcomer),
        ("minecraft:story/smelt_iron", Tier::Settler),
        ("minecraft:story/enter_the_nether", Tier::Settler),
        ("minecraft:nether/root", Tier::Settler),
        ("minecraft:nether/find_fortress", Tier::Veteran),
        ("minecraft:nether/summon_wither", Tier::Veteran),
        ("minecraft:end/root", Tier::Veteran),
        ("minecraft:end/kill_dragon", Tier::Veteran),
        ("minecraft:adventure/root", Tier::Newcomer),
        ("minecraft:adventure/kill_a_mob", Tier::Settler),
        ("minecraft:husbandry/root", Tier::Newcomer),
        ("minecraft:husbandry/breed_an_animal", Tier::Veteran),
    ];
    let rank = |t: Tier| Tier::ALL.iter().position(|candidate| *candidate == t);
    MilestoneSnapshot {
        entries: keys
            .iter()
            .map(|(key, needed)| MilestoneEntry::new(*key, rank(*needed) <= rank(tier)))
            .collect(),
    }
}

fn equipment_for(tier: Tier) -> EquipmentSnapshot {
    match tier {
        Tier::Newcomer => EquipmentSnapshot {
            equipped_armor: vec![ItemStack::new("LEATHER_CHESTPLATE")],
            inventory: vec![ItemStack::new("WOODEN_PICKAXE"), ItemStack::new("STONE_SWORD")],
            ender_chest: Vec::new(),
        },
        Tier::Settler => EquipmentSnapshot {
            equipped_armor: ["IRON_HELMET", "IRON_CHESTPLATE", "IRON_LEGGINGS", "IRON_BOOTS"]
                .iter()
                .map(|kind| ItemStack::new(*kind))
                .collect(),
            inventory: vec![
                ItemStack::new("IRON_PICKAXE").with_enchantment("EFFICIENCY", 2),
                ItemStack::new("IRON_SWORD"),
                ItemStack::new("SHIELD"),
            ],
            ender_chest: Vec::new(),
        },
        Tier::Veteran => EquipmentSnapshot {
            equipped_armor: [
                "NETHERITE_HELMET",
                "NETHERITE_CHESTPLATE",
                "NETHERITE_LEGGINGS",
                "NETHERITE_BOOTS",
            ]
            .iter()
            .map(|kind| ItemStack::new(*kind).with_enchantment("PROTECTION", 4))
            .collect(),
            inventory: vec![
                ItemStack::new("NETHERITE_PICKAXE")
                    .with_enchantment("EFFICIENCY", 5)
                    .with_enchantment("MENDING", 1),
                ItemStack::new("DIAMOND_SWORD")
                    .with_enchantment("SHARPNESS", 5)
                    .with_durability(1561, 400),
                ItemStack::new("TRIDENT"),
                ItemStack::new("ELYTRA"),
            ],
            ender_chest: vec![ItemStack::new("TOTEM_OF_UNDYING").with_amount(2)],
        },
    }
}

fn statistics_for(tier: Tier) -> StatisticsSnapshot {
    let (kills, blocks, distance, hours) = match tier {
        Tier::Newcomer => (35, 1_200, 8_000.0, 3),
        Tier::Settler => (900, 24_000, 120_000.0, 40),
        Tier::Veteran => (6_400, 160_000, 900_000.0, 320),
    };
    let mut kill_counts = BTreeMap::from([("ZOMBIE".to_string(), kills)]);
    let mut block_counts = BTreeMap::from([("STONE".to_string(), blocks)]);
    if tier == Tier::Veteran {
        kill_counts.insert("ENDER_DRAGON".to_string(), 1);
        kill_counts.insert("WITHER".to_string(), 2);
        block_counts.insert("ANCIENT_DEBRIS".to_string(), 48);
    }
    StatisticsSnapshot {
        kills: kill_counts,
        blocks_mined: block_counts,
        distance_blocks: distance,
        playtime_seconds: hours * 3600,
    }
}

fn snapshot_for(tier: Tier) -> CategorySnapshot {
    let level = match tier {
        Tier::Newcomer => 4,
        Tier::Settler => 27,
        Tier::Veteran => 68,
    };
    CategorySnapshot {
        milestones: Some(milestones_for(tier)),
        experience: Some(ExperienceSnapshot { level }),
        equipment: Some(equipment_for(tier)),
        statistics: Some(statistics_for(tier)),
    }
}

fn render_breakdown(label: &str, result: &ProgressResult, as_json: bool) {
    if as_json {
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{label}:\n{json}"),
            Err(err) => println!("{label}: breakdown unavailable ({err})"),
        }
        return;
    }

    println!("\n{label}: {:.2}", result.final_score);
    for score in &result.categories {
        println!("  {:<18} {:>6.2}", score.category.label(), score.value);
    }
    if result.penalty_applied > 0.0 {
        println!("  {:<18} {:>6.2}", "loss penalty", -result.penalty_applied);
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        config,
        json,
        skip_loss,
    } = args;

    let config = match config {
        Some(path) => ScoringConfig::from_path(path)?,
        None => ScoringConfig::default(),
    };
    config.validate()?;

    let host = Arc::new(InMemoryHost::default());
    let service = ProgressService::new(
        config,
        Collaborators {
            persistence: Arc::new(InMemoryPersistence::default()),
            snapshots: host.clone(),
            wealth: Some(host.clone()),
            notifier: Arc::new(LoggingNotifier),
        },
    );

    println!("Progress scoring demo");
    let mut participants = Vec::new();
    for tier in Tier::ALL {
        let participant = ParticipantId::new();
        host.set_snapshot(participant, snapshot_for(tier));
        host.set_balance(participant, tier.balance());
        service.observe(participant).await;

        let result = service.force_recalculate(participant).await?;
        render_breakdown(tier.label(), &result, json);
        participants.push((tier, participant));
    }

    if !skip_loss {
        if let Some((tier, veteran)) = participants
            .iter()
            .find(|(tier, _)| *tier == Tier::Veteran)
            .copied()
        {
            println!("\nThe {} dies and drops their inventory", tier.label());
            let dropped = equipment_for(tier).inventory;
            match service.register_item_loss(veteran, &dropped) {
                Some(loss) => println!("  Loss {loss} registered"),
                None => println!("  Nothing of value was lost"),
            }
            println!(
                "  Current penalty: {:.3}",
                service.current_penalty(veteran).await
            );
            let result = service.force_recalculate(veteran).await?;
            render_breakdown("veteran after death", &result, json);
        }
    }

    println!("\nLeaderboard");
    let leaders = service.top_participants(participants.len()).await?;
    for (rank, entry) in leaders.iter().enumerate() {
        let tier = participants
            .iter()
            .find(|(_, id)| *id == entry.participant_id)
            .map(|(tier, _)| tier.label())
            .unwrap_or("unknown");
        println!("  {}. {:<10} {:>6.2}", rank + 1, tier, entry.score);
    }

    let stats = service.stats();
    println!(
        "\nRecomputes: {} started, {} completed, {} change notifications",
        stats.orchestrator.recomputes_started,
        stats.orchestrator.recomputes_completed,
        stats.orchestrator.notifications
    );
    service.shutdown().await;
    Ok(())
}
