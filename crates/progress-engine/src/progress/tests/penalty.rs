use super::common::*;
use std::time::Duration;

use crate::config::{PenaltyConfig, PenaltyMode};
use crate::progress::domain::ParticipantId;
use crate::progress::penalty::{estimate_loss_value, flat_penalty, PenaltyDecayTracker};
use crate::progress::snapshot::ItemStack;

#[tokio::test(start_paused = true)]
async fn penalty_decays_on_schedule_and_record_is_dropped() {
    let (tracker, _notices) = PenaltyDecayTracker::new(PenaltyConfig::default());
    let participant = ParticipantId::new();

    tracker
        .register_loss(participant, 100.0)
        .expect("loss registered");
    assert!(approx(tracker.current_penalty(participant), 0.1));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(approx(tracker.current_penalty(participant), 0.07));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(approx(tracker.current_penalty(participant), 0.04));
    let losses = tracker.active_losses(participant);
    assert_eq!(losses.len(), 1);
    assert!(approx(losses[0].recovered_percent, 60.0));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(tracker.current_penalty(participant), 0.0);
    assert_eq!(tracker.loss_count(participant), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_losses_sum_their_penalties() {
    let (tracker, _notices) = PenaltyDecayTracker::new(PenaltyConfig::default());
    let participant = ParticipantId::new();

    tracker.register_loss(participant, 100.0);
    tokio::time::sleep(Duration::from_secs(61)).await;
    tracker.register_loss(participant, 500.0);

    assert!(approx(tracker.current_penalty(participant), 0.07 + 0.5));
    assert_eq!(tracker.loss_count(participant), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_records_are_dropped_without_notice() {
    let config = PenaltyConfig {
        hard_expiry_secs: 30,
        ..PenaltyConfig::default()
    };
    let (tracker, mut notices) = PenaltyDecayTracker::new(config);
    let participant = ParticipantId::new();

    tracker.register_loss(participant, 250.0);
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(tracker.current_penalty(participant), 0.0);
    assert_eq!(tracker.loss_count(participant), 0);

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(notices.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn decay_steps_notify_listener() {
    let (tracker, mut notices) = PenaltyDecayTracker::new(PenaltyConfig::default());
    let participant = ParticipantId::new();

    tracker.register_loss(participant, 100.0);
    assert!(notices.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(notices.try_recv().ok(), Some(participant));
}

#[tokio::test(start_paused = true)]
async fn cleared_participant_receives_no_notice() {
    let (tracker, mut notices) = PenaltyDecayTracker::new(PenaltyConfig::default());
    let participant = ParticipantId::new();

    tracker.register_loss(participant, 100.0);
    tracker.clear(participant);
    tokio::time::sleep(Duration::from_secs(400)).await;

    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn empty_losses_are_ignored() {
    let (tracker, _notices) = PenaltyDecayTracker::new(PenaltyConfig::default());
    let participant = ParticipantId::new();

    assert!(tracker.register_loss(participant, 0.0).is_none());
    assert!(tracker.register_loss(participant, -10.0).is_none());
    assert!(tracker.register_loss(participant, f64::NAN).is_none());
    assert!(tracker.register_loss(participant, f64::INFINITY).is_none());
    assert_eq!(tracker.loss_count(participant), 0);
}

#[test]
fn flat_penalty_is_capped() {
    let config = PenaltyConfig {
        mode: PenaltyMode::Flat,
        per_loss: 2.0,
        max_flat: 15.0,
        ..PenaltyConfig::default()
    };

    assert_eq!(flat_penalty(0, &config), 0.0);
    assert_eq!(flat_penalty(3, &config), 6.0);
    assert_eq!(flat_penalty(40, &config), 15.0);
}

#[test]
fn loss_value_combines_material_enchantments_and_wear() {
    let sword = ItemStack::new("DIAMOND_SWORD")
        .with_enchantment("SHARPNESS", 5)
        .with_durability(100, 50);
    assert!(approx(estimate_loss_value(&[sword]), 62.5));

    assert!(approx(estimate_loss_value(&[ItemStack::new("ELYTRA")]), 150.0));
    assert!(approx(
        estimate_loss_value(&[ItemStack::new("NETHER_STAR").with_amount(2)]),
        500.0
    ));
    assert_eq!(estimate_loss_value(&[ItemStack::new("DIRT").with_amount(64)]), 0.0);
    assert_eq!(estimate_loss_value(&[]), 0.0);
}
