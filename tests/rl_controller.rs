//! The learning controller driven through the coordinator.

mod common;

use std::sync::Arc;

use flex_aggregator::config::{SimulationMode, TargetAction};
use flex_aggregator::controller::AggregatorCoordinator;
use flex_aggregator::domain::ExogenousSeries;
use flex_aggregator::rl::CriticSlot;
use flex_aggregator::store::memory::MemoryStore;
use flex_aggregator::store::{keys, StateStore};

#[tokio::test]
async fn test_critics_alternate_by_timestep_parity() {
    let mut cfg = common::config(SimulationMode::RlSimplified, 10, 40, 1);
    cfg.rl.batch_size = 8;
    let store = Arc::new(MemoryStore::new());
    let series = ExogenousSeries::constant(64, 10.0, 0.0, 0.05);
    let mut coordinator = AggregatorCoordinator::new(cfg, Vec::new(), series, store.clone()).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.records.len(), 40);
    for record in &summary.records {
        let learning = record.learning.as_ref().unwrap();
        assert_eq!(learning.timestep, record.timestep);
        let expected = if record.timestep % 2 == 0 { CriticSlot::A } else { CriticSlot::B };
        assert_eq!(learning.critic, expected);
        assert!((-1.0..=1.0).contains(&learning.next_action));
        assert!(learning.reward <= 0.0);
    }
    assert!(summary.records.iter().any(|r| r.learning.as_ref().unwrap().batch_fitted));
    assert!(summary.records.iter().any(|r| r.learning.as_ref().unwrap().policy_updated));

    // The simplified controller keeps a one-slot price buffer.
    let horizon = store.list_all(keys::REWARD_PRICE_HORIZON).unwrap();
    assert_eq!(horizon.len(), 1);
    assert_eq!(horizon[0], store.get_scalar(keys::REWARD_PRICE).unwrap());
}

#[tokio::test]
async fn test_price_buffer_shifts_one_slot_per_step() {
    let mut cfg = common::config(SimulationMode::Rl, 2, 6, 3);
    cfg.rl.action_horizon = 3;
    cfg.rl.target_action = TargetAction::Greedy;
    let homes = vec![common::cold_home("h1"), common::cold_home("h2")];
    let store = Arc::new(MemoryStore::new());
    let series = ExogenousSeries::constant(12, 10.0, 0.0, 0.05);
    let mut coordinator = AggregatorCoordinator::new(cfg, homes, series, store.clone()).unwrap();

    let mut previous = store.list_all(keys::REWARD_PRICE_HORIZON).unwrap();
    assert_eq!(previous, vec![0.0; 3]);

    while !coordinator.is_finished() {
        let record = coordinator.step().await.unwrap();
        let current = store.list_all(keys::REWARD_PRICE_HORIZON).unwrap();
        assert_eq!(current.len(), 3);
        assert_eq!(&current[..2], &previous[1..]);
        assert_eq!(current[2], store.get_scalar(keys::REWARD_PRICE).unwrap());
        assert_eq!(record.reward_price, current[0]);
        assert_eq!(record.solved, 2);
        previous = current;
    }
    let controller = coordinator.rl_controller().unwrap();
    assert_eq!(controller.timestep(), 6);
    assert_eq!(controller.memory().len(), 6);
}

#[tokio::test]
async fn test_same_seed_same_run() {
    let run = || async {
        let cfg = common::config(SimulationMode::RlSimplified, 10, 24, 1);
        let series = ExogenousSeries::constant(48, 10.0, 0.0, 0.05);
        let mut coordinator =
            AggregatorCoordinator::new(cfg, Vec::new(), series, Arc::new(MemoryStore::new())).unwrap();
        coordinator.run().await.unwrap()
    };
    let (a, b) = (run().await, run().await);
    let loads = |s: &flex_aggregator::controller::RunSummary| s.records.iter().map(|r| r.agg_load).collect::<Vec<_>>();
    assert_eq!(loads(&a), loads(&b));
}
