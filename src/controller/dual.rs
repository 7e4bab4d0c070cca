use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::worker_pool::{PoolReport, WorkerPool};
use crate::config::DualConfig;
use crate::domain::{Home, HomeId, Snapshot};
use crate::optimizer::ThermalAgentModel;
use crate::store::{keys, StateStore, StoreResult};

/// Price path and outcome of one timestep's dual ascent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualOutcome {
    pub timestep: usize,
    /// Reward price broadcast at each iteration
    pub prices: Vec<f64>,
    /// Aggregate grid load measured at each iteration
    pub aggregates: Vec<f64>,
    pub converged: bool,
    /// Last round of solves; its records are the ones left in the store
    pub report: PoolReport,
}

impl DualOutcome {
    pub fn iterations(&self) -> usize {
        self.prices.len()
    }

    pub fn final_price(&self) -> f64 {
        self.prices.last().copied().unwrap_or(0.0)
    }

    pub fn agg_load(&self) -> f64 {
        self.aggregates.last().copied().unwrap_or(0.0)
    }
}

/// Raises a surcharge, applied uniformly over every solve-horizon step,
/// until aggregate load fits under the capacity threshold.
pub struct IterativeDualCoordinator {
    config: DualConfig,
    horizon: usize,
}

impl IterativeDualCoordinator {
    pub fn new(config: DualConfig, horizon: usize) -> Self {
        Self {
            config,
            horizon: horizon.max(1),
        }
    }

    pub fn config(&self) -> &DualConfig {
        &self.config
    }

    /// Marginal demand above the capacity threshold.
    pub fn marginal_demand(&self, agg_load: f64) -> f64 {
        (agg_load - self.config.max_load_threshold).max(0.0)
    }

    fn publish_price(&self, store: &dyn StateStore, iteration: usize, price: f64) -> StoreResult<()> {
        store.set_scalar(keys::ITERATION, iteration as f64)?;
        store.set_scalar(keys::REWARD_PRICE, price)?;
        store.list_replace(keys::REWARD_PRICE_HORIZON, &vec![price; self.horizon])
    }

    /// Puts every home back on its committed state. A home without one
    /// (nothing solved yet) goes back to its configured initial state, so a
    /// speculative record from an earlier round is never read as committed.
    fn restore(store: &dyn StateStore, homes: &[Home], committed: &HashMap<HomeId, Snapshot>) -> StoreResult<()> {
        for home in homes {
            let snapshot = committed
                .get(&home.id)
                .copied()
                .unwrap_or_else(|| ThermalAgentModel::initial_snapshot(home));
            store.hash_set_many(home.id.as_str(), &snapshot.to_fields())?;
        }
        Ok(())
    }

    /// Runs broadcast / solve / measure rounds for `timestep`, starting from
    /// a zero surcharge. Before every re-solve each home's state is reset to
    /// its `committed` snapshot so rounds never compound.
    ///
    /// Stops when marginal demand is zero or after `max_iterations` rounds, in
    /// which case the last price is kept and `converged` is false.
    pub async fn settle(
        &self,
        pool: &WorkerPool,
        store: &dyn StateStore,
        homes: &[Home],
        timestep: usize,
        committed: &HashMap<HomeId, Snapshot>,
    ) -> StoreResult<DualOutcome> {
        let max_iterations = self.config.max_iterations.max(1);
        let mut price = 0.0;
        let mut prices = Vec::new();
        let mut aggregates = Vec::new();

        loop {
            let iteration = prices.len();
            self.publish_price(store, iteration, price)?;
            let report = pool.run(homes).await;
            let agg_load = report.agg_load();
            prices.push(price);
            aggregates.push(agg_load);

            let marginal = self.marginal_demand(agg_load);
            debug!(timestep, iteration, reward_price = price, agg_load, marginal, "dual iteration");

            if marginal <= 0.0 {
                info!(timestep, iterations = prices.len(), reward_price = price, agg_load, "dual ascent converged");
                return Ok(DualOutcome {
                    timestep,
                    prices,
                    aggregates,
                    converged: true,
                    report,
                });
            }
            if prices.len() >= max_iterations {
                warn!(
                    timestep,
                    iterations = prices.len(),
                    reward_price = price,
                    agg_load,
                    threshold = self.config.max_load_threshold,
                    "dual ascent hit iteration cap, keeping best-effort price"
                );
                return Ok(DualOutcome {
                    timestep,
                    prices,
                    aggregates,
                    converged: false,
                    report,
                });
            }

            price += self.config.step_size_coeff * marginal;
            Self::restore(store, homes, committed)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{fields, HomeKind};
    use crate::optimizer::mpc::tests::test_home;
    use crate::store::memory::MemoryStore;
    use rstest::rstest;

    #[rstest]
    #[case(10.0, 0.0)]
    #[case(30.0, 0.0)]
    #[case(42.5, 12.5)]
    fn test_marginal_demand(#[case] agg: f64, #[case] expected: f64) {
        let dual = IterativeDualCoordinator::new(DualConfig::default(), 6);
        assert_eq!(dual.marginal_demand(agg), expected);
    }

    #[test]
    fn test_price_covers_whole_horizon() {
        let store = MemoryStore::new();
        let dual = IterativeDualCoordinator::new(DualConfig::default(), 4);
        dual.publish_price(&store, 2, 0.03).unwrap();
        assert_eq!(store.list_all(keys::REWARD_PRICE_HORIZON).unwrap(), vec![0.03; 4]);
        assert_eq!(store.get_scalar(keys::REWARD_PRICE).unwrap(), 0.03);
        assert_eq!(store.get_scalar(keys::ITERATION).unwrap(), 2.0);
    }

    #[test]
    fn test_restore_writes_committed_snapshots() {
        let store = MemoryStore::new();
        let homes = vec![test_home("h1", HomeKind::Base)];
        let mut committed = HashMap::new();
        committed.insert(
            HomeId::new("h1"),
            Snapshot {
                temp_in: 20.5,
                temp_wh: 48.0,
                e_batt: Some(4.0),
            },
        );
        store.hash_set("h1", fields::TEMP_IN, 22.0).unwrap();
        IterativeDualCoordinator::restore(&store, &homes, &committed).unwrap();
        let snap = Snapshot::from_fields(&store.hash_get_all("h1").unwrap()).unwrap();
        assert_eq!(snap.temp_in, 20.5);
        assert_eq!(snap.e_batt, Some(4.0));
    }

    #[test]
    fn test_restore_resets_home_without_committed_state() {
        let store = MemoryStore::new();
        let home = test_home("late", HomeKind::Base);
        // Record left behind by an earlier round of the same timestep.
        store.hash_set("late", fields::TEMP_IN, 22.9).unwrap();
        store.hash_set("late", fields::TEMP_WH, 54.0).unwrap();

        IterativeDualCoordinator::restore(&store, std::slice::from_ref(&home), &HashMap::new()).unwrap();
        let snap = Snapshot::from_fields(&store.hash_get_all("late").unwrap()).unwrap();
        assert_eq!(snap, ThermalAgentModel::initial_snapshot(&home));
    }
}
