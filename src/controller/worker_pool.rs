//! Parallel per-home solves with a single completion barrier per call.
//!
//! Jobs go through a bounded channel to a fixed set of async workers. Each
//! worker moves the CPU-bound solve onto the blocking pool and reports back;
//! [`WorkerPool::run`] returns only after every worker has drained the queue
//! and exited, so the caller never observes a half-finished timestep.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinSet};
use tracing::{debug, error, warn};

use crate::domain::{Home, HomeId, HomeVariant, HorizonSolution};
use crate::optimizer::{SolveError, ThermalAgentModel};
use crate::store::StateStore;

/// Solves one home against the shared store and publishes the result.
pub trait HomeSolver: Send + Sync + 'static {
    fn solve_and_publish(&self, home: &Home, store: &dyn StateStore) -> Result<HorizonSolution, SolveError>;
}

impl HomeSolver for ThermalAgentModel {
    fn solve_and_publish(&self, home: &Home, store: &dyn StateStore) -> Result<HorizonSolution, SolveError> {
        ThermalAgentModel::solve_and_publish(self, home, store)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Solved { solution: HorizonSolution },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub home_id: HomeId,
    pub variant: HomeVariant,
    pub worker: usize,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn solution(&self) -> Option<&HorizonSolution> {
        match &self.outcome {
            JobOutcome::Solved { solution } => Some(solution),
            JobOutcome::Failed { .. } => None,
        }
    }
}

/// Every job report of one barrier, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    pub reports: Vec<JobReport>,
}

impl PoolReport {
    pub fn solutions(&self) -> impl Iterator<Item = &HorizonSolution> {
        self.reports.iter().filter_map(JobReport::solution)
    }

    pub fn solved(&self) -> usize {
        self.solutions().count()
    }

    pub fn failures(&self) -> usize {
        self.reports.len() - self.solved()
    }

    /// Summed committed grid power of the homes that solved.
    pub fn agg_load(&self) -> f64 {
        self.solutions().map(|s| s.p_grid).sum()
    }

    pub fn agg_cost(&self) -> f64 {
        self.solutions().map(|s| s.cost).sum()
    }
}

struct Job {
    seq: usize,
    home: Home,
}

pub struct WorkerPool {
    solver: Arc<dyn HomeSolver>,
    store: Arc<dyn StateStore>,
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(solver: Arc<dyn HomeSolver>, store: Arc<dyn StateStore>, workers: usize, queue_capacity: usize) -> Self {
        Self {
            solver,
            store,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Solves every home once and waits for all of them.
    pub async fn run(&self, homes: &[Home]) -> PoolReport {
        if homes.is_empty() {
            return PoolReport::default();
        }

        let (tx, rx) = mpsc::channel::<Job>(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        for worker in 0..self.workers.min(homes.len()) {
            let rx = Arc::clone(&rx);
            let solver = Arc::clone(&self.solver);
            let store = Arc::clone(&self.store);
            set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job) = next else { break };
                    let report = run_job(worker, job.home, Arc::clone(&solver), Arc::clone(&store)).await;
                    done.push((job.seq, report));
                }
                done
            });
        }

        for (seq, home) in homes.iter().enumerate() {
            if tx.send(Job { seq, home: home.clone() }).await.is_err() {
                error!(home = %home.id, "every worker exited before the queue drained");
                break;
            }
        }
        drop(tx);

        let mut done = Vec::with_capacity(homes.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(reports) => done.extend(reports),
                Err(e) => error!(error = %e, "solve worker aborted"),
            }
        }
        done.sort_by_key(|(seq, _)| *seq);

        let report = PoolReport {
            reports: done.into_iter().map(|(_, r)| r).collect(),
        };
        debug!(
            homes = homes.len(),
            solved = report.solved(),
            failures = report.failures(),
            agg_load = report.agg_load(),
            "worker pool barrier reached"
        );
        report
    }
}

async fn run_job(worker: usize, home: Home, solver: Arc<dyn HomeSolver>, store: Arc<dyn StateStore>) -> JobReport {
    let home_id = home.id.clone();
    let variant = home.variant();
    let joined = task::spawn_blocking(move || solver.solve_and_publish(&home, store.as_ref())).await;

    let outcome = match joined {
        Ok(Ok(solution)) => JobOutcome::Solved { solution },
        Ok(Err(e)) => JobOutcome::Failed { reason: e.to_string() },
        Err(e) => {
            warn!(home = %home_id, worker, error = %e, "solve task panicked");
            JobOutcome::Failed {
                reason: format!("solve task panicked: {e}"),
            }
        }
    };
    JobReport {
        home_id,
        variant,
        worker,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HomeKind, Snapshot};
    use crate::optimizer::mpc::tests::test_home;
    use crate::store::memory::MemoryStore;
    use crate::store::keys;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Publishes a fixed load per home; panics for ids starting with "boom".
    struct FixedSolver {
        calls: AtomicUsize,
    }

    impl HomeSolver for FixedSolver {
        fn solve_and_publish(&self, home: &Home, store: &dyn StateStore) -> Result<HorizonSolution, SolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if home.id.as_str().starts_with("boom") {
                panic!("solver blew up");
            }
            if home.id.as_str().starts_with("bad") {
                return Err(SolveError::Infeasible);
            }
            let solution = HorizonSolution {
                home_id: home.id.clone(),
                timestep: 0,
                iteration: 0,
                p_grid: 2.0,
                p_load: 2.0,
                temp_in: 21.0,
                temp_wh: 50.0,
                hvac_cool_on: false,
                hvac_heat_on: false,
                wh_heat_on: false,
                cost: 0.1,
                horizon_cost: 0.3,
                battery: None,
                pv: None,
            };
            store.hash_set_many(home.id.as_str(), &solution.to_fields())?;
            Ok(solution)
        }
    }

    fn pool(workers: usize, queue: usize) -> (WorkerPool, Arc<FixedSolver>, Arc<MemoryStore>) {
        let solver = Arc::new(FixedSolver {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let pool = WorkerPool::new(solver.clone(), store.clone(), workers, queue);
        (pool, solver, store)
    }

    fn homes(ids: &[&str]) -> Vec<Home> {
        ids.iter().map(|id| test_home(id, HomeKind::Base)).collect()
    }

    #[tokio::test]
    async fn test_every_job_reports_once() {
        let (pool, solver, store) = pool(3, 2);
        let ids: Vec<String> = (0..10).map(|i| format!("home-{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let report = pool.run(&homes(&refs)).await;

        assert_eq!(report.reports.len(), 10);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 10);
        assert_eq!(report.solved(), 10);
        assert!((report.agg_load() - 20.0).abs() < 1e-12);
        let order: Vec<&str> = report.reports.iter().map(|r| r.home_id.as_str()).collect();
        assert_eq!(order, refs);
        assert!(Snapshot::from_fields(&store.hash_get_all("home-9").unwrap()).is_some());
    }

    #[tokio::test]
    async fn test_failures_and_panics_still_reach_the_barrier() {
        let (pool, _, store) = pool(2, 1);
        let report = pool.run(&homes(&["ok-1", "bad-1", "boom-1", "ok-2"])).await;

        assert_eq!(report.reports.len(), 4);
        assert_eq!(report.solved(), 2);
        assert_eq!(report.failures(), 2);
        assert!((report.agg_load() - 4.0).abs() < 1e-12);
        assert!(store.hash_get_all("bad-1").unwrap().is_empty());
        match &report.reports[2].outcome {
            JobOutcome::Failed { reason } => assert!(reason.contains("panicked")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_population() {
        let (pool, solver, _) = pool(4, 4);
        let report = pool.run(&[]).await;
        assert!(report.reports.is_empty());
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_real_model_publishes_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.set_scalar(keys::TIMESTEP, 0.0).unwrap();
        store.set_scalar(keys::ITERATION, 0.0).unwrap();
        store.set_scalar(keys::START_HOUR_INDEX, 0.0).unwrap();
        store.list_replace(keys::OAT, &[10.0; 4]).unwrap();
        store.list_replace(keys::GHI, &[0.0; 4]).unwrap();
        store.list_replace(keys::SPP, &[0.05, 0.10, 0.15, 0.20]).unwrap();
        store.list_replace(keys::REWARD_PRICE_HORIZON, &[0.0]).unwrap();

        let model = Arc::new(ThermalAgentModel::new(3, 1.0, 12.0));
        let pool = WorkerPool::new(model, store.clone(), 2, 2);
        let report = pool.run(&homes(&["a", "b"])).await;

        assert_eq!(report.solved(), 2);
        for id in ["a", "b"] {
            let snap = Snapshot::from_fields(&store.hash_get_all(id).unwrap()).unwrap();
            assert!(snap.temp_in >= 19.0 - 1e-6);
        }
    }
}
