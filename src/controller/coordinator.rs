//! Top-level simulation loop.
//!
//! One [`AggregatorCoordinator::step`] is one control timestep: publish the
//! price for the step, let the community respond (per-home solves or the
//! closed-form surrogate), collect the aggregate and advance the counters.
//! Steps run strictly in order; a step never starts before the previous
//! step's results are collected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dual::IterativeDualCoordinator;
use super::surrogate::ResponseSurrogate;
use super::worker_pool::{PoolReport, WorkerPool};
use crate::config::{Config, ConfigError, SimulationMode};
use crate::domain::{ExogenousSeries, Home, HomeId, Snapshot};
use crate::forecast::{forecaster_for, LoadForecaster};
use crate::optimizer::ThermalAgentModel;
use crate::rl::{ActionSelection, LearningStep, RlObservation, RlPriceController};
use crate::store::{keys, StateStore};

/// Outcome of one control timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub timestep: usize,
    pub agg_load: f64,
    pub agg_cost: f64,
    /// Reward price applied to the committed step
    pub reward_price: f64,
    pub setpoint: f64,
    /// Broadcast / solve rounds this step took
    pub iterations: usize,
    pub converged: bool,
    pub solved: usize,
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning: Option<LearningStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: SimulationMode,
    pub homes: usize,
    pub num_timesteps: usize,
    pub setpoint: f64,
    pub max_agg_load: f64,
    pub total_cost: f64,
    pub total_failures: usize,
    pub unconverged_steps: usize,
    pub rejected_batches: usize,
    pub records: Vec<StepRecord>,
}

enum Strategy {
    Baseline,
    Dual(IterativeDualCoordinator),
    Rl(RlPriceController),
    RlSimplified {
        controller: RlPriceController,
        surrogate: ResponseSurrogate,
    },
}

pub struct AggregatorCoordinator {
    config: Config,
    homes: Vec<Home>,
    store: Arc<dyn StateStore>,
    pool: WorkerPool,
    strategy: Strategy,
    forecaster: Box<dyn LoadForecaster>,
    setpoint: f64,
    num_timesteps: usize,
    timestep: usize,
    history: Vec<f64>,
    records: Vec<StepRecord>,
}

impl AggregatorCoordinator {
    /// Validates the run window against the exogenous data and seeds the
    /// store. Fails before any timestep runs.
    pub fn new(config: Config, homes: Vec<Home>, series: ExogenousSeries, store: Arc<dyn StateStore>) -> Result<Self> {
        config.check().context("invalid configuration")?;
        let sim = &config.simulation;
        let mode = sim.mode;
        let num_timesteps = sim.num_timesteps()?;
        let start_index = sim.start_index()?;
        let horizon = config.home.hems.prediction_horizon;

        if homes.is_empty() && mode != SimulationMode::RlSimplified {
            return Err(ConfigError::InconsistentPopulation(format!("mode {mode} needs at least one home")).into());
        }
        let required = start_index + num_timesteps + horizon;
        if series.len() < required {
            return Err(ConfigError::InsufficientData {
                required,
                available: series.len(),
            }
            .into());
        }

        let steps_per_day = sim.steps_per_day();
        let start_step_of_day = sim.start_hour_of_day()? as usize * sim.steps_per_hour as usize;
        let buffer_len = match mode {
            SimulationMode::Rl => config.rl.action_horizon * sim.steps_per_hour as usize,
            _ => 1,
        };

        store.flush();
        store.list_replace(keys::OAT, &series.ambient_temp)?;
        store.list_replace(keys::GHI, &series.irradiance)?;
        store.list_replace(keys::SPP, &series.wholesale_price)?;
        store.set_scalar(keys::START_HOUR_INDEX, start_index as f64)?;
        store.set_scalar(keys::TIMESTEP, 0.0)?;
        store.set_scalar(keys::ITERATION, 0.0)?;
        store.set_scalar(keys::REWARD_PRICE, 0.0)?;
        store.list_replace(keys::REWARD_PRICE_HORIZON, &vec![0.0; buffer_len])?;

        let strategy = match mode {
            SimulationMode::Baseline => Strategy::Baseline,
            SimulationMode::DualAscent => {
                Strategy::Dual(IterativeDualCoordinator::new(config.dual.clone(), horizon))
            }
            SimulationMode::Rl => Strategy::Rl(RlPriceController::new(
                &config.rl,
                ActionSelection::GaussianPolicy,
                buffer_len,
                steps_per_day,
                start_step_of_day,
                sim.random_seed,
            )),
            SimulationMode::RlSimplified => Strategy::RlSimplified {
                controller: RlPriceController::new(
                    &config.rl,
                    ActionSelection::EpsilonGreedy,
                    buffer_len,
                    steps_per_day,
                    start_step_of_day,
                    sim.random_seed,
                ),
                surrogate: ResponseSurrogate::new(config.surrogate.clone()),
            },
        };

        let model = Arc::new(ThermalAgentModel::new(horizon, sim.dt_hours(), config.home.hems.tap_water_temp));
        let pool = WorkerPool::new(model, Arc::clone(&store), sim.workers, sim.queue_capacity);

        info!(
            mode = %mode,
            homes = homes.len(),
            num_timesteps,
            start_index,
            horizon,
            workers = pool.workers(),
            "coordinator ready"
        );

        Ok(Self {
            forecaster: forecaster_for(config.rl.forecaster),
            setpoint: config.community_setpoint(),
            config,
            homes,
            store,
            pool,
            strategy,
            num_timesteps,
            timestep: 0,
            history: Vec::new(),
            records: Vec::new(),
        })
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    pub fn is_finished(&self) -> bool {
        self.timestep >= self.num_timesteps
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// The RL controller, when running in one of the RL modes.
    pub fn rl_controller(&self) -> Option<&RlPriceController> {
        match &self.strategy {
            Strategy::Rl(controller) | Strategy::RlSimplified { controller, .. } => Some(controller),
            _ => None,
        }
    }

    fn committed_snapshots(&self) -> Result<HashMap<HomeId, Snapshot>> {
        let mut out = HashMap::with_capacity(self.homes.len());
        for home in &self.homes {
            if let Some(snapshot) = Snapshot::from_fields(&self.store.hash_get_all(home.id.as_str())?) {
                out.insert(home.id.clone(), snapshot);
            }
        }
        Ok(out)
    }

    /// Runs exactly one control timestep.
    pub async fn step(&mut self) -> Result<StepRecord> {
        let t = self.timestep;
        let store = Arc::clone(&self.store);
        store.set_scalar(keys::TIMESTEP, t as f64)?;
        store.set_scalar(keys::ITERATION, 0.0)?;

        let committed = match self.strategy {
            Strategy::Dual(_) if t > 0 => self.committed_snapshots()?,
            _ => HashMap::new(),
        };
        let forecast_horizon = self.config.rl.forecast_horizon;

        let record = match &mut self.strategy {
            Strategy::Baseline => {
                let report = self.pool.run(&self.homes).await;
                step_record(t, self.setpoint, &report, 0.0, 1, true)
            }
            Strategy::Dual(dual) => {
                let outcome = dual
                    .settle(&self.pool, store.as_ref(), &self.homes, t, &committed)
                    .await
                    .with_context(|| format!("dual ascent failed at timestep {t}"))?;
                step_record(
                    t,
                    self.setpoint,
                    &outcome.report,
                    outcome.final_price(),
                    outcome.iterations(),
                    outcome.converged,
                )
            }
            Strategy::Rl(controller) => {
                controller.broadcast(store.as_ref())?;
                let reward_price = controller.committed_price();
                let report = self.pool.run(&self.homes).await;
                let mut record = step_record(t, self.setpoint, &report, reward_price, 1, true);
                self.history.push(record.agg_load);
                let obs = observation(&self.history, self.forecaster.as_ref(), forecast_horizon, self.setpoint);
                record.learning = Some(controller.learn(&obs));
                record
            }
            Strategy::RlSimplified { controller, surrogate } => {
                controller.broadcast(store.as_ref())?;
                let reward_price = controller.committed_price();
                let response = surrogate.respond(reward_price, self.setpoint);
                self.history.push(response.agg_load);
                let obs = observation(&self.history, self.forecaster.as_ref(), forecast_horizon, self.setpoint);
                StepRecord {
                    timestep: t,
                    agg_load: response.agg_load,
                    agg_cost: response.agg_cost,
                    reward_price,
                    setpoint: self.setpoint,
                    iterations: 1,
                    converged: true,
                    solved: 0,
                    failures: 0,
                    learning: Some(controller.learn(&obs)),
                }
            }
        };

        if record.failures > 0 {
            warn!(timestep = t, failures = record.failures, solved = record.solved, "homes excluded from aggregate");
        }
        info!(
            timestep = t,
            agg_load = record.agg_load,
            agg_cost = record.agg_cost,
            reward_price = record.reward_price,
            setpoint = record.setpoint,
            iterations = record.iterations,
            "timestep complete"
        );

        self.timestep += 1;
        store.set_scalar(keys::TIMESTEP, self.timestep as f64)?;
        self.records.push(record.clone());
        Ok(record)
    }

    /// Runs the remaining timesteps and summarises the whole run.
    pub async fn run(&mut self) -> Result<RunSummary> {
        while !self.is_finished() {
            self.step().await?;
        }
        debug!(steps = self.records.len(), "run finished");
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            mode: self.config.simulation.mode,
            homes: self.homes.len(),
            num_timesteps: self.num_timesteps,
            setpoint: self.setpoint,
            max_agg_load: self.records.iter().map(|r| r.agg_load).fold(0.0, f64::max),
            total_cost: self.records.iter().map(|r| r.agg_cost).sum(),
            total_failures: self.records.iter().map(|r| r.failures).sum(),
            unconverged_steps: self.records.iter().filter(|r| !r.converged).count(),
            rejected_batches: self.rl_controller().map(|c| c.rejected_batches()).unwrap_or(0),
            records: self.records.clone(),
        }
    }
}

fn step_record(
    timestep: usize,
    setpoint: f64,
    report: &PoolReport,
    reward_price: f64,
    iterations: usize,
    converged: bool,
) -> StepRecord {
    StepRecord {
        timestep,
        agg_load: report.agg_load(),
        agg_cost: report.agg_cost(),
        reward_price,
        setpoint,
        iterations,
        converged,
        solved: report.solved(),
        failures: report.failures(),
        learning: None,
    }
}

/// Feedback for the RL controller; `history` already holds the latest load.
fn observation(history: &[f64], forecaster: &dyn LoadForecaster, horizon: usize, setpoint: f64) -> RlObservation {
    RlObservation {
        agg_load: history.last().copied().unwrap_or(0.0),
        setpoint,
        forecast: forecaster.forecast(history, horizon),
        forecast_setpoint: setpoint,
    }
}
