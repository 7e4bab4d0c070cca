use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::basis::{phi, RlState};
use super::buffer::PriceBuffer;
use super::critic::{action_grid, CriticSlot, DoubleCritic};
use super::memory::{ReplayMemory, Transition};
use super::policy::{GaussianPolicy, PolicyRates};
use super::ridge::fit_ridge;
use crate::config::{RlConfig, TargetAction};
use crate::store::{keys, StateStore, StoreResult};

/// How the next action is chosen after each observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSelection {
    /// Sample the Gaussian policy.
    GaussianPolicy,
    /// Greedy over the action grid with probability `1 - exploration_rate`,
    /// uniform over the action interval otherwise.
    EpsilonGreedy,
}

/// Aggregate feedback for the step that was just committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlObservation {
    pub agg_load: f64,
    pub setpoint: f64,
    /// Load forecast for the following steps, nearest first
    pub forecast: Vec<f64>,
    pub forecast_setpoint: f64,
}

/// Diagnostics of one `learn` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStep {
    pub timestep: usize,
    pub critic: CriticSlot,
    pub reward: f64,
    pub q_predicted: f64,
    pub q_observed: f64,
    pub action: f64,
    pub next_action: f64,
    pub greedy_action: f64,
    pub is_greedy: bool,
    pub batch_fitted: bool,
    pub batch_rejected: bool,
    pub policy_updated: bool,
    pub average_reward: f64,
}

/// Learns a price adjustment from aggregate tracking error.
///
/// Each step the caller broadcasts the current action, lets the community
/// respond, then feeds the response back through [`RlPriceController::learn`].
pub struct RlPriceController {
    config: RlConfig,
    selection: ActionSelection,
    steps_per_day: usize,
    start_step_of_day: usize,
    rng: StdRng,
    critic: DoubleCritic,
    policy: GaussianPolicy,
    memory: ReplayMemory,
    buffer: PriceBuffer,
    grid: Vec<f64>,
    state: RlState,
    action: f64,
    timestep: usize,
    rejected_batches: usize,
}

impl RlPriceController {
    pub fn new(
        config: &RlConfig,
        selection: ActionSelection,
        buffer_len: usize,
        steps_per_day: usize,
        start_step_of_day: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let critic = DoubleCritic::random(&mut rng);
        let rates = PolicyRates {
            lambda_w: config.lambda_w,
            lambda_theta: config.lambda_theta,
            alpha_theta: config.alpha_theta,
            alpha_w: config.alpha_w,
            alpha_r: config.alpha_r,
        };
        let [lo, hi] = config.action_space;
        let steps_per_day = steps_per_day.max(1);

        let mut controller = Self {
            config: config.clone(),
            selection,
            steps_per_day,
            start_step_of_day: start_step_of_day % steps_per_day,
            rng,
            critic,
            policy: GaussianPolicy::new(config.variance, config.action_space, rates),
            memory: ReplayMemory::new(config.memory_size),
            buffer: PriceBuffer::new(buffer_len),
            grid: action_grid(lo, hi, config.action_resolution),
            state: RlState::default(),
            action: 0.0,
            timestep: 0,
            rejected_batches: 0,
        };
        controller.state.time_of_day = controller.phase(0);
        controller
    }

    /// Fraction of the day elapsed at control step `t` of the run.
    fn phase(&self, t: usize) -> f64 {
        ((self.start_step_of_day + t) % self.steps_per_day) as f64 / self.steps_per_day as f64
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn state(&self) -> &RlState {
        &self.state
    }

    pub fn action(&self) -> f64 {
        self.action
    }

    pub fn buffer(&self) -> &PriceBuffer {
        &self.buffer
    }

    pub fn critic(&self) -> &DoubleCritic {
        &self.critic
    }

    pub fn policy(&self) -> &GaussianPolicy {
        &self.policy
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn rejected_batches(&self) -> usize {
        self.rejected_batches
    }

    /// Reward price applied to the step being committed.
    pub fn committed_price(&self) -> f64 {
        self.buffer.front()
    }

    /// Shifts the price buffer, appends `price_scale × action` and mirrors
    /// both into the store. Returns the appended price.
    pub fn broadcast(&mut self, store: &dyn StateStore) -> StoreResult<f64> {
        let price = self.config.price_scale * self.action;
        self.buffer.push(price);
        store.list_pop_front(keys::REWARD_PRICE_HORIZON)?;
        store.list_push(keys::REWARD_PRICE_HORIZON, price)?;
        store.set_scalar(keys::REWARD_PRICE, price)?;
        debug!(timestep = self.timestep, reward_price = price, "broadcast reward price");
        Ok(price)
    }

    fn next_state(&self, obs: &RlObservation) -> RlState {
        let curr_error = obs.agg_load - obs.setpoint;
        let (fcst_error, forecast_trend) = match (obs.forecast.first(), obs.forecast.last()) {
            (Some(first), Some(last)) => (first - obs.forecast_setpoint, first - last),
            _ => (0.0, 0.0),
        };
        RlState {
            curr_error,
            int_error: self.state.int_error + curr_error,
            delta_action: self.buffer.last_change(),
            time_of_day: self.phase(self.timestep + 1),
            fcst_error,
            forecast_trend,
        }
    }

    fn explore(&mut self, next_state: &RlState, greedy: f64) -> f64 {
        match self.selection {
            ActionSelection::GaussianPolicy => self.policy.sample(next_state, &mut self.rng),
            ActionSelection::EpsilonGreedy => {
                if self.rng.gen::<f64>() >= self.config.exploration_rate {
                    greedy
                } else {
                    let [lo, hi] = self.config.action_space;
                    self.rng.gen_range(lo..=hi)
                }
            }
        }
    }

    fn target_action(&mut self, slot: CriticSlot, state: &RlState) -> f64 {
        match self.config.target_action {
            TargetAction::Policy => self.policy.sample(state, &mut self.rng),
            TargetAction::Greedy => self.critic.greedy_action(slot, state, &self.grid).0,
        }
    }

    /// Refits the active critic on a replay batch. `false` when the batch
    /// was numerically unusable and nothing was changed.
    fn fit_batch(&mut self, slot: CriticSlot) -> bool {
        let batch: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, self.config.batch_size)
            .into_iter()
            .cloned()
            .collect();

        let mut features = Vec::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());
        for t in &batch {
            let u1 = self.target_action(slot, &t.next_state);
            let target = t.reward + self.config.discount_factor * self.critic.min_q(&t.next_state, u1);
            features.push(phi(&t.state, t.action));
            targets.push(target);
        }

        match fit_ridge(&features, &targets, self.config.ridge_alpha) {
            Ok(fit) => {
                self.critic.blend(slot, &fit.coef, self.config.learning_rate);
                true
            }
            Err(e) => {
                self.rejected_batches += 1;
                warn!(timestep = self.timestep, critic = %slot, error = %e, "critic batch rejected");
                false
            }
        }
    }

    /// Observes the response to the current action and advances one step.
    pub fn learn(&mut self, obs: &RlObservation) -> LearningStep {
        let next_state = self.next_state(obs);
        // Scored on the state the action was taken in.
        let reward = -self.state.curr_error.powi(2);
        let slot = CriticSlot::for_timestep(self.timestep);

        let (greedy_action, _) = self.critic.greedy_action(slot, &next_state, &self.grid);
        let next_action = self.explore(&next_state, greedy_action);

        let q_predicted = self.critic.q(slot, &self.state, self.action);
        let q_observed = reward - self.policy.average_reward()
            + self.config.discount_factor * self.critic.q(slot, &next_state, next_action);

        let mut batch_fitted = false;
        let mut batch_rejected = false;
        let mut policy_updated = false;
        if self.memory.len() > self.config.batch_size {
            if self.fit_batch(slot) {
                batch_fitted = true;
                if (self.timestep + 1) % self.config.policy_update_interval == 0 && q_observed.is_finite() {
                    self.policy
                        .update(&self.state, &next_state, self.action, q_predicted - q_observed);
                    policy_updated = true;
                }
            } else {
                batch_rejected = true;
            }
        }

        self.memory.push(Transition {
            state: self.state,
            action: self.action,
            next_state,
            reward,
        });

        let step = LearningStep {
            timestep: self.timestep,
            critic: slot,
            reward,
            q_predicted,
            q_observed,
            action: self.action,
            next_action,
            greedy_action,
            is_greedy: next_action == greedy_action,
            batch_fitted,
            batch_rejected,
            policy_updated,
            average_reward: self.policy.average_reward(),
        };

        self.timestep += 1;
        self.state = next_state;
        self.action = next_action;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn config() -> RlConfig {
        RlConfig {
            batch_size: 4,
            memory_size: 50,
            policy_update_interval: 2,
            ..RlConfig::default()
        }
    }

    fn observation(load: f64) -> RlObservation {
        RlObservation {
            agg_load: load,
            setpoint: 10.0,
            forecast: vec![load, load - 1.0],
            forecast_setpoint: 10.0,
        }
    }

    #[test]
    fn test_next_state_features() {
        let mut ctl = RlPriceController::new(&config(), ActionSelection::GaussianPolicy, 1, 24, 6, 7);
        assert!((ctl.state().time_of_day - 0.25).abs() < 1e-12);
        ctl.learn(&observation(12.0));
        let s = *ctl.state();
        assert_eq!(s.curr_error, 2.0);
        assert_eq!(s.int_error, 2.0);
        assert_eq!(s.fcst_error, 2.0);
        assert_eq!(s.forecast_trend, 1.0);
        assert!((s.time_of_day - 7.0 / 24.0).abs() < 1e-12);

        ctl.learn(&observation(13.0));
        assert_eq!(ctl.state().int_error, 5.0);
    }

    #[test]
    fn test_reward_scores_state_before_step() {
        let mut ctl = RlPriceController::new(&config(), ActionSelection::GaussianPolicy, 1, 24, 0, 7);
        let step = ctl.learn(&observation(13.0));
        assert_eq!(step.reward, 0.0);
        assert_eq!(step.critic, CriticSlot::A);

        let step = ctl.learn(&observation(11.0));
        assert_eq!(step.reward, -9.0);
        assert_eq!(step.critic, CriticSlot::B);
        assert_eq!(ctl.learn(&observation(11.0)).reward, -1.0);
    }

    #[test]
    fn test_average_reward_moves_with_predicted_minus_observed() {
        let cfg = config();
        let mut ctl = RlPriceController::new(&cfg, ActionSelection::GaussianPolicy, 1, 24, 0, 11);
        let mut updates = 0;
        for i in 0..20 {
            let before = ctl.policy().average_reward();
            let step = ctl.learn(&observation(8.0 + (i % 5) as f64));
            let moved = step.average_reward - before;
            if step.policy_updated {
                let delta = (step.q_predicted - step.q_observed).clamp(-1.0, 1.0);
                assert!((moved - cfg.alpha_r * delta).abs() < 1e-12, "step {i}: moved {moved}, delta {delta}");
                updates += 1;
            } else {
                assert_eq!(moved, 0.0);
            }
        }
        assert!(updates > 0);
    }

    #[test]
    fn test_batch_waits_for_enough_memory() {
        let mut ctl = RlPriceController::new(&config(), ActionSelection::GaussianPolicy, 1, 24, 0, 7);
        for i in 0..5 {
            let step = ctl.learn(&observation(10.0 + i as f64 * 0.1));
            assert!(!step.batch_fitted);
        }
        assert_eq!(ctl.memory().len(), 5);
        let step = ctl.learn(&observation(10.2));
        assert!(step.batch_fitted);
        assert!(step.policy_updated);
    }

    #[test]
    fn test_broadcast_shifts_store_buffer() {
        let store = MemoryStore::new();
        store.list_replace(keys::REWARD_PRICE_HORIZON, &[0.0, 0.0, 0.0]).unwrap();
        let mut ctl = RlPriceController::new(&config(), ActionSelection::GaussianPolicy, 3, 24, 0, 7);
        ctl.learn(&observation(11.0));
        let action = ctl.action();
        let price = ctl.broadcast(&store).unwrap();
        assert_eq!(price, 0.01 * action);
        assert_eq!(store.list_all(keys::REWARD_PRICE_HORIZON).unwrap(), vec![0.0, 0.0, price]);
        assert_eq!(store.get_scalar(keys::REWARD_PRICE).unwrap(), price);
        assert_eq!(ctl.buffer().to_vec(), vec![0.0, 0.0, price]);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let run = || {
            let mut ctl = RlPriceController::new(&config(), ActionSelection::EpsilonGreedy, 1, 24, 0, 42);
            (0..12)
                .map(|i| ctl.learn(&observation(9.0 + (i % 3) as f64)).next_action)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_actions_stay_in_interval() {
        let mut ctl = RlPriceController::new(&config(), ActionSelection::EpsilonGreedy, 1, 24, 0, 3);
        for i in 0..30 {
            let step = ctl.learn(&observation(5.0 + i as f64));
            assert!((-1.0..=1.0).contains(&step.next_action));
        }
    }
}
