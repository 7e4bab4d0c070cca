use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::basis::{dot, state_basis, RlState, STATE_BASIS_LEN};

/// Step sizes and trace decays of the average-reward actor-critic update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyRates {
    pub lambda_w: f64,
    pub lambda_theta: f64,
    pub alpha_theta: f64,
    pub alpha_w: f64,
    pub alpha_r: f64,
}

/// Gaussian policy with a linear mean over [`state_basis`] and fixed variance,
/// plus a linear state-value estimate and eligibility traces for both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianPolicy {
    theta_mu: Vec<f64>,
    w: Vec<f64>,
    z_theta_mu: Vec<f64>,
    z_w: Vec<f64>,
    average_reward: f64,
    variance: f64,
    bounds: [f64; 2],
    rates: PolicyRates,
}

impl GaussianPolicy {
    pub fn new(variance: f64, bounds: [f64; 2], rates: PolicyRates) -> Self {
        Self {
            theta_mu: vec![0.0; STATE_BASIS_LEN],
            w: vec![0.0; STATE_BASIS_LEN],
            z_theta_mu: vec![0.0; STATE_BASIS_LEN],
            z_w: vec![0.0; STATE_BASIS_LEN],
            average_reward: 0.0,
            variance,
            bounds,
            rates,
        }
    }

    pub fn theta_mu(&self) -> &[f64] {
        &self.theta_mu
    }

    pub fn average_reward(&self) -> f64 {
        self.average_reward
    }

    fn clip(&self, action: f64) -> f64 {
        action.clamp(self.bounds[0], self.bounds[1])
    }

    /// Policy mean, clipped to the action interval.
    pub fn mean(&self, state: &RlState) -> f64 {
        self.clip(dot(&self.theta_mu, &state_basis(state)))
    }

    pub fn sample<R: Rng + ?Sized>(&self, state: &RlState, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.clip(self.mean(state) + self.variance.sqrt() * z)
    }

    pub fn value(&self, state: &RlState) -> f64 {
        dot(&self.w, &state_basis(state))
    }

    /// One actor-critic step driven by the temporal difference `delta`,
    /// clipped to [-1, 1].
    pub fn update(&mut self, state: &RlState, next_state: &RlState, action: f64, delta: f64) {
        let delta = delta.clamp(-1.0, 1.0);
        let x_k = state_basis(state);
        let x_k1 = state_basis(next_state);
        let r = self.rates;

        self.average_reward += r.alpha_r * delta;

        let mu = dot(&self.theta_mu, &x_k);
        let score = (action - mu) / self.variance;

        for i in 0..STATE_BASIS_LEN {
            self.z_w[i] = r.lambda_w * self.z_w[i] + (x_k1[i] - x_k[i]);
            self.z_theta_mu[i] = r.lambda_theta * self.z_theta_mu[i] + score * x_k[i];
            self.w[i] += r.alpha_w * delta * self.z_w[i];
            self.theta_mu[i] += r.alpha_theta * delta * self.z_theta_mu[i];
        }
    }
}
