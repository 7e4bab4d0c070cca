use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::basis::{dot, phi, RlState, PHI_LEN};

/// Which of the two critic weight vectors a timestep uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum CriticSlot {
    A,
    B,
}

impl CriticSlot {
    /// Even timesteps use A, odd use B.
    pub fn for_timestep(timestep: usize) -> Self {
        if timestep % 2 == 0 {
            CriticSlot::A
        } else {
            CriticSlot::B
        }
    }
}

/// Inclusive grid of candidate actions from `lo` to `hi` in steps of `resolution`.
pub fn action_grid(lo: f64, hi: f64, resolution: f64) -> Vec<f64> {
    let steps = ((hi - lo) / resolution + 1e-9).floor().max(0.0) as usize;
    (0..=steps).map(|i| lo + i as f64 * resolution).collect()
}

/// Two linear Q-function estimates, updated on alternating timesteps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleCritic {
    theta_a: Vec<f64>,
    theta_b: Vec<f64>,
}

impl DoubleCritic {
    /// Weights drawn independently from N(-1, 0.3²).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut draw = || -> Vec<f64> {
            (0..PHI_LEN)
                .map(|_| -1.0 + 0.3 * rng.sample::<f64, _>(StandardNormal))
                .collect()
        };
        let theta_a = draw();
        let theta_b = draw();
        Self { theta_a, theta_b }
    }

    pub fn from_weights(theta_a: Vec<f64>, theta_b: Vec<f64>) -> Self {
        Self { theta_a, theta_b }
    }

    pub fn theta(&self, slot: CriticSlot) -> &[f64] {
        match slot {
            CriticSlot::A => &self.theta_a,
            CriticSlot::B => &self.theta_b,
        }
    }

    pub fn q(&self, slot: CriticSlot, state: &RlState, action: f64) -> f64 {
        dot(self.theta(slot), &phi(state, action))
    }

    /// Pessimistic estimate over both critics.
    pub fn min_q(&self, state: &RlState, action: f64) -> f64 {
        let features = phi(state, action);
        dot(&self.theta_a, &features).min(dot(&self.theta_b, &features))
    }

    /// Arg-max of `q(slot, state, ·)` over `grid`; first maximum wins.
    pub fn greedy_action(&self, slot: CriticSlot, state: &RlState, grid: &[f64]) -> (f64, f64) {
        grid.iter().fold((0.0, f64::NEG_INFINITY), |best, &a| {
            let q = self.q(slot, state, a);
            if q > best.1 {
                (a, q)
            } else {
                best
            }
        })
    }

    /// `theta ← rate·coef + (1 − rate)·theta` for the given slot.
    pub fn blend(&mut self, slot: CriticSlot, coef: &[f64], rate: f64) {
        let theta = match slot {
            CriticSlot::A => &mut self.theta_a,
            CriticSlot::B => &mut self.theta_b,
        };
        for (t, c) in theta.iter_mut().zip(coef) {
            *t = rate * c + (1.0 - rate) * *t;
        }
    }
}
