//! Fixed polynomial feature expansions for the critic and the policy.
//!
//! Every scalar feature `x` expands to the quadratic basis `[1, x, x²]`; pairs
//! of bases are combined by outer product with the leading constant term
//! dropped, then crossed with the time-of-day basis `[1, sin 2πτ, cos 2πτ]`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Length of [`state_basis`].
pub const STATE_BASIS_LEN: usize = 23;
/// Length of [`phi`].
pub const PHI_LEN: usize = 71;

/// Controller state observed once per timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RlState {
    /// Aggregate load minus setpoint (kW)
    pub curr_error: f64,
    /// Running sum of `curr_error`
    pub int_error: f64,
    /// Change of the broadcast price between the last two broadcasts
    pub delta_action: f64,
    /// Fraction of the day elapsed, in [0, 1)
    pub time_of_day: f64,
    /// One-step forecast minus forecast setpoint
    pub fcst_error: f64,
    /// First minus last value of the load forecast
    pub forecast_trend: f64,
}

impl RlState {
    pub fn is_finite(&self) -> bool {
        [
            self.curr_error,
            self.int_error,
            self.delta_action,
            self.time_of_day,
            self.fcst_error,
            self.forecast_trend,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

fn quadratic(x: f64) -> [f64; 3] {
    [1.0, x, x * x]
}

fn time_basis(phase: f64) -> [f64; 3] {
    let angle = 2.0 * PI * phase;
    [1.0, angle.sin(), angle.cos()]
}

/// Row-major outer product without its `[0][0]` entry.
fn outer_tail(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter()
        .flat_map(|x| b.iter().map(move |y| x * y))
        .skip(1)
        .collect()
}

/// Policy / state-value features: forecast error × forecast trend × time.
pub fn state_basis(state: &RlState) -> Vec<f64> {
    let forecast = outer_tail(&quadratic(state.fcst_error), &quadratic(state.forecast_trend));
    outer_tail(&forecast, &time_basis(state.time_of_day))
}

/// Critic features for a state-action pair: forecast trend × action,
/// forecast error × action and action × tracking error, each crossed with
/// time of day. `delta_action` and `int_error` are not features.
pub fn phi(state: &RlState, action: f64) -> Vec<f64> {
    let act = quadratic(action);

    let mut blocks = outer_tail(&quadratic(state.forecast_trend), &act);
    blocks.extend(outer_tail(&quadratic(state.fcst_error), &act));
    blocks.extend(outer_tail(&act, &quadratic(state.curr_error)));

    outer_tail(&blocks, &time_basis(state.time_of_day))
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> RlState {
        RlState {
            curr_error: 1.5,
            int_error: 3.0,
            delta_action: -0.2,
            time_of_day: 0.25,
            fcst_error: 0.5,
            forecast_trend: 2.0,
        }
    }

    #[test]
    fn test_basis_lengths() {
        let s = sample_state();
        assert_eq!(state_basis(&s).len(), STATE_BASIS_LEN);
        assert_eq!(phi(&s, 0.3).len(), PHI_LEN);
    }

    #[test]
    fn test_state_basis_leading_terms() {
        let s = sample_state();
        let x = state_basis(&s);
        // trend × sin(π/2), trend × cos(π/2), trend² × 1
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
        assert!((x[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_phi_depends_on_action() {
        let s = sample_state();
        assert_ne!(phi(&s, 0.1), phi(&s, -0.1));
    }

    #[test]
    fn test_phi_ignores_price_change() {
        let s = sample_state();
        let moved = RlState {
            delta_action: 0.7,
            int_error: -4.0,
            ..s
        };
        assert_eq!(phi(&s, 0.3), phi(&moved, 0.3));
    }

    #[test]
    fn test_phi_leading_terms() {
        let s = sample_state();
        let x = phi(&s, 0.5);
        // 1 × action × sin(π/2), 1 × action × cos(π/2)
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
        // last entry: action² × curr_error² × cos(π/2)
        assert!(x[PHI_LEN - 1].abs() < 1e-12);
        // action² × curr_error² × sin(π/2)
        assert!((x[PHI_LEN - 2] - 0.25 * 2.25).abs() < 1e-12);
    }
}
