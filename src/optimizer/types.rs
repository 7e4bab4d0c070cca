use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Snapshot;
use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("problem is infeasible")]
    Infeasible,

    #[error("problem is unbounded")]
    Unbounded,

    #[error("solver failure: {0}")]
    Solver(String),

    #[error("{series} series has {available} values from the current step, {needed} needed")]
    MissingData {
        series: &'static str,
        needed: usize,
        available: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SolveError {
    /// Short status label for logs.
    pub fn status(&self) -> &'static str {
        match self {
            SolveError::Infeasible => "infeasible",
            SolveError::Unbounded => "unbounded",
            SolveError::Solver(_) => "solver_error",
            SolveError::MissingData { .. } => "missing_data",
            SolveError::Store(_) => "store_error",
        }
    }
}

/// Everything one home's solve needs besides the home itself.
///
/// Exogenous slices start at the current step and hold `horizon + 1` values:
/// the thermal recurrence for step `k` reads ambient temperature at `k + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonInputs {
    pub timestep: usize,
    pub iteration: usize,
    pub initial: Snapshot,
    pub ambient_temp: Vec<f64>,
    pub irradiance: Vec<f64>,
    pub wholesale_price: Vec<f64>,
    /// Reward price per horizon step; steps past the end get zero
    pub reward_price: Vec<f64>,
    /// Fraction of the tank drawn during each horizon step
    pub draw_fractions: Vec<f64>,
}

impl HorizonInputs {
    pub fn reward_at(&self, k: usize) -> f64 {
        self.reward_price.get(k).copied().unwrap_or(0.0)
    }

    pub fn draw_at(&self, k: usize) -> f64 {
        self.draw_fractions.get(k).copied().unwrap_or(0.0)
    }

    pub(crate) fn check_lengths(&self, horizon: usize) -> Result<(), SolveError> {
        let needed = horizon + 1;
        for (series, values) in [
            ("ambient temperature", &self.ambient_temp),
            ("irradiance", &self.irradiance),
            ("wholesale price", &self.wholesale_price),
        ] {
            if values.len() < needed {
                return Err(SolveError::MissingData {
                    series,
                    needed,
                    available: values.len(),
                });
            }
        }
        Ok(())
    }
}
