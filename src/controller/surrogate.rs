use serde::{Deserialize, Serialize};

use crate::config::SurrogateConfig;

/// Aggregate load and cost of one surrogate step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurrogateResponse {
    pub agg_load: f64,
    pub agg_cost: f64,
}

/// Closed-form stand-in for the per-home solves: the community sheds load in
/// proportion to the price and drifts back toward the setpoint when the price
/// is inside the deadband.
#[derive(Debug, Clone)]
pub struct ResponseSurrogate {
    config: SurrogateConfig,
    load: Option<f64>,
}

impl ResponseSurrogate {
    pub fn new(config: SurrogateConfig) -> Self {
        Self { config, load: None }
    }

    pub fn load(&self) -> Option<f64> {
        self.load
    }

    /// Responds to `reward_price`. The first call starts from 1.1 × setpoint.
    pub fn respond(&mut self, reward_price: f64, setpoint: f64) -> SurrogateResponse {
        let c = &self.config;
        let load = match self.load {
            None => 1.1 * setpoint,
            Some(prev) => {
                let mut load = (prev - c.disutility * reward_price * prev)
                    .max(c.min_load_kw)
                    .min(c.max_load_kw);
                if reward_price.abs() <= c.deadband_price {
                    load += c.relaxation * (setpoint - load);
                }
                load
            }
        };
        self.load = Some(load);
        SurrogateResponse {
            agg_load: load,
            agg_cost: load * reward_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_overshoots_setpoint() {
        let mut s = ResponseSurrogate::new(SurrogateConfig::default());
        let r = s.respond(0.5, 20.0);
        assert!((r.agg_load - 22.0).abs() < 1e-12);
        assert!((r.agg_cost - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_deadband_relaxes_toward_setpoint() {
        let mut s = ResponseSurrogate::new(SurrogateConfig::default());
        s.respond(0.0, 20.0);
        // 22 is untouched by a zero price, then halves its gap to 20
        let r = s.respond(0.0, 20.0);
        assert!((r.agg_load - 21.0).abs() < 1e-12);
        assert_eq!(r.agg_cost, 0.0);
    }

    #[test]
    fn test_price_sheds_load_within_bounds() {
        let mut s = ResponseSurrogate::new(SurrogateConfig::default());
        s.respond(0.0, 20.0);
        let r = s.respond(0.1, 20.0);
        assert!((r.agg_load - 19.8).abs() < 1e-9);
        let r = s.respond(5.0, 20.0);
        assert_eq!(r.agg_load, 1.0);
    }
}
