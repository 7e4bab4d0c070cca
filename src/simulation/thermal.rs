//! First-order RC thermal circuits
//!
//! Both the indoor air node and the water-heater tank are single-capacitance
//! circuits discretised with forward Euler over a step of `dt_h` hours. The
//! optimiser builds its linear constraints from the same coefficients used by
//! [`IndoorCircuit::step`] and [`TankCircuit::step`], so a committed
//! trajectory can be replayed exactly outside the solver.

use crate::domain::{HvacParams, WaterHeaterParams};

/// Indoor air node: `T_in[k+1] = decay·T_in[k] + ambient_gain·T_amb[k+1]
/// − cool_gain·cool[k] + heat_gain·heat[k]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndoorCircuit {
    pub decay: f64,
    pub ambient_gain: f64,
    pub cool_gain: f64,
    pub heat_gain: f64,
}

impl IndoorCircuit {
    pub fn new(hvac: &HvacParams, dt_h: f64) -> Self {
        let leak = dt_h / (hvac.r * hvac.c);
        Self {
            decay: 1.0 - leak,
            ambient_gain: leak,
            cool_gain: dt_h * hvac.p_cool / hvac.c,
            heat_gain: dt_h * hvac.p_heat / hvac.c,
        }
    }

    pub fn step(&self, temp_in: f64, ambient_next: f64, cool: bool, heat: bool) -> f64 {
        self.decay * temp_in + self.ambient_gain * ambient_next
            - if cool { self.cool_gain } else { 0.0 }
            + if heat { self.heat_gain } else { 0.0 }
    }
}

/// Water-heater tank exchanging heat with the indoor air it sits in:
/// `T_pre = decay·T_wh[k] + indoor_gain·T_in[k+1] + heat_gain·on[k]`,
/// followed by tap-water mixing for any draw during the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankCircuit {
    pub decay: f64,
    pub indoor_gain: f64,
    pub heat_gain: f64,
}

impl TankCircuit {
    pub fn new(wh: &WaterHeaterParams, dt_h: f64) -> Self {
        let leak = dt_h / (wh.r * wh.c);
        Self {
            decay: 1.0 - leak,
            indoor_gain: leak,
            heat_gain: dt_h * wh.p / wh.c,
        }
    }

    pub fn step(&self, temp_wh: f64, temp_in_next: f64, on: bool, draw_fraction: f64, tap_temp: f64) -> f64 {
        let pre = self.decay * temp_wh
            + self.indoor_gain * temp_in_next
            + if on { self.heat_gain } else { 0.0 };
        mix_draw(pre, draw_fraction, tap_temp)
    }
}

/// Replaces `fraction` of the tank with tap water.
pub fn mix_draw(temp_pre: f64, fraction: f64, tap_temp: f64) -> f64 {
    (1.0 - fraction) * temp_pre + fraction * tap_temp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hvac() -> HvacParams {
        HvacParams {
            r: 2.0,
            c: 10.0,
            p_cool: 10.0,
            p_heat: 10.0,
            temp_in_min: 19.0,
            temp_in_max: 23.0,
            temp_in_setpoint: 21.0,
            temp_in_init: 19.6,
        }
    }

    #[test]
    fn test_indoor_relaxes_toward_ambient() {
        let circuit = IndoorCircuit::new(&hvac(), 1.0);
        let next = circuit.step(19.6, 10.0, false, false);
        // 19.6 + (10 - 19.6) / 20
        assert!((next - 19.12).abs() < 1e-12);
        let heated = circuit.step(19.6, 10.0, false, true);
        assert!((heated - 20.12).abs() < 1e-12);
    }

    #[test]
    fn test_substep_scales_gains() {
        let hourly = IndoorCircuit::new(&hvac(), 1.0);
        let quarter = IndoorCircuit::new(&hvac(), 0.25);
        assert!((quarter.heat_gain * 4.0 - hourly.heat_gain).abs() < 1e-12);
        assert!((quarter.ambient_gain * 4.0 - hourly.ambient_gain).abs() < 1e-12);
    }

    #[test]
    fn test_tank_draw_mixing() {
        assert_eq!(mix_draw(50.0, 0.0, 12.0), 50.0);
        assert!((mix_draw(50.0, 0.25, 12.0) - 40.5).abs() < 1e-12);
    }
}
