//! Per-home receding-horizon MILP
//!
//! Each home minimises `Σ (wholesale[k] + reward[k]) · p_grid[k]` over the
//! horizon subject to:
//! - indoor and tank RC recurrences, the tank coupled to indoor air
//! - on/off HVAC cooling, heating and water heating (never cool and heat together)
//! - indoor and tank temperature bounds at every step after the first
//! - battery rate limits, separate charge / discharge efficiencies and a
//!   state-of-energy window; a battery may export to the grid
//! - PV curtailment in [0, 1]
//!
//! Only the first step is committed. The committed record is recomputed from
//! the rounded on/off decisions and the first-step battery and PV values so the
//! grid-power identity and the thermal recurrence hold exactly.

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use tracing::{debug, warn};

use super::{HorizonInputs, SolveError};
use crate::domain::{BatteryCommit, Home, HorizonSolution, PvCommit, Snapshot};
use crate::simulation::thermal::{IndoorCircuit, TankCircuit};
use crate::store::{keys, StateStore};

/// Builds and solves one home's horizon problem.
#[derive(Debug, Clone)]
pub struct ThermalAgentModel {
    horizon: usize,
    dt_h: f64,
    tap_water_temp: f64,
}

struct BatteryVars {
    ch: Vec<Variable>,
    disch: Vec<Variable>,
    energy: Vec<Variable>,
}

fn binary_flag(value: f64) -> bool {
    value > 0.5
}

impl ThermalAgentModel {
    pub fn new(horizon: usize, dt_h: f64, tap_water_temp: f64) -> Self {
        Self {
            horizon: horizon.max(1),
            dt_h,
            tap_water_temp,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn dt_hours(&self) -> f64 {
        self.dt_h
    }

    /// Configured starting state, used at timestep 0.
    pub fn initial_snapshot(home: &Home) -> Snapshot {
        Snapshot {
            temp_in: home.hvac.temp_in_init,
            temp_wh: home.water_heater.temp_wh_init,
            e_batt: home.battery().map(|b| b.e_batt_init),
        }
    }

    /// Solves the horizon problem and returns the committed first step.
    pub fn solve(&self, home: &Home, inputs: &HorizonInputs) -> Result<HorizonSolution, SolveError> {
        let h = self.horizon;
        inputs.check_lengths(h)?;

        let hvac = &home.hvac;
        let wh = &home.water_heater;
        let indoor = IndoorCircuit::new(hvac, self.dt_h);
        let tank = TankCircuit::new(wh, self.dt_h);

        let mut vars = ProblemVariables::new();

        let cool: Vec<Variable> = (0..h).map(|_| vars.add(variable().binary())).collect();
        let heat: Vec<Variable> = (0..h).map(|_| vars.add(variable().binary())).collect();
        let wh_on: Vec<Variable> = (0..h).map(|_| vars.add(variable().binary())).collect();

        // Index 0 is pinned to the initial state; bounds apply from index 1.
        let mut temp_in = vec![vars.add(variable())];
        temp_in.extend(
            (0..h).map(|_| vars.add(variable().min(hvac.temp_in_min).max(hvac.temp_in_max))),
        );
        let mut temp_wh = vec![vars.add(variable())];
        temp_wh.extend((0..h).map(|_| vars.add(variable().min(wh.temp_wh_min).max(wh.temp_wh_max))));

        let battery_vars = home.battery().map(|b| {
            let ch = vars.add_vector(variable().min(0.0).max(b.max_rate), h);
            let disch = vars.add_vector(variable().min(-b.max_rate).max(0.0), h);
            let mut energy = vec![vars.add(variable())];
            energy.extend((0..h).map(|_| vars.add(variable().min(b.capacity_lower).max(b.capacity_upper))));
            BatteryVars { ch, disch, energy }
        });

        let pv_available: Vec<f64> = match home.pv() {
            Some(pv) => (0..h).map(|k| pv.available_kw(inputs.irradiance[k])).collect(),
            None => Vec::new(),
        };
        let curtail: Vec<Variable> = if home.pv().is_some() {
            vars.add_vector(variable().min(0.0).max(1.0), h)
        } else {
            Vec::new()
        };

        let p_load: Vec<Expression> = (0..h)
            .map(|k| hvac.p_cool * cool[k] + hvac.p_heat * heat[k] + wh.p * wh_on[k])
            .collect();

        let p_grid: Vec<Expression> = (0..h)
            .map(|k| {
                let mut grid = p_load[k].clone();
                if let Some(bv) = &battery_vars {
                    grid = grid + bv.ch[k] + bv.disch[k];
                }
                if !curtail.is_empty() {
                    // p_pv = avail · (1 − curt)
                    grid = grid + pv_available[k] * curtail[k] - pv_available[k];
                }
                grid
            })
            .collect();

        let prices: Vec<f64> = (0..h)
            .map(|k| inputs.wholesale_price[k] + inputs.reward_at(k))
            .collect();

        let objective: Expression = (0..h).map(|k| prices[k] * p_grid[k].clone()).sum();

        let mut model = vars.minimise(objective).using(default_solver);

        model = model.with(constraint!(temp_in[0] == inputs.initial.temp_in));
        model = model.with(constraint!(temp_wh[0] == inputs.initial.temp_wh));

        for k in 0..h {
            model = model.with(constraint!(cool[k] + heat[k] <= 1.0));

            model = model.with(constraint!(
                temp_in[k + 1]
                    == indoor.decay * temp_in[k]
                        + indoor.heat_gain * heat[k]
                        - indoor.cool_gain * cool[k]
                        + indoor.ambient_gain * inputs.ambient_temp[k + 1]
            ));

            let keep = 1.0 - inputs.draw_at(k);
            model = model.with(constraint!(
                temp_wh[k + 1]
                    == keep * tank.decay * temp_wh[k]
                        + keep * tank.indoor_gain * temp_in[k + 1]
                        + keep * tank.heat_gain * wh_on[k]
                        + (1.0 - keep) * self.tap_water_temp
            ));
        }

        if let (Some(bv), Some(b)) = (&battery_vars, home.battery()) {
            let e0 = inputs.initial.e_batt.unwrap_or(b.e_batt_init);
            model = model.with(constraint!(bv.energy[0] == e0));
            for k in 0..h {
                model = model.with(constraint!(
                    bv.energy[k + 1]
                        == bv.energy[k]
                            + self.dt_h * b.charge_eff * bv.ch[k]
                            + (self.dt_h / b.discharge_eff) * bv.disch[k]
                ));
            }
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => SolveError::Infeasible,
            ResolutionError::Unbounded => SolveError::Unbounded,
            other => SolveError::Solver(other.to_string()),
        })?;

        let horizon_cost: f64 = (0..h)
            .map(|k| prices[k] * solution.eval(p_grid[k].clone()))
            .sum();

        let hvac_cool_on = binary_flag(solution.value(cool[0]));
        let hvac_heat_on = binary_flag(solution.value(heat[0])) && !hvac_cool_on;
        let wh_heat_on = binary_flag(solution.value(wh_on[0]));

        let temp_in_next = indoor.step(
            inputs.initial.temp_in,
            inputs.ambient_temp[1],
            hvac_cool_on,
            hvac_heat_on,
        );
        let temp_wh_next = tank.step(
            inputs.initial.temp_wh,
            temp_in_next,
            wh_heat_on,
            inputs.draw_at(0),
            self.tap_water_temp,
        );

        let p_load = (if hvac_cool_on { hvac.p_cool } else { 0.0 })
            + (if hvac_heat_on { hvac.p_heat } else { 0.0 })
            + (if wh_heat_on { wh.p } else { 0.0 });

        let battery = match (&battery_vars, home.battery()) {
            (Some(bv), Some(b)) => {
                let e0 = inputs.initial.e_batt.unwrap_or(b.e_batt_init);
                let p_batt_ch = solution.value(bv.ch[0]).clamp(0.0, b.max_rate);
                let p_batt_disch = solution.value(bv.disch[0]).clamp(-b.max_rate, 0.0);
                let e_batt = e0
                    + self.dt_h * b.charge_eff * p_batt_ch
                    + (self.dt_h / b.discharge_eff) * p_batt_disch;
                Some(BatteryCommit { e_batt, p_batt_ch, p_batt_disch })
            }
            _ => None,
        };

        let pv = if curtail.is_empty() {
            None
        } else {
            let u_pv_curt = solution.value(curtail[0]).clamp(0.0, 1.0);
            Some(PvCommit {
                p_pv: pv_available[0] * (1.0 - u_pv_curt),
                u_pv_curt,
            })
        };

        let mut p_grid = p_load;
        if let Some(b) = &battery {
            p_grid = p_grid + b.p_batt_ch + b.p_batt_disch;
        }
        if let Some(pv) = &pv {
            p_grid -= pv.p_pv;
        }

        Ok(HorizonSolution {
            home_id: home.id.clone(),
            timestep: inputs.timestep,
            iteration: inputs.iteration,
            p_grid,
            p_load,
            temp_in: temp_in_next,
            temp_wh: temp_wh_next,
            hvac_cool_on,
            hvac_heat_on,
            wh_heat_on,
            cost: inputs.wholesale_price[0] * p_grid,
            horizon_cost,
            battery,
            pv,
        })
    }

    /// Reads the current step's inputs for `home` from the store.
    pub fn gather_inputs(&self, home: &Home, store: &dyn StateStore) -> Result<HorizonInputs, SolveError> {
        let timestep = store.get_scalar(keys::TIMESTEP)? as usize;
        let iteration = store.get_scalar(keys::ITERATION)? as usize;
        let start = store.get_scalar(keys::START_HOUR_INDEX)? as usize;

        let from = (start + timestep) as isize;
        let to = from + self.horizon as isize;
        let ambient_temp = store.list_range(keys::OAT, from, to)?;
        let irradiance = store.list_range(keys::GHI, from, to)?;
        let wholesale_price = store.list_range(keys::SPP, from, to)?;
        let reward_price = store.list_all(keys::REWARD_PRICE_HORIZON)?;

        let initial = if timestep == 0 {
            Self::initial_snapshot(home)
        } else {
            match Snapshot::from_fields(&store.hash_get_all(home.id.as_str())?) {
                Some(mut snap) => {
                    if snap.e_batt.is_none() {
                        snap.e_batt = home.battery().map(|b| b.e_batt_init);
                    }
                    snap
                }
                None => {
                    debug!(home = %home.id, timestep, "no committed state yet, using initial values");
                    Self::initial_snapshot(home)
                }
            }
        };

        let draw_fractions = (0..self.horizon)
            .map(|k| home.water_heater.draw_fraction(timestep + k))
            .collect();

        Ok(HorizonInputs {
            timestep,
            iteration,
            initial,
            ambient_temp,
            irradiance,
            wholesale_price,
            reward_price,
            draw_fractions,
        })
    }

    /// Reads inputs, solves, and writes the committed record under the home's
    /// key. On failure nothing is written, so the previous record carries over.
    pub fn solve_and_publish(&self, home: &Home, store: &dyn StateStore) -> Result<HorizonSolution, SolveError> {
        let inputs = self.gather_inputs(home, store)?;
        let result = self.solve(home, &inputs);
        match result {
            Ok(solution) => {
                store.hash_set_many(home.id.as_str(), &solution.to_fields())?;
                debug!(
                    home = %home.id,
                    timestep = inputs.timestep,
                    iteration = inputs.iteration,
                    p_grid = solution.p_grid,
                    temp_in = solution.temp_in,
                    horizon_cost = solution.horizon_cost,
                    "home solved"
                );
                Ok(solution)
            }
            Err(e) => {
                warn!(
                    home = %home.id,
                    variant = %home.variant(),
                    timestep = inputs.timestep,
                    iteration = inputs.iteration,
                    status = e.status(),
                    error = %e,
                    "home solve failed, keeping previous state"
                );
                Err(e)
            }
        }
    }
}
