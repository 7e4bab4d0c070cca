//! Per-home, per-timestep solve results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::HomeId;

/// Hash field names used when a solution is published to the store.
pub mod fields {
    pub const TIMESTEP: &str = "timestep";
    pub const ITERATION: &str = "iteration";
    pub const P_GRID: &str = "p_grid_opt";
    pub const P_LOAD: &str = "p_load_opt";
    pub const TEMP_IN: &str = "temp_in_opt";
    pub const TEMP_WH: &str = "temp_wh_opt";
    pub const HVAC_COOL_ON: &str = "hvac_cool_on_opt";
    pub const HVAC_HEAT_ON: &str = "hvac_heat_on_opt";
    pub const WH_HEAT_ON: &str = "wh_heat_on_opt";
    pub const COST: &str = "cost_opt";
    pub const E_BATT: &str = "e_batt_opt";
    pub const P_BATT_CH: &str = "p_batt_ch";
    pub const P_BATT_DISCH: &str = "p_batt_disch";
    pub const P_PV: &str = "p_pv_opt";
    pub const U_PV_CURT: &str = "u_pv_curt_opt";
}

/// Committed battery decision for the first step of the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryCommit {
    /// State of energy after the step (kWh)
    pub e_batt: f64,
    /// Charge power, in [0, max_rate]
    pub p_batt_ch: f64,
    /// Discharge power, in [-max_rate, 0]
    pub p_batt_disch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PvCommit {
    pub p_pv: f64,
    pub u_pv_curt: f64,
}

/// First-step decision of one receding-horizon solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonSolution {
    pub home_id: HomeId,
    pub timestep: usize,
    pub iteration: usize,
    pub p_grid: f64,
    pub p_load: f64,
    pub temp_in: f64,
    pub temp_wh: f64,
    pub hvac_cool_on: bool,
    pub hvac_heat_on: bool,
    pub wh_heat_on: bool,
    /// Wholesale cost of the committed step
    pub cost: f64,
    /// Objective value over the whole horizon, reward price included
    pub horizon_cost: f64,
    pub battery: Option<BatteryCommit>,
    pub pv: Option<PvCommit>,
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

impl HorizonSolution {
    /// Flattens the solution into store hash fields.
    pub fn to_fields(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            (fields::TIMESTEP, self.timestep as f64),
            (fields::ITERATION, self.iteration as f64),
            (fields::P_GRID, self.p_grid),
            (fields::P_LOAD, self.p_load),
            (fields::TEMP_IN, self.temp_in),
            (fields::TEMP_WH, self.temp_wh),
            (fields::HVAC_COOL_ON, flag(self.hvac_cool_on)),
            (fields::HVAC_HEAT_ON, flag(self.hvac_heat_on)),
            (fields::WH_HEAT_ON, flag(self.wh_heat_on)),
            (fields::COST, self.cost),
        ];
        if let Some(b) = &self.battery {
            out.push((fields::E_BATT, b.e_batt));
            out.push((fields::P_BATT_CH, b.p_batt_ch));
            out.push((fields::P_BATT_DISCH, b.p_batt_disch));
        }
        if let Some(pv) = &self.pv {
            out.push((fields::P_PV, pv.p_pv));
            out.push((fields::U_PV_CURT, pv.u_pv_curt));
        }
        out
    }

    /// The part of the solution that seeds the next solve.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            temp_in: self.temp_in,
            temp_wh: self.temp_wh,
            e_batt: self.battery.map(|b| b.e_batt),
        }
    }
}

/// Committed thermal / energy state used as the next solve's initial condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub temp_in: f64,
    pub temp_wh: f64,
    pub e_batt: Option<f64>,
}

impl Snapshot {
    /// Reads a snapshot back from a home's hash. `None` if the temperatures
    /// were never published.
    pub fn from_fields(map: &HashMap<String, f64>) -> Option<Self> {
        Some(Self {
            temp_in: *map.get(fields::TEMP_IN)?,
            temp_wh: *map.get(fields::TEMP_WH)?,
            e_batt: map.get(fields::E_BATT).copied(),
        })
    }

    pub fn to_fields(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![(fields::TEMP_IN, self.temp_in), (fields::TEMP_WH, self.temp_wh)];
        if let Some(e) = self.e_batt {
            out.push((fields::E_BATT, e));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_field_round_trip() {
        let sol = HorizonSolution {
            home_id: HomeId::new("h1"),
            timestep: 3,
            iteration: 0,
            p_grid: 1.5,
            p_load: 4.5,
            temp_in: 21.0,
            temp_wh: 49.0,
            hvac_cool_on: false,
            hvac_heat_on: false,
            wh_heat_on: true,
            cost: 0.075,
            horizon_cost: 0.3,
            battery: Some(BatteryCommit { e_batt: 3.0, p_batt_ch: 0.0, p_batt_disch: -3.0 }),
            pv: None,
        };
        let map: HashMap<String, f64> =
            sol.to_fields().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        assert_eq!(map[fields::WH_HEAT_ON], 1.0);
        assert!(!map.contains_key(fields::P_PV));
        assert_eq!(Snapshot::from_fields(&map), Some(sol.snapshot()));
    }

    #[test]
    fn test_snapshot_missing_temperatures() {
        let mut map = HashMap::new();
        map.insert(fields::TEMP_IN.to_string(), 20.0);
        assert_eq!(Snapshot::from_fields(&map), None);
    }
}
