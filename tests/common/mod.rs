//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use flex_aggregator::config::{Config, SimulationMode};
use flex_aggregator::domain::{
    BatteryParams, Home, HomeId, HomeKind, HvacParams, PvParams, WaterHeaterParams,
};

pub fn hvac(min: f64, max: f64, init: f64) -> HvacParams {
    HvacParams {
        r: 2.0,
        c: 10.0,
        p_cool: 10.0,
        p_heat: 10.0,
        temp_in_min: min,
        temp_in_max: max,
        temp_in_setpoint: 0.5 * (min + max),
        temp_in_init: init,
    }
}

pub fn water_heater(r: f64, c: f64) -> WaterHeaterParams {
    WaterHeaterParams {
        r,
        c,
        p: 4.5,
        temp_wh_min: 45.0,
        temp_wh_max: 55.0,
        temp_wh_setpoint: 50.0,
        temp_wh_init: 50.0,
        tank_size_l: 200.0,
        draws: Vec::new(),
    }
}

pub fn battery() -> BatteryParams {
    BatteryParams {
        max_rate: 3.0,
        capacity: 10.0,
        capacity_lower: 2.0,
        capacity_upper: 8.0,
        charge_eff: 0.95,
        discharge_eff: 0.9,
        e_batt_init: 5.0,
    }
}

pub fn pv() -> PvParams {
    PvParams {
        area: 20.0,
        efficiency: 0.2,
    }
}

/// Cold-weather home that must heat once in its first two steps.
pub fn cold_home(id: &str) -> Home {
    Home {
        id: HomeId::new(id),
        hvac: hvac(19.0, 23.0, 19.6),
        water_heater: water_heater(100.0, 1.0),
        kind: HomeKind::Base,
    }
}

/// Home that cannot reach its comfort band: heating adds at most 1 °C a step.
pub fn hopeless_home(id: &str) -> Home {
    Home {
        id: HomeId::new(id),
        hvac: hvac(19.0, 23.0, 10.0),
        water_heater: water_heater(100.0, 1.0),
        kind: HomeKind::Base,
    }
}

/// Warm-weather home with a leaky tank.
pub fn warm_home(id: &str, kind: HomeKind) -> Home {
    Home {
        id: HomeId::new(id),
        hvac: hvac(20.0, 26.0, 22.0),
        water_heater: water_heater(20.0, 2.0),
        kind,
    }
}

/// Battery-only home with nothing else to run at a constant 22 °C: buying at
/// 0.05 and selling at 0.20 nets 0.81 kWh back per kWh bought.
pub fn arbitrage_home(id: &str) -> Home {
    Home {
        id: HomeId::new(id),
        hvac: hvac(20.0, 26.0, 22.0),
        water_heater: water_heater(100.0, 1.0),
        kind: HomeKind::BatteryOnly {
            battery: BatteryParams {
                max_rate: 5.0,
                capacity: 10.0,
                capacity_lower: 0.0,
                capacity_upper: 10.0,
                charge_eff: 0.9,
                discharge_eff: 0.9,
                e_batt_init: 0.0,
            },
        },
    }
}

/// Hourly run of `hours` steps starting at midnight.
pub fn config(mode: SimulationMode, homes: usize, hours: u32, horizon: usize) -> Config {
    let mut cfg = Config::default();
    cfg.simulation.mode = mode;
    cfg.simulation.start_datetime = "2015-01-01 00".into();
    cfg.simulation.data_start_datetime = "2015-01-01 00".into();
    cfg.simulation.end_datetime = format!("2015-01-{:02} {:02}", 1 + hours / 24, hours % 24);
    cfg.simulation.steps_per_hour = 1;
    cfg.simulation.workers = 2;
    cfg.simulation.queue_capacity = 2;
    cfg.community.total_number_homes = homes.max(1);
    cfg.community.homes_pv = 0;
    cfg.community.homes_battery = 0;
    cfg.community.homes_pv_battery = 0;
    cfg.home.hems.prediction_horizon = horizon;
    cfg
}
