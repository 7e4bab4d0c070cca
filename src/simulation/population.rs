//! Seeded synthesis of the home population from the configured parameter
//! ranges.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::domain::{
    BatteryParams, Home, HomeId, HomeKind, HomeVariant, HvacParams, PvParams, WaterDraw, WaterHeaterParams,
};

fn uniform(rng: &mut StdRng, range: [f64; 2]) -> f64 {
    rng.gen_range(range[0]..=range[1])
}

fn count(rng: &mut StdRng, range: [u32; 2]) -> u32 {
    rng.gen_range(range[0]..=range[1])
}

/// Daily draw events at a typical time per event, jittered by up to
/// `jitter` steps on each day of the run.
fn daily_draws(
    rng: &mut StdRng,
    events: u32,
    sizes: [f64; 2],
    jitter: i64,
    steps_per_day: usize,
    days: usize,
) -> Vec<WaterDraw> {
    let typical: Vec<i64> = (0..events)
        .map(|_| rng.gen_range(0..steps_per_day as i64))
        .collect();
    let mut draws = Vec::with_capacity(typical.len() * days);
    for day in 0..days {
        for t in &typical {
            let shift = if jitter > 0 { rng.gen_range(-jitter..jitter) } else { 0 };
            let step = t + shift + (day * steps_per_day) as i64;
            let volume_l = uniform(rng, sizes);
            if step >= 0 {
                draws.push(WaterDraw {
                    step: step as usize,
                    volume_l,
                });
            }
        }
    }
    draws
}

/// Builds `community.total_number_homes` homes: base homes first, then
/// PV-only, battery-only and PV + battery. Deterministic for a given
/// `random_seed`.
pub fn synthesize_population(config: &Config) -> Result<Vec<Home>, ConfigError> {
    let community = &config.community;
    let base = community.base_homes()?;
    let num_timesteps = config.simulation.num_timesteps()?;
    let sph = config.simulation.steps_per_hour as i64;
    let steps_per_day = config.simulation.steps_per_day();
    let days = num_timesteps / steps_per_day + 1;

    let hvac_cfg = &config.home.hvac;
    let wh_cfg = &config.home.wh;
    let draw_cfg = &wh_cfg.waterdraws;
    let batt_cfg = &config.home.battery;
    let pv = PvParams {
        area: config.home.pv.area,
        efficiency: config.home.pv.efficiency,
    };

    let mut rng = StdRng::seed_from_u64(config.simulation.random_seed);
    let layout = [
        (HomeVariant::Base, base),
        (HomeVariant::PvOnly, community.homes_pv),
        (HomeVariant::BatteryOnly, community.homes_battery),
        (HomeVariant::PvBattery, community.homes_pv_battery),
    ];

    let mut homes = Vec::with_capacity(community.total_number_homes);
    for (variant, n) in layout {
        for i in 0..n {
            let sp = uniform(&mut rng, hvac_cfg.temp_sp_dist);
            let db = uniform(&mut rng, hvac_cfg.temp_deadband_dist);
            let hvac = HvacParams {
                r: uniform(&mut rng, hvac_cfg.r_dist),
                c: uniform(&mut rng, hvac_cfg.c_dist),
                p_cool: uniform(&mut rng, hvac_cfg.p_cool_dist),
                p_heat: uniform(&mut rng, hvac_cfg.p_heat_dist),
                temp_in_min: sp - 0.5 * db,
                temp_in_max: sp + 0.5 * db,
                temp_in_setpoint: sp,
                temp_in_init: sp - 0.5 * db + rng.gen_range(0.0..=db),
            };

            let wh_sp = uniform(&mut rng, wh_cfg.sp_dist);
            let wh_db = uniform(&mut rng, wh_cfg.deadband_dist);
            let tank = ((uniform(&mut rng, wh_cfg.size_dist) + 10.0) / 20.0).floor() * 20.0;

            let n_big = count(&mut rng, draw_cfg.n_big_draw_dist);
            let n_small = count(&mut rng, draw_cfg.n_small_draw_dist);
            let mut draws = daily_draws(&mut rng, n_big, draw_cfg.big_draw_size_dist, sph, steps_per_day, days);
            draws.extend(daily_draws(
                &mut rng,
                n_small,
                draw_cfg.small_draw_size_dist,
                3 * sph,
                steps_per_day,
                days,
            ));
            draws.sort_by_key(|d| d.step);

            let water_heater = WaterHeaterParams {
                r: uniform(&mut rng, wh_cfg.r_dist),
                c: uniform(&mut rng, wh_cfg.c_dist),
                p: uniform(&mut rng, wh_cfg.p_dist),
                temp_wh_min: wh_sp - 0.5 * wh_db,
                temp_wh_max: wh_sp + 0.5 * wh_db,
                temp_wh_setpoint: wh_sp,
                temp_wh_init: wh_sp - 0.5 * wh_db + rng.gen_range(0.0..=wh_db),
                tank_size_l: tank,
                draws,
            };

            let lower = batt_cfg.cap_bounds[0] * batt_cfg.capacity;
            let upper = batt_cfg.cap_bounds[1] * batt_cfg.capacity;
            let mut battery = || BatteryParams {
                max_rate: batt_cfg.max_rate,
                capacity: batt_cfg.capacity,
                capacity_lower: lower,
                capacity_upper: upper,
                charge_eff: batt_cfg.charge_eff,
                discharge_eff: batt_cfg.discharge_eff,
                e_batt_init: rng.gen_range(lower..=upper),
            };
            let kind = match variant {
                HomeVariant::Base => HomeKind::Base,
                HomeVariant::PvOnly => HomeKind::PvOnly { pv: pv.clone() },
                HomeVariant::BatteryOnly => HomeKind::BatteryOnly { battery: battery() },
                HomeVariant::PvBattery => HomeKind::PvBattery {
                    pv: pv.clone(),
                    battery: battery(),
                },
            };

            homes.push(Home {
                id: HomeId::new(format!("{variant}-{i:03}")),
                hvac,
                water_heater,
                kind,
            });
        }
    }

    debug!(homes = homes.len(), base, seed = config.simulation.random_seed, "population synthesised");
    Ok(homes)
}
