//! Deterministic synthetic exogenous series: clear-sky irradiance, a diurnal
//! ambient temperature with seeded noise, and a time-of-use wholesale price.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use tracing::debug;

use crate::config::{ConfigError, SimulationConfig, WeatherConfig};
use crate::domain::ExogenousSeries;

const SOLAR_CONSTANT_W_M2: f64 = 1367.0;

/// Clear-sky global horizontal irradiance at a fixed location.
#[derive(Debug, Clone, Copy)]
pub struct ClearSkyModel {
    latitude_deg: f64,
    longitude_deg: f64,
    /// Hours from UTC
    timezone_offset: i32,
}

impl ClearSkyModel {
    pub fn new(latitude_deg: f64, longitude_deg: f64, timezone_offset: i32) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            timezone_offset,
        }
    }

    /// Sun elevation above the horizon in degrees, local time.
    pub fn elevation_deg(&self, time: NaiveDateTime) -> f64 {
        let day = time.ordinal() as f64;
        let hour = time.hour() as f64 + time.minute() as f64 / 60.0;

        let declination = (23.45 * (2.0 * PI * (day + 284.0) / 365.0).sin()).to_radians();
        let latitude = self.latitude_deg.to_radians();
        let solar_time = hour + self.longitude_deg / 15.0 - self.timezone_offset as f64;
        let hour_angle = (15.0 * (solar_time - 12.0)).to_radians();

        let sin_elev = latitude.sin() * declination.sin() + latitude.cos() * declination.cos() * hour_angle.cos();
        sin_elev.clamp(-1.0, 1.0).asin().to_degrees()
    }

    /// Irradiance in W/m², zero with the sun below the horizon.
    pub fn irradiance(&self, time: NaiveDateTime) -> f64 {
        let elevation = self.elevation_deg(time);
        if elevation <= 0.0 {
            return 0.0;
        }
        let sin_elev = elevation.to_radians().sin();
        let air_mass = if elevation > 5.0 { 1.0 / sin_elev } else { 12.0 - elevation / 5.0 };
        SOLAR_CONSTANT_W_M2 * 0.7_f64.powf(air_mass.powf(0.678)) * sin_elev
    }
}

fn in_windows(hour: u32, windows: &[[u32; 2]]) -> bool {
    windows.iter().any(|[from, to]| (*from..*to).contains(&hour))
}

/// Wholesale price ($/kWh) for an hour of day.
pub fn tou_price(config: &WeatherConfig, hour: u32) -> f64 {
    if !config.use_tou {
        config.base_price
    } else if in_windows(hour, &config.peak_hours) {
        config.peak_price
    } else if in_windows(hour, &config.shoulder_hours) {
        config.shoulder_price
    } else {
        config.offpeak_price
    }
}

/// Ambient temperature without noise: coolest at 03:00, warmest at 15:00.
pub fn diurnal_temp(config: &WeatherConfig, time: NaiveDateTime) -> f64 {
    let hour = time.hour() as f64 + time.minute() as f64 / 60.0;
    config.mean_temp + 0.5 * config.daily_temp_swing * (2.0 * PI * (hour - 9.0) / 24.0).sin()
}

/// Step-resolution series starting at the data start, covering the run plus
/// `padding_days` of look-ahead.
pub fn synthesize_series(
    weather: &WeatherConfig,
    sim: &SimulationConfig,
    seed: u64,
) -> Result<ExogenousSeries, ConfigError> {
    let data_start = sim.data_start()?;
    let len = sim.start_index()? + sim.num_timesteps()? + weather.padding_days * sim.steps_per_day();
    let step_minutes = 60 / sim.steps_per_hour as i64;

    let sky = ClearSkyModel::new(weather.latitude, weather.longitude, weather.timezone_offset);
    let noise = Normal::new(0.0, weather.temp_noise_std).ok();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut series = ExogenousSeries {
        ambient_temp: Vec::with_capacity(len),
        irradiance: Vec::with_capacity(len),
        wholesale_price: Vec::with_capacity(len),
    };
    for i in 0..len {
        let time = data_start + Duration::minutes(i as i64 * step_minutes);
        let jitter = noise.map(|n| n.sample(&mut rng)).unwrap_or(0.0);
        series.ambient_temp.push(diurnal_temp(weather, time) + jitter);
        series.irradiance.push(sky.irradiance(time));
        series.wholesale_price.push(tou_price(weather, time.hour()));
    }

    debug!(len, start = %data_start, "synthetic exogenous series built");
    Ok(series)
}
