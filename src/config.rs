use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "FLEX_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid datetime {value:?}: expected \"YYYY-MM-DD HH\"")]
    InvalidDatetime { value: String },

    #[error("invalid simulation window: {0}")]
    InvalidWindow(String),

    #[error("inconsistent population: {0}")]
    InconsistentPopulation(String),

    #[error("exogenous data covers {available} steps but the run needs {required}")]
    InsufficientData { required: usize, available: usize },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Every home solves with the reward price held at zero
    Baseline,
    /// Iterative dual ascent against a capacity threshold
    DualAscent,
    /// Actor-critic price controller driving the real home solves
    Rl,
    /// Actor-critic against the closed-form community response
    RlSimplified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    Policy,
    Greedy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ForecasterKind {
    Persistence,
    LinearTrend,
}

fn ordered_range(range: &[f64; 2]) -> Result<(), ValidationError> {
    if range[0].is_finite() && range[1].is_finite() && range[0] <= range[1] {
        Ok(())
    } else {
        Err(ValidationError::new("range_not_ordered"))
    }
}

fn ordered_count_range(range: &[u32; 2]) -> Result<(), ValidationError> {
    if range[0] <= range[1] {
        Ok(())
    } else {
        Err(ValidationError::new("range_not_ordered"))
    }
}

fn non_empty_interval(range: &[f64; 2]) -> Result<(), ValidationError> {
    if range[0].is_finite() && range[1].is_finite() && range[0] < range[1] {
        Ok(())
    } else {
        Err(ValidationError::new("empty_interval"))
    }
}

fn fraction_window(range: &[f64; 2]) -> Result<(), ValidationError> {
    ordered_range(range)?;
    if range[0] >= 0.0 && range[1] <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::new("fraction_out_of_bounds"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(nested)]
    pub community: CommunityConfig,
    #[validate(nested)]
    pub home: HomeConfig,
    #[validate(nested)]
    pub dual: DualConfig,
    #[validate(nested)]
    pub rl: RlConfig,
    #[validate(nested)]
    pub surrogate: SurrogateConfig,
    #[validate(nested)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// "YYYY-MM-DD HH"
    pub start_datetime: String,
    pub end_datetime: String,
    /// First hour covered by the exogenous series
    pub data_start_datetime: String,
    #[validate(range(min = 1, max = 60))]
    pub steps_per_hour: u32,
    pub mode: SimulationMode,
    pub random_seed: u64,
    #[validate(range(min = 1))]
    pub workers: usize,
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_datetime: "2015-01-01 00".into(),
            end_datetime: "2015-01-02 00".into(),
            data_start_datetime: "2015-01-01 00".into(),
            steps_per_hour: 1,
            mode: SimulationMode::Baseline,
            random_seed: 12,
            workers: 4,
            queue_capacity: 64,
        }
    }
}

/// Parses the hour-resolution datetimes used in configuration.
pub fn parse_hour(value: &str) -> Result<NaiveDateTime, ConfigError> {
    NaiveDateTime::parse_from_str(&format!("{}:00", value.trim()), "%Y-%m-%d %H:%M")
        .map_err(|_| ConfigError::InvalidDatetime { value: value.to_string() })
}

impl SimulationConfig {
    pub fn start(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_hour(&self.start_datetime)
    }

    pub fn end(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_hour(&self.end_datetime)
    }

    pub fn data_start(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_hour(&self.data_start_datetime)
    }

    /// Control step length in hours.
    pub fn dt_hours(&self) -> f64 {
        1.0 / self.steps_per_hour as f64
    }

    pub fn steps_per_day(&self) -> usize {
        24 * self.steps_per_hour as usize
    }

    /// Number of control steps between start and end.
    pub fn num_timesteps(&self) -> Result<usize, ConfigError> {
        let (start, end) = (self.start()?, self.end()?);
        if end <= start {
            return Err(ConfigError::InvalidWindow(format!(
                "end {end} is not after start {start}"
            )));
        }
        let hours = (end - start).num_hours() as usize;
        Ok(hours * self.steps_per_hour as usize)
    }

    /// Offset of the first control step within the exogenous series.
    pub fn start_index(&self) -> Result<usize, ConfigError> {
        let (data_start, start) = (self.data_start()?, self.start()?);
        if start < data_start {
            return Err(ConfigError::InvalidWindow(format!(
                "start {start} precedes data start {data_start}"
            )));
        }
        let hours = (start - data_start).num_hours() as usize;
        Ok(hours * self.steps_per_hour as usize)
    }

    /// Hour of day the run starts at.
    pub fn start_hour_of_day(&self) -> Result<u32, ConfigError> {
        Ok(self.start()?.hour())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CommunityConfig {
    #[validate(range(min = 1))]
    pub total_number_homes: usize,
    pub homes_pv: usize,
    pub homes_battery: usize,
    pub homes_pv_battery: usize,
    /// Per-home share of the aggregate tracking target (kW)
    #[validate(range(min = 0.0))]
    pub setpoint_per_home_kw: f64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            total_number_homes: 10,
            homes_pv: 2,
            homes_battery: 2,
            homes_pv_battery: 2,
            setpoint_per_home_kw: 2.0,
        }
    }
}

impl CommunityConfig {
    pub fn base_homes(&self) -> Result<usize, ConfigError> {
        let special = self.homes_pv + self.homes_battery + self.homes_pv_battery;
        self.total_number_homes.checked_sub(special).ok_or_else(|| {
            ConfigError::InconsistentPopulation(format!(
                "{special} pv/battery homes requested out of {} total",
                self.total_number_homes
            ))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HomeConfig {
    #[validate(nested)]
    pub hvac: HvacDistConfig,
    #[validate(nested)]
    pub wh: WaterHeaterDistConfig,
    #[validate(nested)]
    pub battery: BatteryConfig,
    #[validate(nested)]
    pub pv: PvConfig,
    #[validate(nested)]
    pub hems: HemsConfig,
}

/// Uniform `[lo, hi]` ranges sampled per home.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HvacDistConfig {
    #[validate(custom(function = "ordered_range"))]
    pub r_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub c_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub p_cool_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub p_heat_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub temp_sp_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub temp_deadband_dist: [f64; 2],
}

impl Default for HvacDistConfig {
    fn default() -> Self {
        Self {
            r_dist: [6.8, 9.2],
            c_dist: [4.25, 5.75],
            p_cool_dist: [3.5, 3.5],
            p_heat_dist: [3.5, 3.5],
            temp_sp_dist: [18.0, 22.0],
            temp_deadband_dist: [2.0, 3.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WaterDrawConfig {
    #[validate(custom(function = "ordered_count_range"))]
    pub n_big_draw_dist: [u32; 2],
    #[validate(custom(function = "ordered_range"))]
    pub big_draw_size_dist: [f64; 2],
    #[validate(custom(function = "ordered_count_range"))]
    pub n_small_draw_dist: [u32; 2],
    #[validate(custom(function = "ordered_range"))]
    pub small_draw_size_dist: [f64; 2],
}

impl Default for WaterDrawConfig {
    fn default() -> Self {
        Self {
            n_big_draw_dist: [2, 4],
            big_draw_size_dist: [25.0, 40.0],
            n_small_draw_dist: [0, 3],
            small_draw_size_dist: [7.5, 12.5],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WaterHeaterDistConfig {
    #[validate(custom(function = "ordered_range"))]
    pub r_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub c_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub p_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub sp_dist: [f64; 2],
    #[validate(custom(function = "ordered_range"))]
    pub deadband_dist: [f64; 2],
    /// Tank size in litres
    #[validate(custom(function = "ordered_range"))]
    pub size_dist: [f64; 2],
    #[validate(nested)]
    pub waterdraws: WaterDrawConfig,
}

impl Default for WaterHeaterDistConfig {
    fn default() -> Self {
        Self {
            r_dist: [18.7, 25.3],
            c_dist: [4.25, 5.75],
            p_dist: [2.5, 2.5],
            sp_dist: [45.5, 48.5],
            deadband_dist: [9.0, 12.0],
            size_dist: [200.0, 300.0],
            waterdraws: WaterDrawConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatteryConfig {
    #[validate(range(min = 0.0))]
    pub max_rate: f64,
    #[validate(range(min = 0.0))]
    pub capacity: f64,
    /// Fractional state-of-energy window
    #[validate(custom(function = "fraction_window"))]
    pub cap_bounds: [f64; 2],
    #[validate(range(min = 0.01, max = 1.0))]
    pub charge_eff: f64,
    #[validate(range(min = 0.01, max = 1.0))]
    pub discharge_eff: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            max_rate: 5.0,
            capacity: 13.5,
            cap_bounds: [0.15, 0.85],
            charge_eff: 0.95,
            discharge_eff: 0.99,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PvConfig {
    #[validate(range(min = 0.0))]
    pub area: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub efficiency: f64,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self { area: 32.0, efficiency: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HemsConfig {
    /// Solve horizon in control steps
    #[validate(range(min = 1))]
    pub prediction_horizon: usize,
    pub tap_water_temp: f64,
}

impl Default for HemsConfig {
    fn default() -> Self {
        Self {
            prediction_horizon: 6,
            tap_water_temp: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DualConfig {
    #[validate(range(min = 0.0))]
    pub step_size_coeff: f64,
    /// Aggregate capacity threshold (kW)
    pub max_load_threshold: f64,
    #[validate(range(min = 1))]
    pub max_iterations: usize,
}

impl Default for DualConfig {
    fn default() -> Self {
        Self {
            step_size_coeff: 0.002,
            max_load_threshold: 30.0,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RlConfig {
    /// Mixing rate of freshly fitted critic coefficients
    #[validate(range(min = 0.0, max = 1.0))]
    pub learning_rate: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub discount_factor: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub exploration_rate: f64,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[validate(range(min = 1))]
    pub memory_size: usize,
    #[validate(range(exclusive_min = 0.0))]
    pub variance: f64,
    #[validate(custom(function = "non_empty_interval"))]
    pub action_space: [f64; 2],
    #[validate(range(exclusive_min = 0.0))]
    pub action_resolution: f64,
    /// Length of the broadcast reward-price buffer
    #[validate(range(min = 1))]
    pub action_horizon: usize,
    /// Multiplier from action units to $/kWh
    pub price_scale: f64,
    #[validate(range(min = 0.0))]
    pub ridge_alpha: f64,
    #[validate(range(min = 1))]
    pub policy_update_interval: usize,
    pub lambda_w: f64,
    pub lambda_theta: f64,
    pub alpha_theta: f64,
    pub alpha_w: f64,
    pub alpha_r: f64,
    pub target_action: TargetAction,
    pub forecaster: ForecasterKind,
    #[validate(range(min = 1))]
    pub forecast_horizon: usize,
}

impl Default for RlConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            discount_factor: 0.92,
            exploration_rate: 0.33,
            batch_size: 16,
            memory_size: 1000,
            variance: 0.5,
            action_space: [-1.0, 1.0],
            action_resolution: 0.01,
            action_horizon: 1,
            price_scale: 0.01,
            ridge_alpha: 0.01,
            policy_update_interval: 10,
            lambda_w: 0.01,
            lambda_theta: 0.01,
            alpha_theta: 2f64.powi(-9),
            alpha_w: 2f64.powi(-6),
            alpha_r: 2f64.powi(-3),
            target_action: TargetAction::Policy,
            forecaster: ForecasterKind::Persistence,
            forecast_horizon: 1,
        }
    }
}

/// Closed-form community response used by [`SimulationMode::RlSimplified`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SurrogateConfig {
    #[validate(range(min = 0.0))]
    pub disutility: f64,
    pub min_load_kw: f64,
    pub max_load_kw: f64,
    #[validate(range(min = 0.0))]
    pub deadband_price: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub relaxation: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            disutility: 1.0,
            min_load_kw: 1.0,
            max_load_kw: 50.0,
            deadband_price: 0.02,
            relaxation: 0.5,
        }
    }
}

/// Synthetic exogenous series.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WeatherConfig {
    pub mean_temp: f64,
    #[validate(range(min = 0.0))]
    pub daily_temp_swing: f64,
    #[validate(range(min = 0.0))]
    pub temp_noise_std: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_offset: i32,
    /// Days of series generated beyond the simulation end
    #[validate(range(min = 1))]
    pub padding_days: usize,
    /// Flat price used when no time-of-use windows are configured
    pub base_price: f64,
    pub use_tou: bool,
    pub offpeak_price: f64,
    pub shoulder_price: f64,
    pub peak_price: f64,
    /// Half-open `[from, to)` hour windows
    pub shoulder_hours: Vec<[u32; 2]>,
    pub peak_hours: Vec<[u32; 2]>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            mean_temp: 8.0,
            daily_temp_swing: 6.0,
            temp_noise_std: 0.5,
            latitude: 30.27,
            longitude: -97.74,
            timezone_offset: -6,
            padding_days: 2,
            base_price: 0.07,
            use_tou: true,
            offpeak_price: 0.05,
            shoulder_price: 0.09,
            peak_price: 0.14,
            shoulder_hours: vec![[7, 14], [20, 22]],
            peak_hours: vec![[14, 20]],
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `FLEX__` environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FLEX__").split("__"));
        let cfg: Config = figment
            .extract()
            .with_context(|| format!("failed to read configuration from {path}"))?;
        cfg.check().context("invalid configuration")?;
        Ok(cfg)
    }

    /// Defaults overlaid with an inline TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field validation plus the cross-field checks derive can't express.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.community.base_homes()?;
        self.simulation.num_timesteps()?;
        self.simulation.start_index()?;
        Ok(())
    }

    /// Aggregate tracking target for the whole community (kW).
    pub fn community_setpoint(&self) -> f64 {
        self.community.setpoint_per_home_kw * self.community.total_number_homes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().check().unwrap();
    }

    #[test]
    fn test_inline_toml_overrides_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [simulation]
            mode = "dual_ascent"
            steps_per_hour = 4
            [dual]
            max_load_threshold = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.simulation.mode, SimulationMode::DualAscent);
        assert_eq!(cfg.simulation.num_timesteps().unwrap(), 96);
        assert_eq!(cfg.dual.max_load_threshold, 12.5);
        assert_eq!(cfg.dual.max_iterations, 100);
    }

    #[rstest]
    #[case("2015-01-01 00", true)]
    #[case("2015-01-01 23", true)]
    #[case("2015-01-01", false)]
    #[case("2015-13-01 00", false)]
    fn test_parse_hour(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(parse_hour(value).is_ok(), ok);
    }

    #[test]
    fn test_start_before_data_is_rejected() {
        let mut cfg = Config::default();
        cfg.simulation.data_start_datetime = "2015-01-01 05".into();
        assert!(matches!(cfg.check(), Err(ConfigError::InvalidWindow(_))));
    }

    #[test]
    fn test_overfull_community_is_rejected() {
        let mut cfg = Config::default();
        cfg.community.homes_pv = 20;
        assert!(matches!(cfg.check(), Err(ConfigError::InconsistentPopulation(_))));
    }

    #[test]
    fn test_empty_action_space_is_rejected() {
        let mut cfg = Config::default();
        cfg.rl.action_space = [1.0, 1.0];
        assert!(matches!(cfg.check(), Err(ConfigError::Validation(_))));
    }
}
