//! # Community Simulation Inputs
//!
//! Physical models and synthetic inputs that drive a run.
//!
//! ## Components
//!
//! - **Thermal**: discretised RC circuits for the indoor envelope and the water tank
//! - **Population**: seeded synthesis of homes from configured parameter ranges
//! - **Weather**: clear-sky irradiance, diurnal ambient temperature and time-of-use price
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flex_aggregator::config::Config;
//! use flex_aggregator::simulation::{synthesize_population, synthesize_series};
//!
//! let config = Config::default();
//! let homes = synthesize_population(&config).unwrap();
//! let series = synthesize_series(&config.weather, &config.simulation, config.simulation.random_seed).unwrap();
//! assert!(series.len() >= config.simulation.num_timesteps().unwrap());
//! # let _ = homes;
//! ```

pub mod population;
pub mod thermal;
pub mod weather;

pub use population::synthesize_population;
pub use thermal::{mix_draw, IndoorCircuit, TankCircuit};
pub use weather::{synthesize_series, tou_price, ClearSkyModel};
