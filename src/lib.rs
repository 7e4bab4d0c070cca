//! Community flexible-load aggregator.
//!
//! Every home solves its own receding-horizon control problem
//! ([`optimizer::ThermalAgentModel`]); an aggregator steers the community's
//! summed demand with a broadcast reward price, either by dual ascent against
//! a capacity threshold or with a learned actor-critic pricing policy
//! ([`rl::RlPriceController`]). [`controller::AggregatorCoordinator`] drives
//! the timestep loop over a shared [`store::StateStore`].

pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod optimizer;
pub mod rl;
pub mod simulation;
pub mod store;
pub mod telemetry;
