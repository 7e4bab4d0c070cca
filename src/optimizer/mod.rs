//! Per-home optimal control
//!
//! [`ThermalAgentModel`] formulates each home's horizon problem as a
//! mixed-integer linear program and solves it with `good_lp`.

pub mod mpc;
pub mod types;

pub use mpc::*;
pub use types::*;
