pub mod exogenous;
pub mod home;
pub mod solution;

pub use exogenous::*;
pub use home::*;
pub use solution::*;
