//! Reinforcement-learning price controller: features, replay memory, ridge
//! critic fitting, Gaussian policy and the controller tying them together.

pub mod basis;
pub mod buffer;
pub mod controller;
pub mod critic;
pub mod memory;
pub mod policy;
pub mod ridge;

pub use basis::*;
pub use buffer::*;
pub use controller::*;
pub use critic::*;
pub use memory::*;
pub use policy::*;
pub use ridge::*;
