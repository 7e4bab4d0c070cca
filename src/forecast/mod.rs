pub mod load;

pub use load::*;
