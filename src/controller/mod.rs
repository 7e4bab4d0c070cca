//! Community coordination: the parallel solve pool, the price strategies and
//! the timestep loop that drives them.

pub mod coordinator;
pub mod dual;
pub mod surrogate;
pub mod worker_pool;

pub use coordinator::{AggregatorCoordinator, RunSummary, StepRecord};
pub use dual::{DualOutcome, IterativeDualCoordinator};
pub use surrogate::{ResponseSurrogate, SurrogateResponse};
pub use worker_pool::{HomeSolver, JobOutcome, JobReport, PoolReport, WorkerPool};
