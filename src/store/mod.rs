//! Shared state store
//!
//! The blackboard every component reads from and writes to: global counters,
//! exogenous series, the reward-price horizon and one hash per home holding
//! that home's last committed solution.
//!
//! Write ownership is partitioned by key. The coordinator is the only writer
//! of counters, series and prices; each home's worker writes only the hash
//! keyed by its own [`HomeId`](crate::domain::HomeId).

pub mod memory;

pub use memory::MemoryStore;

use std::collections::HashMap;
use thiserror::Error;

/// Store key names.
pub mod keys {
    pub const TIMESTEP: &str = "timestep";
    pub const ITERATION: &str = "iteration";
    /// Absolute step offset of simulation start within the exogenous series
    pub const START_HOUR_INDEX: &str = "start_hour_index";
    /// Latest scalar price broadcast
    pub const REWARD_PRICE: &str = "reward_price";
    /// Reward price per horizon step, index 0 applies to the committed step
    pub const REWARD_PRICE_HORIZON: &str = "reward_price_horizon";
    pub const OAT: &str = "OAT";
    pub const GHI: &str = "GHI";
    pub const SPP: &str = "SPP";
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("key not found: {0}")]
    MissingKey(String),

    #[error("key {key} does not hold a {expected}")]
    WrongType { key: String, expected: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value port consumed by the optimiser, the coordinators and the
/// controller. Implementations must be safe to share across worker threads.
pub trait StateStore: Send + Sync {
    /// Reads a scalar. A missing key is an error.
    fn get_scalar(&self, key: &str) -> StoreResult<f64>;

    fn set_scalar(&self, key: &str, value: f64) -> StoreResult<()>;

    /// All fields of a hash. A missing key yields an empty map.
    fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, f64>>;

    fn hash_set(&self, key: &str, field: &str, value: f64) -> StoreResult<()>;

    /// Inclusive range; negative indices count from the end (`-1` is the last
    /// element). Out-of-range bounds are clamped, a missing key is empty.
    fn list_range(&self, key: &str, start: isize, end: isize) -> StoreResult<Vec<f64>>;

    /// Appends to the right end.
    fn list_push(&self, key: &str, value: f64) -> StoreResult<()>;

    /// Removes and returns the leftmost element.
    fn list_pop_front(&self, key: &str) -> StoreResult<Option<f64>>;

    /// Drops every key.
    fn flush(&self);

    /// Sets several fields of one hash.
    fn hash_set_many(&self, key: &str, fields: &[(&str, f64)]) -> StoreResult<()> {
        for (field, value) in fields {
            self.hash_set(key, field, *value)?;
        }
        Ok(())
    }

    /// Replaces a list with `values`.
    fn list_replace(&self, key: &str, values: &[f64]) -> StoreResult<()> {
        while self.list_pop_front(key)?.is_some() {}
        for v in values {
            self.list_push(key, *v)?;
        }
        Ok(())
    }

    /// Whole list.
    fn list_all(&self, key: &str) -> StoreResult<Vec<f64>> {
        self.list_range(key, 0, -1)
    }
}
