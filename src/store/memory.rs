use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

use super::{StateStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Scalar(f64),
    Hash(HashMap<String, f64>),
    List(VecDeque<f64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
        }
    }
}

/// In-process [`StateStore`] behind a single `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Value>>,
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

/// Resolves a redis-style inclusive range to a half-open `start..end`.
fn resolve_range(len: usize, start: isize, end: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let norm = |i: isize| if i < 0 { len + i } else { i };
    let s = norm(start).max(0);
    let e = norm(end).min(len - 1);
    if len == 0 || s > e {
        None
    } else {
        Some((s as usize, e as usize + 1))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get_scalar(&self, key: &str) -> StoreResult<f64> {
        match self.inner.read().get(key) {
            Some(Value::Scalar(v)) => Ok(*v),
            Some(other) => {
                tracing::debug!(key, found = other.kind(), "scalar read on non-scalar key");
                Err(wrong_type(key, "scalar"))
            }
            None => Err(StoreError::MissingKey(key.to_string())),
        }
    }

    fn set_scalar(&self, key: &str, value: f64) -> StoreResult<()> {
        let mut map = self.inner.write();
        match map.get(key) {
            Some(Value::Scalar(_)) | None => {
                map.insert(key.to_string(), Value::Scalar(value));
                Ok(())
            }
            Some(_) => Err(wrong_type(key, "scalar")),
        }
    }

    fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, f64>> {
        match self.inner.read().get(key) {
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(_) => Err(wrong_type(key, "hash")),
            None => Ok(HashMap::new()),
        }
    }

    fn hash_set(&self, key: &str, field: &str, value: f64) -> StoreResult<()> {
        let mut map = self.inner.write();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match entry {
            Value::Hash(h) => {
                h.insert(field.to_string(), value);
                Ok(())
            }
            _ => Err(wrong_type(key, "hash")),
        }
    }

    fn list_range(&self, key: &str, start: isize, end: isize) -> StoreResult<Vec<f64>> {
        match self.inner.read().get(key) {
            Some(Value::List(list)) => Ok(resolve_range(list.len(), start, end)
                .map(|(s, e)| list.range(s..e).copied().collect())
                .unwrap_or_default()),
            Some(_) => Err(wrong_type(key, "list")),
            None => Ok(Vec::new()),
        }
    }

    fn list_push(&self, key: &str, value: f64) -> StoreResult<()> {
        let mut map = self.inner.write();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        match entry {
            Value::List(list) => {
                list.push_back(value);
                Ok(())
            }
            _ => Err(wrong_type(key, "list")),
        }
    }

    fn list_pop_front(&self, key: &str) -> StoreResult<Option<f64>> {
        match self.inner.write().get_mut(key) {
            Some(Value::List(list)) => Ok(list.pop_front()),
            Some(_) => Err(wrong_type(key, "list")),
            None => Ok(None),
        }
    }

    fn flush(&self) {
        self.inner.write().clear();
    }
}
