//! Cache storage contract and in-memory implementation.
//!
//! # Responsibility
//! - Define the versioned key-value store interface the coordinator uses.
//! - Provide a process-local store for embedding and tests.
//!
//! # Invariants
//! - Entries are addressed by `(key, version)`; a bumped version never
//!   collides with entries written under an older one.
//! - A missing counter is initialized to 1, never 0.
//! - Expired entries behave exactly like absent entries.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from the cache backend.
#[derive(Debug)]
pub enum CacheError {
    /// The backend cannot serve requests right now.
    Unavailable(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "cache backend unavailable: {message}"),
        }
    }
}

impl Error for CacheError {}

/// Versioned key-value cache backend.
///
/// Implementations must be shareable across threads; the coordinator wraps
/// one instance in an `Arc`.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str, version: u64) -> CacheResult<Option<String>>;
    fn set(&self, key: &str, version: u64, value: &str, ttl: Duration) -> CacheResult<()>;
    /// Increments a named counter and returns the new value. A counter that
    /// does not exist yet is initialized to 1 first, so the first increment
    /// returns 2.
    fn incr(&self, counter: &str) -> CacheResult<u64>;
    /// Reads a named counter, initializing a missing one to 1.
    fn read_counter(&self, counter: &str) -> CacheResult<u64>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<(String, u64), Entry>,
    counters: HashMap<String, u64>,
}

/// Process-local cache store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryCacheStore {
    state: Mutex<MemoryState>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> CacheResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".to_string()))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str, version: u64) -> CacheResult<Option<String>> {
        let mut state = self.locked()?;
        let slot = (key.to_string(), version);
        match state.entries.get(&slot) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                state.entries.remove(&slot);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, version: u64, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut state = self.locked()?;
        state.entries.insert(
            (key.to_string(), version),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn incr(&self, counter: &str) -> CacheResult<u64> {
        let mut state = self.locked()?;
        let slot = state.counters.entry(counter.to_string()).or_insert(1);
        *slot += 1;
        Ok(*slot)
    }

    fn read_counter(&self, counter: &str) -> CacheResult<u64> {
        let mut state = self.locked()?;
        Ok(*state.counters.entry(counter.to_string()).or_insert(1))
    }
}
