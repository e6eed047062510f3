//! Memoization of pipeline runs.
//!
//! Every analysis is a pure function of (dataset content, filter params), so
//! a report can be reused whenever that pair repeats. Keys are SHA-256
//! fingerprints; the cache is an explicit value owned by the caller.

use crate::{filter_engine::FilterParams, transaction::Dataset};
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Stable key for (dataset digest, filter params).
pub fn fingerprint(dataset: &Dataset, params: &FilterParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dataset.digest().as_bytes());
    hasher.update([0x1f]);
    // Params are plain data; serialization cannot fail for them.
    hasher.update(serde_json::to_vec(params).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Bounded fingerprint → value map with FIFO eviction.
pub struct AnalysisCache<T> {
    capacity: usize,
    entries:  HashMap<String, Arc<T>>,
    order:    VecDeque<String>,
    hits:     u64,
    misses:   u64,
}

impl<T> AnalysisCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries:  HashMap::new(),
            order:    VecDeque::new(),
            hits:     0,
            misses:   0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<T>> {
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, key: String, value: T) -> Arc<T> {
        let value = Arc::new(value);
        if self.entries.insert(key.clone(), Arc::clone(&value)).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.entries.remove(&oldest);
        }
        value
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: String, compute: impl FnOnce() -> T) -> Arc<T> {
        if let Some(hit) = self.get(&key) {
            log::info!("cache: hit {}", &key[..key.len().min(12)]);
            return hit;
        }
        self.insert(key, compute())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
