// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded fingerprint → environment cache.
//!
//! Keyed by the client's commutative env fingerprint; a hit lets the
//! handshake skip the environment upload entirely. Entries are immutable
//! once inserted. Eviction is FIFO with a small fixed capacity — the cache
//! exists to cover "the same shell invoking repeatedly", not to be an LRU of
//! everything ever seen.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

pub const DEFAULT_CAPACITY: usize = 5;

type Env = Arc<Vec<(String, String)>>;

pub struct EnvCache {
    map: Mutex<IndexMap<u64, Env>>,
    capacity: usize,
}

impl Default for EnvCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EnvCache {
    pub fn new(capacity: usize) -> Self {
        Self { map: Mutex::new(IndexMap::with_capacity(capacity)), capacity }
    }

    /// Look up a fingerprint.
    pub fn get(&self, fingerprint: u64) -> Option<Env> {
        self.map.lock().get(&fingerprint).cloned()
    }

    /// Insert an environment under its fingerprint, evicting the oldest
    /// entry when full. Re-inserting an existing fingerprint is a no-op
    /// (entries are immutable).
    pub fn insert(&self, fingerprint: u64, env: Vec<(String, String)>) -> Env {
        let mut map = self.map.lock();
        if let Some(existing) = map.get(&fingerprint) {
            return existing.clone();
        }
        let env = Arc::new(env);
        map.insert(fingerprint, env.clone());
        while map.len() > self.capacity {
            map.shift_remove_index(0);
        }
        env
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "envcache_tests.rs"]
mod tests;
