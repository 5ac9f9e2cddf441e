// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commutative environment fingerprint.
//!
//! The fingerprint is the conductor's cache key for a client's environment:
//! each kept `(key, value)` pair is hashed independently and the per-pair
//! digests are XOR-folded, so the result is insensitive to enumeration order.
//! Keys carrying the filtered prefix are excluded so that benchmark-harness
//! variables do not bust the cache between otherwise identical invocations.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Environment keys starting with this prefix are excluded from the
/// fingerprint (they are still uploaded on a cache miss).
pub const FILTERED_PREFIX: &str = "JULIA_DAEMON_BENCH";

/// Fingerprint a set of environment pairs.
pub fn fingerprint<'a, I>(pairs: I) -> u64
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut acc = 0u64;
    for (key, value) in pairs {
        if key.starts_with(FILTERED_PREFIX) {
            continue;
        }
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(key.len() as u64);
        hasher.write(key.as_bytes());
        hasher.write(value.as_bytes());
        acc ^= hasher.finish();
    }
    acc
}

/// Snapshot the process environment as owned pairs.
pub fn snapshot() -> Vec<(String, String)> {
    std::env::vars().collect()
}

/// Fingerprint of owned pairs, as produced by [`snapshot`].
pub fn fingerprint_pairs(pairs: &[(String, String)]) -> u64 {
    fingerprint(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

#[cfg(test)]
#[path = "envhash_tests.rs"]
mod tests;
