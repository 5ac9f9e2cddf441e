// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn env(tag: &str) -> Vec<(String, String)> {
    vec![("TAG".to_owned(), tag.to_owned())]
}

#[test]
fn miss_then_hit() {
    let cache = EnvCache::default();
    assert!(cache.get(1).is_none());
    cache.insert(1, env("a"));
    assert_eq!(cache.get(1).unwrap()[0].1, "a");
}

#[test]
fn fifo_eviction_at_capacity() {
    let cache = EnvCache::new(3);
    for fp in 1..=3u64 {
        cache.insert(fp, env(&fp.to_string()));
    }
    cache.insert(4, env("4"));
    assert_eq!(cache.len(), 3);
    assert!(cache.get(1).is_none(), "oldest entry evicted");
    assert!(cache.get(2).is_some());
    assert!(cache.get(4).is_some());
}

#[test]
fn entries_are_immutable() {
    let cache = EnvCache::default();
    cache.insert(9, env("first"));
    cache.insert(9, env("second"));
    assert_eq!(cache.get(9).unwrap()[0].1, "first");
    assert_eq!(cache.len(), 1);
}

#[test]
fn reinsert_does_not_reorder_eviction() {
    let cache = EnvCache::new(2);
    cache.insert(1, env("1"));
    cache.insert(2, env("2"));
    cache.insert(1, env("dup")); // no-op
    cache.insert(3, env("3"));
    assert!(cache.get(1).is_none(), "1 is still the oldest and gets evicted");
    assert!(cache.get(2).is_some());
    assert!(cache.get(3).is_some());
}
