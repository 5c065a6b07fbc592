use std::{fmt::Display, hash::Hash};

/// Derives the key used for deduplication and caching from a request key.
///
/// Two requests whose cache keys are equal share one batch slot and one cache
/// entry. The batch function still receives the request key that was seen
/// first.
pub trait CacheKeyFn<K> {
    type Key: Eq + Hash + Clone;

    fn cache_key(&self, key: &K) -> Self::Key;
}

/// Uses the request key itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<K> CacheKeyFn<K> for Identity
where
    K: Eq + Hash + Clone,
{
    type Key = K;

    fn cache_key(&self, key: &K) -> K {
        key.clone()
    }
}

/// Uses the canonical string form of the request key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayKey;

impl<K: Display> CacheKeyFn<K> for DisplayKey {
    type Key = String;

    fn cache_key(&self, key: &K) -> String {
        key.to_string()
    }
}

/// A [`CacheKeyFn`] backed by a closure. Created by [`key_fn`].
#[derive(Debug, Clone, Copy)]
pub struct KeyFn<F>(F);

pub fn key_fn<F>(f: F) -> KeyFn<F> {
    KeyFn(f)
}

impl<K, C, F> CacheKeyFn<K> for KeyFn<F>
where
    F: Fn(&K) -> C,
    C: Eq + Hash + Clone,
{
    type Key = C;

    fn cache_key(&self, key: &K) -> C {
        (self.0)(key)
    }
}
