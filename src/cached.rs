use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::channel::oneshot::{self, Canceled};
use futures::future;
use tracing::trace;

use super::{non_cached, BatchFn, CacheKeyFn, Identity, LoadError, LoaderConfig};
use crate::dispatch::resolve;
use crate::window::{LoadResult, ResultReceiver, ResultSender};

/// Batches loads and remembers every successful result.
///
/// A key that is cached or already being fetched never reaches the batch
/// function again until it is cleared. Failed keys are not cached, so a later
/// load retries them.
pub struct Loader<K, V, E, F, C, N = Identity>
where
    N: CacheKeyFn<K>,
{
    loader: non_cached::Loader<K, V, E, F, N>,
    store: Arc<Mutex<Store<C, N::Key, V, E>>>,
}

// Manual implementation is used to omit applying unnecessary Clone bounds.
impl<K, V, E, F, C, N> Clone for Loader<K, V, E, F, C, N>
where
    N: CacheKeyFn<K>,
{
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            store: self.store.clone(),
        }
    }
}

impl<K, V, E, F, C, N> Loader<K, V, E, F, C, N>
where
    K: Clone,
    V: Clone,
    E: Clone,
    F: BatchFn<K, V, Error = E>,
    C: Cache<N::Key, V>,
    N: CacheKeyFn<K>,
{
    pub async fn load(&self, key: K) -> Result<V, LoadError<E>> {
        let cache_key = self.loader.cache_key(&key);
        loop {
            let lookup = self.store().lookup(&cache_key);
            match lookup {
                Lookup::Hit(v) => {
                    trace!("cache hit");
                    return Ok(v);
                }
                Lookup::Follow(rx) => match rx.await {
                    Ok(outcome) => return outcome,
                    Err(Canceled) => trace!("in-flight load was dropped, retrying"),
                },
                Lookup::Lead(token) => {
                    let mut claims = Claims::new(&self.store, vec![(cache_key.clone(), token)]);
                    let outcome = self.loader.load_keyed(key, cache_key).await;
                    claims.settle(0, &outcome);
                    return outcome;
                }
            }
        }
    }

    /// Loads every key, keeping input order and duplicates. Cached keys are
    /// answered directly, keys already being fetched wait for that fetch and
    /// the rest share one window. A failing key only fails its own element.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<Result<V, LoadError<E>>> {
        let mut outcomes: Vec<Option<LoadResult<V, E>>> = Vec::with_capacity(keys.len());
        let mut misses = Vec::new();
        let mut claimed = Vec::new();
        let mut followers = Vec::new();
        {
            let mut store = self.store();
            for (position, key) in keys.into_iter().enumerate() {
                let cache_key = self.loader.cache_key(&key);
                match store.lookup(&cache_key) {
                    Lookup::Hit(v) => outcomes.push(Some(Ok(v))),
                    Lookup::Follow(rx) => {
                        outcomes.push(None);
                        followers.push((position, key, rx));
                    }
                    Lookup::Lead(token) => {
                        outcomes.push(None);
                        claimed.push((position, (cache_key.clone(), token)));
                        misses.push((key, cache_key));
                    }
                }
            }
        }
        trace!(
            hits = outcomes.len() - misses.len() - followers.len(),
            misses = misses.len(),
            in_flight = followers.len(),
            "load_many cache lookup"
        );

        let (positions, claimed): (Vec<usize>, Vec<_>) = claimed.into_iter().unzip();
        let mut claims = Claims::new(&self.store, claimed);
        let lead = async {
            let loaded = self.loader.load_many_keyed(misses).await;
            for (index, outcome) in loaded.iter().enumerate() {
                claims.settle(index, outcome);
            }
            loaded
        };
        let follow = future::join_all(followers.into_iter().map(
            move |(position, key, rx)| async move {
                let outcome = match rx.await {
                    Ok(outcome) => outcome,
                    Err(Canceled) => self.load(key).await,
                };
                (position, outcome)
            },
        ));
        let (loaded, followed) = future::join(lead, follow).await;

        for (position, outcome) in positions.into_iter().zip(loaded) {
            outcomes[position] = Some(outcome);
        }
        for (position, outcome) in followed {
            outcomes[position] = Some(outcome);
        }
        outcomes.into_iter().flatten().collect()
    }

    /// Like [`load_many`](Self::load_many), but fails with the first error in
    /// input order.
    pub async fn try_load_many(&self, keys: Vec<K>) -> Result<Vec<V>, LoadError<E>> {
        self.load_many(keys).await.into_iter().collect()
    }

    /// Removes the cached result of `key`, returning it if there was one. A
    /// fetch of `key` that is still running is not written to the cache.
    pub fn clear(&self, key: &K) -> Option<V> {
        let cache_key = self.loader.cache_key(key);
        let mut store = self.store();
        store.in_flight.remove(&cache_key);
        store.cache.remove(&cache_key)
    }

    pub fn clear_all(&self) {
        let mut store = self.store();
        store.in_flight.clear();
        store.cache.clear();
    }

    /// Seeds the cache with `val` unless `key` is cached or being fetched.
    /// Returns whether the value was stored.
    pub fn prime(&self, key: K, val: V) -> bool {
        let cache_key = self.loader.cache_key(&key);
        self.store().prime(cache_key, val)
    }

    /// Seeds the cache with `val`, replacing any existing entry. A fetch of
    /// `key` that is still running is not written to the cache.
    pub fn prime_overwrite(&self, key: K, val: V) {
        let cache_key = self.loader.cache_key(&key);
        let mut store = self.store();
        store.in_flight.remove(&cache_key);
        store.cache.insert(cache_key, val);
    }

    pub fn prime_many(&self, values: impl IntoIterator<Item = (K, V)>) {
        let mut store = self.store();
        for (key, val) in values {
            let cache_key = self.loader.cache_key(&key);
            store.prime(cache_key, val);
        }
    }
}

impl<K, V, E, F, C, N> Loader<K, V, E, F, C, N>
where
    N: CacheKeyFn<K>,
{
    pub fn with_cache(loader: non_cached::Loader<K, V, E, F, N>, cache: C) -> Self {
        Loader {
            loader,
            store: Arc::new(Mutex::new(Store::new(cache))),
        }
    }

    /// Largest number of keys passed to one batch function call.
    pub fn max_batch_size(&self) -> usize {
        self.loader.max_batch_size()
    }

    /// Batch size and yield count of the wrapped loader.
    pub fn config(&self) -> &LoaderConfig {
        self.loader.config()
    }

    fn store(&self) -> MutexGuard<'_, Store<C, N::Key, V, E>> {
        lock(&self.store)
    }
}

// every store operation is a single call, a poisoned lock still holds usable maps
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Token = u64;

/// Cached results plus the keys that are being fetched right now.
///
/// A key in `in_flight` is owned by the load that claimed it. Later loads of
/// the key wait in `followers` under the claim's token. Removing the key from
/// `in_flight` detaches the claim: its outcome still reaches the followers but
/// is not cached.
struct Store<C, CK, V, E> {
    cache: C,
    in_flight: HashMap<CK, Token>,
    followers: HashMap<Token, Vec<ResultSender<V, E>>>,
    next_token: Token,
}

enum Lookup<V, E> {
    Hit(V),
    Follow(ResultReceiver<V, E>),
    Lead(Token),
}

impl<C, CK, V, E> Store<C, CK, V, E>
where
    CK: Eq + Hash,
{
    fn new(cache: C) -> Self {
        Store {
            cache,
            in_flight: HashMap::new(),
            followers: HashMap::new(),
            next_token: 0,
        }
    }

    fn lookup(&mut self, cache_key: &CK) -> Lookup<V, E>
    where
        C: Cache<CK, V>,
        CK: Clone,
    {
        if let Some(v) = self.cache.get(cache_key) {
            return Lookup::Hit(v);
        }
        if let Some(&token) = self.in_flight.get(cache_key) {
            let (tx, rx) = oneshot::channel();
            self.followers.entry(token).or_default().push(tx);
            return Lookup::Follow(rx);
        }
        self.next_token = self.next_token.wrapping_add(1);
        self.in_flight.insert(cache_key.clone(), self.next_token);
        Lookup::Lead(self.next_token)
    }

    fn prime(&mut self, cache_key: CK, val: V) -> bool
    where
        C: Cache<CK, V>,
    {
        if self.in_flight.contains_key(&cache_key) || self.cache.contains_key(&cache_key) {
            return false;
        }
        self.cache.insert(cache_key, val);
        true
    }

    /// Ends the claim `token`: caches a success if the claim is still
    /// attached and hands the outcome to every follower.
    fn settle(&mut self, cache_key: CK, token: Token, outcome: &LoadResult<V, E>)
    where
        C: Cache<CK, V>,
        V: Clone,
        E: Clone,
    {
        if self.in_flight.get(&cache_key) == Some(&token) {
            self.in_flight.remove(&cache_key);
            if let Ok(v) = outcome {
                self.cache.insert(cache_key, v.clone());
            }
        }
        if let Some(senders) = self.followers.remove(&token) {
            resolve(Some(senders), outcome.clone());
        }
    }

    /// Ends the claim `token` without an outcome. Its followers see their
    /// receivers cancelled and load the key themselves.
    fn abandon(&mut self, cache_key: &CK, token: Token) {
        if self.in_flight.get(cache_key) == Some(&token) {
            self.in_flight.remove(cache_key);
        }
        self.followers.remove(&token);
    }
}

/// Claims a leading load still has to settle. Claims left over when it is
/// dropped are abandoned.
struct Claims<'a, C, CK, V, E>
where
    CK: Eq + Hash,
{
    store: &'a Mutex<Store<C, CK, V, E>>,
    claims: Vec<Option<(CK, Token)>>,
}

impl<'a, C, CK, V, E> Claims<'a, C, CK, V, E>
where
    CK: Eq + Hash,
{
    fn new(store: &'a Mutex<Store<C, CK, V, E>>, claims: Vec<(CK, Token)>) -> Self {
        Claims {
            store,
            claims: claims.into_iter().map(Some).collect(),
        }
    }

    fn settle(&mut self, index: usize, outcome: &LoadResult<V, E>)
    where
        C: Cache<CK, V>,
        V: Clone,
        E: Clone,
    {
        if let Some((cache_key, token)) = self.claims[index].take() {
            lock(self.store).settle(cache_key, token, outcome);
        }
    }
}

impl<'a, C, CK, V, E> Drop for Claims<'a, C, CK, V, E>
where
    CK: Eq + Hash,
{
    fn drop(&mut self) {
        let left: Vec<_> = self.claims.iter_mut().filter_map(Option::take).collect();
        if left.is_empty() {
            return;
        }
        trace!(keys = left.len(), "leading load dropped before it finished");
        let mut store = lock(self.store);
        for (cache_key, token) in left {
            store.abandon(&cache_key, token);
        }
    }
}

/// A pluggable store for cached results, keyed by cache key.
pub trait Cache<K, V> {
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
    fn get(&self, key: &K) -> Option<V>;
    fn insert(&mut self, key: K, value: V);
    fn remove(&mut self, key: &K) -> Option<V>;
    fn clear(&mut self);
}

impl<K, V> Cache<K, V> for BTreeMap<K, V>
where
    K: Ord,
    V: Clone,
{
    fn contains_key(&self, key: &K) -> bool {
        BTreeMap::contains_key(self, key)
    }

    fn get(&self, key: &K) -> Option<V> {
        BTreeMap::get(self, key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        BTreeMap::insert(self, key, value);
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        BTreeMap::remove(self, key)
    }

    fn clear(&mut self) {
        BTreeMap::clear(self);
    }
}

impl<K, V, S> Cache<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
{
    fn contains_key(&self, key: &K) -> bool {
        HashMap::contains_key(self, key)
    }

    fn get(&self, key: &K) -> Option<V> {
        HashMap::get(self, key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        HashMap::remove(self, key)
    }

    fn clear(&mut self) {
        HashMap::clear(self);
    }
}
