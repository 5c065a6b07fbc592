use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot::Canceled;
use futures::future;
use tracing::{debug, trace};

use crate::dispatch::dispatch;
use crate::runtime;
use crate::window::{LoadResult, Scheduler, WindowId};
use crate::{
    cached, yield_fn, BatchFn, CacheKeyFn, Identity, LoadError, LoaderConfig, WaitForWorkFn,
};

/// Batches loads without remembering their results.
///
/// Every window fetches every key it holds, even if an earlier window already
/// loaded it. Use [`Loader::cached`] for a loader that remembers results.
pub struct Loader<K, V, E, F, N = Identity>
where
    N: CacheKeyFn<K>,
{
    state: Arc<Mutex<Scheduler<K, V, E, N::Key>>>,
    load_fn: Arc<runtime::Mutex<F>>,
    key_fn: Arc<N>,
    config: LoaderConfig,
    wait_for_work: Arc<dyn WaitForWorkFn>,
    custom_wait_for_work: bool,
}

// Manual implementation is used to omit applying unnecessary Clone bounds.
impl<K, V, E, F, N> Clone for Loader<K, V, E, F, N>
where
    N: CacheKeyFn<K>,
{
    fn clone(&self) -> Self {
        Loader {
            state: self.state.clone(),
            load_fn: self.load_fn.clone(),
            key_fn: self.key_fn.clone(),
            config: self.config,
            wait_for_work: self.wait_for_work.clone(),
            custom_wait_for_work: self.custom_wait_for_work,
        }
    }
}

impl<K, V, E, F> Loader<K, V, E, F, Identity>
where
    K: Eq + Hash + Clone,
    F: BatchFn<K, V, Error = E>,
{
    pub fn new(load_fn: F) -> Self {
        Loader::with_key_fn(load_fn, Identity)
    }
}

impl<K, V, E, F, N> Loader<K, V, E, F, N>
where
    F: BatchFn<K, V, Error = E>,
    N: CacheKeyFn<K>,
{
    /// Creates a loader that deduplicates and caches by `key_fn(key)`.
    pub fn with_key_fn(load_fn: F, key_fn: N) -> Self {
        let config = LoaderConfig::default();
        Loader {
            state: Arc::new(Mutex::new(Scheduler::new())),
            load_fn: Arc::new(runtime::Mutex::new(load_fn)),
            key_fn: Arc::new(key_fn),
            config,
            wait_for_work: Arc::new(yield_fn(config.yield_count)),
            custom_wait_for_work: false,
        }
    }

    /// Replaces the whole configuration. A wait-for-work function set with
    /// [`with_custom_wait_for_work`](Self::with_custom_wait_for_work) is kept.
    pub fn with_config(self, config: LoaderConfig) -> Self {
        self.with_max_batch_size(config.max_batch_size)
            .with_yield_count(config.yield_count)
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config = self.config.with_max_batch_size(max_batch_size);
        self
    }

    /// Number of yields before a window is dispatched. Ignored by the wait
    /// once a custom wait-for-work function is set.
    pub fn with_yield_count(mut self, yield_count: usize) -> Self {
        self.config = self.config.with_yield_count(yield_count);
        if !self.custom_wait_for_work {
            self.wait_for_work = Arc::new(yield_fn(yield_count));
        }
        self
    }

    /// Replaces the yield function, which is called once per load before the
    /// window is dispatched.
    pub fn with_custom_wait_for_work(mut self, wait_for_work: impl WaitForWorkFn) -> Self {
        self.wait_for_work = Arc::new(wait_for_work);
        self.custom_wait_for_work = true;
        self
    }

    /// Wraps this loader in a cache backed by a `HashMap`.
    pub fn cached(self) -> cached::Loader<K, V, E, F, HashMap<N::Key, V>, N> {
        cached::Loader::with_cache(self, HashMap::new())
    }

    /// Wraps this loader in the given cache store.
    pub fn with_cache<C>(self, cache: C) -> cached::Loader<K, V, E, F, C, N>
    where
        C: cached::Cache<N::Key, V>,
    {
        cached::Loader::with_cache(self, cache)
    }
}

impl<K, V, E, F, N> Loader<K, V, E, F, N>
where
    N: CacheKeyFn<K>,
{
    /// Largest number of keys passed to one batch function call.
    pub fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    /// Batch size and yield count this loader was built with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The normalized key `key` is deduplicated and cached under.
    pub fn cache_key(&self, key: &K) -> N::Key {
        self.key_fn.cache_key(key)
    }

    fn scheduler(&self) -> MutexGuard<'_, Scheduler<K, V, E, N::Key>> {
        // the scheduler is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V, E, F, N> Loader<K, V, E, F, N>
where
    K: Clone,
    V: Clone,
    E: Clone,
    F: BatchFn<K, V, Error = E>,
    N: CacheKeyFn<K>,
{
    pub async fn load(&self, key: K) -> Result<V, LoadError<E>> {
        let cache_key = self.cache_key(&key);
        self.load_keyed(key, cache_key).await
    }

    /// Loads every key, keeping input order and duplicates. A failing key only
    /// fails its own element.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<Result<V, LoadError<E>>> {
        let keyed = keys
            .into_iter()
            .map(|key| {
                let cache_key = self.cache_key(&key);
                (key, cache_key)
            })
            .collect();
        self.load_many_keyed(keyed).await
    }

    /// Like [`load_many`](Self::load_many), but fails with the first error in
    /// input order.
    pub async fn try_load_many(&self, keys: Vec<K>) -> Result<Vec<V>, LoadError<E>> {
        self.load_many(keys).await.into_iter().collect()
    }

    pub(crate) async fn load_keyed(&self, key: K, cache_key: N::Key) -> Result<V, LoadError<E>> {
        loop {
            let (window, rx) = self.scheduler().enqueue(key.clone(), cache_key.clone());
            trace!(window, "enqueued load");
            self.settle(window).await;
            match rx.await {
                Ok(outcome) => return outcome,
                Err(Canceled) => {
                    debug!(window, "batch window dropped before it finished, retrying")
                }
            }
        }
    }

    /// Loads `keys` through one window per attempt. Keys whose window was
    /// dropped before it finished are enqueued again until every key has an
    /// outcome.
    pub(crate) async fn load_many_keyed(
        &self,
        keys: Vec<(K, N::Key)>,
    ) -> Vec<Result<V, LoadError<E>>> {
        let mut outcomes: Vec<Option<LoadResult<V, E>>> = keys.iter().map(|_| None).collect();
        let mut pending: Vec<usize> = (0..keys.len()).collect();
        while !pending.is_empty() {
            let (window, receivers) = {
                let mut scheduler = self.scheduler();
                let mut window = 0;
                let mut receivers = Vec::with_capacity(pending.len());
                for &position in &pending {
                    let (key, cache_key) = &keys[position];
                    let (id, rx) = scheduler.enqueue(key.clone(), cache_key.clone());
                    window = id;
                    receivers.push(rx);
                }
                (window, receivers)
            };
            trace!(window, keys = receivers.len(), "enqueued load_many");
            self.settle(window).await;

            let received = future::join_all(receivers).await;
            let mut dropped = Vec::new();
            for (position, outcome) in pending.into_iter().zip(received) {
                match outcome {
                    Ok(outcome) => outcomes[position] = Some(outcome),
                    Err(Canceled) => dropped.push(position),
                }
            }
            if !dropped.is_empty() {
                debug!(
                    window,
                    keys = dropped.len(),
                    "batch window dropped before it finished, retrying"
                );
            }
            pending = dropped;
        }
        outcomes.into_iter().flatten().collect()
    }

    /// Waits for sibling requests to join the window, then dispatches it
    /// unless another request already has.
    async fn settle(&self, window: WindowId) {
        (self.wait_for_work)().await;
        let closed = self.scheduler().close(window);
        if let Some(closed) = closed {
            dispatch(&self.load_fn, closed, self.config.max_batch_size).await;
        }
    }
}
