use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::*;


pub use crate::non_cached::Loader;

/// Multiplies every key by 10 and records each call it receives.
#[derive(Clone, Default)]
pub struct Batcher {
    calls: Arc<Mutex<Vec<Vec<i32>>>>,
}

impl Batcher {
    pub fn new() -> Batcher {
        Batcher::default()
    }

    pub fn calls(&self) -> Vec<Vec<i32>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invoke_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl BatchFn<i32, i32> for Batcher {
    type Error = ();

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<i32, ()> {
        self.calls.lock().unwrap().push(keys.to_vec());
        Ok(keys.iter().map(|v| Ok(v * 10)).collect())
    }
}

/// Value is (batch_fn call seq, v * 10)
#[derive(Clone, Default)]
pub struct SeqBatcher {
    invoke_cnt: Arc<AtomicUsize>,
}

impl BatchFn<i32, (usize, i32)> for SeqBatcher {
    type Error = ();

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<(usize, i32), ()> {
        let seq = self.invoke_cnt.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(keys.iter().map(|v| Ok((seq, v * 10))).collect())
    }
}

/// Multiplies every key by 10 after yielding `yields` times, so other loads
/// can run while a fetch is in flight.
#[derive(Clone)]
pub struct SlowBatcher {
    yields: usize,
    calls: Arc<Mutex<Vec<Vec<i32>>>>,
}

impl SlowBatcher {
    pub fn new(yields: usize) -> SlowBatcher {
        SlowBatcher {
            yields,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<i32>> {
        self.calls.lock().unwrap().clone()
    }
}

impl BatchFn<i32, i32> for SlowBatcher {
    type Error = ();

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<i32, ()> {
        self.calls.lock().unwrap().push(keys.to_vec());
        yield_times(self.yields).await;
        Ok(keys.iter().map(|v| Ok(v * 10)).collect())
    }
}

/// Never answers its first call. Later calls multiply every key by 10.
#[derive(Clone, Default)]
pub struct StallingBatcher {
    invoke_cnt: Arc<AtomicUsize>,
}

impl StallingBatcher {
    pub fn invoke_count(&self) -> usize {
        self.invoke_cnt.load(Ordering::SeqCst)
    }
}

impl BatchFn<i32, i32> for StallingBatcher {
    type Error = ();

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<i32, ()> {
        if self.invoke_cnt.fetch_add(1, Ordering::SeqCst) == 0 {
            futures::future::pending::<()>().await;
        }
        Ok(keys.iter().map(|v| Ok(v * 10)).collect())
    }
}

pub async fn yield_times(count: usize) {
    for _ in 0..count {
        crate::runtime::yield_now().await;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MyError {
    Unknown,
    NotEven,
}

/// Fails every call as a whole.
pub struct BadBatcher;

impl BatchFn<i32, i32> for BadBatcher {
    type Error = MyError;

    async fn load(&mut self, _keys: &[i32]) -> BatchOutcome<i32, MyError> {
        Err(MyError::Unknown)
    }
}

/// Fails odd keys individually.
#[derive(Clone, Default)]
pub struct EvenBatcher {
    invoke_cnt: Arc<AtomicUsize>,
}

impl EvenBatcher {
    pub fn invoke_count(&self) -> usize {
        self.invoke_cnt.load(Ordering::SeqCst)
    }
}

impl BatchFn<i32, i32> for EvenBatcher {
    type Error = MyError;

    async fn load(&mut self, keys: &[i32]) -> BatchOutcome<i32, MyError> {
        self.invoke_cnt.fetch_add(1, Ordering::SeqCst);
        Ok(keys
            .iter()
            .map(|v| {
                if v % 2 == 0 {
                    Ok(v * 10)
                } else {
                    Err(MyError::NotEven)
                }
            })
            .collect())
    }
}

/// Always returns fewer values than it was given keys.
pub struct ShortBatcher;

impl BatchFn<i32, i32> for ShortBatcher {
    type Error = ();

    async fn load(&mut self, _keys: &[i32]) -> BatchOutcome<i32, ()> {
        Ok(vec![])
    }
}

pub struct MyCache<K, V>(HashMap<K, V>);

impl<K, V> MyCache<K, V> {
    pub fn new() -> MyCache<K, V> {
        MyCache(HashMap::new())
    }
}

impl<K, V> cached::Cache<K, V> for MyCache<K, V>
where
    K: Eq + std::hash::Hash,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.0.get(key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        self.0.insert(key, value);
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.0.remove(key)
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}
