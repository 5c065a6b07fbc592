#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use superloader::{BatchFn, BatchOutcome};

/// Returns every key as its own value and records the keys of each call.
#[derive(Clone)]
pub struct IdentityLoadFn<K> {
    calls: Arc<Mutex<Vec<Vec<K>>>>,
}

impl<K> IdentityLoadFn<K> {
    pub fn new() -> Self {
        IdentityLoadFn {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Vec<K>>
    where
        K: Clone,
    {
        self.calls.lock().unwrap().clone()
    }

    pub fn invoke_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_batch_loaded(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }
}

impl<K: Clone> BatchFn<K, K> for IdentityLoadFn<K> {
    type Error = String;

    async fn load(&mut self, keys: &[K]) -> BatchOutcome<K, String> {
        self.calls.lock().unwrap().push(keys.to_vec());
        Ok(keys.iter().cloned().map(Ok).collect())
    }
}

/// Like [`IdentityLoadFn`] but fails the keys it was told to fail.
#[derive(Clone)]
pub struct FailingLoadFn {
    pub inner: IdentityLoadFn<&'static str>,
    pub fail: &'static str,
}

impl BatchFn<&'static str, &'static str> for FailingLoadFn {
    type Error = String;

    async fn load(&mut self, keys: &[&'static str]) -> BatchOutcome<&'static str, String> {
        self.inner.calls.lock().unwrap().push(keys.to_vec());
        Ok(keys
            .iter()
            .map(|&k| {
                if k == self.fail {
                    Err(format!("{} not found", k))
                } else {
                    Ok(k)
                }
            })
            .collect())
    }
}
