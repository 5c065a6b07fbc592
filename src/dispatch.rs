use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, error, warn};

use crate::runtime::Mutex;
use crate::window::{LoadResult, ResultSender, Window};
use crate::{BatchFn, BatchOutcome, LoadError};

/// Runs the batch function over a closed window and hands every waiting
/// request its outcome.
///
/// Chunks are fetched one after another while the batch function is locked,
/// each chunk's outcome is delivered before the next chunk starts.
pub(crate) async fn dispatch<K, V, E, F, C>(
    load_fn: &Mutex<F>,
    window: Window<K, V, E, C>,
    max_batch_size: usize,
) where
    V: Clone,
    E: Clone,
    F: BatchFn<K, V, Error = E>,
    C: Eq + Hash,
{
    let max_batch_size = max_batch_size.max(1);
    let key_count = window.len();
    let Window {
        id,
        keys,
        cache_keys,
        mut requests,
    } = window;
    debug!(
        window = id,
        keys = key_count,
        chunks = keys.chunks(max_batch_size).len(),
        "dispatching batch window"
    );

    let mut load_fn = load_fn.lock().await;
    for (chunk, (keys, cache_keys)) in keys
        .chunks(max_batch_size)
        .zip(cache_keys.chunks(max_batch_size))
        .enumerate()
    {
        debug!(window = id, chunk, keys = keys.len(), "loading chunk");
        let outcome = load_fn.load(keys).await;
        distribute(cache_keys, outcome, &mut requests);
    }
}

/// Resolves the requests of one chunk from the batch function's outcome.
fn distribute<V, E, C>(
    cache_keys: &[C],
    outcome: BatchOutcome<V, E>,
    requests: &mut HashMap<C, Vec<ResultSender<V, E>>>,
) where
    V: Clone,
    E: Clone,
    C: Eq + Hash,
{
    match outcome {
        Ok(values) if values.len() == cache_keys.len() => {
            for (cache_key, value) in cache_keys.iter().zip(values) {
                resolve(requests.remove(cache_key), value.map_err(LoadError::Key));
            }
        }
        Ok(values) => {
            error!(
                key_count = cache_keys.len(),
                value_count = values.len(),
                "batch function returned a mismatched number of values"
            );
            let err = LoadError::UnequalKeyValueSize {
                key_count: cache_keys.len(),
                value_count: values.len(),
            };
            for cache_key in cache_keys {
                resolve(requests.remove(cache_key), Err(err.clone()));
            }
        }
        Err(e) => {
            warn!(keys = cache_keys.len(), "batch function failed");
            for cache_key in cache_keys {
                resolve(requests.remove(cache_key), Err(LoadError::BatchFn(e.clone())));
            }
        }
    }
}

pub(crate) fn resolve<V, E>(senders: Option<Vec<ResultSender<V, E>>>, outcome: LoadResult<V, E>)
where
    V: Clone,
    E: Clone,
{
    let mut senders = senders.unwrap_or_default();
    if let Some(last) = senders.pop() {
        for tx in senders {
            // receiver may have been dropped
            let _ = tx.send(outcome.clone());
        }
        let _ = last.send(outcome);
    }
}
