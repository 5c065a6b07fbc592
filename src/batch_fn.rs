use std::{fmt, future::Future};

/// What a batch function returns for one call: either one outcome per key,
/// in key order, or a failure of the call as a whole.
pub type BatchOutcome<V, E> = Result<Vec<Result<V, E>>, E>;

/// The fetch side of a loader.
///
/// `load` receives the unique keys of one chunk in first-seen order and must
/// return exactly one outcome per key, in the same order. An `Err` element
/// fails only the requests for that key, an outer `Err` fails every request of
/// the chunk.
pub trait BatchFn<K, V> {
    type Error;

    fn load(&mut self, keys: &[K]) -> impl Future<Output = BatchOutcome<V, Self::Error>>;
}

/// Adapts a closure into a [`BatchFn`]. Created by [`batch_fn`].
#[derive(Clone)]
pub struct FnBatcher<F> {
    f: F,
}

impl<F> fmt::Debug for FnBatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBatcher").finish_non_exhaustive()
    }
}

/// Builds a [`BatchFn`] from a closure taking an owned copy of the keys.
///
/// ```
/// use superloader::batch_fn;
///
/// let users = batch_fn(|ids: Vec<u64>| async move {
///     let names: Vec<Result<String, String>> =
///         ids.into_iter().map(|id| Ok(format!("user-{}", id))).collect();
///     Ok::<_, String>(names)
/// });
/// # let _ = users;
/// ```
pub fn batch_fn<F>(f: F) -> FnBatcher<F> {
    FnBatcher { f }
}

impl<K, V, E, F, Fut> BatchFn<K, V> for FnBatcher<F>
where
    K: Clone,
    F: FnMut(Vec<K>) -> Fut,
    Fut: Future<Output = BatchOutcome<V, E>>,
{
    type Error = E;

    fn load(&mut self, keys: &[K]) -> impl Future<Output = BatchOutcome<V, E>> {
        (self.f)(keys.to_vec())
    }
}
