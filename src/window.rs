use std::collections::hash_map::{Entry, HashMap};
use std::hash::Hash;

use futures::channel::oneshot;
use tracing::trace;

use crate::LoadError;

pub(crate) type LoadResult<V, E> = Result<V, LoadError<E>>;
pub(crate) type ResultSender<V, E> = oneshot::Sender<LoadResult<V, E>>;
pub(crate) type ResultReceiver<V, E> = oneshot::Receiver<LoadResult<V, E>>;

pub(crate) type WindowId = u64;

/// Requests collected for one dispatch.
///
/// `keys` and `cache_keys` hold one entry per unique cache key in first-seen
/// order; `requests` holds every waiting caller of that cache key.
pub(crate) struct Window<K, V, E, C> {
    pub(crate) id: WindowId,
    pub(crate) keys: Vec<K>,
    pub(crate) cache_keys: Vec<C>,
    pub(crate) requests: HashMap<C, Vec<ResultSender<V, E>>>,
}

impl<K, V, E, C> Window<K, V, E, C>
where
    C: Eq + Hash + Clone,
{
    fn new(id: WindowId) -> Self {
        Window {
            id,
            keys: Vec::new(),
            cache_keys: Vec::new(),
            requests: HashMap::new(),
        }
    }

    fn push(&mut self, key: K, cache_key: C) -> ResultReceiver<V, E> {
        let (tx, rx) = oneshot::channel();
        match self.requests.entry(cache_key) {
            Entry::Occupied(mut waiting) => waiting.get_mut().push(tx),
            Entry::Vacant(slot) => {
                self.keys.push(key);
                self.cache_keys.push(slot.key().clone());
                slot.insert(vec![tx]);
            }
        }
        rx
    }
}

impl<K, V, E, C> Window<K, V, E, C> {
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Owns the single open window of a loader.
pub(crate) struct Scheduler<K, V, E, C> {
    open: Option<Window<K, V, E, C>>,
    next_id: WindowId,
}

impl<K, V, E, C> Scheduler<K, V, E, C>
where
    C: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Scheduler {
            open: None,
            next_id: 0,
        }
    }

    /// Appends a request to the open window, opening one when none is open.
    pub(crate) fn enqueue(&mut self, key: K, cache_key: C) -> (WindowId, ResultReceiver<V, E>) {
        let window = self.open_window();
        let rx = window.push(key, cache_key);
        (window.id, rx)
    }

    fn open_window(&mut self) -> &mut Window<K, V, E, C> {
        let next_id = &mut self.next_id;
        self.open.get_or_insert_with(|| {
            *next_id = next_id.wrapping_add(1);
            trace!(window = *next_id, "opening batch window");
            Window::new(*next_id)
        })
    }

    /// Takes window `id` out for dispatch. Returns `None` when that window has
    /// already been closed by another request.
    pub(crate) fn close(&mut self, id: WindowId) -> Option<Window<K, V, E, C>> {
        if self.open.as_ref().is_some_and(|window| window.id == id) {
            self.open.take()
        } else {
            None
        }
    }
}
