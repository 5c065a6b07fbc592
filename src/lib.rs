//! Request-coalescing loader with a per-key result cache.
//!
//! Every `load` issued while the current batch window is open is folded into a
//! single call to a user supplied [`BatchFn`]. Duplicate keys are fetched once,
//! oversized windows are split into chunks of at most `max_batch_size` keys and
//! each caller receives the outcome that belongs to its own key.
//!
//! [`non_cached::Loader`] only batches. [`cached::Loader`] additionally keeps
//! successful results so repeated lookups never reach the batch function again.
//!
//! ```
//! use futures::{executor::block_on, future};
//! use superloader::{batch_fn, non_cached::Loader};
//!
//! let loader = Loader::new(batch_fn(|keys: Vec<i32>| async move {
//!     let values: Vec<Result<i32, ()>> = keys.into_iter().map(|k| Ok(k * 10)).collect();
//!     Ok::<_, ()>(values)
//! }))
//! .cached();
//!
//! let (a, b) = block_on(future::join(loader.load(1), loader.load(2)));
//! assert_eq!((Ok(10), Ok(20)), (a, b));
//! ```

mod batch_fn;
pub mod cached;
mod config;
mod dispatch;
mod error;
mod key;
pub mod non_cached;
mod runtime;
mod window;

#[cfg(test)]
mod tests;

pub use batch_fn::{batch_fn, BatchFn, BatchOutcome, FnBatcher};
pub use config::LoaderConfig;
pub use error::LoadError;
pub use key::{key_fn, CacheKeyFn, DisplayKey, Identity, KeyFn};

use std::{future::Future, pin::Pin};

/// A trait alias. Read as "a function which returns a pinned box containing a future"
pub trait WaitForWorkFn:
    Fn() -> Pin<Box<dyn Future<Output = ()> + Send + Sync>> + Send + Sync + 'static
{
}

impl<T> WaitForWorkFn for T where
    T: Fn() -> Pin<Box<dyn Future<Output = ()> + Send + Sync>> + Send + Sync + 'static
{
}

pub(crate) fn yield_fn(count: usize) -> impl WaitForWorkFn {
    move || {
        Box::pin(async move {
            // yield for other load to append request
            for _ in 0..count {
                runtime::yield_now().await;
            }
        })
    }
}
