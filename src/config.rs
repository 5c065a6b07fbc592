/// Loader settings, fixed once the loader has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of keys handed to one batch function call. A window
    /// holding more unique keys is split into consecutive chunks.
    ///
    /// Defaults to `usize::MAX`, i.e. one call per window.
    pub max_batch_size: usize,
    /// How many times a request yields to the executor before its window is
    /// closed. Defaults to 10.
    pub yield_count: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: usize::MAX,
            yield_count: 10,
        }
    }
}

impl LoaderConfig {
    /// Sets the chunk size. Zero is treated as one.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_yield_count(mut self, yield_count: usize) -> Self {
        self.yield_count = yield_count;
        self
    }

    /// Number of batch function calls needed for `key_count` unique keys.
    pub fn chunk_count(&self, key_count: usize) -> usize {
        let size = self.max_batch_size.max(1);
        key_count / size + usize::from(key_count % size != 0)
    }
}
