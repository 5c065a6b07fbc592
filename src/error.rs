use thiserror::Error;

/// Why a single `load` did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError<E> {
    /// The batch function failed as a whole. Every request of the chunk gets
    /// the same error.
    #[error("batch function failed: {0}")]
    BatchFn(E),

    /// The batch function returned a failure for this key only.
    #[error("key failed to load: {0}")]
    Key(E),

    /// The batch function broke its contract by returning a different number
    /// of outcomes than it was given keys.
    #[error("batch function returned {value_count} values for {key_count} keys")]
    UnequalKeyValueSize {
        key_count: usize,
        value_count: usize,
    },
}

impl<E> LoadError<E> {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::UnequalKeyValueSize { .. })
    }

    /// The error produced by the batch function, if any.
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::BatchFn(e) | Self::Key(e) => Some(e),
            Self::UnequalKeyValueSize { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_only_for_batch_fn_errors() {
        assert_eq!(Some(&"boom"), LoadError::BatchFn("boom").inner());
        assert_eq!(Some(&"missing"), LoadError::Key("missing").inner());
        let violation = LoadError::<&str>::UnequalKeyValueSize {
            key_count: 2,
            value_count: 1,
        };
        assert_eq!(None, violation.inner());
        assert!(!LoadError::Key("missing").is_contract_violation());
    }

    #[test]
    fn display() {
        let err = LoadError::<String>::UnequalKeyValueSize {
            key_count: 3,
            value_count: 2,
        };
        assert_eq!("batch function returned 2 values for 3 keys", err.to_string());
        assert_eq!(
            "key failed to load: not found",
            LoadError::Key("not found").to_string()
        );
    }
}
