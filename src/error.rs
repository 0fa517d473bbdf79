use thiserror::Error;

/// Error type for the tag-filter core.
///
/// Cache-backend and filter-combination errors are deliberately absent: the
/// in-process caches cannot become unavailable, and
/// [`crate::filters::TagFilters::add`] accepts every combination of
/// `(key, value, is_negative, is_regexp)`.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid regexp {expr:?}: {reason}")]
    RegexParse { expr: String, reason: String },

    #[error("Corrupted tag value suffix: {0}")]
    CorruptSuffix(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),
}

// Implement conversion from lock poison errors for convenience
impl<T> From<std::sync::PoisonError<T>> for FilterError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        FilterError::LockError(format!("Mutex/RwLock poisoned: {}", err))
    }
}
