use thiserror::Error;

/// Errors raised by the caching layer.
///
/// None of these ever reach an HTTP client: the gateway treats every store
/// or payload failure as a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached or refused the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// A key or payload could not be encoded or decoded.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored entry decoded but does not describe a valid value.
    #[error("corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// A cache directive was constructed with invalid values.
    #[error("invalid cache directive: {reason}")]
    InvalidDirective { reason: &'static str },
}
