/// All errors that can be returned by a PropositionCache implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key cannot be mapped onto the backend (empty, or escapes the
    /// cache directory).
    #[error("invalid cache key: {key:?}")]
    InvalidKey { key: String },

    /// Reading or writing the backing file failed.
    #[error("cache i/o error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored bytes could not be decoded or encoded as a cache entry.
    #[error("corrupt cache entry {key}: {message}")]
    Corrupt { key: String, message: String },

    /// A backend-specific storage error.
    #[error("storage backend error: {0}")]
    Backend(String),
}
