use async_trait::async_trait;

use crate::entry::CacheEntry;
use crate::error::StorageError;

/// Key/value persistence for reconciled proposition snapshots.
///
/// The pipeline keeps a single key (see `PROPOSITIONS_KEY`) holding the
/// full durable store. Writes replace the whole entry; there is no partial
/// update.
///
/// ## Semantics
///
/// - `get` on a missing key returns `Ok(None)`, not an error.
/// - `set` replaces any existing entry atomically from a reader's point
///   of view: a concurrent `get` sees the old entry or the new one.
/// - `remove` on a missing key succeeds.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so the pipeline state
/// can share them across tasks.
#[async_trait]
pub trait PropositionCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
