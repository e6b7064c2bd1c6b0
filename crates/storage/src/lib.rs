pub mod conformance;
mod entry;
mod error;
mod file;
mod memory;
mod traits;

pub use entry::CacheEntry;
pub use error::StorageError;
pub use file::FileCache;
pub use memory::MemoryCache;
pub use traits::PropositionCache;

/// Cache key holding the persisted in-app proposition store.
pub const PROPOSITIONS_KEY: &str = "propositions";
