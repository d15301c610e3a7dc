pub mod cache;
pub mod file;
#[cfg(test)]
pub mod memory;
pub mod traits;

// Re-export
pub use cache::FileSnapshotCache;
pub use file::FileRecordStore;
#[cfg(test)]
pub use memory::MemoryStore;
pub use traits::{CacheKey, RecordStore, RosterRepository, SnapshotCache};
