// Service exports
pub mod fetch;
pub mod store;

pub use fetch::{ApiError, DogApi, FetchClient};
pub use store::{CriteriaSnapshot, FileSnapshotStore, MemorySnapshotStore, PersistedSnapshot, SnapshotStore, StoreError};
