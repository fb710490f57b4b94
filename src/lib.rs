//! Dogfinder - search, filter, pagination and favorites engine for the dog adoption API
//!
//! The engine turns user-chosen filters into correctly paginated, server-ordered
//! result pages, keeps favorites consistent across pages, persists that state per
//! user, and reconciles it all against the API's opaque cursor pagination.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{SearchOrchestrator, OrchestratorConfig, SearchCriteria, SearchError, FetchOutcome, PageView};
pub use crate::models::{Dog, Location, SelectedLocation, SortField, SortOrder, SortSpec};
pub use crate::services::{DogApi, FetchClient, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
