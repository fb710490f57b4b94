use crate::models::{Dog, SelectedLocation, SortField, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur reading or writing saved filter state
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Criteria portion of a saved snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CriteriaSnapshot {
    #[serde(default)]
    pub breeds: Vec<String>,
    #[serde(rename = "zipCodes", default)]
    pub zip_codes: Vec<String>,
    #[serde(rename = "ageMin", default)]
    pub age_min: Option<u8>,
    #[serde(rename = "ageMax", default)]
    pub age_max: Option<u8>,
    #[serde(rename = "sortField", default)]
    pub sort_field: SortField,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: SortOrder,
}

/// Everything restored for a user at session start
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub criteria: CriteriaSnapshot,
    #[serde(rename = "selectedLocations", default)]
    pub selected_locations: Vec<SelectedLocation>,
    #[serde(default)]
    pub favorites: Vec<Dog>,
    #[serde(rename = "matchResult", default)]
    pub match_result: Option<String>,
}

/// Per-user durable storage for filter and favorites state.
///
/// `load` never fails: unreadable or corrupt state is logged and treated as
/// absent.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, user_key: &str) -> Option<PersistedSnapshot>;

    fn save(&self, user_key: &str, snapshot: &PersistedSnapshot) -> Result<(), StoreError>;
}

/// One JSON file per user key under a directory
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", urlencoding::encode(user_key)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, user_key: &str) -> Option<PersistedSnapshot> {
        let path = self.path_for(user_key);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read saved state {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Ignoring corrupt saved state {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self, user_key: &str, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string(snapshot)?;
        std::fs::write(self.path_for(user_key), json)?;

        tracing::trace!("Saved state for {}", user_key);
        Ok(())
    }
}

/// Raw JSON blobs held in memory, keyed by user
#[derive(Default)]
pub struct MemorySnapshotStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw blob as-is, bypassing serialization
    pub fn put_raw(&self, user_key: &str, raw: impl Into<String>) {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(user_key.to_string(), raw.into());
    }

    pub fn contains(&self, user_key: &str) -> bool {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.contains_key(user_key)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, user_key: &str) -> Option<PersistedSnapshot> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        let raw = blobs.get(user_key)?;

        match serde_json::from_str(raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Ignoring corrupt saved state for {}: {}", user_key, e);
                None
            }
        }
    }

    fn save(&self, user_key: &str, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        self.put_raw(user_key, json);
        Ok(())
    }
}
