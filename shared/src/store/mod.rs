use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::model::{LocationRecord, NewLocation, RecordId, UnixTimeMs};

#[cfg(not(target_arch = "wasm32"))]
mod sqlite;

#[cfg(not(target_arch = "wasm32"))]
pub use self::sqlite::SqliteLocationStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open store: {0}")]
    Open(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(not(target_arch = "wasm32"))]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Statement(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// CRUD over the record store. Each call is independently atomic; there is
/// no transaction spanning calls.
#[async_trait::async_trait]
pub trait LocationStore: Send + Sync {
    /// Inserts a record. The store assigns `id` and `timestamp`.
    async fn save(&self, location: &NewLocation) -> Result<(), StoreError>;

    /// All records, highest id first. Empty store yields an empty vec.
    async fn list_all(&self) -> Result<Vec<LocationRecord>, StoreError>;

    /// Deletes by id. Deleting an id that is not stored is not an error.
    async fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

struct MemoryRows {
    next_id: i64,
    rows: Vec<LocationRecord>,
}

/// In-process record store with the same ordering and id semantics as the
/// SQLite gateway. Can be switched offline to simulate connectivity loss.
pub struct InMemoryLocationStore {
    rows: Mutex<MemoryRows>,
    offline: AtomicBool,
}

impl Default for InMemoryLocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(MemoryRows {
                next_id: 1,
                rows: Vec::new(),
            }),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRows> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn save(&self, location: &NewLocation) -> Result<(), StoreError> {
        self.check_online()?;
        let mut rows = self.lock();
        let id = RecordId(rows.next_id);
        rows.next_id += 1;
        rows.rows.push(LocationRecord {
            id,
            name: location.name.clone(),
            coordinates: location.coordinates,
            timestamp: UnixTimeMs::now(),
        });
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<LocationRecord>, StoreError> {
        self.check_online()?;
        let mut rows = self.lock().rows.clone();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.check_online()?;
        self.lock().rows.retain(|row| row.id != id);
        Ok(())
    }
}
