use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use super::{LocationStore, StoreError};
use crate::model::{Coordinates, LocationRecord, NewLocation, RecordId, UnixTimeMs};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS Locations (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT,
        Latitude REAL NOT NULL,
        Longitude REAL NOT NULL,
        Timestamp INTEGER NOT NULL
            DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
    );
"#;

const INSERT_LOCATION: &str =
    "INSERT INTO Locations (Name, Latitude, Longitude) VALUES (?1, ?2, ?3)";

const SELECT_LOCATIONS: &str =
    "SELECT Id, Name, Latitude, Longitude, Timestamp FROM Locations ORDER BY Id DESC";

const DELETE_LOCATION: &str = "DELETE FROM Locations WHERE Id = ?1";

/// SQLite-backed record store.
///
/// Every operation opens its own connection on a blocking worker and drops
/// it when the statement finishes; no connection outlives a call.
#[derive(Debug, Clone)]
pub struct SqliteLocationStore {
    path: PathBuf,
}

impl SqliteLocationStore {
    /// Opens (creating if needed) the database file and makes sure the
    /// `Locations` table exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store
            .with_connection(|conn| {
                conn.execute_batch(CREATE_TABLE)?;
                Ok(())
            })
            .await?;
        debug!(path = %store.path.display(), "location store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path).map_err(|e| StoreError::Open(e.to_string()))?;
            op(&conn)
        })
        .await?
    }
}

#[async_trait::async_trait]
impl LocationStore for SqliteLocationStore {
    #[instrument(skip(self, location), fields(name = %location.name))]
    async fn save(&self, location: &NewLocation) -> Result<(), StoreError> {
        let name = (!location.name.is_empty()).then(|| location.name.clone());
        let Coordinates {
            latitude,
            longitude,
        } = location.coordinates;

        self.with_connection(move |conn| {
            conn.execute(INSERT_LOCATION, params![name, latitude, longitude])?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<LocationRecord>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(SELECT_LOCATIONS)?;
            let rows = stmt.query_map([], |row| {
                let name: Option<String> = row.get(1)?;
                let latitude: Option<f64> = row.get(2)?;
                let longitude: Option<f64> = row.get(3)?;
                let timestamp: Option<i64> = row.get(4)?;
                Ok(LocationRecord {
                    id: RecordId(row.get(0)?),
                    name: name.unwrap_or_default(),
                    coordinates: Coordinates::new(
                        latitude.unwrap_or_default(),
                        longitude.unwrap_or_default(),
                    ),
                    timestamp: UnixTimeMs(timestamp.unwrap_or_default().max(0) as u64),
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.with_connection(move |conn| {
            let affected = conn.execute(DELETE_LOCATION, params![id.0])?;
            debug!(affected, "delete finished");
            Ok(())
        })
        .await
    }
}
