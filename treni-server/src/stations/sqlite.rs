//! SQLite-backed station store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Statement, params};

use super::error::StoreError;
use super::model::{ImportMetadata, ImportStatus, StationRecord};
use super::repository::{ImportMetadataRepository, StationRepository};

/// Tables are created on open if missing.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    region INTEGER NOT NULL DEFAULT 0,
    latitude REAL NOT NULL DEFAULT 0,
    longitude REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stations_name ON stations(name);

CREATE TABLE IF NOT EXISTS import_metadata (
    entity_type TEXT PRIMARY KEY,
    last_import TEXT NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT
);
"#;

const STATION_COLUMNS: &str = "id, name, region, latitude, longitude, updated_at";

const UPSERT_STATION: &str = "INSERT INTO stations (id, name, region, latitude, longitude, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        region = excluded.region,
        latitude = excluded.latitude,
        longitude = excluded.longitude,
        updated_at = excluded.updated_at";

/// Station and import-metadata store on a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<StationRecord> {
    Ok(StationRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        region: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn execute_upsert(stmt: &mut Statement<'_>, station: &StationRecord) -> Result<(), StoreError> {
    stmt.execute(params![
        station.id,
        station.name,
        station.region,
        station.latitude,
        station.longitude,
        station.updated_at,
    ])?;
    Ok(())
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<ImportMetadata> {
    let status: String = row.get(4)?;
    let status = status
        .parse::<ImportStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;
    let record_count: i64 = row.get(2)?;

    Ok(ImportMetadata {
        entity_type: row.get(0)?,
        last_import: row.get(1)?,
        record_count: usize::try_from(record_count).unwrap_or(0),
        duration_ms: row.get(3)?,
        status,
        error_message: row.get(5)?,
    })
}

impl StationRepository for SqliteStore {
    fn get_by_id(&self, id: &str) -> Result<Option<StationRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?1");
        let station = conn
            .query_row(&sql, params![id], station_from_row)
            .optional()?;
        Ok(station)
    }

    fn search(&self, query: &str) -> Result<Vec<StationRecord>, StoreError> {
        let conn = self.conn()?;
        // lower() folds ASCII only; MemoryStore matches that.
        let sql = format!(
            "SELECT {STATION_COLUMNS} FROM stations
             WHERE id = ?1 OR instr(lower(name), lower(?1)) > 0
             ORDER BY name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![query], station_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list(&self) -> Result<Vec<StationRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], station_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn upsert(&self, station: &StationRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(UPSERT_STATION)?;
        execute_upsert(&mut stmt, station)
    }

    /// One transaction per batch; a row that fails is skipped and the rest
    /// still commit.
    fn upsert_many(
        &self,
        stations: &[StationRecord],
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let outcomes: Vec<Result<(), StoreError>> = {
            let mut stmt = tx.prepare_cached(UPSERT_STATION)?;
            stations
                .iter()
                .map(|s| execute_upsert(&mut stmt, s))
                .collect()
        };
        tx.commit()?;
        Ok(outcomes)
    }
}

impl ImportMetadataRepository for SqliteStore {
    fn get_metadata(&self, entity_type: &str) -> Result<Option<ImportMetadata>, StoreError> {
        let conn = self.conn()?;
        let meta = conn
            .query_row(
                "SELECT entity_type, last_import, record_count, duration_ms, status, error_message
                 FROM import_metadata WHERE entity_type = ?1",
                params![entity_type],
                metadata_from_row,
            )
            .optional()?;
        Ok(meta)
    }

    fn upsert_metadata(&self, meta: &ImportMetadata) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO import_metadata
                (entity_type, last_import, record_count, duration_ms, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entity_type) DO UPDATE SET
                last_import = excluded.last_import,
                record_count = excluded.record_count,
                duration_ms = excluded.duration_ms,
                status = excluded.status,
                error_message = excluded.error_message",
            params![
                meta.entity_type,
                meta.last_import,
                meta.record_count as i64,
                meta.duration_ms,
                meta.status.as_str(),
                meta.error_message,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn station(id: &str, name: &str) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: name.into(),
            region: 1,
            latitude: 45.48,
            longitude: 9.2,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn upsert_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get_by_id("S01700").unwrap().is_none());

        let original = station("S01700", "MILANO CENTRALE");
        store.upsert(&original).unwrap();
        assert_eq!(store.get_by_id("S01700").unwrap(), Some(original));

        let renamed = station("S01700", "MILANO C.LE");
        store.upsert(&renamed).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get_by_id("S01700").unwrap().unwrap().name, "MILANO C.LE");
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&station("S01700", "MILANO CENTRALE")).unwrap();
        store.upsert(&station("S01645", "MILANO ROGOREDO")).unwrap();
        store.upsert(&station("S08409", "ROMA TERMINI")).unwrap();

        let found = store.search("rogo").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "S01645");

        let found = store.search("milano").unwrap();
        assert_eq!(
            found.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["S01700", "S01645"]
        );

        assert_eq!(store.search("S08409").unwrap().len(), 1);
        assert_eq!(store.list().unwrap().len(), 3);
    }

    #[test]
    fn metadata_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_metadata("stations").unwrap().is_none());

        let meta = ImportMetadata {
            entity_type: "stations".into(),
            last_import: Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            record_count: 2500,
            duration_ms: 4200,
            status: ImportStatus::PartialFailure,
            error_message: Some("1 of 22 regions failed to import".into()),
        };
        store.upsert_metadata(&meta).unwrap();
        assert_eq!(store.get_metadata("stations").unwrap(), Some(meta));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("treni.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(&station("S01700", "MILANO CENTRALE")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(
            store.get_by_id("S01700").unwrap().unwrap().name,
            "MILANO CENTRALE"
        );
    }

    #[test]
    fn batch_upsert_in_one_transaction() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&station("S01700", "MILANO CENTRALE")).unwrap();

        let outcomes = store
            .upsert_many(&[
                station("S01700", "MILANO C.LE"),
                station("S01645", "MILANO ROGOREDO"),
                station("S08409", "ROMA TERMINI"),
            ])
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.get_by_id("S01700").unwrap().unwrap().name, "MILANO C.LE");
        assert!(store.upsert_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn search_folds_ascii_like_memory_store() {
        use crate::stations::MemoryStore;

        let stations = [
            station("S06950", "CITTÀ DI CASTELLO"),
            station("S07104", "FORLÌ"),
        ];
        let sqlite = SqliteStore::open_in_memory().unwrap();
        for s in &stations {
            sqlite.upsert(s).unwrap();
        }
        let memory = MemoryStore::with_stations(stations.clone());

        for query in ["città", "CITTÀ", "citt", "forlì", "FORL"] {
            let ids = |found: Vec<StationRecord>| -> Vec<String> {
                found.into_iter().map(|s| s.id).collect()
            };
            assert_eq!(
                ids(sqlite.search(query).unwrap()),
                ids(memory.search(query).unwrap()),
                "stores disagree on {query:?}"
            );
        }
        assert_eq!(sqlite.search("citt").unwrap().len(), 1);
        assert!(sqlite.search("città").unwrap().is_empty());
    }
}
