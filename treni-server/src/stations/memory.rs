//! In-memory station store for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::StoreError;
use super::model::{ImportMetadata, StationRecord};
use super::repository::{ImportMetadataRepository, StationRepository};

#[derive(Default)]
struct Tables {
    stations: BTreeMap<String, StationRecord>,
    metadata: HashMap<String, ImportMetadata>,
}

/// Station and metadata store held in memory.
///
/// `set_failing` makes every operation return [`StoreError::Unavailable`];
/// `fail_upserts_for` does the same for upserts of one station ID.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: AtomicBool,
    failing_upserts: RwLock<Vec<String>>,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `stations`.
    pub fn with_stations(stations: impl IntoIterator<Item = StationRecord>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.write();
            for station in stations {
                tables.stations.insert(station.id.clone(), station);
            }
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_upserts_for(&self, station_id: &str) {
        self.failing_upserts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(station_id.to_string());
    }

    /// Number of successful station upserts.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl StationRepository for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<StationRecord>, StoreError> {
        self.check()?;
        Ok(self.read().stations.get(id).cloned())
    }

    fn search(&self, query: &str) -> Result<Vec<StationRecord>, StoreError> {
        self.check()?;
        let needle = query.to_ascii_lowercase();
        let mut found: Vec<StationRecord> = self
            .read()
            .stations
            .values()
            .filter(|s| s.id == query || s.name.to_ascii_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    fn list(&self) -> Result<Vec<StationRecord>, StoreError> {
        self.check()?;
        Ok(self.read().stations.values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.check()?;
        Ok(self.read().stations.len())
    }

    fn upsert(&self, station: &StationRecord) -> Result<(), StoreError> {
        self.check()?;
        let rejected = self
            .failing_upserts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&station.id);
        if rejected {
            return Err(StoreError::Unavailable(format!(
                "upsert of {} set to fail",
                station.id
            )));
        }

        self.write()
            .stations
            .insert(station.id.clone(), station.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ImportMetadataRepository for MemoryStore {
    fn get_metadata(&self, entity_type: &str) -> Result<Option<ImportMetadata>, StoreError> {
        self.check()?;
        Ok(self.read().metadata.get(entity_type).cloned())
    }

    fn upsert_metadata(&self, meta: &ImportMetadata) -> Result<(), StoreError> {
        self.check()?;
        self.write()
            .metadata
            .insert(meta.entity_type.clone(), meta.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::model::ImportStatus;
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;

    fn station(id: &str, name: &str) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: name.into(),
            region: 1,
            latitude: 0.0,
            longitude: 0.0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_matches_name_substring_or_exact_id() {
        let store = MemoryStore::with_stations([
            station("S01700", "MILANO CENTRALE"),
            station("S01645", "MILANO ROGOREDO"),
            station("S08409", "ROMA TERMINI"),
        ]);

        let found = store.search("milano").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "MILANO CENTRALE");

        let found = store.search("S08409").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "ROMA TERMINI");

        assert!(store.search("napoli").unwrap().is_empty());
    }

    #[test]
    fn failure_injection() {
        let store = MemoryStore::with_stations([station("S01700", "MILANO CENTRALE")]);
        store.fail_upserts_for("S08409");

        assert!(store.upsert(&station("S08409", "ROMA TERMINI")).is_err());
        assert!(store.upsert(&station("S01645", "MILANO ROGOREDO")).is_ok());
        assert_eq!(store.upsert_count(), 1);

        store.set_failing(true);
        assert!(matches!(store.count(), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn should_refresh_follows_last_import() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let day = Duration::from_secs(24 * 3600);

        assert!(store.should_refresh("stations", day, now).unwrap());

        store
            .upsert_metadata(&ImportMetadata {
                entity_type: "stations".into(),
                last_import: now - TimeDelta::hours(2),
                record_count: 10,
                duration_ms: 5,
                status: ImportStatus::Success,
                error_message: None,
            })
            .unwrap();

        assert!(!store.should_refresh("stations", day, now).unwrap());
        assert!(store
            .should_refresh("stations", Duration::from_secs(3600), now)
            .unwrap());
    }
}
