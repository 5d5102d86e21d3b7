//! Storage traits for the persisted station set.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::model::{ImportMetadata, StationRecord, is_older_than};

/// Storage operations for stations.
pub trait StationRepository: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<StationRecord>, StoreError>;

    /// Stations whose name contains `query` or whose ID equals it, ordered
    /// by name. Case folding is ASCII-only, so `È` and `è` differ.
    fn search(&self, query: &str) -> Result<Vec<StationRecord>, StoreError>;

    /// Every station, ordered by ID.
    fn list(&self) -> Result<Vec<StationRecord>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// Insert or replace by ID.
    fn upsert(&self, station: &StationRecord) -> Result<(), StoreError>;

    /// Insert or replace a batch, returning each station's outcome in order.
    /// `Err` means the batch as a whole could not be written.
    fn upsert_many(
        &self,
        stations: &[StationRecord],
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        Ok(stations.iter().map(|s| self.upsert(s)).collect())
    }
}

/// Import bookkeeping, one row per entity type.
pub trait ImportMetadataRepository: Send + Sync {
    fn get_metadata(&self, entity_type: &str) -> Result<Option<ImportMetadata>, StoreError>;

    fn upsert_metadata(&self, meta: &ImportMetadata) -> Result<(), StoreError>;

    /// True when nothing was ever imported or the last import is older
    /// than `max_age`.
    fn should_refresh(
        &self,
        entity_type: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(match self.get_metadata(entity_type)? {
            None => true,
            Some(meta) => is_older_than(meta.last_import, max_age, now),
        })
    }
}

/// Run a store call on the blocking pool so it never holds an executor
/// thread.
pub(crate) async fn blocking<S, T, F>(store: &Arc<S>, f: F) -> Result<T, StoreError>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store)).await?
}
