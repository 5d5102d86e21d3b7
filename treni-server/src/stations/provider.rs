//! Priority-ordered station lookup with fallback and write-through.
//!
//! Sources are consulted in ascending priority. The first non-empty answer
//! wins and is returned with a [`DataFreshness`] descriptor; when the live
//! API wins, the result is also queued for persistence so the store fills
//! up with whatever users look at.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::StationError;
use super::model::{DataFreshness, StationRecord};
use super::repository::StationRepository;
use super::source::StationSource;
use super::write_through::WriteThrough;
use crate::viaggiatreno::TransitApi;

/// Default age after which station data is reported stale (one week).
pub const DEFAULT_STALENESS_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub struct CompositeStationProvider<R, A> {
    sources: Vec<StationSource<R, A>>,
    staleness_age: Duration,
    write_through: Option<WriteThrough>,
}

impl<R: StationRepository + 'static, A: TransitApi> CompositeStationProvider<R, A> {
    /// Sources are sorted by priority here, once.
    pub fn new(staleness_age: Duration, mut sources: Vec<StationSource<R, A>>) -> Self {
        sources.sort_by_key(|s| s.priority());
        Self {
            sources,
            staleness_age,
            write_through: None,
        }
    }

    /// Persist live answers through `write_through`.
    pub fn with_write_through(mut self, write_through: WriteThrough) -> Self {
        self.write_through = Some(write_through);
        self
    }

    /// Source names in the order they are consulted.
    pub fn source_order(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn get_station(
        &self,
        id: &str,
    ) -> Result<(StationRecord, DataFreshness), StationError> {
        let mut last_error = None;

        for source in &self.sources {
            if !source.available().await {
                continue;
            }
            match source.get_station(id).await {
                Ok(station) => {
                    let freshness = self.freshness(source.name(), station.updated_at);
                    if source.is_live() {
                        self.persist(vec![station.clone()]);
                    }
                    return Ok((station, freshness));
                }
                Err(StationError::NotFound) => {
                    debug!(source = source.name(), station = id, "station not found in source");
                }
                Err(e) => {
                    warn!(source = source.name(), station = id, error = %e, "station lookup failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(StationError::NotFound))
    }

    pub async fn search_stations(
        &self,
        query: &str,
    ) -> Result<(Vec<StationRecord>, DataFreshness), StationError> {
        let mut last_error = None;

        for source in &self.sources {
            if !source.available().await {
                continue;
            }
            match source.search_stations(query).await {
                Ok(stations) if !stations.is_empty() => {
                    return Ok(self.answer(source, stations));
                }
                Ok(_) | Err(StationError::NotFound) => {
                    debug!(source = source.name(), query, "no stations matched in source");
                }
                Err(e) => {
                    warn!(source = source.name(), query, error = %e, "station search failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(StationError::NotFound))
    }

    pub async fn list_all_stations(
        &self,
    ) -> Result<(Vec<StationRecord>, DataFreshness), StationError> {
        let mut last_error = None;

        for source in &self.sources {
            if !source.available().await {
                continue;
            }
            match source.list_all_stations().await {
                Ok(stations) if !stations.is_empty() => {
                    return Ok(self.answer(source, stations));
                }
                Ok(_) | Err(StationError::NotFound) => {
                    debug!(source = source.name(), "source has no stations");
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "station listing failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(StationError::NotFound))
    }

    /// Freshness of a non-empty collection is that of its newest record.
    fn answer(
        &self,
        source: &StationSource<R, A>,
        stations: Vec<StationRecord>,
    ) -> (Vec<StationRecord>, DataFreshness) {
        let newest = stations
            .iter()
            .map(|s| s.updated_at)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let freshness = self.freshness(source.name(), newest);
        if source.is_live() {
            self.persist(stations.clone());
        }
        (stations, freshness)
    }

    fn freshness(&self, source: &str, last_updated: DateTime<Utc>) -> DataFreshness {
        DataFreshness::new(source, last_updated, self.staleness_age, Utc::now())
    }

    fn persist(&self, stations: Vec<StationRecord>) {
        if let Some(wt) = &self.write_through {
            wt.enqueue(stations);
        }
    }
}
