//! Caching wrapper around a [`TransitApi`].
//!
//! Responses are stored as JSON under `"<operation>:<arg>[:<arg>...]"` keys.
//! Time arguments are truncated to the minute (`YYYYMMDDHHmm`) so that
//! repeated board queries within the same minute share one upstream call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::{Cache, TtlClass, TtlConfig};
use crate::viaggiatreno::{
    ApiError, Arrival, Departure, RegionStation, StationDetail, StationMatch, TrainJourney,
    TrainMatch, TransitApi,
};

/// Build a cache key from an operation name and its arguments.
pub fn cache_key(operation: &str, args: &[&str]) -> String {
    let mut key = String::from(operation);
    for arg in args {
        key.push(':');
        key.push_str(arg);
    }
    key
}

/// A query time truncated to minute resolution, as used in cache keys.
pub fn minute_key(when: DateTime<Utc>) -> String {
    when.format("%Y%m%d%H%M").to_string()
}

/// [`TransitApi`] that serves fresh responses from a [`Cache`].
///
/// Failed and absent results are never cached, so an upstream error or a
/// not-yet-published journey is retried on the next call.
pub struct CachedClient<C> {
    inner: C,
    cache: Arc<dyn Cache>,
    ttl: TtlConfig,
}

impl<C: TransitApi> CachedClient<C> {
    pub fn new(inner: C, cache: Arc<dyn Cache>, ttl: TtlConfig) -> Self {
        Self { inner, cache, ttl }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Decode a cached value; undecodable entries count as a miss.
    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.cache.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                debug!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, class: TtlClass) {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                trace!(key, ?class, bytes = bytes.len(), "cache store");
                self.cache.set(key, bytes, self.ttl.ttl(class));
            }
            Err(e) => debug!(key, error = %e, "response not cacheable"),
        }
    }
}

impl<C: TransitApi> TransitApi for CachedClient<C> {
    async fn autocomplete_station(&self, prefix: &str) -> Result<Vec<StationMatch>, ApiError> {
        let key = cache_key("autocompleta", &[prefix]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let stations = self.inner.autocomplete_station(prefix).await?;
        self.store(&key, &stations, TtlClass::Static);
        Ok(stations)
    }

    async fn search_station(&self, prefix: &str) -> Result<Vec<StationDetail>, ApiError> {
        let key = cache_key("cerca_stazione", &[prefix]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let stations = self.inner.search_station(prefix).await?;
        self.store(&key, &stations, TtlClass::Static);
        Ok(stations)
    }

    async fn find_train_number(&self, number: &str) -> Result<Vec<TrainMatch>, ApiError> {
        let key = cache_key("cerca_treno", &[number]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let matches = self.inner.find_train_number(number).await?;
        self.store(&key, &matches, TtlClass::SemiStatic);
        Ok(matches)
    }

    async fn departures(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Departure>, ApiError> {
        let key = cache_key("partenze", &[station_id, &minute_key(when)]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let departures = self.inner.departures(station_id, when).await?;
        self.store(&key, &departures, TtlClass::Realtime);
        Ok(departures)
    }

    async fn arrivals(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Arrival>, ApiError> {
        let key = cache_key("arrivi", &[station_id, &minute_key(when)]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let arrivals = self.inner.arrivals(station_id, when).await?;
        self.store(&key, &arrivals, TtlClass::Realtime);
        Ok(arrivals)
    }

    async fn train_journey(
        &self,
        origin_id: &str,
        train_number: &str,
        departure_ts: i64,
    ) -> Result<Option<TrainJourney>, ApiError> {
        let ts = departure_ts.to_string();
        let key = cache_key("andamento", &[origin_id, train_number, &ts]);
        if let Some(hit) = self.lookup::<TrainJourney>(&key) {
            return Ok(Some(hit));
        }
        debug!(key = %key, "cache miss");

        let journey = self
            .inner
            .train_journey(origin_id, train_number, departure_ts)
            .await?;
        if let Some(journey) = &journey {
            self.store(&key, journey, TtlClass::Realtime);
        }
        Ok(journey)
    }

    async fn region_stations(&self, region: u8) -> Result<Vec<RegionStation>, ApiError> {
        let region_arg = region.to_string();
        let key = cache_key("elenco_stazioni", &[&region_arg]);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        debug!(key = %key, "cache miss");

        let stations = self.inner.region_stations(region).await?;
        self.store(&key, &stations, TtlClass::Static);
        Ok(stations)
    }
}
