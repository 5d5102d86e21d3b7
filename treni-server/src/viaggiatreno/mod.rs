//! ViaggiaTreno (Trenitalia) client.
//!
//! This module provides the upstream transit API used by everything else:
//! station lookup, departure and arrival boards, train journeys and the
//! per-region station lists used for bulk imports.
//!
//! Key characteristics of ViaggiaTreno:
//! - Two autocomplete endpoints answer with pipe-delimited text, the rest
//!   with JSON using Italian field names
//! - Times are epoch milliseconds; `0` means "unknown"
//! - A train run is identified by (origin station, train number, departure
//!   timestamp), since train numbers are reused across days and origins
//! - The service is rate-limited and occasionally unreliable, so callers go
//!   through a TTL cache (see [`crate::cache`])

mod client;
mod error;
pub mod mock;
mod parse;
mod types;

use std::future::Future;

use chrono::{DateTime, Utc};

pub use client::{ClientConfig, DEFAULT_BASE_URL, HttpClient};
pub use error::ApiError;
pub use mock::MockClient;
pub use parse::format_query_time;
pub use types::{
    Arrival, Departure, Locality, RegionStation, StationDetail, StationMatch, Stop, TrainJourney,
    TrainMatch, from_epoch_millis,
};

/// Number of regional partitions served by `elencoStazioni`.
pub const REGION_COUNT: u8 = 22;

/// Operations exposed by the upstream transit API.
///
/// Every method answers with a populated result, an empty result, or a typed
/// error. Implemented by the live [`HttpClient`], the fixture [`MockClient`]
/// and the caching wrapper [`crate::cache::CachedClient`], so they can be
/// substituted for one another.
pub trait TransitApi: Send + Sync {
    /// Stations whose name starts with `prefix`.
    fn autocomplete_station(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<StationMatch>, ApiError>> + Send;

    /// Detailed station records whose name starts with `prefix`.
    fn search_station(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<StationDetail>, ApiError>> + Send;

    /// Resolve a train number to the runs (origin + date) it identifies.
    fn find_train_number(
        &self,
        number: &str,
    ) -> impl Future<Output = Result<Vec<TrainMatch>, ApiError>> + Send;

    /// Departure board for a station at a given time.
    fn departures(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Departure>, ApiError>> + Send;

    /// Arrivals board for a station at a given time.
    fn arrivals(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Arrival>, ApiError>> + Send;

    /// Full journey of one train run; `None` when the run is unknown.
    fn train_journey(
        &self,
        origin_id: &str,
        train_number: &str,
        departure_ts: i64,
    ) -> impl Future<Output = Result<Option<TrainJourney>, ApiError>> + Send;

    /// All stations of one region (`1..=REGION_COUNT`).
    fn region_stations(
        &self,
        region: u8,
    ) -> impl Future<Output = Result<Vec<RegionStation>, ApiError>> + Send;
}

impl<T: TransitApi> TransitApi for std::sync::Arc<T> {
    fn autocomplete_station(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<StationMatch>, ApiError>> + Send {
        (**self).autocomplete_station(prefix)
    }

    fn search_station(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<StationDetail>, ApiError>> + Send {
        (**self).search_station(prefix)
    }

    fn find_train_number(
        &self,
        number: &str,
    ) -> impl Future<Output = Result<Vec<TrainMatch>, ApiError>> + Send {
        (**self).find_train_number(number)
    }

    fn departures(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Departure>, ApiError>> + Send {
        (**self).departures(station_id, when)
    }

    fn arrivals(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Arrival>, ApiError>> + Send {
        (**self).arrivals(station_id, when)
    }

    fn train_journey(
        &self,
        origin_id: &str,
        train_number: &str,
        departure_ts: i64,
    ) -> impl Future<Output = Result<Option<TrainJourney>, ApiError>> + Send {
        (**self).train_journey(origin_id, train_number, departure_ts)
    }

    fn region_stations(
        &self,
        region: u8,
    ) -> impl Future<Output = Result<Vec<RegionStation>, ApiError>> + Send {
        (**self).region_stations(region)
    }
}
