//! In-memory ViaggiaTreno client for tests and offline development.
//!
//! Serves fixture records as if they were live API responses, counts calls
//! per operation, and can be told to fail specific requests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::TransitApi;
use super::error::ApiError;
use super::types::{
    Arrival, Departure, RegionStation, StationDetail, StationMatch, TrainJourney, TrainMatch,
};

/// Operation names used for call counting.
pub mod op {
    pub const AUTOCOMPLETE: &str = "autocomplete_station";
    pub const SEARCH_STATION: &str = "search_station";
    pub const TRAIN_NUMBER: &str = "find_train_number";
    pub const DEPARTURES: &str = "departures";
    pub const ARRIVALS: &str = "arrivals";
    pub const JOURNEY: &str = "train_journey";
    pub const REGION: &str = "region_stations";
}

#[derive(Default)]
struct MockState {
    stations: Vec<StationMatch>,
    details: Vec<StationDetail>,
    train_matches: HashMap<String, Vec<TrainMatch>>,
    departures: HashMap<String, Vec<Departure>>,
    arrivals: HashMap<String, Vec<Arrival>>,
    journeys: HashMap<String, TrainJourney>,
    regions: HashMap<u8, Vec<RegionStation>>,

    failing_departures: HashSet<String>,
    failing_journeys: HashSet<String>,
    failing_regions: HashSet<u8>,
    unavailable: bool,
    latency: Option<Duration>,

    calls: HashMap<&'static str, usize>,
    departure_queries: Vec<(String, DateTime<Utc>)>,
    journey_queries: Vec<String>,
}

/// Fixture-backed [`TransitApi`] implementation.
#[derive(Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not poison every later assertion.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a station served by autocomplete.
    pub fn add_station(&self, id: &str, name: &str) -> &Self {
        self.state().stations.push(StationMatch {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn add_station_detail(&self, detail: StationDetail) -> &Self {
        self.state().details.push(detail);
        self
    }

    pub fn add_train_match(&self, m: TrainMatch) -> &Self {
        self.state()
            .train_matches
            .entry(m.number.clone())
            .or_default()
            .push(m);
        self
    }

    /// Set the departure board for a station (returned for any query time).
    pub fn set_departures(&self, station_id: &str, departures: Vec<Departure>) -> &Self {
        self.state()
            .departures
            .insert(station_id.to_string(), departures);
        self
    }

    pub fn set_arrivals(&self, station_id: &str, arrivals: Vec<Arrival>) -> &Self {
        self.state()
            .arrivals
            .insert(station_id.to_string(), arrivals);
        self
    }

    /// Register a train run, looked up by train number.
    pub fn add_journey(&self, journey: TrainJourney) -> &Self {
        self.state()
            .journeys
            .insert(journey.train_number.to_string(), journey);
        self
    }

    pub fn set_region(&self, region: u8, stations: Vec<RegionStation>) -> &Self {
        self.state().regions.insert(region, stations);
        self
    }

    pub fn fail_departures(&self, station_id: &str) -> &Self {
        self.state()
            .failing_departures
            .insert(station_id.to_string());
        self
    }

    pub fn fail_journey(&self, train_number: &str) -> &Self {
        self.state()
            .failing_journeys
            .insert(train_number.to_string());
        self
    }

    pub fn fail_region(&self, region: u8) -> &Self {
        self.state().failing_regions.insert(region);
        self
    }

    /// Make every operation fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) -> &Self {
        self.state().unavailable = unavailable;
        self
    }

    /// Delay every response.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        self.state().latency = Some(latency);
        self
    }

    /// Number of calls made to an operation (see [`op`]).
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Every `(station, time)` departures was queried with, in call order.
    pub fn departure_queries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.state().departure_queries.clone()
    }

    /// Every train number whose journey was requested, in call order.
    pub fn journey_queries(&self) -> Vec<String> {
        self.state().journey_queries.clone()
    }

    /// Count the call and return the configured latency, failing if the
    /// client is unavailable.
    fn enter(&self, operation: &'static str) -> Result<Option<Duration>, ApiError> {
        let mut state = self.state();
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.unavailable {
            return Err(ApiError::Timeout);
        }
        Ok(state.latency)
    }

    async fn pause(latency: Option<Duration>) {
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn unavailable(what: &str) -> ApiError {
    ApiError::Status {
        status: 503,
        body: format!("mock failure: {what}"),
    }
}

impl TransitApi for MockClient {
    async fn autocomplete_station(&self, prefix: &str) -> Result<Vec<StationMatch>, ApiError> {
        let latency = self.enter(op::AUTOCOMPLETE)?;
        Self::pause(latency).await;

        let needle = prefix.to_lowercase();
        Ok(self
            .state()
            .stations
            .iter()
            .filter(|s| s.id == prefix || s.name.to_lowercase().starts_with(&needle))
            .cloned()
            .collect())
    }

    async fn search_station(&self, prefix: &str) -> Result<Vec<StationDetail>, ApiError> {
        let latency = self.enter(op::SEARCH_STATION)?;
        Self::pause(latency).await;

        let needle = prefix.to_lowercase();
        Ok(self
            .state()
            .details
            .iter()
            .filter(|d| d.long_name.to_lowercase().starts_with(&needle))
            .cloned()
            .collect())
    }

    async fn find_train_number(&self, number: &str) -> Result<Vec<TrainMatch>, ApiError> {
        let latency = self.enter(op::TRAIN_NUMBER)?;
        Self::pause(latency).await;

        Ok(self
            .state()
            .train_matches
            .get(number)
            .cloned()
            .unwrap_or_default())
    }

    async fn departures(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Departure>, ApiError> {
        let latency = self.enter(op::DEPARTURES)?;
        self.state()
            .departure_queries
            .push((station_id.to_string(), when));
        Self::pause(latency).await;

        let state = self.state();
        if state.failing_departures.contains(station_id) {
            return Err(unavailable(station_id));
        }
        Ok(state
            .departures
            .get(station_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn arrivals(
        &self,
        station_id: &str,
        _when: DateTime<Utc>,
    ) -> Result<Vec<Arrival>, ApiError> {
        let latency = self.enter(op::ARRIVALS)?;
        Self::pause(latency).await;

        Ok(self
            .state()
            .arrivals
            .get(station_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn train_journey(
        &self,
        _origin_id: &str,
        train_number: &str,
        _departure_ts: i64,
    ) -> Result<Option<TrainJourney>, ApiError> {
        let latency = self.enter(op::JOURNEY)?;
        self.state().journey_queries.push(train_number.to_string());
        Self::pause(latency).await;

        let state = self.state();
        if state.failing_journeys.contains(train_number) {
            return Err(unavailable(train_number));
        }
        Ok(state.journeys.get(train_number).cloned())
    }

    async fn region_stations(&self, region: u8) -> Result<Vec<RegionStation>, ApiError> {
        let latency = self.enter(op::REGION)?;
        Self::pause(latency).await;

        let state = self.state();
        if state.failing_regions.contains(&region) {
            return Err(unavailable(&format!("region {region}")));
        }
        Ok(state.regions.get(&region).cloned().unwrap_or_default())
    }
}
