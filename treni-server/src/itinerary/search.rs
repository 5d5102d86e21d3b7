//! Point-to-point itinerary search.
//!
//! Takes the departure board at the origin, probes the journey of each
//! departing train, and emits direct solutions (the train reaches the
//! destination) and one-transfer solutions (the train stops somewhere a
//! later train to the destination leaves from). Candidates are probed
//! concurrently; a failed probe yields no solutions and never fails the
//! search.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::viaggiatreno::{ApiError, Departure, TrainJourney, TransitApi};

use super::config::SearchConfig;
use super::model::{Leg, Solution};
use super::rank::rank_solutions;

/// Error from itinerary search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The origin departure board could not be fetched
    #[error("failed to fetch departures from {station}: {source}")]
    OriginDepartures {
        station: String,
        #[source]
        source: ApiError,
    },

    /// Invalid search request
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// Search timed out
    #[error("search timed out")]
    Timeout,
}

/// Itinerary search engine over a transit API (normally the cached one).
pub struct ItineraryEngine<A> {
    api: Arc<A>,
    config: SearchConfig,
}

impl<A: TransitApi + 'static> ItineraryEngine<A> {
    pub fn new(api: Arc<A>, config: SearchConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Solutions from `from` to `to` departing from now on.
    pub async fn search(&self, from: &str, to: &str) -> Result<Vec<Solution>, SearchError> {
        self.search_at(from, to, Utc::now()).await
    }

    /// Solutions from `from` to `to` using the origin board at `when`.
    ///
    /// Returns at most `max_results` solutions ordered by arrival time.
    /// Dropping the returned future cancels every outstanding probe.
    pub async fn search_at(
        &self,
        from: &str,
        to: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Solution>, SearchError> {
        validate(from, to)?;

        tokio::time::timeout(self.config.timeout, self.run(from, to, when))
            .await
            .map_err(|_| SearchError::Timeout)?
    }

    async fn run(
        &self,
        from: &str,
        to: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Solution>, SearchError> {
        let departures = self.api.departures(from, when).await.map_err(|source| {
            SearchError::OriginDepartures {
                station: from.to_string(),
                source,
            }
        })?;

        let mut tasks = JoinSet::new();
        for departure in departures.into_iter().take(self.config.max_departures) {
            if departure.is_cancelled() {
                debug!(train = departure.train_number, "skipping cancelled departure");
                continue;
            }
            let probe = Probe {
                api: self.api.clone(),
                config: self.config.clone(),
                from: from.to_string(),
                to: to.to_string(),
            };
            tasks.spawn(async move { probe.solutions_for(departure).await });
        }

        let mut solutions = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(found) => solutions.extend(found),
                Err(e) => warn!(error = %e, "candidate probe task failed"),
            }
        }

        debug!(
            from,
            to,
            candidates = solutions.len(),
            "itinerary search finished probing"
        );
        Ok(rank_solutions(solutions, self.config.max_results))
    }
}

fn validate(from: &str, to: &str) -> Result<(), SearchError> {
    if from.trim().is_empty() || to.trim().is_empty() {
        return Err(SearchError::InvalidRequest(
            "origin and destination are required".to_string(),
        ));
    }
    if from == to {
        return Err(SearchError::InvalidRequest(
            "origin and destination are the same station".to_string(),
        ));
    }
    Ok(())
}

/// Everything one candidate task needs, owned so it can be spawned.
struct Probe<A> {
    api: Arc<A>,
    config: SearchConfig,
    from: String,
    to: String,
}

impl<A: TransitApi> Probe<A> {
    /// Solutions that start with the train behind `departure`.
    async fn solutions_for(&self, departure: Departure) -> Vec<Solution> {
        let Some(journey) = self.journey_of(&departure).await else {
            return Vec::new();
        };

        let Some(from_idx) = journey.find_stop(&self.from, 0) else {
            debug!(train = departure.train_number, "origin not on journey");
            return Vec::new();
        };

        if let Some(to_idx) = journey.find_stop(&self.to, from_idx + 1) {
            return Leg::from_journey(&journey, from_idx, to_idx)
                .and_then(|leg| Solution::direct(leg).ok())
                .into_iter()
                .collect();
        }

        // A train calling at the destination only before the origin is
        // heading the other way.
        if journey.calls_at(&self.to) {
            return Vec::new();
        }

        self.connections(&journey, from_idx).await
    }

    /// One-transfer solutions riding `first` from `from_idx` to an
    /// intermediate stop, then a second train to the destination.
    async fn connections(&self, first: &TrainJourney, from_idx: usize) -> Vec<Solution> {
        let mut solutions = Vec::new();

        for inter_idx in (from_idx + 1)..first.stops.len() {
            let inter = &first.stops[inter_idx];
            if inter.is_suppressed() {
                continue;
            }
            let Some(arrival) = inter.arrival_at() else {
                continue;
            };
            let earliest = arrival + self.config.min_connection();

            let departures = match self.api.departures(&inter.station_id, earliest).await {
                Ok(departures) => departures,
                Err(e) => {
                    debug!(station = %inter.station_id, error = %e, "interchange board unavailable");
                    continue;
                }
            };

            for connecting in departures {
                if connecting.is_cancelled() {
                    continue;
                }
                match connecting.departure_at() {
                    Some(at) if at >= earliest => {}
                    _ => continue,
                }

                let Some(second) = self.journey_of(&connecting).await else {
                    continue;
                };
                if let Some(solution) = transfer(first, from_idx, inter_idx, &second, &self.to) {
                    solutions.push(solution);
                    break;
                }
            }

            if solutions.len() >= self.config.max_transfers_per_leg {
                break;
            }
        }

        solutions
    }

    /// Full journey of a departing train; `None` on any failure.
    async fn journey_of(&self, departure: &Departure) -> Option<TrainJourney> {
        let number = departure.train_number.to_string();
        match self
            .api
            .train_journey(&departure.origin_id, &number, departure.departure_time)
            .await
        {
            Ok(Some(journey)) if !journey.stops.is_empty() => Some(journey),
            Ok(_) => {
                debug!(train = %number, "no journey data, skipping candidate");
                None
            }
            Err(e) => {
                debug!(train = %number, error = %e, "journey fetch failed, skipping candidate");
                None
            }
        }
    }
}

/// Two-leg solution changing at `first.stops[inter_idx]`, if `second`
/// calls there and later at `to`.
fn transfer(
    first: &TrainJourney,
    from_idx: usize,
    inter_idx: usize,
    second: &TrainJourney,
    to: &str,
) -> Option<Solution> {
    let interchange = &first.stops[inter_idx].station_id;
    let board = second.find_stop(interchange, 0)?;
    let alight = second.find_stop(to, board + 1)?;

    let first_leg = Leg::from_journey(first, from_idx, inter_idx)?;
    let second_leg = Leg::from_journey(second, board, alight)?;
    Solution::new(vec![first_leg, second_leg]).ok()
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
