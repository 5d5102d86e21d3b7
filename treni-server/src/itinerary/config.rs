//! Search configuration for the itinerary engine.

use chrono::TimeDelta;
use std::time::Duration;

/// Configuration parameters for itinerary search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Minimum time between arriving at an interchange and the connecting
    /// departure (minutes).
    pub min_connection_mins: i64,

    /// Departures from the origin that are probed. Later ones are ignored.
    pub max_departures: usize,

    /// Maximum number of solutions to return.
    pub max_results: usize,

    /// One-transfer solutions kept per first train.
    pub max_transfers_per_leg: usize,

    /// Deadline for the whole search, including every upstream call.
    pub timeout: Duration,
}

impl SearchConfig {
    /// Returns the minimum connection time as a Duration.
    pub fn min_connection(&self) -> TimeDelta {
        TimeDelta::minutes(self.min_connection_mins)
    }

    pub fn with_min_connection_mins(mut self, mins: i64) -> Self {
        self.min_connection_mins = mins;
        self
    }

    pub fn with_max_departures(mut self, n: usize) -> Self {
        self.max_departures = n;
        self
    }

    pub fn with_max_results(mut self, n: usize) -> Self {
        self.max_results = n;
        self
    }

    pub fn with_max_transfers_per_leg(mut self, n: usize) -> Self {
        self.max_transfers_per_leg = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_connection_mins: 10,
            max_departures: 20,
            max_results: 10,
            max_transfers_per_leg: 3,
            timeout: Duration::from_secs(30),
        }
    }
}
