//! Station records and import bookkeeping.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::viaggiatreno::{RegionStation, StationMatch};

/// A station as held by the persisted store and the live source.
///
/// `id` is the canonical identity (e.g. `S01700`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    /// Region code, `0` when unknown.
    pub region: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl StationRecord {
    /// Record from an autocomplete match (no region or coordinates).
    pub fn from_match(m: &StationMatch, now: DateTime<Utc>) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            region: 0,
            latitude: 0.0,
            longitude: 0.0,
            updated_at: now,
        }
    }

    /// Record from a regional station listing.
    pub fn from_region(rs: &RegionStation, now: DateTime<Utc>) -> Self {
        Self {
            id: rs.id.clone(),
            name: rs.name().to_string(),
            region: rs.region,
            latitude: rs.latitude,
            longitude: rs.longitude,
            updated_at: now,
        }
    }
}

/// Where a response came from and how old it is.
///
/// Computed per response, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataFreshness {
    /// Name of the data source that answered.
    pub source: String,
    pub last_updated: DateTime<Utc>,
    pub is_stale: bool,
}

impl DataFreshness {
    pub fn new(
        source: &str,
        last_updated: DateTime<Utc>,
        staleness_age: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.to_string(),
            last_updated,
            is_stale: is_older_than(last_updated, staleness_age, now),
        }
    }
}

/// `now - then > age`, saturating for ages chrono cannot represent.
pub(crate) fn is_older_than(then: DateTime<Utc>, age: Duration, now: DateTime<Utc>) -> bool {
    match TimeDelta::from_std(age) {
        Ok(age) => now.signed_duration_since(then) > age,
        Err(_) => false,
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    InProgress,
    Success,
    PartialFailure,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::InProgress => "in_progress",
            ImportStatus::Success => "success",
            ImportStatus::PartialFailure => "partial_failure",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ImportStatus::InProgress),
            "success" => Ok(ImportStatus::Success),
            "partial_failure" => Ok(ImportStatus::PartialFailure),
            other => Err(format!("unknown import status: {other}")),
        }
    }
}

/// Last import of one entity type. One row per entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub entity_type: String,
    pub last_import: DateTime<Utc>,
    pub record_count: usize,
    pub duration_ms: i64,
    pub status: ImportStatus,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn freshness_staleness() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let week = Duration::from_secs(7 * 24 * 3600);

        let fresh = DataFreshness::new("store", now - TimeDelta::days(1), week, now);
        assert!(!fresh.is_stale);
        assert_eq!(fresh.source, "store");

        let stale = DataFreshness::new("store", now - TimeDelta::days(8), week, now);
        assert!(stale.is_stale);
    }

    #[test]
    fn exact_age_is_not_stale() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let then = now - TimeDelta::hours(1);
        assert!(!is_older_than(then, Duration::from_secs(3600), now));
        assert!(is_older_than(then, Duration::from_secs(3599), now));
    }

    #[test]
    fn import_status_strings() {
        for status in [
            ImportStatus::InProgress,
            ImportStatus::Success,
            ImportStatus::PartialFailure,
        ] {
            assert_eq!(status.as_str().parse::<ImportStatus>(), Ok(status));
        }
        assert!("done".parse::<ImportStatus>().is_err());
    }

    #[test]
    fn record_from_region_listing() {
        let rs: RegionStation = serde_json::from_str(
            r#"{"codiceStazione": "S08409", "lat": 41.9, "lon": 12.5, "codReg": 5,
                "localita": {"nomeLungo": "ROMA TERMINI"}}"#,
        )
        .unwrap();
        let now = Utc::now();
        let record = StationRecord::from_region(&rs, now);

        assert_eq!(record.id, "S08409");
        assert_eq!(record.name, "ROMA TERMINI");
        assert_eq!(record.region, 5);
        assert_eq!(record.updated_at, now);
    }
}
