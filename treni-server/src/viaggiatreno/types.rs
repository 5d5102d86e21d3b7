//! ViaggiaTreno API records.
//!
//! These types map directly to the ViaggiaTreno JSON responses (field names
//! are Italian on the wire). They are also the payloads stored in the TTL
//! cache, so every type round-trips through serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circulation state flag for a cancelled train.
const CIRCULATION_CANCELLED: i32 = 1;

/// Circulation state flag for a partially cancelled train.
const CIRCULATION_PARTIALLY_CANCELLED: i32 = 2;

/// Stop type flag for a suppressed (skipped) stop.
const STOP_SUPPRESSED: i32 = 3;

/// Convert an epoch-millisecond timestamp to a UTC datetime.
///
/// Returns `None` for zero (the API's "unknown") or out-of-range values.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

/// Station returned by the autocomplete endpoint (`NAME|ID` lines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMatch {
    pub id: String,
    pub name: String,
}

/// Detailed station info from `cercaStazione`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDetail {
    pub id: String,
    #[serde(rename = "nomeLungo", default)]
    pub long_name: String,
    #[serde(rename = "nomeBreve", default)]
    pub short_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "lat", default)]
    pub latitude: f64,
    #[serde(rename = "lon", default)]
    pub longitude: f64,
    #[serde(rename = "codiceRegione", default)]
    pub region: i32,
}

/// Train-number resolution result: which origin a train number departs from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainMatch {
    pub number: String,
    pub origin: String,
    pub origin_id: String,
    /// Departure timestamp (epoch ms) identifying the run.
    pub departure_ts: i64,
}

/// A train on a station departure board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    #[serde(rename = "numeroTreno")]
    pub train_number: i64,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "categoriaDescrizione", default)]
    pub category_description: String,
    #[serde(rename = "origine", default)]
    pub origin: String,
    #[serde(rename = "codOrigine", default)]
    pub origin_id: String,
    #[serde(rename = "destinazione", default)]
    pub destination: String,
    /// Scheduled departure from the queried station (epoch ms).
    #[serde(rename = "orarioPartenza", default)]
    pub departure_time: i64,
    #[serde(rename = "ritardo", default)]
    pub delay: i32,
    #[serde(rename = "binarioProgrammatoPartenzaDescrizione", default)]
    pub platform: Option<String>,
    #[serde(rename = "binarioEffettivoPartenzaDescrizione", default)]
    pub actual_platform: Option<String>,
    /// 0 = running, 1 = cancelled, 2 = partially cancelled.
    #[serde(rename = "provvedimento", default)]
    pub circulation_state: i32,
    #[serde(rename = "inStazione", default)]
    pub in_station: bool,
    #[serde(rename = "nonPartito", default)]
    pub not_departed: bool,
}

impl Departure {
    pub fn is_cancelled(&self) -> bool {
        self.circulation_state == CIRCULATION_CANCELLED
    }

    pub fn is_partially_cancelled(&self) -> bool {
        self.circulation_state == CIRCULATION_PARTIALLY_CANCELLED
    }

    /// Scheduled departure as a datetime, if the board carried one.
    pub fn departure_at(&self) -> Option<DateTime<Utc>> {
        from_epoch_millis(self.departure_time)
    }

    /// Actual platform if announced, otherwise the scheduled one.
    pub fn effective_platform(&self) -> Option<&str> {
        effective(&self.actual_platform, &self.platform)
    }
}

/// A train on a station arrivals board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    #[serde(rename = "numeroTreno")]
    pub train_number: i64,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "categoriaDescrizione", default)]
    pub category_description: String,
    #[serde(rename = "origine", default)]
    pub origin: String,
    #[serde(rename = "destinazione", default)]
    pub destination: String,
    #[serde(rename = "orarioArrivo", default)]
    pub arrival_time: i64,
    #[serde(rename = "ritardo", default)]
    pub delay: i32,
    #[serde(rename = "binarioProgrammatoArrivoDescrizione", default)]
    pub platform: Option<String>,
    #[serde(rename = "binarioEffettivoArrivoDescrizione", default)]
    pub actual_platform: Option<String>,
    #[serde(rename = "provvedimento", default)]
    pub circulation_state: i32,
}

impl Arrival {
    pub fn is_cancelled(&self) -> bool {
        self.circulation_state == CIRCULATION_CANCELLED
    }

    pub fn arrival_at(&self) -> Option<DateTime<Utc>> {
        from_epoch_millis(self.arrival_time)
    }

    pub fn effective_platform(&self) -> Option<&str> {
        effective(&self.actual_platform, &self.platform)
    }
}

/// Full journey of a train run (`andamentoTreno`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainJourney {
    #[serde(rename = "numeroTreno")]
    pub train_number: i64,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "origine", default)]
    pub origin: String,
    #[serde(rename = "idOrigine", default)]
    pub origin_id: String,
    #[serde(rename = "destinazione", default)]
    pub destination: String,
    #[serde(rename = "idDestinazione", default)]
    pub destination_id: String,
    #[serde(rename = "orarioPartenza", default)]
    pub departure_time: i64,
    #[serde(rename = "orarioArrivo", default)]
    pub arrival_time: i64,
    #[serde(rename = "ritardo", default)]
    pub delay: i32,
    #[serde(rename = "provvedimento", default)]
    pub circulation_state: i32,
    #[serde(rename = "stazioneUltimoRilevamento", default)]
    pub last_detection: Option<String>,
    #[serde(rename = "oraUltimoRilevamento", default)]
    pub last_detection_time: Option<i64>,
    /// Ordered stop list, origin first.
    #[serde(rename = "fermate", default)]
    pub stops: Vec<Stop>,
}

impl TrainJourney {
    pub fn is_cancelled(&self) -> bool {
        self.circulation_state == CIRCULATION_CANCELLED
    }

    /// Index of the first stop at `station_id` at or after `from`.
    pub fn find_stop(&self, station_id: &str, from: usize) -> Option<usize> {
        self.stops
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, s)| s.station_id == station_id)
            .map(|(i, _)| i)
    }

    /// Whether the train calls at `station_id` anywhere on its run.
    pub fn calls_at(&self, station_id: &str) -> bool {
        self.stops.iter().any(|s| s.station_id == station_id)
    }
}

/// One stop of a train journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "id")]
    pub station_id: String,
    #[serde(rename = "stazione", default)]
    pub station_name: String,
    /// P = origin, A = destination, F = intermediate.
    #[serde(rename = "tipoFermata", default)]
    pub stop_type: String,
    #[serde(rename = "arrivo_teorico", default)]
    pub scheduled_arrival: Option<i64>,
    #[serde(rename = "partenza_teorica", default)]
    pub scheduled_departure: Option<i64>,
    #[serde(rename = "arrivoReale", default)]
    pub actual_arrival: Option<i64>,
    #[serde(rename = "partenzaReale", default)]
    pub actual_departure: Option<i64>,
    #[serde(rename = "ritardoArrivo", default)]
    pub arrival_delay: i32,
    #[serde(rename = "ritardoPartenza", default)]
    pub departure_delay: i32,
    #[serde(rename = "binarioProgrammatoArrivoDescrizione", default)]
    pub platform: Option<String>,
    #[serde(rename = "binarioEffettivoArrivoDescrizione", default)]
    pub actual_platform: Option<String>,
    /// 1 = regular, 2 = unscheduled, 3 = suppressed, 0 = unknown.
    #[serde(rename = "actualFermataType", default)]
    pub actual_stop_type: i32,
}

impl Stop {
    pub fn is_suppressed(&self) -> bool {
        self.actual_stop_type == STOP_SUPPRESSED
    }

    pub fn arrival_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_arrival.and_then(from_epoch_millis)
    }

    pub fn departure_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_departure.and_then(from_epoch_millis)
    }

    pub fn effective_platform(&self) -> Option<&str> {
        effective(&self.actual_platform, &self.platform)
    }
}

/// Station listed for a region (`elencoStazioni`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStation {
    #[serde(rename = "codiceStazione")]
    pub id: String,
    #[serde(rename = "lat", default)]
    pub latitude: f64,
    #[serde(rename = "lon", default)]
    pub longitude: f64,
    #[serde(rename = "codReg", default)]
    pub region: i32,
    #[serde(rename = "localita", default)]
    pub locality: Locality,
}

impl RegionStation {
    /// Display name (the locality's long name).
    pub fn name(&self) -> &str {
        &self.locality.long_name
    }
}

/// Naming block nested inside [`RegionStation`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    #[serde(rename = "nomeLungo", default)]
    pub long_name: String,
    #[serde(rename = "nomeBreve", default)]
    pub short_name: String,
    #[serde(default)]
    pub id: String,
}

fn effective<'a>(actual: &'a Option<String>, scheduled: &'a Option<String>) -> Option<&'a str> {
    actual
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or_else(|| scheduled.as_deref().filter(|p| !p.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departure_flags() {
        let json = r#"{
            "numeroTreno": 9531,
            "categoria": "FR",
            "codOrigine": "S01700",
            "orarioPartenza": 1710496800000,
            "provvedimento": 1,
            "binarioProgrammatoPartenzaDescrizione": "7",
            "binarioEffettivoPartenzaDescrizione": " "
        }"#;

        let dep: Departure = serde_json::from_str(json).unwrap();
        assert!(dep.is_cancelled());
        assert!(!dep.is_partially_cancelled());
        assert_eq!(dep.effective_platform(), Some("7"));
        assert_eq!(
            dep.departure_at().unwrap().to_rfc3339(),
            "2024-03-15T10:00:00+00:00"
        );
    }

    #[test]
    fn journey_stop_lookup() {
        let json = r#"{
            "numeroTreno": 2135,
            "fermate": [
                {"id": "S01700", "stazione": "MILANO CENTRALE", "partenza_teorica": 1710496800000},
                {"id": "S01820", "stazione": "BRESCIA", "arrivo_teorico": 1710500400000, "actualFermataType": 3},
                {"id": "S02430", "stazione": "VERONA P.N.", "arrivo_teorico": 1710504000000}
            ]
        }"#;

        let journey: TrainJourney = serde_json::from_str(json).unwrap();
        assert_eq!(journey.find_stop("S01820", 0), Some(1));
        assert_eq!(journey.find_stop("S01700", 1), None);
        assert!(journey.calls_at("S02430"));
        assert!(journey.stops[1].is_suppressed());
        assert!(journey.stops[0].arrival_at().is_none());
    }

    #[test]
    fn region_station_name_comes_from_locality() {
        let json = r#"{
            "codiceStazione": "S08409",
            "lat": 41.9,
            "lon": 12.5,
            "codReg": 5,
            "localita": {"nomeLungo": "ROMA TERMINI", "nomeBreve": "Roma Termini", "id": "S08409"}
        }"#;

        let station: RegionStation = serde_json::from_str(json).unwrap();
        assert_eq!(station.name(), "ROMA TERMINI");
        assert_eq!(station.region, 5);
    }

    #[test]
    fn zero_timestamp_is_unknown() {
        assert!(from_epoch_millis(0).is_none());
    }
}
