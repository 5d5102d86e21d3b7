//! Parsers for the plain-text ViaggiaTreno endpoints.
//!
//! Two autocomplete endpoints answer with one record per line instead of
//! JSON. Malformed lines are skipped rather than failing the whole response.

use chrono::{DateTime, Utc};

use super::types::{StationMatch, TrainMatch};

/// Format a query time the way the `partenze`/`arrivi` endpoints expect it,
/// e.g. `Fri Mar 15 2024 10:00:00 GMT+0000`.
pub fn format_query_time(when: DateTime<Utc>) -> String {
    when.format("%a %b %d %Y %H:%M:%S GMT%z").to_string()
}

/// Parse `NAME|ID` lines from `autocompletaStazione`.
pub fn parse_station_lines(body: &str) -> Vec<StationMatch> {
    body.lines()
        .filter_map(|line| {
            let (name, id) = line.split_once('|')?;
            let (name, id) = (name.trim(), id.trim());
            if id.is_empty() || id.contains('|') {
                return None;
            }
            Some(StationMatch {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Parse `NUMBER - ORIGIN|NUMBER-ORIGIN_ID-TIMESTAMP` lines from
/// `cercaNumeroTrenoTrenoAutocomplete`.
pub fn parse_train_lines(body: &str) -> Vec<TrainMatch> {
    body.lines()
        .filter_map(|line| {
            let (display, data) = line.split_once('|')?;

            let origin = display
                .split_once(" - ")
                .map(|(_, origin)| origin.trim().to_string())
                .unwrap_or_default();

            let parts: Vec<&str> = data.trim().split('-').collect();
            if parts.len() < 3 {
                return None;
            }

            // An unparseable timestamp still identifies the origin; keep it as 0.
            let departure_ts = parts[parts.len() - 1].parse().unwrap_or(0);

            Some(TrainMatch {
                number: parts[0].to_string(),
                origin,
                origin_id: parts[1].to_string(),
                departure_ts,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_time_format() {
        let when = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(format_query_time(when), "Fri Mar 15 2024 10:00:00 GMT+0000");
    }

    #[test]
    fn station_lines() {
        let body = "MILANO CENTRALE|S01700\nMILANO LAMBRATE|S01701\ngarbage\n|\n";
        let stations = parse_station_lines(body);

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "S01700");
        assert_eq!(stations[0].name, "MILANO CENTRALE");
        assert_eq!(stations[1].id, "S01701");
    }

    #[test]
    fn train_lines() {
        let body = "9531 - MILANO CENTRALE|9531-S01700-1710496800000\n\
                    9531 - TORINO P.NUOVA|9531-S00219-1710489600000\n\
                    broken line\n\
                    1 - X|1-2\n";
        let matches = parse_train_lines(body);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].number, "9531");
        assert_eq!(matches[0].origin, "MILANO CENTRALE");
        assert_eq!(matches[0].origin_id, "S01700");
        assert_eq!(matches[0].departure_ts, 1_710_496_800_000);
        assert_eq!(matches[1].origin_id, "S00219");
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(parse_station_lines("").is_empty());
        assert!(parse_train_lines("").is_empty());
    }
}
