//! Solution ranking for search results.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::model::Solution;

/// Identity of a solution: the trains ridden and when.
type SolutionKey = Vec<(String, String, DateTime<Utc>, String, DateTime<Utc>)>;

fn key(solution: &Solution) -> SolutionKey {
    solution
        .legs()
        .iter()
        .map(|leg| {
            (
                leg.train_number.clone(),
                leg.from.id.clone(),
                leg.departure_at,
                leg.to.id.clone(),
                leg.arrival_at,
            )
        })
        .collect()
}

/// Drop solutions identical to an earlier one (same trains, same times).
pub fn deduplicate(solutions: Vec<Solution>) -> Vec<Solution> {
    let mut seen = HashSet::new();
    solutions
        .into_iter()
        .filter(|s| seen.insert(key(s)))
        .collect()
}

/// Deduplicate, order by arrival time (earliest first) and keep the best
/// `max_results`.
///
/// Arrival time is the only ordering key; ties keep their input order.
pub fn rank_solutions(solutions: Vec<Solution>, max_results: usize) -> Vec<Solution> {
    let mut solutions = deduplicate(solutions);
    solutions.sort_by_key(|s| s.arrival_at());
    solutions.truncate(max_results);
    solutions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::model::{Leg, StationRef};
    use chrono::{TimeDelta, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap()
    }

    fn direct(train: &str, dep_mins: i64, arr_mins: i64) -> Solution {
        Solution::direct(Leg {
            train_number: train.into(),
            category: "REG".into(),
            from: StationRef {
                id: "A".into(),
                name: "ALPHA".into(),
            },
            to: StationRef {
                id: "D".into(),
                name: "DELTA".into(),
            },
            departure_at: base() + TimeDelta::minutes(dep_mins),
            arrival_at: base() + TimeDelta::minutes(arr_mins),
            platform: None,
            delay: 0,
        })
        .unwrap()
    }

    #[test]
    fn rank_by_arrival() {
        let ranked = rank_solutions(
            vec![direct("1", 0, 90), direct("2", 10, 60), direct("3", 5, 75)],
            10,
        );
        let trains: Vec<_> = ranked
            .iter()
            .map(|s| s.legs()[0].train_number.as_str())
            .collect();
        assert_eq!(trains, vec!["2", "3", "1"]);
    }

    #[test]
    fn duplicates_removed() {
        let ranked = rank_solutions(
            vec![direct("1", 0, 60), direct("1", 0, 60), direct("2", 0, 60)],
            10,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn truncates_to_max_results() {
        let solutions = (0..15).map(|i| direct(&i.to_string(), i, 60 + i)).collect();
        let ranked = rank_solutions(solutions, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[9].legs()[0].train_number, "9");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ranked_is_bounded_and_ordered(
                arrivals in proptest::collection::vec(1i64..600, 0..40),
                max_results in 0usize..15,
            ) {
                let solutions: Vec<Solution> = arrivals
                    .iter()
                    .enumerate()
                    .map(|(i, &arr)| direct(&i.to_string(), 0, arr))
                    .collect();
                let input_len = solutions.len();

                let ranked = rank_solutions(solutions, max_results);

                prop_assert!(ranked.len() <= max_results);
                prop_assert_eq!(ranked.len(), input_len.min(max_results));
                for pair in ranked.windows(2) {
                    prop_assert!(pair[0].arrival_at() <= pair[1].arrival_at());
                }
            }
        }
    }
}
