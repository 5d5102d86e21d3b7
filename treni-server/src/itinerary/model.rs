//! Itinerary types.
//!
//! A `Solution` is a complete trip from origin to destination made of one
//! or more train `Leg`s.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::viaggiatreno::TrainJourney;

/// Errors building a solution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolutionError {
    /// Solution has no legs
    #[error("solution must have at least one leg")]
    Empty,

    /// Leg arrives before it departs
    #[error("leg {train} arrives before it departs")]
    InvalidLeg { train: String },

    /// Consecutive legs don't share a station
    #[error("legs do not connect: {from} then {to}")]
    NotContiguous { from: String, to: String },

    /// Next leg departs before the previous one arrives
    #[error("leg {train} departs before the previous leg arrives")]
    Overlapping { train: String },
}

/// Station reference used in legs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StationRef {
    pub id: String,
    pub name: String,
}

/// One uninterrupted train segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leg {
    pub train_number: String,
    /// Category code, e.g. `REG`, `FR`.
    pub category: String,
    pub from: StationRef,
    pub to: StationRef,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    /// Departure platform, actual if announced.
    pub platform: Option<String>,
    /// Current delay of the train (minutes).
    pub delay: i32,
}

impl Leg {
    /// Leg riding `journey` from stop `board` to stop `alight`.
    ///
    /// Returns `None` if the indices are out of order or out of bounds, or
    /// the scheduled times are missing.
    pub fn from_journey(journey: &TrainJourney, board: usize, alight: usize) -> Option<Self> {
        if board >= alight {
            return None;
        }
        let from = journey.stops.get(board)?;
        let to = journey.stops.get(alight)?;

        Some(Self {
            train_number: journey.train_number.to_string(),
            category: journey.category.clone(),
            from: StationRef {
                id: from.station_id.clone(),
                name: from.station_name.clone(),
            },
            to: StationRef {
                id: to.station_id.clone(),
                name: to.station_name.clone(),
            },
            departure_at: from.departure_at()?,
            arrival_at: to.arrival_at()?,
            platform: from.effective_platform().map(str::to_string),
            delay: journey.delay,
        })
    }

    pub fn duration(&self) -> TimeDelta {
        self.arrival_at.signed_duration_since(self.departure_at)
    }
}

/// A complete itinerary.
///
/// # Invariants
///
/// - At least one leg
/// - Each leg arrives no earlier than it departs
/// - Consecutive legs connect: `legs[i].to == legs[i + 1].from`
/// - Each leg departs no earlier than the previous one arrives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    legs: Vec<Leg>,
}

impl Solution {
    /// Build a solution from legs in travel order.
    pub fn new(legs: Vec<Leg>) -> Result<Self, SolutionError> {
        let mut iter = legs.into_iter();
        let first = iter.next().ok_or(SolutionError::Empty)?;
        let mut solution = Self::direct(first)?;
        for leg in iter {
            solution.push_leg(leg)?;
        }
        Ok(solution)
    }

    /// Single-leg solution.
    pub fn direct(leg: Leg) -> Result<Self, SolutionError> {
        check_leg(&leg)?;
        Ok(Self { legs: vec![leg] })
    }

    /// Append a leg after the current last one.
    pub fn push_leg(&mut self, leg: Leg) -> Result<(), SolutionError> {
        check_leg(&leg)?;
        if let Some(last) = self.legs.last() {
            if last.to.id != leg.from.id {
                return Err(SolutionError::NotContiguous {
                    from: last.to.id.clone(),
                    to: leg.from.id.clone(),
                });
            }
            if leg.departure_at < last.arrival_at {
                return Err(SolutionError::Overlapping {
                    train: leg.train_number.clone(),
                });
            }
        }
        self.legs.push(leg);
        Ok(())
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn departure_at(&self) -> DateTime<Utc> {
        self.legs[0].departure_at
    }

    pub fn arrival_at(&self) -> DateTime<Utc> {
        self.legs[self.legs.len() - 1].arrival_at
    }

    pub fn duration(&self) -> TimeDelta {
        self.arrival_at().signed_duration_since(self.departure_at())
    }

    /// Number of train changes (0 for a direct train).
    pub fn changes(&self) -> usize {
        self.legs.len() - 1
    }

    pub fn origin(&self) -> &StationRef {
        &self.legs[0].from
    }

    pub fn destination(&self) -> &StationRef {
        &self.legs[self.legs.len() - 1].to
    }
}

fn check_leg(leg: &Leg) -> Result<(), SolutionError> {
    if leg.arrival_at < leg.departure_at {
        return Err(SolutionError::InvalidLeg {
            train: leg.train_number.clone(),
        });
    }
    Ok(())
}
