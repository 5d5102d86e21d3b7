//! Itinerary search.
//!
//! Finds direct and one-transfer solutions between two stations using live
//! departure boards and train journeys.

mod config;
mod model;
mod rank;
mod search;

pub use config::SearchConfig;
pub use model::{Leg, Solution, SolutionError, StationRef};
pub use rank::{deduplicate, rank_solutions};
pub use search::{ItineraryEngine, SearchError};
