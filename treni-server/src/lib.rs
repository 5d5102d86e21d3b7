//! Italian rail itinerary service.
//!
//! Answers "how do I get from this station to that one?" using the
//! ViaggiaTreno real-time API, behind a TTL cache, with a locally persisted
//! station directory kept fresh by a background importer.

pub mod cache;
pub mod config;
pub mod itinerary;
pub mod stations;
pub mod viaggiatreno;
