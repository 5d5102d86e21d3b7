//! Station data: persisted store, live fallback and bulk import.
//!
//! The persisted store acts as a fast, possibly stale copy of the live
//! API's station list. [`CompositeStationProvider`] answers from the store
//! when it can and falls back to the API, writing live answers back.
//! [`ImportScheduler`] keeps the store topped up with full imports.

mod error;
mod memory;
mod model;
mod provider;
mod repository;
mod scheduler;
mod source;
mod sqlite;
mod write_through;

pub use error::{StationError, StoreError};
pub use memory::MemoryStore;
pub use model::{DataFreshness, ImportMetadata, ImportStatus, StationRecord};
pub use provider::{CompositeStationProvider, DEFAULT_STALENESS_AGE};
pub use repository::{ImportMetadataRepository, StationRepository};
pub use scheduler::{ImportConfig, ImportScheduler, STATIONS_ENTITY, SchedulerHandle};
pub use source::{LIVE_SOURCE, LiveSource, STORE_SOURCE, StationSource, StoreSource};
pub use sqlite::SqliteStore;
pub use write_through::{DEFAULT_QUEUE_CAPACITY, WriteEvent, WriteOutcome, WriteThrough};
