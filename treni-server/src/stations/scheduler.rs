//! Periodic bulk import of the station list.
//!
//! On every tick the scheduler checks whether the last station import is
//! older than the configured maximum age and, if so, walks every region of
//! the live API and upserts what it finds. A failing region is logged and
//! counted; the import carries on with the rest and records
//! `partial_failure`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::StoreError;
use super::model::{ImportMetadata, ImportStatus, StationRecord};
use super::repository::{ImportMetadataRepository, StationRepository, blocking};
use crate::viaggiatreno::{REGION_COUNT, TransitApi};

/// Entity type under which station imports are recorded.
pub const STATIONS_ENTITY: &str = "stations";

/// Shortest tick the loop accepts; `tokio::time::interval` rejects zero.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the import scheduler.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// How often to check whether an import is due
    pub refresh_interval: Duration,
    /// Age after which the station set is re-imported
    pub max_age: Duration,
    /// Regions fetched, `1..=regions`
    pub regions: u8,
}

impl ImportConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_regions(mut self, regions: u8) -> Self {
        self.regions = regions;
        self
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            regions: REGION_COUNT,
        }
    }
}

/// Bulk station importer.
///
/// Talks to the API client it is given directly; pass an uncached client,
/// since a full import is itself the refresh.
pub struct ImportScheduler<A, S> {
    api: A,
    store: Arc<S>,
    config: ImportConfig,
}

impl<A, S> ImportScheduler<A, S>
where
    A: TransitApi + 'static,
    S: StationRepository + ImportMetadataRepository + 'static,
{
    pub fn new(api: A, store: Arc<S>, config: ImportConfig) -> Self {
        Self { api, store, config }
    }

    /// Start the background loop. The first check runs immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let period = self.config.refresh_interval.max(MIN_REFRESH_INTERVAL);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => self.check_and_refresh().await,
                }
            }
            info!("import scheduler stopped");
        });

        SchedulerHandle {
            stop: Some(stop_tx),
            task,
        }
    }

    /// Whether the stored station set is missing or older than `max_age`.
    pub async fn should_refresh(&self) -> Result<bool, StoreError> {
        let max_age = self.config.max_age;
        blocking(&self.store, move |store| {
            store.should_refresh(STATIONS_ENTITY, max_age, Utc::now())
        })
        .await
    }

    /// Import now, regardless of staleness.
    pub async fn force_refresh(&self) -> ImportMetadata {
        self.import_all_stations().await
    }

    pub async fn last_import_status(&self) -> Result<Option<ImportMetadata>, StoreError> {
        blocking(&self.store, |store| store.get_metadata(STATIONS_ENTITY)).await
    }

    async fn check_and_refresh(&self) {
        match self.should_refresh().await {
            Ok(true) => {
                info!("station data is stale, starting scheduled import");
                self.import_all_stations().await;
            }
            Ok(false) => {}
            Err(e) => error!(error = %e, "failed to read import metadata"),
        }
    }

    async fn save_metadata(&self, meta: &ImportMetadata) -> Result<(), StoreError> {
        let meta = meta.clone();
        blocking(&self.store, move |store| store.upsert_metadata(&meta)).await
    }

    async fn import_all_stations(&self) -> ImportMetadata {
        let started = Instant::now();

        // The in-progress row keeps the previous import time, so an
        // interrupted import is still due on the next check.
        let previous_import = match self.last_import_status().await {
            Ok(previous) => previous.map(|m| m.last_import),
            Err(e) => {
                warn!(error = %e, "failed to read previous import metadata");
                None
            }
        };
        let mut meta = ImportMetadata {
            entity_type: STATIONS_ENTITY.to_string(),
            last_import: previous_import.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            record_count: 0,
            duration_ms: 0,
            status: ImportStatus::InProgress,
            error_message: None,
        };
        if let Err(e) = self.save_metadata(&meta).await {
            warn!(error = %e, "failed to record import start");
        }

        let mut imported = 0;
        let mut failed_regions = 0;

        for region in 1..=self.config.regions {
            let listed = match self.api.region_stations(region).await {
                Ok(listed) => listed,
                Err(e) => {
                    warn!(region, error = %e, "failed to fetch region");
                    failed_regions += 1;
                    continue;
                }
            };

            let now = Utc::now();
            let records: Vec<StationRecord> = listed
                .iter()
                .map(|rs| StationRecord::from_region(rs, now))
                .collect();
            let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

            let written = blocking(&self.store, move |store| store.upsert_many(&records)).await;
            let stored = match written {
                Ok(outcomes) => {
                    let mut stored = 0;
                    for (id, outcome) in ids.iter().zip(outcomes) {
                        match outcome {
                            Ok(()) => stored += 1,
                            Err(e) => warn!(station = %id, error = %e, "failed to upsert station"),
                        }
                    }
                    stored
                }
                Err(e) => {
                    warn!(region, error = %e, "failed to store region");
                    0
                }
            };
            imported += stored;
            info!(region, listed = listed.len(), stored, "imported region");
        }

        meta.last_import = Utc::now();
        meta.record_count = imported;
        meta.duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        if failed_regions == 0 {
            meta.status = ImportStatus::Success;
        } else {
            meta.status = ImportStatus::PartialFailure;
            meta.error_message = Some(format!(
                "{failed_regions} of {} regions failed to import",
                self.config.regions
            ));
        }

        if let Err(e) = self.save_metadata(&meta).await {
            error!(error = %e, "failed to save import metadata");
        }

        info!(
            stations = meta.record_count,
            duration_ms = meta.duration_ms,
            status = %meta.status,
            "station import complete"
        );
        meta
    }
}

/// Running scheduler loop.
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for it to exit. An import in progress is
    /// finished first.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "import scheduler task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
