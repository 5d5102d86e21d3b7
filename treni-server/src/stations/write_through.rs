//! Background persistence of live lookups into the station store.
//!
//! Batches go through a bounded queue drained by a single worker task.
//! Enqueueing never waits: a full queue drops the batch. Every upsert
//! publishes a [`WriteEvent`], so completion can be observed without
//! polling the store. Failures are logged and never retried.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::model::StationRecord;
use super::repository::{StationRepository, blocking};

/// Default number of queued batches.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Buffered events per subscriber before slow receivers start lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Failed(String),
}

/// Result of persisting one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub station_id: String,
    pub outcome: WriteOutcome,
}

/// Handle to the write-through worker. Cheap to clone.
///
/// The worker exits once every handle has been dropped and the queue is
/// drained.
#[derive(Clone)]
pub struct WriteThrough {
    queue: mpsc::Sender<Vec<StationRecord>>,
    events: broadcast::Sender<WriteEvent>,
}

impl WriteThrough {
    /// Spawn the worker on the current runtime.
    pub fn spawn<R>(repo: Arc<R>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        R: StationRepository + 'static,
    {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let worker = tokio::spawn(run_worker(repo, rx, events.clone()));
        (Self { queue, events }, worker)
    }

    /// Queue stations for persistence. Returns `false` if the batch was
    /// dropped.
    pub fn enqueue(&self, stations: Vec<StationRecord>) -> bool {
        if stations.is_empty() {
            return true;
        }
        let count = stations.len();
        match self.queue.try_send(stations) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(count, "write-through queue full, dropping batch");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(count, "write-through worker stopped, dropping batch");
                false
            }
        }
    }

    /// Receive an event for every station the worker persists from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WriteEvent> {
        self.events.subscribe()
    }
}

async fn run_worker<R: StationRepository + 'static>(
    repo: Arc<R>,
    mut rx: mpsc::Receiver<Vec<StationRecord>>,
    events: broadcast::Sender<WriteEvent>,
) {
    while let Some(batch) = rx.recv().await {
        let ids: Vec<String> = batch.iter().map(|s| s.id.clone()).collect();
        let outcomes: Vec<Result<(), String>> =
            match blocking(&repo, move |repo| repo.upsert_many(&batch)).await {
                Ok(outcomes) => outcomes
                    .into_iter()
                    .map(|r| r.map_err(|e| e.to_string()))
                    .collect(),
                Err(e) => {
                    warn!(count = ids.len(), error = %e, "write-through batch failed");
                    vec![Err(e.to_string()); ids.len()]
                }
            };

        for (station_id, result) in ids.into_iter().zip(outcomes) {
            let outcome = match result {
                Ok(()) => {
                    debug!(station = %station_id, "write-through stored station");
                    WriteOutcome::Written
                }
                Err(e) => {
                    warn!(station = %station_id, error = %e, "write-through upsert failed");
                    WriteOutcome::Failed(e)
                }
            };
            // No subscribers is the normal case.
            let _ = events.send(WriteEvent {
                station_id,
                outcome,
            });
        }
    }
    debug!("write-through worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::{MemoryStore, SqliteStore};
    use chrono::Utc;

    fn station(id: &str) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: format!("STATION {id}"),
            region: 0,
            latitude: 0.0,
            longitude: 0.0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn persists_and_reports_each_station() {
        let store = Arc::new(MemoryStore::new());
        store.fail_upserts_for("S2");
        let (wt, _worker) = WriteThrough::spawn(store.clone(), 4);
        let mut events = wt.subscribe();

        assert!(wt.enqueue(vec![station("S1"), station("S2")]));

        let first = events.recv().await.unwrap();
        assert_eq!(first.station_id, "S1");
        assert_eq!(first.outcome, WriteOutcome::Written);

        let second = events.recv().await.unwrap();
        assert_eq!(second.station_id, "S2");
        assert!(matches!(second.outcome, WriteOutcome::Failed(_)));

        assert!(store.get_by_id("S1").unwrap().is_some());
        assert!(store.get_by_id("S2").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_batch_reports_every_station() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let (wt, _worker) = WriteThrough::spawn(store, 4);
        let mut events = wt.subscribe();

        assert!(wt.enqueue(vec![station("S1"), station("S2")]));

        for expected in ["S1", "S2"] {
            let event = events.recv().await.unwrap();
            assert_eq!(event.station_id, expected);
            assert!(matches!(event.outcome, WriteOutcome::Failed(_)));
        }
    }

    #[tokio::test]
    async fn batches_persist_into_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let (wt, worker) = WriteThrough::spawn(store.clone(), 4);

        wt.enqueue(vec![station("S1"), station("S2"), station("S3")]);
        drop(wt);
        worker.await.unwrap();

        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_batch() {
        let store = Arc::new(MemoryStore::new());
        let (wt, _worker) = WriteThrough::spawn(store, 1);

        // The worker cannot run until this task yields, so the second
        // batch finds the single slot taken.
        assert!(wt.enqueue(vec![station("S1")]));
        assert!(!wt.enqueue(vec![station("S2")]));
    }

    #[tokio::test]
    async fn worker_exits_when_handles_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (wt, worker) = WriteThrough::spawn(store.clone(), 4);
        wt.enqueue(vec![station("S1")]);
        drop(wt);

        worker.await.unwrap();
        assert_eq!(store.upsert_count(), 1);
    }
}
