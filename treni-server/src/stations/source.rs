//! Station data sources: the persisted store and the live API.
//!
//! The set of sources is closed, so [`StationSource`] is an enum over the
//! two implementations rather than a trait object.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::error::StationError;
use super::model::StationRecord;
use super::repository::{StationRepository, blocking};
use crate::viaggiatreno::{ApiError, REGION_COUNT, TransitApi};

/// Name reported by the persisted-store source.
pub const STORE_SOURCE: &str = "store";

/// Name reported by the live-API source.
pub const LIVE_SOURCE: &str = "api";

/// Region listings fetched at once by [`LiveSource::list_all_stations`].
const REGION_FETCH_CONCURRENCY: usize = 4;

/// Stations from the persisted store.
pub struct StoreSource<R> {
    repo: Arc<R>,
}

impl<R: StationRepository + 'static> StoreSource<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Tried first.
    pub fn priority(&self) -> u32 {
        1
    }

    /// Available once the store holds at least one station.
    pub async fn available(&self) -> bool {
        match blocking(&self.repo, |repo| repo.count()).await {
            Ok(count) => count > 0,
            Err(e) => {
                debug!(error = %e, "store count failed, treating store as unavailable");
                false
            }
        }
    }

    pub async fn get_station(&self, id: &str) -> Result<StationRecord, StationError> {
        let id = id.to_string();
        blocking(&self.repo, move |repo| repo.get_by_id(&id))
            .await?
            .ok_or(StationError::NotFound)
    }

    pub async fn search_stations(&self, query: &str) -> Result<Vec<StationRecord>, StationError> {
        let query = query.to_string();
        Ok(blocking(&self.repo, move |repo| repo.search(&query)).await?)
    }

    pub async fn list_all_stations(&self) -> Result<Vec<StationRecord>, StationError> {
        Ok(blocking(&self.repo, |repo| repo.list()).await?)
    }
}

/// Stations straight from the upstream API.
pub struct LiveSource<A> {
    api: A,
}

impl<A: TransitApi> LiveSource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Tried after the store.
    pub fn priority(&self) -> u32 {
        10
    }

    pub fn available(&self) -> bool {
        true
    }

    /// Resolve an ID through autocomplete, keeping only an exact ID match.
    pub async fn get_station(&self, id: &str) -> Result<StationRecord, StationError> {
        let matches = self
            .api
            .autocomplete_station(id)
            .await
            .map_err(live_error)?;
        let now = Utc::now();
        matches
            .iter()
            .find(|m| m.id == id)
            .map(|m| StationRecord::from_match(m, now))
            .ok_or(StationError::NotFound)
    }

    pub async fn search_stations(&self, query: &str) -> Result<Vec<StationRecord>, StationError> {
        let matches = self
            .api
            .autocomplete_station(query)
            .await
            .map_err(live_error)?;
        let now = Utc::now();
        Ok(matches
            .iter()
            .map(|m| StationRecord::from_match(m, now))
            .collect())
    }

    /// Every station of every region. Failing regions are skipped.
    pub async fn list_all_stations(&self) -> Result<Vec<StationRecord>, StationError> {
        let api = &self.api;
        let results: Vec<_> = stream::iter(1..=REGION_COUNT)
            .map(|region| async move { (region, api.region_stations(region).await) })
            .buffered(REGION_FETCH_CONCURRENCY)
            .collect()
            .await;

        let now = Utc::now();
        let mut stations = Vec::new();
        for (region, result) in results {
            match result {
                Ok(listed) => {
                    stations.extend(listed.iter().map(|rs| StationRecord::from_region(rs, now)))
                }
                Err(e) => warn!(region, error = %e, "region listing failed, skipping"),
            }
        }

        if stations.is_empty() {
            return Err(StationError::unavailable(
                LIVE_SOURCE,
                "no region returned any station",
            ));
        }
        Ok(stations)
    }
}

/// Network failures surface as `Upstream`; anything else the API said
/// means this source cannot answer.
fn live_error(err: ApiError) -> StationError {
    if err.is_transport() {
        StationError::Upstream(err)
    } else {
        StationError::unavailable(LIVE_SOURCE, err.to_string())
    }
}

/// One of the station sources a composite provider can consult.
pub enum StationSource<R, A> {
    Store(StoreSource<R>),
    Live(LiveSource<A>),
}

impl<R: StationRepository + 'static, A: TransitApi> StationSource<R, A> {
    pub fn store(repo: Arc<R>) -> Self {
        StationSource::Store(StoreSource::new(repo))
    }

    pub fn live(api: A) -> Self {
        StationSource::Live(LiveSource::new(api))
    }

    pub fn name(&self) -> &'static str {
        match self {
            StationSource::Store(_) => STORE_SOURCE,
            StationSource::Live(_) => LIVE_SOURCE,
        }
    }

    /// Lower is tried first.
    pub fn priority(&self) -> u32 {
        match self {
            StationSource::Store(s) => s.priority(),
            StationSource::Live(s) => s.priority(),
        }
    }

    pub async fn available(&self) -> bool {
        match self {
            StationSource::Store(s) => s.available().await,
            StationSource::Live(s) => s.available(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, StationSource::Live(_))
    }

    pub async fn get_station(&self, id: &str) -> Result<StationRecord, StationError> {
        match self {
            StationSource::Store(s) => s.get_station(id).await,
            StationSource::Live(s) => s.get_station(id).await,
        }
    }

    pub async fn search_stations(&self, query: &str) -> Result<Vec<StationRecord>, StationError> {
        match self {
            StationSource::Store(s) => s.search_stations(query).await,
            StationSource::Live(s) => s.search_stations(query).await,
        }
    }

    pub async fn list_all_stations(&self) -> Result<Vec<StationRecord>, StationError> {
        match self {
            StationSource::Store(s) => s.list_all_stations().await,
            StationSource::Live(s) => s.list_all_stations().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::MemoryStore;
    use crate::viaggiatreno::{Locality, MockClient, RegionStation};

    fn region_station(id: &str, name: &str, region: i32) -> RegionStation {
        RegionStation {
            id: id.into(),
            latitude: 0.0,
            longitude: 0.0,
            region,
            locality: Locality {
                long_name: name.into(),
                short_name: name.into(),
                id: id.into(),
            },
        }
    }

    #[tokio::test]
    async fn live_get_station_requires_exact_id() {
        let mock = MockClient::new();
        mock.add_station("S01700", "MILANO CENTRALE");
        let source = LiveSource::new(mock);

        let station = source.get_station("S01700").await.unwrap();
        assert_eq!(station.name, "MILANO CENTRALE");

        let err = source.get_station("S0170").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn live_errors_are_classified() {
        let mock = MockClient::new();
        mock.set_unavailable(true);
        let source = LiveSource::new(mock);

        let err = source.get_station("S01700").await.unwrap_err();
        assert!(matches!(err, StationError::Upstream(_)));
    }

    #[tokio::test]
    async fn live_list_skips_failing_regions() {
        let mock = MockClient::new();
        mock.set_region(1, vec![region_station("S00219", "TORINO P.NUOVA", 1)]);
        mock.set_region(2, vec![region_station("S01700", "MILANO CENTRALE", 2)]);
        mock.fail_region(2);
        let source = LiveSource::new(mock);

        let stations = source.list_all_stations().await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "S00219");
    }

    #[tokio::test]
    async fn live_list_with_nothing_is_unavailable() {
        let source = LiveSource::new(MockClient::new());
        let err = source.list_all_stations().await.unwrap_err();
        assert!(matches!(err, StationError::SourceUnavailable { .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn store_availability_needs_rows() {
        let store = Arc::new(MemoryStore::new());
        let source = StoreSource::new(store.clone());
        assert!(!source.available().await);

        let roma = StationRecord::from_region(&region_station("S00219", "ROMA", 5), Utc::now());
        store.upsert(&roma).unwrap();
        assert!(source.available().await);
        assert_eq!(source.get_station("S00219").await.unwrap().name, "ROMA");
        assert!(matches!(
            source.get_station("S99999").await,
            Err(StationError::NotFound)
        ));

        store.set_failing(true);
        assert!(!source.available().await);
        assert!(matches!(
            source.search_stations("roma").await,
            Err(StationError::Store(_))
        ));
    }

    #[test]
    fn source_identity() {
        let store: StationSource<MemoryStore, MockClient> =
            StationSource::store(Arc::new(MemoryStore::new()));
        let live: StationSource<MemoryStore, MockClient> = StationSource::live(MockClient::new());

        assert_eq!((store.name(), store.priority()), ("store", 1));
        assert_eq!((live.name(), live.priority()), ("api", 10));
        assert!(live.is_live() && !store.is_live());
    }
}
