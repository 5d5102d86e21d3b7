//! ViaggiaTreno HTTP client.
//!
//! Provides async methods for querying the ViaggiaTreno REST API.
//! Handles per-request deadlines, concurrency limiting, and decoding to
//! the record types in [`super::types`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

use super::error::ApiError;
use super::parse::{format_query_time, parse_station_lines, parse_train_lines};
use super::types::{
    Arrival, Departure, RegionStation, StationDetail, StationMatch, TrainJourney, TrainMatch,
};
use super::TransitApi;

/// Default base URL for the ViaggiaTreno API.
pub const DEFAULT_BASE_URL: &str =
    "http://www.viaggiatreno.it/infomobilita/resteasy/viaggiatreno";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default request deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the ViaggiaTreno client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (defaults to production ViaggiaTreno)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Deadline applied to every request
    pub timeout: Duration,
}

impl ClientConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// ViaggiaTreno API client.
///
/// Cheap to clone; clones share the connection pool and the concurrency
/// limit. The semaphore keeps bursts (an itinerary search fans out to tens
/// of calls) under the upstream's rate limit.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl HttpClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ApiError::NotConfigured(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::NotConfigured("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET an endpoint; `None` when the API answers 204 No Content.
    async fn get_text(&self, segments: &[&str]) -> Result<Option<String>, ApiError> {
        let url = self.endpoint(segments)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::NotConfigured("client semaphore closed".to_string()))?;

        let response = self.http.get(url).send().await.map_err(map_reqwest)?;
        let status = response.status();

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let body = response.text().await.map_err(map_reqwest)?;
        Ok(Some(body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, ApiError> {
        let Some(body) = self.get_text(segments).await? else {
            return Ok(None);
        };

        // The API answers "null" or an empty body for unknown runs
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }

        serde_json::from_str(&body).map(Some).map_err(|e| ApiError::Decode {
            message: format!("{e} (body: {})", body.chars().take(200).collect::<String>()),
        })
    }
}

fn map_reqwest(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Http(err)
    }
}

impl TransitApi for HttpClient {
    async fn autocomplete_station(&self, prefix: &str) -> Result<Vec<StationMatch>, ApiError> {
        let body = self.get_text(&["autocompletaStazione", prefix]).await?;
        Ok(body.map(|b| parse_station_lines(&b)).unwrap_or_default())
    }

    async fn search_station(&self, prefix: &str) -> Result<Vec<StationDetail>, ApiError> {
        let stations = self.get_json(&["cercaStazione", prefix]).await?;
        Ok(stations.unwrap_or_default())
    }

    async fn find_train_number(&self, number: &str) -> Result<Vec<TrainMatch>, ApiError> {
        let body = self
            .get_text(&["cercaNumeroTrenoTrenoAutocomplete", number])
            .await?;
        Ok(body.map(|b| parse_train_lines(&b)).unwrap_or_default())
    }

    async fn departures(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Departure>, ApiError> {
        let when = format_query_time(when);
        let departures = self.get_json(&["partenze", station_id, &when]).await?;
        Ok(departures.unwrap_or_default())
    }

    async fn arrivals(
        &self,
        station_id: &str,
        when: DateTime<Utc>,
    ) -> Result<Vec<Arrival>, ApiError> {
        let when = format_query_time(when);
        let arrivals = self.get_json(&["arrivi", station_id, &when]).await?;
        Ok(arrivals.unwrap_or_default())
    }

    async fn train_journey(
        &self,
        origin_id: &str,
        train_number: &str,
        departure_ts: i64,
    ) -> Result<Option<TrainJourney>, ApiError> {
        let ts = departure_ts.to_string();
        self.get_json(&["andamentoTreno", origin_id, train_number, &ts])
            .await
    }

    async fn region_stations(&self, region: u8) -> Result<Vec<RegionStation>, ApiError> {
        let region = region.to_string();
        let stations = self.get_json(&["elencoStazioni", &region]).await?;
        Ok(stations.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ClientConfig::default()
            .with_base_url("http://localhost:8080")
            .with_max_concurrent(10)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn client_creation_trims_trailing_slash() {
        let config = ClientConfig::default().with_base_url("http://localhost:8080/");
        let client = HttpClient::new(config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn endpoint_escapes_segments() {
        let config = ClientConfig::default().with_base_url("http://localhost:8080/api");
        let client = HttpClient::new(config).unwrap();

        let url = client
            .endpoint(&["partenze", "S01700", "Fri Mar 15 2024 10:00:00 GMT+0000"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/partenze/S01700/Fri%20Mar%2015%202024%2010:00:00%20GMT+0000"
        );
    }
}
