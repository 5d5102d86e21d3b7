//! Application configuration from `TRENI_*` environment variables.
//!
//! Every variable is optional. Durations accept `30s`, `15m`, `24h`, `7d` or
//! a bare number of seconds.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::TtlConfig;
use crate::itinerary::SearchConfig;
use crate::stations::{DEFAULT_STALENESS_AGE, ImportConfig};
use crate::viaggiatreno::ClientConfig;

pub const DATABASE_PATH: &str = "TRENI_DATABASE_PATH";
pub const API_BASE_URL: &str = "TRENI_API_BASE_URL";
pub const API_TIMEOUT: &str = "TRENI_API_TIMEOUT";
pub const API_MAX_CONCURRENT: &str = "TRENI_API_MAX_CONCURRENT";
pub const CACHE_STATIC_TTL: &str = "TRENI_CACHE_STATIC_TTL";
pub const CACHE_SEMI_STATIC_TTL: &str = "TRENI_CACHE_SEMI_STATIC_TTL";
pub const CACHE_REALTIME_TTL: &str = "TRENI_CACHE_REALTIME_TTL";
pub const CACHE_MAX_ENTRIES: &str = "TRENI_CACHE_MAX_ENTRIES";
pub const STATION_STALENESS_AGE: &str = "TRENI_STATION_STALENESS_AGE";
pub const AUTO_IMPORT: &str = "TRENI_AUTO_IMPORT";
pub const IMPORT_REFRESH_INTERVAL: &str = "TRENI_IMPORT_REFRESH_INTERVAL";
pub const SEARCH_TIMEOUT: &str = "TRENI_SEARCH_TIMEOUT";

const DEFAULT_DATABASE_PATH: &str = "treni.db";

/// Error reading configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to something that doesn't parse
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to wire the service together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub client: ClientConfig,
    pub ttl: TtlConfig,
    /// When set, the bounded cache backend is used with this capacity.
    pub cache_max_entries: Option<u64>,
    /// Age after which station data is reported stale.
    pub staleness_age: Duration,
    pub auto_import: bool,
    pub import: ImportConfig,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            client: ClientConfig::default(),
            ttl: TtlConfig::default(),
            cache_max_entries: None,
            staleness_age: DEFAULT_STALENESS_AGE,
            auto_import: true,
            import: ImportConfig::default().with_max_age(DEFAULT_STALENESS_AGE),
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(DATABASE_PATH) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(url) = get(API_BASE_URL) {
            config.client = config.client.with_base_url(url);
        }
        if let Some(v) = get(API_TIMEOUT) {
            config.client = config.client.with_timeout(duration(API_TIMEOUT, &v)?);
        }
        if let Some(v) = get(API_MAX_CONCURRENT) {
            let n: usize = number(API_MAX_CONCURRENT, &v)?;
            if n == 0 {
                return Err(invalid(API_MAX_CONCURRENT, &v, "must be at least 1"));
            }
            config.client = config.client.with_max_concurrent(n);
        }

        if let Some(v) = get(CACHE_STATIC_TTL) {
            config.ttl = config.ttl.with_static_ttl(duration(CACHE_STATIC_TTL, &v)?);
        }
        if let Some(v) = get(CACHE_SEMI_STATIC_TTL) {
            config.ttl = config
                .ttl
                .with_semi_static_ttl(duration(CACHE_SEMI_STATIC_TTL, &v)?);
        }
        if let Some(v) = get(CACHE_REALTIME_TTL) {
            config.ttl = config
                .ttl
                .with_realtime_ttl(duration(CACHE_REALTIME_TTL, &v)?);
        }
        if let Some(v) = get(CACHE_MAX_ENTRIES) {
            config.cache_max_entries = Some(number(CACHE_MAX_ENTRIES, &v)?);
        }

        if let Some(v) = get(STATION_STALENESS_AGE) {
            let age = duration(STATION_STALENESS_AGE, &v)?;
            config.staleness_age = age;
            config.import = config.import.with_max_age(age);
        }
        if let Some(v) = get(AUTO_IMPORT) {
            config.auto_import = boolean(AUTO_IMPORT, &v)?;
        }
        if let Some(v) = get(IMPORT_REFRESH_INTERVAL) {
            let interval = duration(IMPORT_REFRESH_INTERVAL, &v)?;
            if interval.is_zero() {
                return Err(invalid(IMPORT_REFRESH_INTERVAL, &v, "must be positive"));
            }
            config.import = config.import.with_refresh_interval(interval);
        }

        if let Some(v) = get(SEARCH_TIMEOUT) {
            config.search = config.search.with_timeout(duration(SEARCH_TIMEOUT, &v)?);
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse `30s`, `15m`, `24h`, `7d` or bare seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit_secs) = match value.char_indices().last()? {
        (i, 's') => (&value[..i], 1),
        (i, 'm') => (&value[..i], 60),
        (i, 'h') => (&value[..i], 60 * 60),
        (i, 'd') => (&value[..i], 24 * 60 * 60),
        _ => (value, 1),
    };
    let n: u64 = digits.trim().parse().ok()?;
    n.checked_mul(unit_secs).map(Duration::from_secs)
}

fn duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value)
        .ok_or_else(|| invalid(var, value, "expected a duration like 30s, 15m, 24h or 7d"))
}

fn number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(var, value, "expected a non-negative integer"))
}

fn boolean(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_vars(&[]).unwrap();

        assert_eq!(config.database_path, PathBuf::from("treni.db"));
        assert_eq!(config.client.timeout, Duration::from_secs(30));
        assert_eq!(config.client.max_concurrent, 8);
        assert_eq!(config.ttl.static_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.ttl.semi_static_ttl, Duration::from_secs(3600));
        assert_eq!(config.ttl.realtime_ttl, Duration::from_secs(30));
        assert_eq!(config.cache_max_entries, None);
        assert_eq!(config.staleness_age, Duration::from_secs(168 * 3600));
        assert!(config.auto_import);
        assert_eq!(config.import.refresh_interval, Duration::from_secs(24 * 3600));
        assert_eq!(config.import.max_age, Duration::from_secs(168 * 3600));
        assert_eq!(config.search.timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_from_vars() {
        let config = from_vars(&[
            (DATABASE_PATH, "/var/lib/treni/stations.db"),
            (API_BASE_URL, "http://localhost:9000/api"),
            (API_MAX_CONCURRENT, "2"),
            (CACHE_REALTIME_TTL, "10s"),
            (CACHE_MAX_ENTRIES, "5000"),
            (STATION_STALENESS_AGE, "2d"),
            (AUTO_IMPORT, "false"),
            (IMPORT_REFRESH_INTERVAL, "6h"),
            (SEARCH_TIMEOUT, "45"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/treni/stations.db"));
        assert_eq!(config.client.base_url, "http://localhost:9000/api");
        assert_eq!(config.client.max_concurrent, 2);
        assert_eq!(config.ttl.realtime_ttl, Duration::from_secs(10));
        assert_eq!(config.cache_max_entries, Some(5000));
        assert_eq!(config.staleness_age, Duration::from_secs(2 * 86400));
        assert_eq!(config.import.max_age, Duration::from_secs(2 * 86400));
        assert!(!config.auto_import);
        assert_eq!(config.import.refresh_interval, Duration::from_secs(6 * 3600));
        assert_eq!(config.search.timeout, Duration::from_secs(45));
    }

    #[test]
    fn empty_values_are_ignored() {
        let config = from_vars(&[(DATABASE_PATH, "  "), (CACHE_MAX_ENTRIES, "")]).unwrap();
        assert_eq!(config.database_path, PathBuf::from("treni.db"));
        assert_eq!(config.cache_max_entries, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = from_vars(&[(CACHE_STATIC_TTL, "soon")]).unwrap_err();
        let ConfigError::Invalid { var, value, .. } = err;
        assert_eq!(var, CACHE_STATIC_TTL);
        assert_eq!(value, "soon");

        assert!(from_vars(&[(AUTO_IMPORT, "maybe")]).is_err());
        assert!(from_vars(&[(API_MAX_CONCURRENT, "0")]).is_err());
        assert!(from_vars(&[(IMPORT_REFRESH_INTERVAL, "0s")]).is_err());
        assert!(from_vars(&[(CACHE_MAX_ENTRIES, "-1")]).is_err());
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_duration("24h"), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(604800)));
        assert_eq!(parse_duration(" 90 "), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("1.5h"), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration(""), None);
    }
}
