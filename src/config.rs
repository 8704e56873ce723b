use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::api::{ApiError, HttpBackend};
use crate::auth::{TokenGuard, DEFAULT_REFRESH_WINDOW_MS};
use crate::backoff::RateLimitPolicy;
use crate::clock::{Clock, IntervalTicker};
use crate::reporter::Reporter;
use crate::storage::{FileStorage, Storage, StorageError};

pub const ENV_PREFIX: &str = "WISENTIA_";

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("could not read the `{ENV_PREFIX}*` environment: {source}"))]
    Environment { source: envy::Error },

    #[snafu(display("tick period must be at least one millisecond"))]
    ZeroTick,
}

/// Read from `WISENTIA_*` environment variables, e.g. `WISENTIA_API_URL`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Url,
    pub storage_path: PathBuf,
    pub log_dir: PathBuf,
    pub tick_millis: u64,
    pub refresh_window_secs: i64,
    pub rate_limit_retries: usize,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:8000/").expect("static url is valid"),
            storage_path: PathBuf::from(".wisentia/storage.json"),
            log_dir: PathBuf::from("logs"),
            tick_millis: 1000,
            refresh_window_secs: DEFAULT_REFRESH_WINDOW_MS / 1000,
            rate_limit_retries: 0,
            request_timeout_secs: 15,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let config: Config = envy::prefixed(ENV_PREFIX)
            .from_env()
            .context(EnvironmentSnafu)?;
        config.validate()
    }

    pub fn from_vars<I>(vars: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context(EnvironmentSnafu)?;
        config.validate()
    }

    fn validate(self) -> Result<Config, ConfigError> {
        snafu::ensure!(self.tick_millis > 0, ZeroTickSnafu);
        Ok(self)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn ticker(&self) -> IntervalTicker {
        IntervalTicker::new(self.tick_period())
    }

    pub fn backend(&self) -> Result<HttpBackend, ApiError> {
        HttpBackend::new(
            self.api_url.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    pub fn storage(&self) -> Result<FileStorage, StorageError> {
        FileStorage::open(&self.storage_path)
    }

    pub fn reporter(
        &self,
        backend: Arc<HttpBackend>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Reporter {
        let guard = TokenGuard::new(storage, backend.clone(), clock.clone())
            .with_refresh_window(chrono::Duration::seconds(self.refresh_window_secs));

        Reporter::new(backend, guard, clock)
            .with_rate_limit(RateLimitPolicy::new(self.rate_limit_retries))
    }
}
