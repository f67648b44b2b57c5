//! INI-backed configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::keys::ConfigKey;
use super::config_file_path;
use crate::edge::{EdgeSettings, DEFAULT_MAX_ENTRIES, DEFAULT_PARTITION_HINT};
use crate::fetch::{FetchSettings, DEFAULT_MAX_CONCURRENCY, DEFAULT_TILE_CACHE_CAPACITY};
use crate::geo::GeoError;
use crate::logging::LoggingConfig;
use crate::normalize::{Normalizer, DEFAULT_RESOLUTION};
use crate::upstream::{UpstreamSettings, DEFAULT_CLIENT_ID_HEADER, DEFAULT_CLIENT_SECRET_HEADER};

/// Environment variable overriding `cache.ttl_seconds`.
pub const ENV_CACHE_TTL_SECONDS: &str = "CACHE_TTL_SECONDS";
/// Environment variable overriding `grid.bucket_resolution`.
pub const ENV_H3_RESOLUTION: &str = "H3_RESOLUTION";
/// Environment variable overriding `upstream.client_id`.
pub const ENV_CLIENT_ID: &str = "FW_DATA_ENGINE_CLIENT_ID";
/// Environment variable overriding `upstream.client_secret`.
pub const ENV_CLIENT_SECRET: &str = "FW_DATA_ENGINE_CLIENT_SECRET";
/// Environment variable overriding `upstream.tile_base_url`.
pub const ENV_TILE_BASE_URL: &str = "FW_TILE_BASE_URL";

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Edge store retention in seconds.
    pub ttl_seconds: u64,
    pub partition_hint: Option<String>,
    /// Capacity of the in-memory edge store.
    pub max_entries: u64,
    /// Capacity of the per-tile result cache; 0 disables it.
    pub tile_cache_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 10,
            partition_hint: Some(DEFAULT_PARTITION_HINT.to_string()),
            max_entries: DEFAULT_MAX_ENTRIES,
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

/// `[grid]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    pub bucket_resolution: u8,
    pub storage_resolution: u8,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            bucket_resolution: DEFAULT_RESOLUTION,
            storage_resolution: DEFAULT_RESOLUTION,
        }
    }
}

/// `[upstream]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub tile_base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_id_header: String,
    pub client_secret_header: String,
    pub max_concurrency: usize,
    pub time_bucket_seconds: u64,
    /// Per-fetch deadline; 0 disables it.
    pub fetch_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            tile_base_url: None,
            client_id: None,
            client_secret: None,
            client_id_header: DEFAULT_CLIENT_ID_HEADER.to_string(),
            client_secret_header: DEFAULT_CLIENT_SECRET_HEADER.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            time_bucket_seconds: 10,
            fetch_timeout_seconds: 15,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub grid: GridSettings,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Loads the default config file and applies environment overrides.
    pub fn load() -> Result<Self, ConfigFileError> {
        let mut config = Self::load_from(&config_file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigFileError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigFileError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Builds a config from parsed INI data. Unknown keys are ignored.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Renders the config as INI. Unset optional values are omitted.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Saves to the default config file path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let io_err = |source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`.
    ///
    /// Numeric values that fail to parse or are not positive are ignored, as
    /// are blank strings.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(ttl) = text(ENV_CACHE_TTL_SECONDS)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(res) = text(ENV_H3_RESOLUTION)
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|v| crate::grid::resolution(*v).is_ok() && *v > 0)
        {
            self.grid.bucket_resolution = res;
        }
        if let Some(id) = text(ENV_CLIENT_ID) {
            self.upstream.client_id = Some(id);
        }
        if let Some(secret) = text(ENV_CLIENT_SECRET) {
            self.upstream.client_secret = Some(secret);
        }
        if let Some(url) = text(ENV_TILE_BASE_URL) {
            self.upstream.tile_base_url = Some(url);
        }
    }

    /// Normalizer for the `[grid]` settings.
    pub fn normalizer(&self) -> Result<Normalizer, GeoError> {
        Normalizer::new(self.grid.bucket_resolution, self.grid.storage_resolution)
    }

    pub fn time_bucket(&self) -> Duration {
        Duration::from_secs(self.upstream.time_bucket_seconds.max(1))
    }

    pub fn upstream_settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            tile_base_url: self.upstream.tile_base_url.clone(),
            client_id: self.upstream.client_id.clone(),
            client_secret: self.upstream.client_secret.clone(),
            client_id_header: self.upstream.client_id_header.clone(),
            client_secret_header: self.upstream.client_secret_header.clone(),
            time_bucket: self.time_bucket(),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let timeout = self.upstream.fetch_timeout_seconds;
        FetchSettings {
            max_concurrency: self.upstream.max_concurrency.max(1),
            time_bucket: self.time_bucket(),
            fetch_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            tile_cache_capacity: self.cache.tile_cache_capacity,
        }
    }

    /// Edge settings. Clients are told a freshness window of one time bucket.
    pub fn edge_settings(&self) -> EdgeSettings {
        EdgeSettings {
            ttl: Duration::from_secs(self.cache.ttl_seconds.max(1)),
            client_max_age: self.time_bucket(),
            partition_hint: self.cache.partition_hint.clone(),
        }
    }
}
