//! Settable configuration keys.
//!
//! Each key is addressed as `section.key` and knows how to read its value
//! from, and validate and write a value into, a [`ConfigFile`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{ConfigFile, ConfigFileError};
use crate::grid;
use crate::logging::LOG_LEVELS;

/// A configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CacheTtlSeconds,
    CachePartitionHint,
    CacheMaxEntries,
    CacheTileCacheCapacity,
    GridBucketResolution,
    GridStorageResolution,
    UpstreamTileBaseUrl,
    UpstreamClientId,
    UpstreamClientSecret,
    UpstreamClientIdHeader,
    UpstreamClientSecretHeader,
    UpstreamMaxConcurrency,
    UpstreamTimeBucketSeconds,
    UpstreamFetchTimeoutSeconds,
    LoggingLevel,
    LoggingDirectory,
}

const ALL_KEYS: [ConfigKey; 16] = [
    ConfigKey::CacheTtlSeconds,
    ConfigKey::CachePartitionHint,
    ConfigKey::CacheMaxEntries,
    ConfigKey::CacheTileCacheCapacity,
    ConfigKey::GridBucketResolution,
    ConfigKey::GridStorageResolution,
    ConfigKey::UpstreamTileBaseUrl,
    ConfigKey::UpstreamClientId,
    ConfigKey::UpstreamClientSecret,
    ConfigKey::UpstreamClientIdHeader,
    ConfigKey::UpstreamClientSecretHeader,
    ConfigKey::UpstreamMaxConcurrency,
    ConfigKey::UpstreamTimeBucketSeconds,
    ConfigKey::UpstreamFetchTimeoutSeconds,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingDirectory,
];

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full name, `section.key`.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::CacheTtlSeconds => "cache.ttl_seconds",
            ConfigKey::CachePartitionHint => "cache.partition_hint",
            ConfigKey::CacheMaxEntries => "cache.max_entries",
            ConfigKey::CacheTileCacheCapacity => "cache.tile_cache_capacity",
            ConfigKey::GridBucketResolution => "grid.bucket_resolution",
            ConfigKey::GridStorageResolution => "grid.storage_resolution",
            ConfigKey::UpstreamTileBaseUrl => "upstream.tile_base_url",
            ConfigKey::UpstreamClientId => "upstream.client_id",
            ConfigKey::UpstreamClientSecret => "upstream.client_secret",
            ConfigKey::UpstreamClientIdHeader => "upstream.client_id_header",
            ConfigKey::UpstreamClientSecretHeader => "upstream.client_secret_header",
            ConfigKey::UpstreamMaxConcurrency => "upstream.max_concurrency",
            ConfigKey::UpstreamTimeBucketSeconds => "upstream.time_bucket_seconds",
            ConfigKey::UpstreamFetchTimeoutSeconds => "upstream.fetch_timeout_seconds",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map(|(s, _)| s).unwrap_or("")
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split_once('.').map(|(_, k)| k).unwrap_or("")
    }

    /// Whether the value must never be echoed back.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::UpstreamClientSecret)
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match self {
            ConfigKey::CacheTtlSeconds => config.cache.ttl_seconds.to_string(),
            ConfigKey::CachePartitionHint => opt(&config.cache.partition_hint),
            ConfigKey::CacheMaxEntries => config.cache.max_entries.to_string(),
            ConfigKey::CacheTileCacheCapacity => config.cache.tile_cache_capacity.to_string(),
            ConfigKey::GridBucketResolution => config.grid.bucket_resolution.to_string(),
            ConfigKey::GridStorageResolution => config.grid.storage_resolution.to_string(),
            ConfigKey::UpstreamTileBaseUrl => opt(&config.upstream.tile_base_url),
            ConfigKey::UpstreamClientId => opt(&config.upstream.client_id),
            ConfigKey::UpstreamClientSecret => opt(&config.upstream.client_secret),
            ConfigKey::UpstreamClientIdHeader => config.upstream.client_id_header.clone(),
            ConfigKey::UpstreamClientSecretHeader => config.upstream.client_secret_header.clone(),
            ConfigKey::UpstreamMaxConcurrency => config.upstream.max_concurrency.to_string(),
            ConfigKey::UpstreamTimeBucketSeconds => config.upstream.time_bucket_seconds.to_string(),
            ConfigKey::UpstreamFetchTimeoutSeconds => {
                config.upstream.fetch_timeout_seconds.to_string()
            }
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates `value` and writes it into `config`.
    ///
    /// An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigFileError> {
        let value = value.trim();
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match self {
            ConfigKey::CacheTtlSeconds => config.cache.ttl_seconds = self.positive(value)?,
            ConfigKey::CachePartitionHint => config.cache.partition_hint = optional(value),
            ConfigKey::CacheMaxEntries => config.cache.max_entries = self.positive(value)?,
            ConfigKey::CacheTileCacheCapacity => {
                config.cache.tile_cache_capacity = self.number(value)?
            }
            ConfigKey::GridBucketResolution => {
                config.grid.bucket_resolution = self.resolution(value)?
            }
            ConfigKey::GridStorageResolution => {
                config.grid.storage_resolution = self.resolution(value)?
            }
            ConfigKey::UpstreamTileBaseUrl => {
                if !value.is_empty()
                    && !(value.starts_with("http://") || value.starts_with("https://"))
                {
                    return Err(self.invalid(value, "must be an http(s) URL"));
                }
                config.upstream.tile_base_url = optional(value);
            }
            ConfigKey::UpstreamClientId => config.upstream.client_id = optional(value),
            ConfigKey::UpstreamClientSecret => config.upstream.client_secret = optional(value),
            ConfigKey::UpstreamClientIdHeader => {
                config.upstream.client_id_header = self.header(value)?
            }
            ConfigKey::UpstreamClientSecretHeader => {
                config.upstream.client_secret_header = self.header(value)?
            }
            ConfigKey::UpstreamMaxConcurrency => {
                config.upstream.max_concurrency = self.positive(value)?
            }
            ConfigKey::UpstreamTimeBucketSeconds => {
                config.upstream.time_bucket_seconds = self.positive(value)?
            }
            ConfigKey::UpstreamFetchTimeoutSeconds => {
                config.upstream.fetch_timeout_seconds = self.number(value)?
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(value, &format!("expected one of {:?}", LOG_LEVELS)));
                }
                config.logging.level = level;
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = optional(value).map(PathBuf::from)
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn number<T: FromStr>(&self, value: &str) -> Result<T, ConfigFileError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn positive<T: FromStr + Default + PartialOrd>(&self, value: &str) -> Result<T, ConfigFileError> {
        let n: T = self.number(value)?;
        if n <= T::default() {
            return Err(self.invalid(value, "must be greater than zero"));
        }
        Ok(n)
    }

    fn resolution(&self, value: &str) -> Result<u8, ConfigFileError> {
        let level: u8 = self.number(value)?;
        grid::resolution(level).map_err(|e| self.invalid(value, &e.to_string()))?;
        Ok(level)
    }

    fn header(&self, value: &str) -> Result<String, ConfigFileError> {
        let valid = !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(self.invalid(value, "must be a non-empty HTTP header name"));
        }
        Ok(value.to_string())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown configuration key '{}'", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for ConfigKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}
