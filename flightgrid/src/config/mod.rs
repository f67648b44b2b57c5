//! Configuration file support.
//!
//! Settings live in an INI file at `<config_dir>/flightgrid/config.ini`
//! with `[cache]`, `[grid]`, `[upstream]` and `[logging]` sections. A few
//! deployment values can be overridden from the environment after loading.

mod file;
mod keys;

pub use file::{
    CacheSettings, ConfigFile, ConfigFileError, GridSettings, UpstreamConfig,
    ENV_CACHE_TTL_SECONDS, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_H3_RESOLUTION, ENV_TILE_BASE_URL,
};
pub use keys::{ConfigKey, UnknownKey};

use std::path::PathBuf;

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "flightgrid";

/// Path of the default configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join("config.ini")
}
