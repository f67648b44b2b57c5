//! `flightgrid config`: inspect and edit the INI configuration file.

use std::fmt::Write as _;

use clap::Subcommand;
use flightgrid::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

const UNSET: &str = "(not set)";
const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get {
        /// Setting name as section.key, e.g. grid.storage_resolution
        key: String,
    },

    /// Change one setting and save the file
    Set {
        /// Setting name as section.key, e.g. upstream.max_concurrency
        key: String,

        /// New value; an empty string clears optional settings
        value: String,
    },

    /// Print every setting grouped by section
    List,

    /// Print where the configuration file lives
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::List => print!("{}", render_listing(&ConfigFile::load_from(&path)?)),
        ConfigCommands::Get { key } => {
            let key = lookup(&key)?;
            println!("{}", render(key, &ConfigFile::load_from(&path)?));
        }
        ConfigCommands::Set { key, value } => {
            let key = lookup(&key)?;
            // Loaded from disk only, so environment overrides are never written back.
            let mut config = ConfigFile::load_from(&path)?;
            key.set(&mut config, &value)
                .map_err(|e| CliError::Config(e.to_string()))?;
            config.save()?;
            println!("{} = {}", key.name(), render(key, &config));
        }
    }
    Ok(())
}

fn lookup(name: &str) -> Result<ConfigKey, CliError> {
    name.parse().map_err(|_| {
        CliError::Config(format!(
            "no setting named '{name}' (run 'flightgrid config list' for the full set)"
        ))
    })
}

/// Printable value of `key`: masked when secret, a marker when unset.
fn render(key: ConfigKey, config: &ConfigFile) -> String {
    let value = key.get(config);
    if value.is_empty() {
        UNSET.to_string()
    } else if key.is_secret() {
        MASK.to_string()
    } else {
        value
    }
}

/// Every setting, one `[section]` block per section, names aligned.
fn render_listing(config: &ConfigFile) -> String {
    let width = ConfigKey::all()
        .iter()
        .map(|k| k.key_name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let mut section = None;
    for key in ConfigKey::all() {
        if section != Some(key.section()) {
            if section.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", key.section());
            section = Some(key.section());
        }
        let _ = writeln!(out, "{:<width$} = {}", key.key_name(), render(*key, config));
    }
    out
}
