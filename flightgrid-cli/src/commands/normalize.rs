//! `normalize` command: shows how a radius query is quantized.

use clap::Args;
use flightgrid::config::ConfigFile;
use flightgrid::query::{Query, RadiusQuery};

use crate::error::CliError;

/// Arguments for `flightgrid normalize`.
#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Centre latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Centre longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Requested radius in kilometres
    #[arg(long)]
    pub radius_km: f64,
}

/// Prints the cache key and storage tiles for the query.
pub fn run(args: NormalizeArgs, config: &ConfigFile) -> Result<(), CliError> {
    let normalizer = config.normalizer().map_err(|e| CliError::Config(e.to_string()))?;
    let query = Query::Radius(RadiusQuery {
        latitude: args.lat,
        longitude: args.lon,
        radius_km: args.radius_km,
    });
    let normalized = normalizer
        .normalize(&query)
        .map_err(|e| CliError::InvalidInput(e.to_string()))?;

    match &normalized.cache_key {
        Some(key) => println!("Cache key:     {}", key),
        None => println!("Cache key:     (none)"),
    }
    if let Some(bucket) = normalized.radius_bucket() {
        println!("Radius bucket: {} km", bucket.km());
    }
    println!(
        "Storage tiles: {} at resolution {}",
        normalized.storage_tiles.len(),
        normalizer.storage_resolution()
    );
    for tile in &normalized.storage_tiles {
        println!("  {}", tile);
    }
    Ok(())
}
