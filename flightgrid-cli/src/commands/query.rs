//! `query` commands: run nearby-flights queries through the full pipeline.

use clap::{Args, Subcommand};
use flightgrid::config::ConfigFile;
use flightgrid::query::DataFilters;
use flightgrid::service::ResponseEnvelope;
use flightgrid::{FlightRequest, NearbyRequest, NearbyService};
use tracing::debug;

use crate::error::CliError;

/// Resource path the CLI presents to the edge cache.
const RADIUS_PATH: &str = "/v1/flights/nearby";
const POLYGON_PATH: &str = "/v1/flights/geo";

/// Query shapes.
#[derive(Debug, Subcommand)]
pub enum QueryCommands {
    /// Flights within a radius of a point
    Radius(RadiusArgs),
    /// Flights inside a polygon
    Polygon(PolygonArgs),
}

#[derive(Debug, Args)]
pub struct RadiusArgs {
    /// Centre latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Centre longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Radius in kilometres
    #[arg(long)]
    pub radius_km: f64,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Args)]
pub struct PolygonArgs {
    /// Ring as "lon,lat;lon,lat;..."
    #[arg(long, allow_hyphen_values = true)]
    pub coords: String,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Attribute and altitude filters.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Keep only these ICAO24 addresses or registrations
    #[arg(long, value_delimiter = ',')]
    pub only_aircraft: Vec<String>,

    /// Keep only these airline codes
    #[arg(long, value_delimiter = ',')]
    pub only_airlines: Vec<String>,

    /// Minimum altitude in metres
    #[arg(long, allow_hyphen_values = true)]
    pub min_altitude: Option<f64>,

    /// Maximum altitude in metres
    #[arg(long, allow_hyphen_values = true)]
    pub max_altitude: Option<f64>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run the query this many times (later runs exercise the caches)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Print telemetry after the last run
    #[arg(long)]
    pub stats: bool,
}

impl FilterArgs {
    fn apply(&self, request: FlightRequest) -> FlightRequest {
        let list = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        request
            .with_filters(DataFilters {
                only_aircraft: list(&self.only_aircraft),
                only_airlines: list(&self.only_airlines),
            })
            .with_altitude(self.min_altitude, self.max_altitude)
    }
}

/// Run a query subcommand.
pub async fn run(command: QueryCommands, config: &ConfigFile) -> Result<(), CliError> {
    let (path, body, filters, run) = match command {
        QueryCommands::Radius(args) => (
            RADIUS_PATH,
            FlightRequest::radius(args.lat, args.lon, args.radius_km),
            args.filters,
            args.run,
        ),
        QueryCommands::Polygon(args) => (
            POLYGON_PATH,
            FlightRequest::polygon(parse_coords(&args.coords)?),
            args.filters,
            args.run,
        ),
    };

    let service = NearbyService::from_config(config)?;
    let request = NearbyRequest::new(path, filters.apply(body));

    let runs = run.repeat.max(1);
    debug!(path, runs, "Running nearby query");
    for i in 1..=runs {
        let handled = service.serve(&request).await;
        if let Some(store) = handled.store {
            // Let the next run see the stored response.
            let _ = store.await;
        }
        let response = handled.response;

        if i < runs {
            println!("Run {}: HTTP {}", i, response.status);
            continue;
        }

        println!("HTTP {}", response.status);
        for (name, value) in &response.headers {
            println!("{}: {}", name, value);
        }
        println!();
        let envelope = ResponseEnvelope::from_body(&response.body)?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        if !envelope.success {
            return Err(CliError::Query(format!("HTTP {}", response.status)));
        }
    }

    if run.stats {
        println!();
        print!("{}", service.snapshot());
    }
    Ok(())
}

/// Parses "lon,lat;lon,lat;..." into `[lon, lat]` pairs.
fn parse_coords(input: &str) -> Result<Vec<[f64; 2]>, CliError> {
    input
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<[f64; 2], CliError> {
            let (lon, lat) = pair.split_once(',').ok_or_else(|| {
                CliError::InvalidInput(format!("expected 'lon,lat', got '{}'", pair))
            })?;
            let parse = |s: &str| {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| CliError::InvalidInput(format!("invalid coordinate '{}'", s.trim())))
            };
            Ok([parse(lon)?, parse(lat)?])
        })
        .collect()
}
