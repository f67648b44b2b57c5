//! Request pipeline telemetry.
//!
//! Lock-free atomic counters are bumped from the edge cache, the tile fetch
//! engine and the service. [`NearbyMetrics::snapshot`] copies them into a
//! serialisable [`TelemetrySnapshot`] for display or export.
//!
//! ```text
//! Edge cache / fetch engine ─────► NearbyMetrics ─────► TelemetrySnapshot
//!                                  (atomic counters)    (point-in-time copy)
//! ```

mod metrics;
mod snapshot;

pub use metrics::NearbyMetrics;
pub use snapshot::TelemetrySnapshot;
