//! End-to-end tests driving `NearbyService` over a counting stub upstream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flightgrid::config::ConfigFile;
use flightgrid::geo::{destination_point, haversine_km, GeoPoint};
use flightgrid::fetch::TimeBucket;
use flightgrid::grid::CellId;
use flightgrid::service::ResponseEnvelope;
use flightgrid::upstream::{TileFetchError, TileSource};
use flightgrid::{
    BoxFuture, ConfigurationError, Flight, FlightRequest, NearbyRequest, NearbyService,
};

const LA_LAT: f64 = 34.0522;
const LA_LON: f64 = -118.2437;

/// Upstream that serves every flight from whichever tile contains it.
#[derive(Default)]
struct CountingUpstream {
    by_tile: HashMap<CellId, Vec<Flight>>,
    missing_credentials: bool,
    delay: Option<Duration>,
    calls: Mutex<HashMap<CellId, usize>>,
    total: AtomicUsize,
}

impl CountingUpstream {
    fn with_flights(flights: Vec<Flight>) -> Self {
        let mut by_tile: HashMap<CellId, Vec<Flight>> = HashMap::new();
        for flight in flights {
            let p = flight.position().unwrap();
            let tile = flightgrid::grid::point_to_cell(p, storage_resolution()).unwrap();
            by_tile.entry(tile).or_default().push(flight);
        }
        Self {
            by_tile,
            ..Default::default()
        }
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn max_calls_per_tile(&self) -> usize {
        self.calls.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

impl TileSource for CountingUpstream {
    fn ensure_ready(&self) -> Result<(), ConfigurationError> {
        if self.missing_credentials {
            Err(ConfigurationError::MissingCredentials)
        } else {
            Ok(())
        }
    }

    fn fetch_tile(
        &self,
        tile: CellId,
        _bucket: TimeBucket,
    ) -> BoxFuture<'_, Result<Vec<Flight>, TileFetchError>> {
        Box::pin(async move {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.calls.lock().unwrap().entry(tile).or_default() += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.by_tile.get(&tile).cloned().unwrap_or_default())
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn storage_resolution() -> flightgrid::grid::Resolution {
    flightgrid::grid::resolution(ConfigFile::default().grid.storage_resolution).unwrap()
}

fn la() -> GeoPoint {
    GeoPoint::new(LA_LAT, LA_LON).unwrap()
}

fn flight(p: GeoPoint, callsign: &str) -> Flight {
    Flight {
        callsign: Some(callsign.to_string()),
        position_lat: Some(p.lat()),
        position_lon: Some(p.lon()),
        ..Default::default()
    }
}

fn service(upstream: Arc<CountingUpstream>) -> NearbyService {
    NearbyService::from_config_with_source(&ConfigFile::default(), upstream).unwrap()
}

fn callsigns(body: &[u8]) -> Vec<String> {
    ResponseEnvelope::from_body(body)
        .unwrap()
        .flights()
        .iter()
        .filter_map(|f| f.callsign.clone())
        .collect()
}

#[tokio::test]
async fn test_radius_query_returns_only_flights_within_radius() {
    let far = destination_point(la(), 45.0, 40.0);
    assert!(haversine_km(la(), far) > 39.0);
    let upstream = Arc::new(CountingUpstream::with_flights(vec![
        flight(la(), "CENTER"),
        flight(far, "FAR"),
    ]));
    let svc = service(upstream.clone());

    let request = NearbyRequest::new(
        "/v1/flights/nearby",
        FlightRequest::radius(LA_LAT, LA_LON, 25.0),
    );
    let response = svc.handle(&request).await;

    assert_eq!(response.status, 200);
    assert_eq!(callsigns(&response.body), vec!["CENTER".to_string()]);
    assert!(upstream.total() > 0);
}

#[tokio::test]
async fn test_nearby_queries_share_edge_entry() {
    let upstream = Arc::new(CountingUpstream::with_flights(vec![flight(la(), "CENTER")]));
    let svc = service(upstream.clone());

    let first = svc
        .serve(&NearbyRequest::new(
            "/v1/flights/nearby",
            FlightRequest::radius(LA_LAT, LA_LON, 20.0),
        ))
        .await;
    first.store.unwrap().await.unwrap();
    let fetched = upstream.total();

    // Different decimals, same cell and radius bucket.
    let second = svc
        .handle(&NearbyRequest::new(
            "/v1/flights/nearby",
            FlightRequest::radius(LA_LAT + 0.00003, LA_LON - 0.00004, 22.0),
        ))
        .await;

    assert_eq!(second, first.response);
    assert_eq!(upstream.total(), fetched);
    assert_eq!(svc.snapshot().edge_hits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_queries_fetch_each_tile_once() {
    let upstream = Arc::new(CountingUpstream {
        delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let mut config = ConfigFile::default();
    config.upstream.max_concurrency = 64;
    // One bucket for the whole test.
    config.upstream.time_bucket_seconds = 3600;
    let svc = Arc::new(
        NearbyService::from_config_with_source(&config, upstream.clone()).unwrap(),
    );

    // Distinct paths so the edge cache cannot absorb the overlap.
    let requests = [
        ("/a", FlightRequest::radius(LA_LAT, LA_LON, 20.0)),
        ("/b", FlightRequest::radius(LA_LAT + 0.05, LA_LON, 20.0)),
        ("/c", FlightRequest::radius(LA_LAT, LA_LON + 0.05, 20.0)),
    ];
    let handles: Vec<_> = requests
        .into_iter()
        .map(|(path, body)| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.handle(&NearbyRequest::new(path, body)).await })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        assert_eq!(handle.unwrap().status, 200);
    }
    assert_eq!(upstream.max_calls_per_tile(), 1);
}

#[tokio::test]
async fn test_polygon_query_is_never_edge_cached() {
    let upstream = Arc::new(CountingUpstream::with_flights(vec![
        flight(la(), "INSIDE"),
        flight(GeoPoint::new(34.6, -118.2).unwrap(), "OUTSIDE"),
    ]));
    let svc = service(upstream.clone());
    let body = FlightRequest::polygon(vec![
        [-118.5, 33.8],
        [-118.0, 33.8],
        [-118.0, 34.3],
        [-118.5, 34.3],
    ]);

    let first = svc.serve(&NearbyRequest::new("/v1/flights/geo", body.clone())).await;
    assert!(first.store.is_none());
    assert_eq!(callsigns(&first.response.body), vec!["INSIDE".to_string()]);

    svc.handle(&NearbyRequest::new("/v1/flights/geo", body)).await;
    let snapshot = svc.snapshot();
    assert_eq!(snapshot.edge_hits, 0);
    assert_eq!(snapshot.edge_stores, 0);
}

#[tokio::test]
async fn test_missing_credentials_surface_as_502() {
    let upstream = Arc::new(CountingUpstream {
        missing_credentials: true,
        ..Default::default()
    });
    let svc = service(upstream.clone());

    let response = svc
        .handle(&NearbyRequest::new(
            "/v1/flights/nearby",
            FlightRequest::radius(LA_LAT, LA_LON, 25.0),
        ))
        .await;

    assert_eq!(response.status, 502);
    assert_eq!(upstream.total(), 0);
    let envelope = ResponseEnvelope::from_body(&response.body).unwrap();
    assert!(!envelope.success);
    assert_eq!(svc.snapshot().edge_stores, 0);
}

#[tokio::test]
async fn test_conditional_request_after_store() {
    let upstream = Arc::new(CountingUpstream::with_flights(vec![flight(la(), "CENTER")]));
    let svc = service(upstream);
    let body = FlightRequest::radius(LA_LAT, LA_LON, 5.0);

    let first = svc.serve(&NearbyRequest::new("/n", body.clone())).await;
    first.store.unwrap().await.unwrap();
    let etag = first.response.etag().unwrap().to_string();

    let revalidated = svc
        .handle(&NearbyRequest::new("/n", body).with_if_none_match(format!("W/{}", etag)))
        .await;
    assert_eq!(revalidated.status, 304);
    assert!(revalidated.body.is_empty());
}

#[tokio::test]
async fn test_swapped_coordinates_are_corrected() {
    let upstream = Arc::new(CountingUpstream::with_flights(vec![flight(la(), "CENTER")]));
    let svc = service(upstream);

    // Longitude first: -118 is not a latitude, 34 fits one.
    let response = svc
        .handle(&NearbyRequest::new(
            "/n",
            FlightRequest::radius(LA_LON, LA_LAT, 10.0),
        ))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(callsigns(&response.body), vec!["CENTER".to_string()]);
}
