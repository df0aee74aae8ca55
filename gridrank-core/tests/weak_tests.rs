// Tests for weak-location resolution

use async_trait::async_trait;
use gridrank_core::aggregate::Thresholds;
use gridrank_core::weak::{WeakLocationResolver, normalize_place};
use gridrank_scanner::{Coordinate, Geocoder, ScanError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Names points by latitude; latitudes not listed have no locality and
/// negative latitudes fail.
struct TableGeocoder {
    table: Vec<(f64, &'static str)>,
    calls: AtomicUsize,
}

impl TableGeocoder {
    fn new(table: &[(f64, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            table: table.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn reverse(&self, at: Coordinate) -> gridrank_scanner::error::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if at.latitude < 0.0 {
            return Err(ScanError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self
            .table
            .iter()
            .find(|(lat, _)| (*lat - at.latitude).abs() < 1e-9)
            .map(|(_, name)| name.to_string()))
    }

    async fn forward(&self, _query: &str) -> gridrank_scanner::error::Result<Option<Coordinate>> {
        Ok(None)
    }
}

fn at(lat: f64) -> Coordinate {
    Coordinate::new(lat, -1.1)
}

#[tokio::test]
async fn test_duplicate_names_collapse_to_one_entry() {
    let geocoder = TableGeocoder::new(&[(1.0, "Doncaster"), (2.0, "Doncaster")]);
    let resolver = WeakLocationResolver::new(geocoder.clone(), Thresholds::default());

    let report = resolver
        .resolve(&[at(1.0), at(2.0)], &[Some(12), Some(7)])
        .await;

    assert_eq!(report.locations.len(), 1);
    assert_eq!(report.locations[0].name, "Doncaster");
    assert_eq!(report.locations[0].point_count, 2);
    assert_eq!(report.locations[0].best_position, Some(7));
    assert_eq!(report.locations[0].coordinate, at(1.0));
    assert_eq!(report.checked, 2);
}

#[tokio::test]
async fn test_dedupe_ignores_case_and_spacing() {
    let geocoder = TableGeocoder::new(&[(1.0, "Bessacarr"), (2.0, "  bessacarr ")]);
    let resolver = WeakLocationResolver::new(geocoder, Thresholds::default());

    let report = resolver.resolve(&[at(1.0), at(2.0)], &[None, None]).await;

    assert_eq!(report.names(), vec!["Bessacarr".to_string()]);
}

#[tokio::test]
async fn test_strong_points_are_not_geocoded() {
    let geocoder = TableGeocoder::new(&[(1.0, "Armthorpe"), (2.0, "Rossington"), (3.0, "Tickhill")]);
    let resolver = WeakLocationResolver::new(geocoder.clone(), Thresholds::default());

    let report = resolver
        .resolve(&[at(1.0), at(2.0), at(3.0)], &[Some(1), Some(3), None])
        .await;

    assert_eq!(geocoder.calls(), 1);
    assert_eq!(report.names(), vec!["Tickhill".to_string()]);
}

#[tokio::test]
async fn test_base_and_tracked_locations_are_excluded() {
    let geocoder = TableGeocoder::new(&[(1.0, "Doncaster"), (2.0, "Thorne"), (3.0, "Hatfield")]);
    let resolver = WeakLocationResolver::new(geocoder, Thresholds::default())
        .with_exclusions(["doncaster", "THORNE"]);

    let report = resolver
        .resolve(&[at(1.0), at(2.0), at(3.0)], &[None, Some(9), Some(20)])
        .await;

    assert_eq!(report.names(), vec!["Hatfield".to_string()]);
    assert_eq!(report.excluded, 2);
}

#[tokio::test]
async fn test_failures_and_missing_names_are_skipped() {
    let geocoder = TableGeocoder::new(&[(1.0, "Balby")]);
    let resolver = WeakLocationResolver::new(geocoder, Thresholds::default());

    let report = resolver
        .resolve(&[at(-1.0), at(5.0), at(1.0)], &[None, None, None])
        .await;

    assert_eq!(report.checked, 3);
    assert_eq!(report.unresolved, 2);
    assert_eq!(report.names(), vec!["Balby".to_string()]);
}

#[tokio::test]
async fn test_no_weak_points() {
    let geocoder = TableGeocoder::new(&[]);
    let resolver = WeakLocationResolver::new(geocoder.clone(), Thresholds::default());

    let report = resolver.resolve(&[at(1.0)], &[Some(2)]).await;

    assert!(report.locations.is_empty());
    assert_eq!(report.checked, 0);
    assert_eq!(geocoder.calls(), 0);
}

#[test]
fn test_normalize_place() {
    assert_eq!(normalize_place("  Kirk   Sandall "), "kirk sandall");
    assert_eq!(normalize_place(""), "");
}
