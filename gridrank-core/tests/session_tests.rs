// Tests for the scan session state machine

use gridrank_core::GridRankError;
use gridrank_core::aggregate::Thresholds;
use gridrank_core::grid::GridSpec;
use gridrank_core::session::{HeatmapSession, ScanPhase};
use gridrank_core::weak::WeakLocationReport;
use gridrank_scanner::{Coordinate, PointOutcome, RankLookup, ScanResult};
use std::time::Duration;

fn spec(size: usize) -> GridSpec {
    GridSpec::new(Coordinate::new(53.52, -1.13), size, 3.0).unwrap()
}

fn result_for(positions: &[Option<u32>]) -> ScanResult {
    let outcomes = positions
        .iter()
        .map(|p| {
            PointOutcome::from_lookup(RankLookup {
                position: *p,
                business_count: Some(12),
            })
        })
        .collect();
    ScanResult::new(outcomes, Duration::from_secs(1))
}

#[test]
fn test_full_walk() {
    let mut session = HeatmapSession::new();
    assert_eq!(session.phase(), ScanPhase::Idle);

    assert_eq!(session.set_grid(spec(2)).unwrap().len(), 4);
    assert_eq!(session.phase(), ScanPhase::Generating);

    let coordinates = session.begin_scan().unwrap();
    assert_eq!(coordinates.len(), 4);
    assert_eq!(session.phase(), ScanPhase::Scanning);

    let summary = session
        .record_results(result_for(&[Some(1), Some(5), None, Some(2)]), &Thresholds::default())
        .unwrap();
    assert_eq!(summary.ranked, 3);
    assert_eq!(session.phase(), ScanPhase::Scanned);

    let (points, positions) = session.begin_resolving().unwrap();
    assert_eq!(points.len(), 4);
    assert_eq!(positions, vec![Some(1), Some(5), None, Some(2)]);
    assert_eq!(session.phase(), ScanPhase::ResolvingWeakLocations);

    session.finish_report(WeakLocationReport::default()).unwrap();
    assert_eq!(session.phase(), ScanPhase::ReportReady);
    assert!(session.weak_locations().is_some());
}

#[test]
fn test_failed_lookups_are_not_resolved() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(2)).unwrap();
    let coordinates = session.begin_scan().unwrap();

    let outcomes = vec![
        PointOutcome::from_lookup(RankLookup {
            position: Some(6),
            business_count: Some(12),
        }),
        PointOutcome::Failed {
            error: "rate limited".to_string(),
        },
        PointOutcome::from_lookup(RankLookup {
            position: None,
            business_count: Some(12),
        }),
        PointOutcome::Failed {
            error: "timeout".to_string(),
        },
    ];
    let summary = session
        .record_results(ScanResult::new(outcomes, Duration::from_secs(1)), &Thresholds::default())
        .unwrap();
    assert_eq!(summary.failed, 2);

    let (points, positions) = session.begin_resolving().unwrap();
    assert_eq!(points, vec![coordinates[0], coordinates[2]]);
    assert_eq!(positions, vec![Some(6), None]);
}

#[test]
fn test_scan_requires_grid() {
    let mut session = HeatmapSession::new();
    let err = session.begin_scan().unwrap_err();
    assert!(matches!(err, GridRankError::InvalidTransition { .. }));
}

#[test]
fn test_results_require_scanning_phase() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(1)).unwrap();

    let err = session
        .record_results(result_for(&[Some(1)]), &Thresholds::default())
        .unwrap_err();
    assert!(matches!(err, GridRankError::InvalidTransition { .. }));
}

#[test]
fn test_results_must_match_point_count() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(2)).unwrap();
    session.begin_scan().unwrap();

    let err = session
        .record_results(result_for(&[Some(1)]), &Thresholds::default())
        .unwrap_err();
    assert!(matches!(err, GridRankError::InvalidGrid(_)));
    assert_eq!(session.phase(), ScanPhase::Scanning);
}

#[test]
fn test_regrid_discards_results() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(1)).unwrap();
    session.begin_scan().unwrap();
    session
        .record_results(result_for(&[Some(2)]), &Thresholds::default())
        .unwrap();
    session.finish_without_weak_locations().unwrap();
    assert!(session.aggregate().is_some());

    session.set_grid(spec(3)).unwrap();
    assert_eq!(session.phase(), ScanPhase::Generating);
    assert!(session.result().is_none());
    assert!(session.aggregate().is_none());
    assert_eq!(session.points().len(), 9);
}

#[test]
fn test_rescan_from_report_ready() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(1)).unwrap();
    session.begin_scan().unwrap();
    session
        .record_results(result_for(&[None]), &Thresholds::default())
        .unwrap();
    session.finish_without_weak_locations().unwrap();

    assert!(session.begin_scan().is_ok());
    assert!(session.aggregate().is_none());
}

#[test]
fn test_cannot_resolve_twice() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(1)).unwrap();
    session.begin_scan().unwrap();
    session
        .record_results(result_for(&[None]), &Thresholds::default())
        .unwrap();
    session.begin_resolving().unwrap();

    assert!(session.begin_resolving().is_err());
    assert!(session.finish_without_weak_locations().is_err());
}

#[test]
fn test_invalid_grid_keeps_previous_state() {
    let mut session = HeatmapSession::new();
    session.set_grid(spec(2)).unwrap();

    assert!(
        session
            .set_grid(gridrank_core::grid::GridSpec {
                center: Coordinate::new(0.0, 0.0),
                size: 0,
                radius_km: 1.0,
            })
            .is_err()
    );
    assert_eq!(session.points().len(), 4);
    assert_eq!(session.phase(), ScanPhase::Generating);
}
