use crate::aggregate::{ScanAggregate, Thresholds};
use crate::data::{CombinationSource, Database, Project};
use crate::error::{GridRankError, Result};
use crate::grid::{GridPoint, GridSpec};
use crate::session::HeatmapSession;
use crate::weak::{WeakLocationReport, WeakLocationResolver};
use gridrank_scanner::{Geocoder, RankChecker, RankScanner, ScanResult, ScanStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for configuring a heat-map scan
pub struct ScanOptions {
    pub project: Project,
    pub keyword: String,
    pub grid_size: usize,
    pub radius_km: f64,
    pub workers: usize,
    pub request_interval: Duration,
    pub thresholds: Thresholds,
    pub resolve_weak_locations: bool,
    pub seed_combinations: bool,
    pub show_progress_bars: bool,
}

/// Callback for reporting scan stage messages
pub type ScanProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub spec: GridSpec,
    pub points: Vec<GridPoint>,
    pub result: ScanResult,
    pub aggregate: ScanAggregate,
    pub weak_locations: Option<WeakLocationReport>,
    /// New combinations created from weak locations.
    pub seeded: usize,
}

/// Marks a scan failed after a storage error so it never stays `running`.
fn abandon_scan(
    db: &Database,
    scan_id: &str,
    aggregate: Option<&ScanAggregate>,
    err: impl Into<GridRankError>,
) -> GridRankError {
    let err = err.into();
    warn!("Scan {} abandoned: {}", scan_id, err);
    if let Err(e) = db.fail_scan(scan_id, aggregate) {
        warn!("Could not mark scan {} failed: {}", scan_id, e);
    }
    err
}

fn report(progress_callback: &Option<ScanProgressCallback>, msg: String) {
    if let Some(callback) = progress_callback {
        callback(msg);
    }
}

/// Run the whole pipeline for one project and keyword: grid, lookups,
/// aggregation, optional weak locations, persistence and optional seeding.
///
/// If every lookup fails the completed subset is still persisted, the scan is
/// marked failed and `GridRankError::ScanFailed` is returned. A storage error
/// after the scan row exists marks it failed with whatever aggregate was
/// computed. Weak locations and seeding are best effort.
pub async fn execute_scan(
    db: &Database,
    checker: Arc<dyn RankChecker>,
    geocoder: Option<Arc<dyn Geocoder>>,
    options: ScanOptions,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanOutcome> {
    let ScanOptions {
        project,
        keyword,
        grid_size,
        radius_km,
        workers,
        request_interval,
        thresholds,
        resolve_weak_locations,
        seed_combinations,
        show_progress_bars,
    } = options;

    let mut session = HeatmapSession::new();
    let spec = GridSpec::new(project.center, grid_size, radius_km)?;
    let point_count = session.set_grid(spec)?.len();
    report(
        &progress_callback,
        format!(
            "Generated {}x{} grid ({} points) over {} km radius",
            grid_size, grid_size, point_count, radius_km
        ),
    );

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(point_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} points {msg}")
                .map_err(|e| GridRankError::Config(format!("progress template: {}", e)))?
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let coordinates = session.begin_scan()?;
    let scan_id = db.create_scan(&project.id, &keyword, &spec)?;
    info!(
        "Scan {} started for project '{}' keyword '{}'",
        scan_id, project.name, keyword
    );

    let mut scanner = RankScanner::new(checker)
        .with_workers(workers)
        .with_request_interval(request_interval);
    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        scanner = scanner.with_progress_callback(Arc::new(move |_worker_id: usize, done: usize, _total: usize| {
            pb.set_position(done as u64);
        }));
    }

    let result = match scanner
        .scan(&keyword, project.target.as_deref(), &coordinates)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            if let Some(ref pb) = progress_bar {
                pb.finish_and_clear();
            }
            return Err(abandon_scan(db, &scan_id, None, e));
        }
    };

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }

    let status = result.status;
    let aggregate = match session.record_results(result, &thresholds) {
        Ok(aggregate) => aggregate.clone(),
        Err(e) => return Err(abandon_scan(db, &scan_id, None, e)),
    };

    let outcomes = session
        .result()
        .map(|r| r.outcomes.as_slice())
        .unwrap_or_default();
    let stored = db
        .record_points(&scan_id, grid_size, session.points(), outcomes)
        .and_then(|_| db.record_aggregate(&scan_id, &aggregate));
    if let Err(e) = stored {
        return Err(abandon_scan(db, &scan_id, Some(&aggregate), e));
    }

    if status == ScanStatus::Failed {
        warn!("Scan {} failed: every lookup errored", scan_id);
        db.fail_scan(&scan_id, Some(&aggregate))?;
        return Err(GridRankError::ScanFailed {
            scan_id,
            failed: aggregate.failed,
        });
    }

    report(
        &progress_callback,
        format!(
            "Scanned {} points: {} ranked, {} not ranked ({} failed)",
            point_count, aggregate.ranked, aggregate.not_ranked, aggregate.failed
        ),
    );

    let resolver_input = match geocoder.filter(|_| resolve_weak_locations) {
        Some(geocoder) => match db.tracked_locations(&project.id) {
            Ok(tracked) => Some((geocoder, tracked)),
            Err(e) => {
                warn!("Could not load tracked locations, skipping weak locations: {}", e);
                None
            }
        },
        None => {
            if resolve_weak_locations {
                debug!("No geocoder configured; skipping weak locations");
            }
            None
        }
    };

    let finished = match resolver_input {
        Some((geocoder, mut exclusions)) => match session.begin_resolving() {
            Ok((points, positions)) => {
                report(&progress_callback, "Resolving weak locations...".to_string());

                exclusions.push(project.base_location.clone());

                let resolver =
                    WeakLocationResolver::new(geocoder, thresholds).with_exclusions(exclusions);
                let weak = resolver.resolve(&points, &positions).await;
                session.finish_report(weak)
            }
            Err(e) => Err(e),
        },
        None => session.finish_without_weak_locations(),
    };
    if let Err(e) = finished {
        return Err(abandon_scan(db, &scan_id, Some(&aggregate), e));
    }

    let weak_locations = session.weak_locations().cloned();
    let weak_list = weak_locations
        .as_ref()
        .map(|w| w.locations.as_slice())
        .unwrap_or_default();
    if let Err(e) = db.complete_scan(&scan_id, status, &aggregate, weak_list) {
        return Err(abandon_scan(db, &scan_id, Some(&aggregate), e));
    }

    let seeded = match weak_locations.as_ref() {
        Some(weak) if seed_combinations && !weak.locations.is_empty() => {
            match db.seed_combinations(
                &project.id,
                &keyword,
                &weak.names(),
                CombinationSource::WeakLocation,
            ) {
                Ok(seeded) => {
                    report(
                        &progress_callback,
                        format!("Seeded {} new combinations from weak locations", seeded),
                    );
                    seeded
                }
                Err(e) => {
                    warn!("Could not seed combinations for scan {}: {}", scan_id, e);
                    0
                }
            }
        }
        _ => 0,
    };

    info!(
        "Scan {} finished with status {} (average position {:?})",
        scan_id,
        status.as_str(),
        aggregate.average_position
    );

    let result = session
        .result()
        .cloned()
        .ok_or_else(|| GridRankError::InvalidGrid("scan result missing".to_string()))?;

    Ok(ScanOutcome {
        scan_id,
        spec,
        points: session.points().to_vec(),
        result,
        aggregate,
        weak_locations,
        seeded,
    })
}
