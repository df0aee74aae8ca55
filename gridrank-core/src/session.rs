// In-memory state for one heat-map scan

use crate::aggregate::{ScanAggregate, Thresholds, aggregate};
use crate::error::{GridRankError, Result};
use crate::grid::{GridPoint, GridSpec, generate_grid};
use crate::weak::WeakLocationReport;
use gridrank_scanner::{Coordinate, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    /// Grid computed, no scan yet.
    Generating,
    Scanning,
    Scanned,
    ResolvingWeakLocations,
    ReportReady,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Generating => "generating",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Scanned => "scanned",
            ScanPhase::ResolvingWeakLocations => "resolving weak locations",
            ScanPhase::ReportReady => "report ready",
        }
    }
}

/// Walks one scan through grid, lookups, aggregation and weak locations.
/// Changing the grid from any phase throws away in-memory results.
#[derive(Debug)]
pub struct HeatmapSession {
    phase: ScanPhase,
    spec: Option<GridSpec>,
    points: Vec<GridPoint>,
    result: Option<ScanResult>,
    aggregate: Option<ScanAggregate>,
    weak_locations: Option<WeakLocationReport>,
}

impl Default for HeatmapSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatmapSession {
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Idle,
            spec: None,
            points: Vec::new(),
            result: None,
            aggregate: None,
            weak_locations: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn spec(&self) -> Option<&GridSpec> {
        self.spec.as_ref()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    pub fn aggregate(&self) -> Option<&ScanAggregate> {
        self.aggregate.as_ref()
    }

    pub fn weak_locations(&self) -> Option<&WeakLocationReport> {
        self.weak_locations.as_ref()
    }

    fn invalid(&self, action: &'static str) -> GridRankError {
        GridRankError::InvalidTransition {
            action,
            phase: self.phase.as_str(),
        }
    }

    fn discard_results(&mut self) {
        self.result = None;
        self.aggregate = None;
        self.weak_locations = None;
    }

    pub fn set_grid(&mut self, spec: GridSpec) -> Result<&[GridPoint]> {
        let points = generate_grid(&spec)?;
        self.discard_results();
        self.spec = Some(spec);
        self.points = points;
        self.phase = ScanPhase::Generating;
        Ok(&self.points)
    }

    /// Returns the coordinates to look up, in grid order.
    pub fn begin_scan(&mut self) -> Result<Vec<Coordinate>> {
        match self.phase {
            ScanPhase::Generating | ScanPhase::Scanned | ScanPhase::ReportReady => {
                self.discard_results();
                self.phase = ScanPhase::Scanning;
                Ok(self.points.iter().map(|p| p.coordinate).collect())
            }
            _ => Err(self.invalid("start a scan")),
        }
    }

    pub fn record_results(
        &mut self,
        result: ScanResult,
        thresholds: &Thresholds,
    ) -> Result<&ScanAggregate> {
        if self.phase != ScanPhase::Scanning {
            return Err(self.invalid("record scan results"));
        }
        if result.outcomes.len() != self.points.len() {
            return Err(GridRankError::InvalidGrid(format!(
                "expected {} outcomes, got {}",
                self.points.len(),
                result.outcomes.len()
            )));
        }

        let summary = aggregate(&result.positions(), result.failed_count(), thresholds);
        self.result = Some(result);
        self.phase = ScanPhase::Scanned;
        Ok(self.aggregate.insert(summary))
    }

    /// Returns the points and positions the resolver needs. Points whose
    /// lookup failed carry no ranking evidence and are left out.
    pub fn begin_resolving(&mut self) -> Result<(Vec<Coordinate>, Vec<Option<u32>>)> {
        if self.phase != ScanPhase::Scanned {
            return Err(self.invalid("resolve weak locations"));
        }
        let (points, positions): (Vec<Coordinate>, Vec<Option<u32>>) = match self.result.as_ref() {
            Some(result) => self
                .points
                .iter()
                .zip(&result.outcomes)
                .filter(|(_, outcome)| !outcome.is_failed())
                .map(|(point, outcome)| (point.coordinate, outcome.position()))
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };
        self.phase = ScanPhase::ResolvingWeakLocations;
        Ok((points, positions))
    }

    pub fn finish_report(&mut self, weak_locations: WeakLocationReport) -> Result<()> {
        if self.phase != ScanPhase::ResolvingWeakLocations {
            return Err(self.invalid("finish the weak-location report"));
        }
        self.weak_locations = Some(weak_locations);
        self.phase = ScanPhase::ReportReady;
        Ok(())
    }

    /// Go straight from scanned to report-ready without weak locations.
    pub fn finish_without_weak_locations(&mut self) -> Result<()> {
        if self.phase != ScanPhase::Scanned {
            return Err(self.invalid("finish the report"));
        }
        self.phase = ScanPhase::ReportReady;
        Ok(())
    }
}
