//! Weak-location resolution.
//!
//! Poorly ranked grid points are reverse geocoded one at a time. The resulting
//! place names, minus the project's own base location and anything already
//! tracked, become candidates for new location-targeted content.

use crate::aggregate::Thresholds;
use gridrank_scanner::{Coordinate, Geocoder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakLocation {
    pub name: String,
    /// Weak grid points that resolved to this name.
    pub point_count: usize,
    pub best_position: Option<u32>,
    /// First grid point that resolved to this name.
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeakLocationReport {
    pub locations: Vec<WeakLocation>,
    pub checked: usize,
    pub unresolved: usize,
    pub excluded: usize,
}

impl WeakLocationReport {
    pub fn names(&self) -> Vec<String> {
        self.locations.iter().map(|l| l.name.clone()).collect()
    }
}

/// Comparison key for place names: trimmed, lower-cased, single-spaced.
pub fn normalize_place(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct WeakLocationResolver {
    geocoder: Arc<dyn Geocoder>,
    thresholds: Thresholds,
    exclusions: HashSet<String>,
}

impl WeakLocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, thresholds: Thresholds) -> Self {
        Self {
            geocoder,
            thresholds,
            exclusions: HashSet::new(),
        }
    }

    /// Names that must never be proposed (base location, tracked locations).
    pub fn with_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions.extend(
            names
                .into_iter()
                .map(|n| normalize_place(n.as_ref()))
                .filter(|n| !n.is_empty()),
        );
        self
    }

    pub async fn resolve(
        &self,
        points: &[Coordinate],
        positions: &[Option<u32>],
    ) -> WeakLocationReport {
        if points.len() != positions.len() {
            warn!(
                "Weak-location input mismatch: {} points, {} positions",
                points.len(),
                positions.len()
            );
        }

        let mut report = WeakLocationReport::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (point, position) in points.iter().zip(positions) {
            if !self.thresholds.is_weak(*position) {
                continue;
            }
            report.checked += 1;

            let name = match self.geocoder.reverse(*point).await {
                Ok(Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
                Ok(_) => {
                    report.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Reverse geocode failed for {:.5},{:.5}: {}",
                        point.latitude, point.longitude, e
                    );
                    report.unresolved += 1;
                    continue;
                }
            };

            let key = normalize_place(&name);
            if self.exclusions.contains(&key) {
                debug!("Skipping excluded location {}", name);
                report.excluded += 1;
                continue;
            }

            match seen.get(&key) {
                Some(&idx) => {
                    let existing = &mut report.locations[idx];
                    existing.point_count += 1;
                    existing.best_position = match (existing.best_position, *position) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => {
                    seen.insert(key, report.locations.len());
                    report.locations.push(WeakLocation {
                        name,
                        point_count: 1,
                        best_position: *position,
                        coordinate: *point,
                    });
                }
            }
        }

        info!(
            "Resolved {} weak locations from {} weak points ({} unresolved, {} excluded)",
            report.locations.len(),
            report.checked,
            report.unresolved,
            report.excluded
        );
        report
    }
}
