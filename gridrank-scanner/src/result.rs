use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// What the rank API reported for one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RankLookup {
    pub position: Option<u32>,
    pub business_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PointOutcome {
    Ranked {
        position: u32,
        business_count: Option<u32>,
    },
    NotRanked {
        business_count: Option<u32>,
    },
    Failed {
        error: String,
    },
}

impl PointOutcome {
    pub fn from_lookup(lookup: RankLookup) -> Self {
        match lookup.position {
            Some(position) => PointOutcome::Ranked {
                position,
                business_count: lookup.business_count,
            },
            None => PointOutcome::NotRanked {
                business_count: lookup.business_count,
            },
        }
    }

    pub fn position(&self) -> Option<u32> {
        match self {
            PointOutcome::Ranked { position, .. } => Some(*position),
            _ => None,
        }
    }

    pub fn business_count(&self) -> Option<u32> {
        match self {
            PointOutcome::Ranked { business_count, .. }
            | PointOutcome::NotRanked { business_count } => *business_count,
            PointOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PointOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PointOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    Complete,
    Partial { failed: usize },
    Failed,
}

impl ScanStatus {
    pub fn from_counts(total: usize, failed: usize) -> Self {
        if failed == 0 {
            ScanStatus::Complete
        } else if failed >= total {
            ScanStatus::Failed
        } else {
            ScanStatus::Partial { failed }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Complete => "completed",
            ScanStatus::Partial { .. } => "partial",
            ScanStatus::Failed => "failed",
        }
    }
}

/// Outcomes are stored in grid order, one per point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub outcomes: Vec<PointOutcome>,
    pub status: ScanStatus,
    pub elapsed: Duration,
}

impl ScanResult {
    pub fn new(outcomes: Vec<PointOutcome>, elapsed: Duration) -> Self {
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let status = ScanStatus::from_counts(outcomes.len(), failed);
        Self {
            outcomes,
            status,
            elapsed,
        }
    }

    pub fn positions(&self) -> Vec<Option<u32>> {
        self.outcomes.iter().map(PointOutcome::position).collect()
    }

    pub fn business_counts(&self) -> Vec<Option<u32>> {
        self.outcomes.iter().map(PointOutcome::business_count).collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn failures(&self) -> Vec<(usize, &str)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(idx, o)| o.error().map(|e| (idx, e)))
            .collect()
    }
}
