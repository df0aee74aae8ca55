// Scan aggregation and color classification

use serde::{Deserialize, Serialize};

/// Classification cut-offs. Defaults are the product's observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Positions at or beyond this (and unranked points) count as weak.
    pub weak_rank: u32,
    pub top3_max: u32,
    pub top10_max: u32,
    pub density_high: u32,
    pub density_medium: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            weak_rank: 4,
            top3_max: 3,
            top10_max: 10,
            density_high: 20,
            density_medium: 10,
        }
    }
}

impl Thresholds {
    pub fn rank_band(&self, position: Option<u32>) -> RankBand {
        match position {
            None => RankBand::NotRanked,
            Some(p) if p <= self.top3_max => RankBand::Top3,
            Some(p) if p <= self.top10_max => RankBand::TopTen,
            Some(_) => RankBand::Low,
        }
    }

    pub fn density_bucket(&self, business_count: Option<u32>) -> DensityBucket {
        match business_count {
            Some(c) if c >= self.density_high => DensityBucket::High,
            Some(c) if c >= self.density_medium => DensityBucket::Medium,
            Some(c) if c > 0 => DensityBucket::Low,
            _ => DensityBucket::None,
        }
    }

    pub fn is_weak(&self, position: Option<u32>) -> bool {
        position.is_none_or(|p| p >= self.weak_rank)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBand {
    Top3,
    TopTen,
    Low,
    NotRanked,
}

impl RankBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankBand::Top3 => "top3",
            RankBand::TopTen => "top10",
            RankBand::Low => "low",
            RankBand::NotRanked => "not_ranked",
        }
    }

    /// Heat-map color name.
    pub fn color(&self) -> &'static str {
        match self {
            RankBand::Top3 => "green",
            RankBand::TopTen => "amber",
            RankBand::Low => "red",
            RankBand::NotRanked => "grey",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityBucket {
    High,
    Medium,
    Low,
    None,
}

impl DensityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityBucket::High => "high",
            DensityBucket::Medium => "medium",
            DensityBucket::Low => "low",
            DensityBucket::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BandCounts {
    pub top3: usize,
    pub top10: usize,
    pub low: usize,
    pub not_ranked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAggregate {
    /// Mean of ranked positions, one decimal place. `None` when nothing ranked.
    pub average_position: Option<f64>,
    pub ranked: usize,
    /// Includes failed lookups.
    pub not_ranked: usize,
    pub failed: usize,
    pub best_position: Option<u32>,
    pub worst_position: Option<u32>,
    pub bands: BandCounts,
}

impl ScanAggregate {
    pub fn total(&self) -> usize {
        self.ranked + self.not_ranked
    }

    /// Share of points ranked in the top three, 0.0 to 100.0.
    pub fn top3_share(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.bands.top3 as f64 * 100.0 / self.total() as f64
        }
    }
}

/// Round half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn aggregate(positions: &[Option<u32>], failed: usize, thresholds: &Thresholds) -> ScanAggregate {
    let ranked: Vec<u32> = positions.iter().flatten().copied().collect();

    let average_position = if ranked.is_empty() {
        None
    } else {
        let sum: u64 = ranked.iter().map(|p| *p as u64).sum();
        Some(round_one_decimal(sum as f64 / ranked.len() as f64))
    };

    let mut bands = BandCounts::default();
    for position in positions {
        match thresholds.rank_band(*position) {
            RankBand::Top3 => bands.top3 += 1,
            RankBand::TopTen => bands.top10 += 1,
            RankBand::Low => bands.low += 1,
            RankBand::NotRanked => bands.not_ranked += 1,
        }
    }

    ScanAggregate {
        average_position,
        ranked: ranked.len(),
        not_ranked: positions.len() - ranked.len(),
        failed: failed.min(positions.len() - ranked.len()),
        best_position: ranked.iter().min().copied(),
        worst_position: ranked.iter().max().copied(),
        bands,
    }
}
