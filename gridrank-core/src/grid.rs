//! Square sampling grids around a business location.
//!
//! A grid of size N covers a square box of side `2 × radius_km` centred on the
//! business. Row 0 is the northern edge and column 0 the western edge; points
//! are returned row-major so `index = row * N + col`.

use crate::error::{GridRankError, Result};
use gridrank_scanner::Coordinate;
use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.32;
pub const MAX_GRID_SIZE: usize = 25;
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub center: Coordinate,
    pub size: usize,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub row: usize,
    pub col: usize,
    pub coordinate: Coordinate,
}

impl GridPoint {
    pub fn index(&self, size: usize) -> usize {
        self.row * size + self.col
    }
}

impl GridSpec {
    pub fn new(center: Coordinate, size: usize, radius_km: f64) -> Result<Self> {
        let spec = Self {
            center,
            size,
            radius_km,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(GridRankError::InvalidGrid(
                "grid size must be at least 1".to_string(),
            ));
        }
        if self.size > MAX_GRID_SIZE {
            return Err(GridRankError::InvalidGrid(format!(
                "grid size {} exceeds the maximum of {}",
                self.size, MAX_GRID_SIZE
            )));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(GridRankError::InvalidGrid(format!(
                "radius must be a positive number of kilometres, got {}",
                self.radius_km
            )));
        }

        let Coordinate {
            latitude,
            longitude,
        } = self.center;
        if !latitude.is_finite() || latitude <= -90.0 || latitude >= 90.0 {
            return Err(GridRankError::InvalidGrid(format!(
                "latitude {} is out of range",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GridRankError::InvalidGrid(format!(
                "longitude {} is out of range",
                longitude
            )));
        }

        let half_lat = self.radius_km / KM_PER_DEGREE;
        let half_lng = self.radius_km / lng_km_per_degree(latitude);
        if latitude + half_lat >= 90.0 || latitude - half_lat <= -90.0 || half_lng >= 180.0 {
            return Err(GridRankError::InvalidGrid(format!(
                "a {} km radius around latitude {} reaches past the pole",
                self.radius_km, latitude
            )));
        }

        Ok(())
    }

    pub fn point_count(&self) -> usize {
        self.size * self.size
    }

    /// Distance between neighbouring points; zero for a single-point grid.
    pub fn step_km(&self) -> f64 {
        if self.size <= 1 {
            0.0
        } else {
            2.0 * self.radius_km / (self.size - 1) as f64
        }
    }
}

fn lng_km_per_degree(latitude: f64) -> f64 {
    KM_PER_DEGREE * latitude.to_radians().cos()
}

fn wrap_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

pub fn generate_grid(spec: &GridSpec) -> Result<Vec<GridPoint>> {
    spec.validate()?;

    let step = spec.step_km();
    let (north_edge, west_edge) = if spec.size == 1 {
        (0.0, 0.0)
    } else {
        (spec.radius_km, -spec.radius_km)
    };
    let lng_scale = lng_km_per_degree(spec.center.latitude);

    let mut points = Vec::with_capacity(spec.point_count());
    for row in 0..spec.size {
        let north_km = north_edge - row as f64 * step;
        for col in 0..spec.size {
            let east_km = west_edge + col as f64 * step;
            points.push(GridPoint {
                row,
                col,
                coordinate: Coordinate::new(
                    spec.center.latitude + north_km / KM_PER_DEGREE,
                    wrap_longitude(spec.center.longitude + east_km / lng_scale),
                ),
            });
        }
    }

    Ok(points)
}

/// `(east_km, north_km)` of `point` relative to `center`, on the same
/// projection `generate_grid` uses.
pub fn offset_km(center: Coordinate, point: Coordinate) -> (f64, f64) {
    let north = (point.latitude - center.latitude) * KM_PER_DEGREE;
    let d_lng = wrap_longitude(point.longitude - center.longitude);
    let east = d_lng * lng_km_per_degree(center.latitude);
    (east, north)
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
