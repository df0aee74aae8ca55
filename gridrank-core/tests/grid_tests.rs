// Tests for grid generation

use gridrank_core::GridRankError;
use gridrank_core::grid::{GridSpec, MAX_GRID_SIZE, generate_grid, haversine_km, offset_km};
use gridrank_scanner::Coordinate;
use proptest::prelude::*;

fn london() -> Coordinate {
    Coordinate::new(51.5, -0.12)
}

// ============================================================================
// Shape Tests
// ============================================================================

#[test]
fn test_five_by_five_around_london() {
    let spec = GridSpec::new(london(), 5, 5.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    assert_eq!(points.len(), 25);
    for point in &points {
        let (east, north) = offset_km(london(), point.coordinate);
        assert!(east.abs() <= 5.0 + 1e-6, "east offset {}", east);
        assert!(north.abs() <= 5.0 + 1e-6, "north offset {}", north);
        // corners sit on the diagonal of the box
        assert!(haversine_km(london(), point.coordinate) <= 5.0 * 2f64.sqrt() + 0.05);
    }
}

#[test]
fn test_points_are_row_major_north_first() {
    let spec = GridSpec::new(london(), 3, 2.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    for (idx, point) in points.iter().enumerate() {
        assert_eq!(point.index(3), idx);
        assert_eq!(point.row, idx / 3);
        assert_eq!(point.col, idx % 3);
    }

    // row 0 is north of row 2, column 0 is west of column 2
    assert!(points[0].coordinate.latitude > points[6].coordinate.latitude);
    assert!(points[0].coordinate.longitude < points[2].coordinate.longitude);
}

#[test]
fn test_center_point_of_odd_grid_is_business_location() {
    let spec = GridSpec::new(london(), 5, 5.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    let center = points[12].coordinate;
    assert!((center.latitude - 51.5).abs() < 1e-9);
    assert!((center.longitude + 0.12).abs() < 1e-9);
}

#[test]
fn test_single_point_grid_is_center() {
    let spec = GridSpec::new(london(), 1, 10.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].coordinate, london());
}

#[test]
fn test_edges_reach_the_radius() {
    let spec = GridSpec::new(london(), 5, 5.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    let (_, north) = offset_km(london(), points[2].coordinate);
    let (east, _) = offset_km(london(), points[14].coordinate);
    assert!((north - 5.0).abs() < 1e-6);
    assert!((east - 5.0).abs() < 1e-6);
}

#[test]
fn test_longitude_wraps_at_antimeridian() {
    let spec = GridSpec::new(Coordinate::new(0.0, 179.99), 3, 5.0).unwrap();
    let points = generate_grid(&spec).unwrap();

    for point in &points {
        assert!((-180.0..=180.0).contains(&point.coordinate.longitude));
    }
    assert!(points[2].coordinate.longitude < 0.0);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_rejects_zero_size() {
    let err = GridSpec::new(london(), 0, 5.0).unwrap_err();
    assert!(matches!(err, GridRankError::InvalidGrid(_)));
}

#[test]
fn test_rejects_oversized_grid() {
    assert!(GridSpec::new(london(), MAX_GRID_SIZE, 5.0).is_ok());
    assert!(GridSpec::new(london(), MAX_GRID_SIZE + 1, 5.0).is_err());
}

#[test]
fn test_rejects_bad_radius() {
    assert!(GridSpec::new(london(), 5, 0.0).is_err());
    assert!(GridSpec::new(london(), 5, -1.0).is_err());
    assert!(GridSpec::new(london(), 5, f64::NAN).is_err());
    assert!(GridSpec::new(london(), 5, f64::INFINITY).is_err());
}

#[test]
fn test_rejects_bad_center() {
    assert!(GridSpec::new(Coordinate::new(90.0, 0.0), 5, 1.0).is_err());
    assert!(GridSpec::new(Coordinate::new(-91.0, 0.0), 5, 1.0).is_err());
    assert!(GridSpec::new(Coordinate::new(0.0, 180.5), 5, 1.0).is_err());
    assert!(GridSpec::new(Coordinate::new(f64::NAN, 0.0), 5, 1.0).is_err());
}

#[test]
fn test_rejects_box_past_the_pole() {
    assert!(GridSpec::new(Coordinate::new(89.99, 0.0), 3, 5.0).is_err());
    assert!(GridSpec::new(Coordinate::new(-89.99, 0.0), 3, 5.0).is_err());
}

#[test]
fn test_generate_grid_validates_hand_built_spec() {
    let spec = GridSpec {
        center: london(),
        size: 0,
        radius_km: 5.0,
    };
    assert!(generate_grid(&spec).is_err());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_grid_has_n_squared_points_within_box(
        lat in -70.0f64..70.0,
        lng in -179.0f64..179.0,
        size in 1usize..=15,
        radius in 0.1f64..50.0,
    ) {
        let center = Coordinate::new(lat, lng);
        let spec = GridSpec::new(center, size, radius).unwrap();
        let points = generate_grid(&spec).unwrap();

        prop_assert_eq!(points.len(), size * size);
        for point in &points {
            let (east, north) = offset_km(center, point.coordinate);
            prop_assert!(east.abs() <= radius + 1e-6);
            prop_assert!(north.abs() <= radius + 1e-6);
        }
    }

    #[test]
    fn prop_grid_is_symmetric_about_center(
        lat in -60.0f64..60.0,
        lng in -170.0f64..170.0,
        half in 1usize..=7,
        radius in 0.5f64..20.0,
    ) {
        let size = half * 2 + 1;
        let center = Coordinate::new(lat, lng);
        let points = generate_grid(&GridSpec::new(center, size, radius).unwrap()).unwrap();

        let first = points[0].coordinate;
        let last = points[size * size - 1].coordinate;
        prop_assert!((first.latitude - lat + last.latitude - lat).abs() < 1e-9);
        prop_assert!((first.longitude - lng + last.longitude - lng).abs() < 1e-9);
    }
}
