// Tests for rank aggregation and classification

use gridrank_core::aggregate::{
    DensityBucket, RankBand, Thresholds, aggregate, round_one_decimal,
};
use proptest::prelude::*;

#[test]
fn test_mixed_positions() {
    let summary = aggregate(&[Some(1), Some(2), None, Some(15), None], 0, &Thresholds::default());

    assert_eq!(summary.ranked, 3);
    assert_eq!(summary.not_ranked, 2);
    assert_eq!(summary.average_position, Some(6.0));
    assert_eq!(summary.best_position, Some(1));
    assert_eq!(summary.worst_position, Some(15));
    assert_eq!(summary.total(), 5);
}

#[test]
fn test_all_unranked_has_no_average() {
    let summary = aggregate(&[None, None, None], 0, &Thresholds::default());

    assert_eq!(summary.ranked, 0);
    assert_eq!(summary.not_ranked, 3);
    assert_eq!(summary.average_position, None);
    assert_eq!(summary.best_position, None);
    assert_eq!(summary.top3_share(), 0.0);
}

#[test]
fn test_empty_input() {
    let summary = aggregate(&[], 0, &Thresholds::default());
    assert_eq!(summary.total(), 0);
    assert_eq!(summary.average_position, None);
}

#[test]
fn test_average_rounds_to_one_decimal() {
    let summary = aggregate(&[Some(1), Some(2), Some(2)], 0, &Thresholds::default());
    assert_eq!(summary.average_position, Some(1.7));

    assert_eq!(round_one_decimal(6.25), 6.3);
    assert_eq!(round_one_decimal(6.0), 6.0);
}

#[test]
fn test_failed_lookups_count_as_not_ranked() {
    let summary = aggregate(&[Some(3), None, None], 2, &Thresholds::default());

    assert_eq!(summary.not_ranked, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.bands.not_ranked, 2);
}

#[test]
fn test_failed_count_is_capped_by_unranked() {
    let summary = aggregate(&[Some(3), None], 5, &Thresholds::default());
    assert_eq!(summary.failed, 1);
}

#[test]
fn test_band_counts() {
    let summary = aggregate(
        &[Some(1), Some(3), Some(4), Some(10), Some(11), None],
        0,
        &Thresholds::default(),
    );

    assert_eq!(summary.bands.top3, 2);
    assert_eq!(summary.bands.top10, 2);
    assert_eq!(summary.bands.low, 1);
    assert_eq!(summary.bands.not_ranked, 1);
    assert!((summary.top3_share() - 100.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_rank_bands() {
    let t = Thresholds::default();
    assert_eq!(t.rank_band(Some(1)), RankBand::Top3);
    assert_eq!(t.rank_band(Some(3)), RankBand::Top3);
    assert_eq!(t.rank_band(Some(4)), RankBand::TopTen);
    assert_eq!(t.rank_band(Some(10)), RankBand::TopTen);
    assert_eq!(t.rank_band(Some(11)), RankBand::Low);
    assert_eq!(t.rank_band(None), RankBand::NotRanked);
}

#[test]
fn test_density_buckets() {
    let t = Thresholds::default();
    assert_eq!(t.density_bucket(Some(25)), DensityBucket::High);
    assert_eq!(t.density_bucket(Some(20)), DensityBucket::High);
    assert_eq!(t.density_bucket(Some(19)), DensityBucket::Medium);
    assert_eq!(t.density_bucket(Some(10)), DensityBucket::Medium);
    assert_eq!(t.density_bucket(Some(1)), DensityBucket::Low);
    assert_eq!(t.density_bucket(Some(0)), DensityBucket::None);
    assert_eq!(t.density_bucket(None), DensityBucket::None);
}

#[test]
fn test_weak_threshold() {
    let t = Thresholds::default();
    assert!(!t.is_weak(Some(1)));
    assert!(!t.is_weak(Some(3)));
    assert!(t.is_weak(Some(4)));
    assert!(t.is_weak(Some(40)));
    assert!(t.is_weak(None));

    let strict = Thresholds {
        weak_rank: 2,
        ..Thresholds::default()
    };
    assert!(strict.is_weak(Some(2)));
}

proptest! {
    #[test]
    fn prop_counts_partition_input(positions in prop::collection::vec(prop::option::of(1u32..100), 0..60)) {
        let summary = aggregate(&positions, 0, &Thresholds::default());

        prop_assert_eq!(summary.ranked + summary.not_ranked, positions.len());
        let bands = summary.bands;
        prop_assert_eq!(bands.top3 + bands.top10 + bands.low + bands.not_ranked, positions.len());

        if let Some(avg) = summary.average_position {
            let best = summary.best_position.unwrap() as f64;
            let worst = summary.worst_position.unwrap() as f64;
            prop_assert!(avg >= best - 0.05 && avg <= worst + 0.05);
        } else {
            prop_assert_eq!(summary.ranked, 0);
        }
    }
}
