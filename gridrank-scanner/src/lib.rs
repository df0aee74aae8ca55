pub mod client;
pub mod error;
pub mod geocoder;
pub mod result;
pub mod scanner;

pub use client::{HttpRankClient, RankChecker};
pub use error::ScanError;
pub use geocoder::{Geocoder, NominatimGeocoder};
pub use result::{Coordinate, PointOutcome, RankLookup, ScanResult, ScanStatus};
pub use scanner::{ProgressCallback, RankScanner, ScanEstimate};
