// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used helpers for convenience
pub use handlers::{AppContext, format_duration, parse_coordinate, parse_keyword};

// Re-export scan functionality from gridrank-core
pub use gridrank_core::scan::{ScanOptions, ScanOutcome, ScanProgressCallback, execute_scan};
