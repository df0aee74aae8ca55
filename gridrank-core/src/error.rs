use gridrank_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridRankError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: &'static str },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Scan {scan_id} failed: all {failed} lookups failed")]
    ScanFailed { scan_id: String, failed: usize },
}

pub type Result<T> = std::result::Result<T, GridRankError>;
