use crate::aggregate::ScanAggregate;
use crate::grid::{GridPoint, GridSpec};
use crate::weak::WeakLocation;
use gridrank_scanner::{Coordinate, PointOutcome, ScanStatus};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub base_location: String,
    pub center: Coordinate,
    /// Business name or domain the rank API looks for.
    pub target: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationSource {
    Manual,
    WeakLocation,
}

impl CombinationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinationSource::Manual => "manual",
            CombinationSource::WeakLocation => "weak_location",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "weak_location" => CombinationSource::WeakLocation,
            _ => CombinationSource::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    pub keyword: String,
    pub location: String,
    pub source: CombinationSource,
    pub created_at: i64,
}

/// One persisted heat-map scan: parameters, aggregate and weak locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub project_id: String,
    pub keyword: String,
    pub center: Coordinate,
    pub grid_size: usize,
    pub radius_km: f64,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub status: String,
    pub aggregate: Option<ScanAggregate>,
    pub weak_locations: Vec<WeakLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub coordinate: Coordinate,
    pub position: Option<u32>,
    pub business_count: Option<u32>,
    pub error: Option<String>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: for<'de> Deserialize<'de>>(column: usize, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

const SCAN_COLUMNS: &str = "id, project_id, keyword, center_lat, center_lng, grid_size, radius_km,
     started_at, completed_at, status, aggregate, weak_locations";

fn scan_from_row(row: &Row<'_>) -> Result<ScanRecord> {
    let aggregate: Option<String> = row.get(10)?;
    let weak_locations: Option<String> = row.get(11)?;

    Ok(ScanRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        keyword: row.get(2)?,
        center: Coordinate::new(row.get(3)?, row.get(4)?),
        grid_size: row.get::<_, i64>(5)? as usize,
        radius_km: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
        status: row.get(9)?,
        aggregate: aggregate.as_deref().map(|a| from_json(10, a)).transpose()?,
        weak_locations: weak_locations
            .as_deref()
            .map(|w| from_json(11, w))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn project_from_row(row: &Row<'_>) -> Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        base_location: row.get(2)?,
        center: Coordinate::new(row.get(3)?, row.get(4)?),
        target: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    base_location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    target TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tracked_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL COLLATE NOCASE,
    created_at INTEGER NOT NULL,
    FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
    UNIQUE(project_id, name)
);

-- keyword + location pairs that content and rank tracking are keyed on
CREATE TABLE IF NOT EXISTS combinations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    keyword TEXT NOT NULL COLLATE NOCASE,
    location TEXT NOT NULL COLLATE NOCASE,
    source TEXT NOT NULL CHECK(source IN ('manual', 'weak_location')),
    created_at INTEGER NOT NULL,
    FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
    UNIQUE(project_id, keyword, location)
);

CREATE TABLE IF NOT EXISTS scans (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    keyword TEXT NOT NULL COLLATE NOCASE,
    center_lat REAL NOT NULL,
    center_lng REAL NOT NULL,
    grid_size INTEGER NOT NULL,
    radius_km REAL NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'partial', 'failed')),
    average_position REAL,
    ranked_count INTEGER,
    not_ranked_count INTEGER,
    failed_count INTEGER,
    aggregate TEXT,           -- JSON ScanAggregate
    weak_locations TEXT,      -- JSON array of WeakLocation
    FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_scans_project_keyword ON scans(project_id, keyword, started_at);

CREATE TABLE IF NOT EXISTS scan_points (
    scan_id TEXT NOT NULL,
    point_index INTEGER NOT NULL,
    grid_row INTEGER NOT NULL,
    grid_col INTEGER NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    position INTEGER CHECK(position IS NULL OR position > 0),
    business_count INTEGER,
    error TEXT,
    PRIMARY KEY(scan_id, point_index),
    FOREIGN KEY(scan_id) REFERENCES scans(id) ON DELETE CASCADE
);
            ",
        )?;
        Ok(())
    }

    // Projects
    pub fn create_project(
        &self,
        name: &str,
        base_location: &str,
        center: Coordinate,
        target: Option<&str>,
    ) -> Result<String> {
        let project_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO projects (id, name, base_location, latitude, longitude, target, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &project_id,
                name.trim(),
                base_location.trim(),
                center.latitude,
                center.longitude,
                target,
                current_timestamp()
            ],
        )?;

        Ok(project_id)
    }

    pub fn get_project(&self, name: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, name, base_location, latitude, longitude, target, created_at
                 FROM projects WHERE name = ?1",
                params![name.trim()],
                project_from_row,
            )
            .optional()
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, base_location, latitude, longitude, target, created_at
             FROM projects ORDER BY name",
        )?;

        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(projects)
    }

    /// Returns false if the location was already tracked.
    pub fn add_tracked_location(&self, project_id: &str, name: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO tracked_locations (project_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![project_id, name.trim(), current_timestamp()],
        )?;
        Ok(inserted > 0)
    }

    pub fn tracked_locations(&self, project_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM tracked_locations WHERE project_id = ?1 ORDER BY id")?;

        let names = stmt
            .query_map(params![project_id], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;

        Ok(names)
    }

    // Combinations
    pub fn seed_combinations(
        &self,
        project_id: &str,
        keyword: &str,
        locations: &[String],
        source: CombinationSource,
    ) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let timestamp = current_timestamp();
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO combinations (project_id, keyword, location, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for location in locations.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
                inserted += stmt.execute(params![
                    project_id,
                    keyword.trim(),
                    location,
                    source.as_str(),
                    timestamp
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    pub fn list_combinations(&self, project_id: &str) -> Result<Vec<Combination>> {
        let mut stmt = self.conn.prepare(
            "SELECT keyword, location, source, created_at FROM combinations
             WHERE project_id = ?1 ORDER BY keyword, location",
        )?;

        let combinations = stmt
            .query_map(params![project_id], |row| {
                let source: String = row.get(2)?;
                Ok(Combination {
                    keyword: row.get(0)?,
                    location: row.get(1)?,
                    source: CombinationSource::parse(&source),
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(combinations)
    }

    // Scans
    pub fn create_scan(&self, project_id: &str, keyword: &str, spec: &GridSpec) -> Result<String> {
        let scan_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO scans (id, project_id, keyword, center_lat, center_lng, grid_size, radius_km, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'running')",
            params![
                &scan_id,
                project_id,
                keyword.trim(),
                spec.center.latitude,
                spec.center.longitude,
                spec.size as i64,
                spec.radius_km,
                current_timestamp()
            ],
        )?;

        Ok(scan_id)
    }

    pub fn record_points(
        &self,
        scan_id: &str,
        size: usize,
        points: &[GridPoint],
        outcomes: &[PointOutcome],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO scan_points (
                    scan_id, point_index, grid_row, grid_col, latitude, longitude,
                    position, business_count, error
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for (point, outcome) in points.iter().zip(outcomes) {
                stmt.execute(params![
                    scan_id,
                    point.index(size) as i64,
                    point.row as i64,
                    point.col as i64,
                    point.coordinate.latitude,
                    point.coordinate.longitude,
                    outcome.position(),
                    outcome.business_count(),
                    outcome.error(),
                ])?;
            }
        }

        tx.commit()
    }

    /// Stores the aggregate on a scan that is still running.
    pub fn record_aggregate(&self, scan_id: &str, aggregate: &ScanAggregate) -> Result<()> {
        self.conn.execute(
            "UPDATE scans SET average_position = ?1, ranked_count = ?2, not_ranked_count = ?3,
                failed_count = ?4, aggregate = ?5
             WHERE id = ?6",
            params![
                aggregate.average_position,
                aggregate.ranked as i64,
                aggregate.not_ranked as i64,
                aggregate.failed as i64,
                to_json(aggregate)?,
                scan_id
            ],
        )?;
        Ok(())
    }

    pub fn complete_scan(
        &self,
        scan_id: &str,
        status: ScanStatus,
        aggregate: &ScanAggregate,
        weak_locations: &[WeakLocation],
    ) -> Result<()> {
        self.finish_scan(scan_id, status.as_str(), Some(aggregate), weak_locations)
    }

    /// Marks the scan failed. Points already recorded are kept.
    pub fn fail_scan(&self, scan_id: &str, aggregate: Option<&ScanAggregate>) -> Result<()> {
        self.finish_scan(scan_id, ScanStatus::Failed.as_str(), aggregate, &[])
    }

    fn finish_scan(
        &self,
        scan_id: &str,
        status: &str,
        aggregate: Option<&ScanAggregate>,
        weak_locations: &[WeakLocation],
    ) -> Result<()> {
        let aggregate_json = aggregate.map(to_json).transpose()?;
        let weak_json = to_json(&weak_locations)?;

        self.conn.execute(
            "UPDATE scans SET status = ?1, completed_at = ?2, average_position = ?3,
                ranked_count = ?4, not_ranked_count = ?5, failed_count = ?6,
                aggregate = ?7, weak_locations = ?8
             WHERE id = ?9",
            params![
                status,
                current_timestamp(),
                aggregate.and_then(|a| a.average_position),
                aggregate.map(|a| a.ranked as i64),
                aggregate.map(|a| a.not_ranked as i64),
                aggregate.map(|a| a.failed as i64),
                aggregate_json,
                weak_json,
                scan_id
            ],
        )?;
        Ok(())
    }

    pub fn get_scan(&self, scan_id: &str) -> Result<Option<ScanRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM scans WHERE id = ?1", SCAN_COLUMNS),
                params![scan_id],
                scan_from_row,
            )
            .optional()
    }

    /// Most recent scan for a project and keyword phrase.
    pub fn latest_scan(&self, project_id: &str, keyword: &str) -> Result<Option<ScanRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM scans WHERE project_id = ?1 AND keyword = ?2
                     ORDER BY started_at DESC, rowid DESC LIMIT 1",
                    SCAN_COLUMNS
                ),
                params![project_id, keyword.trim()],
                scan_from_row,
            )
            .optional()
    }

    /// Every scan for a project and keyword phrase, oldest first.
    pub fn scan_history(&self, project_id: &str, keyword: &str) -> Result<Vec<ScanRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scans WHERE project_id = ?1 AND keyword = ?2
             ORDER BY started_at ASC, rowid ASC",
            SCAN_COLUMNS
        ))?;

        let scans = stmt
            .query_map(params![project_id, keyword.trim()], scan_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(scans)
    }

    pub fn scan_points(&self, scan_id: &str) -> Result<Vec<StoredPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT point_index, grid_row, grid_col, latitude, longitude, position, business_count, error
             FROM scan_points WHERE scan_id = ?1 ORDER BY point_index",
        )?;

        let points = stmt
            .query_map(params![scan_id], |row| {
                Ok(StoredPoint {
                    index: row.get::<_, i64>(0)? as usize,
                    row: row.get::<_, i64>(1)? as usize,
                    col: row.get::<_, i64>(2)? as usize,
                    coordinate: Coordinate::new(row.get(3)?, row.get(4)?),
                    position: row.get(5)?,
                    business_count: row.get(6)?,
                    error: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(points)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
