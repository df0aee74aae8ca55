// Report generation from database

use crate::aggregate::{DensityBucket, RankBand, ScanAggregate, Thresholds};
use crate::data::{Database, ScanRecord, StoredPoint};
use crate::weak::WeakLocation;
use colored::Colorize;
use gridrank_scanner::Coordinate;
use rusqlite::{OptionalExtension, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPoint {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub coordinate: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_count: Option<u32>,
    pub band: RankBand,
    pub density: DensityBucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapReportData {
    pub scan_id: String,
    pub project: String,
    pub keyword: String,
    pub center: Coordinate,
    pub grid_size: usize,
    pub radius_km: f64,
    pub status: String,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<ScanAggregate>,
    pub points: Vec<ReportPoint>,
    pub weak_locations: Vec<WeakLocation>,
}

impl HeatmapReportData {
    pub fn from_record(
        project: &str,
        record: &ScanRecord,
        points: &[StoredPoint],
        thresholds: &Thresholds,
    ) -> Self {
        let points = points
            .iter()
            .map(|p| ReportPoint {
                index: p.index,
                row: p.row,
                col: p.col,
                coordinate: p.coordinate,
                position: p.position,
                business_count: p.business_count,
                band: thresholds.rank_band(p.position),
                density: thresholds.density_bucket(p.business_count),
                error: p.error.clone(),
            })
            .collect();

        Self {
            scan_id: record.id.clone(),
            project: project.to_string(),
            keyword: record.keyword.clone(),
            center: record.center,
            grid_size: record.grid_size,
            radius_km: record.radius_km,
            status: record.status.clone(),
            started_at: record.started_at,
            completed_at: record.completed_at,
            aggregate: record.aggregate.clone(),
            points,
            weak_locations: record.weak_locations.clone(),
        }
    }

    fn status_to_string(&self) -> &str {
        match self.status.as_str() {
            "completed" => "Completed",
            "partial" => "Partial",
            "failed" => "Failed",
            "running" => "Running",
            _ => "Unknown",
        }
    }

    fn point_at(&self, row: usize, col: usize) -> Option<&ReportPoint> {
        self.points.iter().find(|p| p.row == row && p.col == col)
    }
}

/// Load a persisted scan and its points. `None` if the scan does not exist.
pub fn gather_report_data(
    db: &Database,
    scan_id: &str,
    thresholds: &Thresholds,
) -> Result<Option<HeatmapReportData>> {
    let Some(record) = db.get_scan(scan_id)? else {
        return Ok(None);
    };

    let project: String = db
        .get_connection()
        .query_row(
            "SELECT name FROM projects WHERE id = ?1",
            [&record.project_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or_else(|| record.project_id.clone());

    let points = db.scan_points(scan_id)?;
    Ok(Some(HeatmapReportData::from_record(
        &project, &record, &points, thresholds,
    )))
}

fn paint(cell: &str, band: RankBand, colorize: bool) -> String {
    if !colorize {
        return cell.to_string();
    }
    match band {
        RankBand::Top3 => cell.green().bold().to_string(),
        RankBand::TopTen => cell.yellow().to_string(),
        RankBand::Low => cell.red().to_string(),
        RankBand::NotRanked => cell.bright_black().to_string(),
    }
}

/// Render the N×N grid, north row first. Each cell is the position or `--`.
pub fn render_heat_grid(data: &HeatmapReportData, colorize: bool) -> String {
    let mut grid = String::new();

    for row in 0..data.grid_size {
        grid.push_str("  ");
        for col in 0..data.grid_size {
            let (cell, band) = match data.point_at(row, col) {
                Some(ReportPoint {
                    position: Some(position),
                    band,
                    ..
                }) => (format!("{:>3}", position), *band),
                Some(point) if point.error.is_some() => ("  !".to_string(), RankBand::NotRanked),
                _ => (" --".to_string(), RankBand::NotRanked),
            };
            grid.push_str(&paint(&cell, band, colorize));
            grid.push(' ');
        }
        grid.push('\n');
    }

    grid
}

fn section(report: &mut String, title: &str) {
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");
}

fn format_position(position: Option<f64>) -> String {
    position
        .map(|p| format!("{:.1}", p))
        .unwrap_or_else(|| "-".to_string())
}

pub fn generate_text_report(data: &HeatmapReportData, colorize: bool) -> String {
    let mut report = String::new();

    // Header
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("                        GRIDRANK HEAT-MAP REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Scan ID:      {}\n", data.scan_id));
    report.push_str(&format!("Project:      {}\n", data.project));
    report.push_str(&format!("Keyword:      {}\n", data.keyword));
    report.push_str(&format!("Status:       {}\n", data.status_to_string()));
    report.push_str(&format!("Scan Date:    {}\n", format_timestamp(data.started_at)));
    if let Some(end_time) = data.completed_at {
        report.push_str(&format!("Duration:     {} seconds\n", end_time - data.started_at));
    }
    report.push_str(&format!(
        "Center:       {:.5}, {:.5}\n",
        data.center.latitude, data.center.longitude
    ));
    report.push_str(&format!(
        "Grid:         {}x{} points, {} km radius\n\n",
        data.grid_size, data.grid_size, data.radius_km
    ));

    section(&mut report, "HEAT MAP (north at top)");
    report.push_str(&render_heat_grid(data, colorize));
    report.push('\n');
    report.push_str(&format!(
        "Legend: {} top 3   {} top 10   {} 11+   {} not ranked   {} lookup failed\n\n",
        paint("##", RankBand::Top3, colorize),
        paint("##", RankBand::TopTen, colorize),
        paint("##", RankBand::Low, colorize),
        paint("--", RankBand::NotRanked, colorize),
        "!",
    ));

    section(&mut report, "SUMMARY");
    match data.aggregate {
        Some(ref agg) => {
            report.push_str(&format!(
                "Average Position:  {}\n",
                format_position(agg.average_position)
            ));
            report.push_str(&format!("Ranked Points:     {}/{}\n", agg.ranked, agg.total()));
            report.push_str(&format!("Not Ranked:        {}\n", agg.not_ranked));
            if agg.failed > 0 {
                report.push_str(&format!("Failed Lookups:    {}\n", agg.failed));
            }
            if let (Some(best), Some(worst)) = (agg.best_position, agg.worst_position) {
                report.push_str(&format!("Best / Worst:      {} / {}\n", best, worst));
            }
            report.push_str(&format!("Top 3 Share:       {:.1}%\n\n", agg.top3_share()));
            report.push_str(&format!("  [TOP 3]      {}\n", agg.bands.top3));
            report.push_str(&format!("  [TOP 10]     {}\n", agg.bands.top10));
            report.push_str(&format!("  [11+]        {}\n", agg.bands.low));
            report.push_str(&format!("  [NOT RANKED] {}\n", agg.bands.not_ranked));
        }
        None => report.push_str("No results recorded.\n"),
    }
    report.push('\n');

    if !data.weak_locations.is_empty() {
        section(&mut report, "WEAK LOCATIONS");
        for (idx, location) in data.weak_locations.iter().enumerate() {
            let best = location
                .best_position
                .map(|p| format!("best #{}", p))
                .unwrap_or_else(|| "not ranked".to_string());
            report.push_str(&format!(
                "[{}] {}  ({} point{}, {})\n",
                idx + 1,
                location.name,
                location.point_count,
                if location.point_count == 1 { "" } else { "s" },
                best
            ));
        }
        report.push('\n');
    }

    let failures: Vec<&ReportPoint> = data.points.iter().filter(|p| p.error.is_some()).collect();
    if !failures.is_empty() {
        section(&mut report, "FAILED LOOKUPS");
        for point in failures {
            report.push_str(&format!(
                "  ({}, {}) {:.5},{:.5}: {}\n",
                point.row,
                point.col,
                point.coordinate.latitude,
                point.coordinate.longitude,
                point.error.as_deref().unwrap_or_default()
            ));
        }
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report
}

pub fn generate_json_report(data: &HeatmapReportData) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "GridRank",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "scan": {
                "id": data.scan_id,
                "project": data.project,
                "keyword": data.keyword,
                "status": data.status,
                "start_time": format_iso8601_timestamp(data.started_at),
                "end_time": data.completed_at.map(format_iso8601_timestamp),
                "center": data.center,
                "grid_size": data.grid_size,
                "radius_km": data.radius_km
            },
            "summary": data.aggregate,
            "points": data.points,
            "weak_locations": data.weak_locations
        }
    });

    serde_json::to_string_pretty(&json_report)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One row per grid point, in grid order.
pub fn generate_csv_report(data: &HeatmapReportData) -> String {
    let mut csv =
        String::from("index,row,col,latitude,longitude,position,business_count,band,density,error\n");

    for point in &data.points {
        csv.push_str(&format!(
            "{},{},{},{:.6},{:.6},{},{},{},{},{}\n",
            point.index,
            point.row,
            point.col,
            point.coordinate.latitude,
            point.coordinate.longitude,
            point.position.map(|p| p.to_string()).unwrap_or_default(),
            point.business_count.map(|c| c.to_string()).unwrap_or_default(),
            point.band.as_str(),
            point.density.as_str(),
            csv_field(point.error.as_deref().unwrap_or_default()),
        ));
    }

    csv
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub scan_id: String,
    pub started_at: i64,
    pub status: String,
    pub grid_size: usize,
    pub radius_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_position: Option<f64>,
    /// Change in average position against the previous scan that had one.
    /// Negative means the ranking improved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_delta: Option<f64>,
    pub ranked: usize,
    pub total: usize,
}

/// Build history rows, oldest first, from `Database::scan_history`.
pub fn history_entries(scans: &[ScanRecord]) -> Vec<HistoryEntry> {
    let mut previous: Option<f64> = None;

    scans
        .iter()
        .map(|scan| {
            let average_position = scan.aggregate.as_ref().and_then(|a| a.average_position);
            let average_delta = match (previous, average_position) {
                (Some(before), Some(now)) => Some(crate::aggregate::round_one_decimal(now - before)),
                _ => None,
            };
            if average_position.is_some() {
                previous = average_position;
            }

            HistoryEntry {
                scan_id: scan.id.clone(),
                started_at: scan.started_at,
                status: scan.status.clone(),
                grid_size: scan.grid_size,
                radius_km: scan.radius_km,
                average_position,
                average_delta,
                ranked: scan.aggregate.as_ref().map(|a| a.ranked).unwrap_or_default(),
                total: scan
                    .aggregate
                    .as_ref()
                    .map(ScanAggregate::total)
                    .unwrap_or(scan.grid_size * scan.grid_size),
            }
        })
        .collect()
}

pub fn generate_history_report(project: &str, keyword: &str, entries: &[HistoryEntry]) -> String {
    let mut report = String::new();

    section(&mut report, &format!("RANK HISTORY: {} / {}", project, keyword));

    if entries.is_empty() {
        report.push_str("No scans recorded.\n");
        return report;
    }

    report.push_str(&format!(
        "{:<22} {:<10} {:>6} {:>8} {:>7} {:>9}\n",
        "Date", "Status", "Grid", "Average", "Change", "Ranked"
    ));
    report.push_str(&format!("{}\n", "─".repeat(67)));

    for entry in entries {
        let delta = entry
            .average_delta
            .map(|d| format!("{:+.1}", d))
            .unwrap_or_else(|| "-".to_string());
        report.push_str(&format!(
            "{:<22} {:<10} {:>6} {:>8} {:>7} {:>9}\n",
            format_timestamp(entry.started_at),
            entry.status,
            format!("{}x{}", entry.grid_size, entry.grid_size),
            format_position(entry.average_position),
            delta,
            format!("{}/{}", entry.ranked, entry.total),
        ));
    }

    report
}

pub fn generate_history_json(
    project: &str,
    keyword: &str,
    entries: &[HistoryEntry],
) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "history": {
            "metadata": {
                "generator": "GridRank",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339()
            },
            "project": project,
            "keyword": keyword,
            "scans": entries
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}
