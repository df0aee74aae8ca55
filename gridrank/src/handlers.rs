use anyhow::{Context, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use gridrank_core::GridRankError;
use gridrank_core::config::{CONFIG_FILE_NAME, Settings, database_path, resolve_config_dir};
use gridrank_core::data::{Database, Project};
use gridrank_core::grid::{GridSpec, generate_grid};
use gridrank_core::report::{
    HeatmapReportData, ReportFormat, gather_report_data, generate_csv_report,
    generate_history_json, generate_history_report, generate_json_report, generate_text_report,
    history_entries, save_report,
};
use gridrank_core::scan::{ScanOptions, ScanProgressCallback, execute_scan};
use gridrank_scanner::{
    Coordinate, Geocoder, HttpRankClient, NominatimGeocoder, RankChecker, RankScanner,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Settings plus the directory they came from.
pub struct AppContext {
    pub config_dir: PathBuf,
    pub settings: Settings,
}

impl AppContext {
    pub fn load(raw_config_dir: &str) -> anyhow::Result<Self> {
        let config_dir = resolve_config_dir(raw_config_dir);
        let settings = Settings::load(&config_dir)?;
        debug!("Loaded settings from {}", config_dir.display());
        Ok(Self {
            config_dir,
            settings,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.config_dir)
    }

    pub fn open_database(&self) -> anyhow::Result<Database> {
        let path = self.database_path();
        if !Database::exists(&path) {
            bail!(
                "No database at {}. Run `gridrank init` first.",
                path.display()
            );
        }
        Database::new(&path).with_context(|| format!("Failed to open {}", path.display()))
    }

    pub fn rank_checker(&self) -> anyhow::Result<Arc<dyn RankChecker>> {
        let api = &self.settings.rank_api;
        let client = HttpRankClient::new(&api.base_url, api.timeout_secs)?
            .with_api_key(api.api_key.clone());
        debug!("Rank lookups go to {}", client.endpoint());
        Ok(Arc::new(client))
    }

    pub fn geocoder(&self) -> anyhow::Result<Arc<dyn Geocoder>> {
        let geo = &self.settings.geocoder;
        let geocoder =
            NominatimGeocoder::new(&geo.base_url, Some(geo.user_agent.as_str()), geo.timeout_secs)?;
        Ok(Arc::new(geocoder))
    }
}

pub fn find_project(db: &Database, name: &str) -> anyhow::Result<Project> {
    db.get_project(name)?
        .ok_or_else(|| GridRankError::ProjectNotFound(name.to_string()).into())
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // a second call in the same process is a no-op
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Trim and collapse internal whitespace; empty keywords are rejected.
pub fn parse_keyword(raw: &str) -> Result<String, String> {
    let keyword = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if keyword.is_empty() {
        Err("Keyword must not be empty".to_string())
    } else {
        Ok(keyword)
    }
}

pub fn parse_coordinate(latitude: f64, longitude: f64) -> Result<Coordinate, String> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("Latitude {} is out of range", latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("Longitude {} is out of range", longitude));
    }
    Ok(Coordinate::new(latitude, longitude))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

pub fn parse_report_format(raw: &str) -> anyhow::Result<ReportFormat> {
    ReportFormat::from_str(raw).ok_or_else(|| anyhow!("Unknown report format '{}'", raw))
}

pub fn render_scan_report(
    data: &HeatmapReportData,
    format: ReportFormat,
    colorize: bool,
) -> anyhow::Result<String> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(data, colorize),
        ReportFormat::Json => generate_json_report(data)?,
        ReportFormat::Csv => generate_csv_report(data),
    })
}

fn emit_report(content: &str, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(msg: String) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(msg);
    Ok(spinner)
}

fn grid_size(args: &ArgMatches, ctx: &AppContext) -> usize {
    args.get_one::<usize>("size")
        .copied()
        .unwrap_or(ctx.settings.scan.grid_size)
}

fn workers(args: &ArgMatches, ctx: &AppContext) -> usize {
    args.get_one::<usize>("workers")
        .copied()
        .unwrap_or(ctx.settings.scan.workers)
}

pub fn handle_init(args: &ArgMatches, raw_config_dir: &str) -> anyhow::Result<()> {
    print_divider();
    println!("{}", "  GRIDRANK INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let force = args.get_flag("force");
    let config_dir = resolve_config_dir(raw_config_dir);
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let db_path = database_path(&config_dir);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    if config_path.exists() && !force {
        println!(
            "{} Keeping existing config: {}",
            "→".blue(),
            config_path.display().to_string().bright_white()
        );
    } else {
        Settings::default().save(&config_path)?;
        println!(
            "{} Config written: {}",
            "✓".green().bold(),
            config_path.display().to_string().bright_white()
        );
    }

    if Database::exists(&db_path) {
        let overwrite = if force {
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "Database already exists at {}",
                db_path.display().to_string().bright_white()
            );
            let response = print_prompt("Would you like to overwrite it? [y/N]:")?;
            response == "y" || response == "yes"
        };

        if overwrite {
            Database::drop(&db_path)?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
    }

    if !Database::exists(&db_path) {
        Database::new(&db_path)?;
        println!(
            "{} Database initialized: {}",
            "✓".green().bold(),
            db_path.display().to_string().bright_white()
        );
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    Ok(())
}

pub async fn handle_project_add(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let name = args
        .get_one::<String>("name")
        .context("--name is required")?;
    let location = args
        .get_one::<String>("location")
        .context("--location is required")?;
    let target = args.get_one::<String>("target").map(String::as_str);

    let center = match (args.get_one::<f64>("lat"), args.get_one::<f64>("lng")) {
        (Some(lat), Some(lng)) => parse_coordinate(*lat, *lng).map_err(|e| anyhow!(e))?,
        _ => {
            init_tracing();
            let spinner = spinner(format!("Geocoding {}...", location))?;
            let found = ctx.geocoder()?.forward(location).await;
            spinner.finish_and_clear();
            found?.ok_or_else(|| {
                anyhow!(
                    "Could not find '{}'. Pass --lat and --lng instead.",
                    location
                )
            })?
        }
    };

    db.create_project(name, location, center, target)
        .with_context(|| format!("Failed to create project '{}'", name))?;

    println!(
        "{} Project {} added at {:.5}, {:.5} ({})",
        "✓".green().bold(),
        name.bright_white().bold(),
        center.latitude,
        center.longitude,
        location
    );
    Ok(())
}

pub fn handle_project_list(ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let projects = db.list_projects()?;

    if projects.is_empty() {
        println!("No projects yet. Add one with `gridrank project add`.");
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<24} {:<20} {:>10} {:>11}  {}",
            "Name", "Base location", "Latitude", "Longitude", "Target"
        )
        .bold()
    );
    for project in projects {
        println!(
            "{:<24} {:<20} {:>10.5} {:>11.5}  {}",
            project.name,
            project.base_location,
            project.center.latitude,
            project.center.longitude,
            project.target.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn handle_project_track(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let project = find_project(&db, args.get_one::<String>("project").context("--project is required")?)?;
    let location = args
        .get_one::<String>("location")
        .context("--location is required")?;

    if db.add_tracked_location(&project.id, location)? {
        println!(
            "{} {} is now tracked for {}",
            "✓".green().bold(),
            location.bright_white(),
            project.name
        );
    } else {
        println!("{} {} was already tracked", "→".blue(), location);
    }
    Ok(())
}

pub fn handle_grid(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let lat = *args.get_one::<f64>("lat").context("--lat is required")?;
    let lng = *args.get_one::<f64>("lng").context("--lng is required")?;
    let radius = args
        .get_one::<f64>("radius")
        .copied()
        .unwrap_or(ctx.settings.scan.radius_km);

    let spec = GridSpec::new(Coordinate::new(lat, lng), grid_size(args, ctx), radius)?;
    let points = generate_grid(&spec)?;

    match parse_report_format(args.get_one::<String>("format").map_or("text", String::as_str))? {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&points)?),
        _ => {
            println!(
                "{}x{} grid, {} km radius, {:.3} km between points",
                spec.size,
                spec.size,
                spec.radius_km,
                spec.step_km()
            );
            for point in &points {
                println!(
                    "  [{:>2},{:>2}] {:>10.6} {:>11.6}",
                    point.row, point.col, point.coordinate.latitude, point.coordinate.longitude
                );
            }
        }
    }
    Ok(())
}

pub fn handle_estimate(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let size = grid_size(args, ctx);
    let workers = workers(args, ctx);
    let api = &ctx.settings.rank_api;

    let estimate = RankScanner::estimate(
        size * size,
        workers,
        api.credits_per_lookup,
        Duration::from_millis(api.assumed_latency_ms),
    );

    println!("Grid:      {}x{} ({} lookups)", size, size, estimate.lookups);
    println!("Workers:   {}", workers);
    println!("Credits:   {}", estimate.credits);
    println!(
        "Duration:  ~{} {}",
        format_duration(estimate.estimated_duration),
        "(estimate)".dimmed()
    );
    Ok(())
}

pub async fn handle_scan(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    init_tracing();

    let db = ctx.open_database()?;
    let project = find_project(&db, args.get_one::<String>("project").context("--project is required")?)?;
    let keyword = parse_keyword(
        args.get_one::<String>("keyword")
            .context("--keyword is required")?,
    )
    .map_err(|e| anyhow!(e))?;
    let format =
        parse_report_format(args.get_one::<String>("format").map_or("text", String::as_str))?;
    let output = args.get_one::<PathBuf>("output");

    let settings = &ctx.settings;
    let size = grid_size(args, ctx);
    let workers = workers(args, ctx);
    let radius_km = args
        .get_one::<f64>("radius")
        .copied()
        .unwrap_or(settings.scan.radius_km);
    let interval_ms = args
        .get_one::<u64>("interval-ms")
        .copied()
        .unwrap_or(settings.scan.request_interval_ms);
    let resolve_weak = !args.get_flag("no-weak-locations");

    let estimate = RankScanner::estimate(
        size * size,
        workers,
        settings.rank_api.credits_per_lookup,
        Duration::from_millis(settings.rank_api.assumed_latency_ms),
    );

    println!(
        "\n{} Scanning '{}' for {}",
        "→".blue().bold(),
        keyword.bright_white().bold(),
        project.name.bright_white().bold()
    );
    println!("Grid: {}x{} over {} km, {} workers", size, size, radius_km, workers);
    println!(
        "Cost: {} credits, ~{} {}\n",
        estimate.credits,
        format_duration(estimate.estimated_duration),
        "(estimate)".dimmed()
    );

    if !args.get_flag("yes") {
        let response = print_prompt("Continue? [Y/n]:")?;
        if response == "n" || response == "no" {
            println!("{} Scan cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let geocoder = if resolve_weak {
        Some(ctx.geocoder()?)
    } else {
        None
    };

    let options = ScanOptions {
        project,
        keyword,
        grid_size: size,
        radius_km,
        workers,
        request_interval: Duration::from_millis(interval_ms),
        thresholds: settings.thresholds,
        resolve_weak_locations: resolve_weak,
        seed_combinations: !args.get_flag("no-seed"),
        show_progress_bars: true,
    };

    let progress_callback: ScanProgressCallback = Arc::new(|msg: String| {
        println!("{} {}", "→".blue(), msg);
    });

    let outcome = execute_scan(
        &db,
        ctx.rank_checker()?,
        geocoder,
        options,
        Some(progress_callback),
    )
    .await?;

    println!(
        "\n{} Scan complete in {}\n",
        "✓".green().bold(),
        format_duration(outcome.result.elapsed)
    );

    let data = gather_report_data(&db, &outcome.scan_id, &settings.thresholds)?
        .ok_or_else(|| anyhow!("Scan {} was not stored", outcome.scan_id))?;
    let content = render_scan_report(&data, format, output.is_none())?;
    emit_report(&content, output)
}

/// Id of the newest scan for a project and keyword, matched the same way
/// `scan` stores keywords.
pub fn latest_scan_id(db: &Database, project: &str, keyword: &str) -> anyhow::Result<String> {
    let project = find_project(db, project)?;
    let keyword = parse_keyword(keyword).map_err(|e| anyhow!(e))?;
    let scan = db
        .latest_scan(&project.id, &keyword)?
        .ok_or_else(|| anyhow!("No scans for '{}' in {}", keyword, project.name))?;
    Ok(scan.id)
}

pub fn handle_report(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let format =
        parse_report_format(args.get_one::<String>("format").map_or("text", String::as_str))?;
    let output = args.get_one::<PathBuf>("output");

    let scan_id = match args.get_one::<String>("SCAN_ID") {
        Some(id) => id.clone(),
        None => {
            let (Some(project), Some(keyword)) = (
                args.get_one::<String>("project"),
                args.get_one::<String>("keyword"),
            ) else {
                bail!("Pass a scan id, or --project and --keyword");
            };
            latest_scan_id(&db, project, keyword)?
        }
    };

    let data = gather_report_data(&db, &scan_id, &ctx.settings.thresholds)?
        .ok_or_else(|| anyhow!("Scan not found: {}", scan_id))?;
    let content = render_scan_report(&data, format, output.is_none())?;
    emit_report(&content, output)
}

pub fn handle_history(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let project = find_project(&db, args.get_one::<String>("project").context("--project is required")?)?;
    let keyword = parse_keyword(
        args.get_one::<String>("keyword")
            .context("--keyword is required")?,
    )
    .map_err(|e| anyhow!(e))?;

    let entries = history_entries(&db.scan_history(&project.id, &keyword)?);
    let content =
        match parse_report_format(args.get_one::<String>("format").map_or("text", String::as_str))? {
            ReportFormat::Json => generate_history_json(&project.name, &keyword, &entries)?,
            _ => generate_history_report(&project.name, &keyword, &entries),
        };
    println!("{}", content);
    Ok(())
}

pub fn handle_combos(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database()?;
    let project = find_project(&db, args.get_one::<String>("project").context("--project is required")?)?;
    let combos = db.list_combinations(&project.id)?;

    if combos.is_empty() {
        println!("No combinations for {} yet.", project.name);
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<32} {:<24} {}", "Keyword", "Location", "Source").bold()
    );
    for combo in combos {
        println!(
            "{:<32} {:<24} {}",
            combo.keyword,
            combo.location,
            combo.source.as_str()
        );
    }
    Ok(())
}

pub async fn handle_geocode(args: &ArgMatches, ctx: &AppContext) -> anyhow::Result<()> {
    init_tracing();
    let geocoder = ctx.geocoder()?;

    if let Some(query) = args.get_one::<String>("query") {
        match geocoder.forward(query).await? {
            Some(at) => println!("{} {:.6}, {:.6}", query.bright_white(), at.latitude, at.longitude),
            None => println!("{} No match for '{}'", "✗".red(), query),
        }
        return Ok(());
    }

    match (args.get_one::<f64>("lat"), args.get_one::<f64>("lng")) {
        (Some(lat), Some(lng)) => {
            let at = parse_coordinate(*lat, *lng).map_err(|e| anyhow!(e))?;
            match geocoder.reverse(at).await? {
                Some(name) => println!("{}", name.bright_white()),
                None => println!("{} No locality at {:.5}, {:.5}", "✗".red(), lat, lng),
            }
            Ok(())
        }
        _ => bail!("Pass --query, or --lat and --lng"),
    }
}
