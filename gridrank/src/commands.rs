use crate::CLAP_STYLING;
use clap::{arg, command};
use gridrank_core::config::DEFAULT_CONFIG_DIR;

fn project_arg() -> clap::Arg {
    arg!(-p --"project" <NAME>)
        .required(true)
        .help("The name of the project")
}

fn keyword_arg() -> clap::Arg {
    arg!(-k --"keyword" <KEYWORD>)
        .required(true)
        .help("The keyword phrase to rank for, e.g. \"emergency plumber\"")
}

fn latitude_arg(required: bool) -> clap::Arg {
    arg!(--"lat" <LATITUDE>)
        .required(required)
        .allow_negative_numbers(true)
        .help("Latitude in decimal degrees")
        .value_parser(clap::value_parser!(f64))
}

fn longitude_arg(required: bool) -> clap::Arg {
    arg!(--"lng" <LONGITUDE>)
        .required(required)
        .allow_negative_numbers(true)
        .help("Longitude in decimal degrees")
        .value_parser(clap::value_parser!(f64))
}

fn size_arg() -> clap::Arg {
    arg!(-s --"size" <N>)
        .required(false)
        .help("Grid size; the grid has N x N points (default from config)")
        .value_parser(clap::value_parser!(usize))
}

fn radius_arg() -> clap::Arg {
    arg!(-r --"radius" <KM>)
        .required(false)
        .help("Distance from the center to the grid edge in km (default from config)")
        .value_parser(clap::value_parser!(f64))
}

fn workers_arg() -> clap::Arg {
    arg!(-t --"workers" <NUM_WORKERS>)
        .required(false)
        .help("The number of concurrent ranking lookups (default from config)")
        .value_parser(clap::value_parser!(usize))
}

fn format_arg(formats: &'static [&'static str]) -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help(format!("Output format: {}", formats.join(", ")))
        .value_parser(formats.to_vec())
        .default_value("text")
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("gridrank")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("gridrank")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-c --"config-dir" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding config.toml and the gridrank database")
                .default_value(DEFAULT_CONFIG_DIR),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the config file and database in the config directory")
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrite any existing config file and database")
                        .required(false),
                ),
        )
        .subcommand(
            command!("project")
                .about("Manage projects (a business and its base location)")
                .subcommand_required(true)
                .subcommand(
                    command!("add")
                        .about("Adds a project. Without --lat/--lng the location is geocoded.")
                        .arg(
                            arg!(-n --"name" <NAME>)
                                .required(true)
                                .help("The name of the project"),
                        )
                        .arg(
                            arg!(-l --"location" <PLACE>)
                                .required(true)
                                .help("The business's base town or city"),
                        )
                        .arg(latitude_arg(false).requires("lng"))
                        .arg(longitude_arg(false).requires("lat"))
                        .arg(
                            arg!(--"target" <NAME_OR_DOMAIN>)
                                .required(false)
                                .help("Business name or domain the rank API should look for"),
                        ),
                )
                .subcommand(command!("list").about("Lists all projects"))
                .subcommand(
                    command!("track")
                        .about("Marks a location as already covered so it is never proposed")
                        .arg(project_arg())
                        .arg(
                            arg!(-l --"location" <PLACE>)
                                .required(true)
                                .help("The location name"),
                        ),
                ),
        )
        .subcommand(
            command!("grid")
                .about("Prints the sample points of a grid without scanning")
                .arg(latitude_arg(true))
                .arg(longitude_arg(true))
                .arg(size_arg())
                .arg(radius_arg())
                .arg(format_arg(&["text", "json"])),
        )
        .subcommand(
            command!("estimate")
                .about("Estimates credits and duration for a scan")
                .arg(size_arg())
                .arg(workers_arg()),
        )
        .subcommand(
            command!("scan")
                .about("Runs a heat-map ranking scan for a project and keyword")
                .arg(project_arg())
                .arg(keyword_arg())
                .arg(size_arg())
                .arg(radius_arg())
                .arg(workers_arg())
                .arg(
                    arg!(--"interval-ms" <MILLIS>)
                        .required(false)
                        .help("Minimum delay between lookup starts across all workers")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"no-weak-locations")
                        .required(false)
                        .help("Skip reverse geocoding of weak points")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-seed")
                        .required(false)
                        .help("Do not create keyword + location combinations from weak locations")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-y --"yes")
                        .required(false)
                        .help("Skip the credit confirmation prompt")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(format_arg(&["text", "json", "csv"])),
        )
        .subcommand(
            command!("report")
                .about("Shows the report for a stored scan")
                .arg(
                    arg!([SCAN_ID])
                        .required(false)
                        .help("Scan id (default: latest scan for --project and --keyword)"),
                )
                .arg(project_arg().required(false))
                .arg(keyword_arg().required(false))
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(format_arg(&["text", "json", "csv"])),
        )
        .subcommand(
            command!("history")
                .about("Shows how the average position changed across scans")
                .arg(project_arg())
                .arg(keyword_arg())
                .arg(format_arg(&["text", "json"])),
        )
        .subcommand(
            command!("combos")
                .about("Lists keyword + location combinations for a project")
                .arg(project_arg()),
        )
        .subcommand(
            command!("geocode")
                .about("Looks up a place name, or the locality at a coordinate")
                .arg(
                    arg!(--"query" <PLACE>)
                        .required(false)
                        .help("Place name to look up")
                        .conflicts_with_all(["lat", "lng"]),
                )
                .arg(latitude_arg(false).requires("lng"))
                .arg(longitude_arg(false).requires("lat")),
        )
}
