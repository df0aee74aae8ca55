use colored::Colorize;
use commands::command_argument_builder;
use gridrank::handlers::{
    AppContext, handle_combos, handle_estimate, handle_geocode, handle_grid, handle_history,
    handle_init, handle_project_add, handle_project_list, handle_project_track, handle_report,
    handle_scan,
};
use gridrank_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        return;
    }

    let config_dir = chosen_command
        .get_one::<String>("config-dir")
        .map(String::as_str)
        .unwrap_or(gridrank_core::config::DEFAULT_CONFIG_DIR);

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command, config_dir),
        Some((name, primary_command)) => match AppContext::load(config_dir) {
            Ok(ctx) => match (name, primary_command.subcommand()) {
                ("project", Some(("add", secondary_command))) => {
                    handle_project_add(secondary_command, &ctx).await
                }
                ("project", Some(("list", _))) => handle_project_list(&ctx),
                ("project", Some(("track", secondary_command))) => {
                    handle_project_track(secondary_command, &ctx)
                }
                ("grid", _) => handle_grid(primary_command, &ctx),
                ("estimate", _) => handle_estimate(primary_command, &ctx),
                ("scan", _) => handle_scan(primary_command, &ctx).await,
                ("report", _) => handle_report(primary_command, &ctx),
                ("history", _) => handle_history(primary_command, &ctx),
                ("combos", _) => handle_combos(primary_command, &ctx),
                ("geocode", _) => handle_geocode(primary_command, &ctx).await,
                _ => unreachable!("clap should ensure we don't get here"),
            },
            Err(e) => Err(e),
        },
        None => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
