pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod report;
pub mod scan;
pub mod session;
pub mod weak;

pub use error::{GridRankError, Result};

use colored::Colorize;

const BANNER: &str = r#"
   ____      _     _ ____             _
  / ___|_ __(_) __| |  _ \ __ _ _ __ | | __
 | |  _| '__| |/ _` | |_) / _` | '_ \| |/ /
 | |_| | |  | | (_| |  _ < (_| | | | |   <
  \____|_|  |_|\__,_|_| \_\__,_|_| |_|_|\_\
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_green().bold());
    println!(
        "  {} {}\n",
        "local search heat-map scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
