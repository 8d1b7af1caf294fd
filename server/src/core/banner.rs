//! Startup banner and URL display

use super::config::{AppConfig, is_all_interfaces};
use super::constants::APP_NAME;
use crate::utils::terminal::{banner_row, terminal_link};

/// Host shown in URLs; all-interfaces binds are displayed as localhost
fn display_host(host: &str) -> &str {
    if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    }
}

/// Print the startup banner with URLs
pub fn print_banner(config: &AppConfig, data_dir: &str) {
    let host = display_host(&config.server.host);
    let port = config.server.port;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let ingest_url = format!("ws://{}:{}{}", host, port, config.ingest.path);
    let ingest_note = if config.ingest.token.is_some() {
        " \x1b[90m(token required)\x1b[0m"
    } else {
        ""
    };
    println!(
        "{}",
        banner_row(32, "OneBot socket:", &format!("{}{}", ingest_url, ingest_note))
    );

    let stats_url = format!("http://{}:{}/api/v1/stats/bots", host, port);
    println!("{}", banner_row(33, "Stats API:", &terminal_link(&stats_url)));

    let docs_url = format!("http://{}:{}/api/docs", host, port);
    println!("{}", banner_row(35, "API docs:", &terminal_link(&docs_url)));

    if config.server.host == "127.0.0.1" || config.server.host == "localhost" {
        println!(
            "  \x1b[90m➜  {:<14} use --host 0.0.0.0 to expose\x1b[0m",
            "Network:"
        );
    }

    println!(
        "  \x1b[90m➜  {:<14} {} known bot(s), {} probe endpoint(s), timezone {}\x1b[0m",
        "Tracking:",
        config.bots.len(),
        config.probes.endpoints.len(),
        config.calendar
    );
    println!("  \x1b[90m➜  {:<14} {}\x1b[0m", "Data:", data_dir);

    println!();
}
