//! mcp-bridge CLI binary entry point.

use clap::Parser;
use mcp_bridge::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = mcp_bridge::cli::run(Cli::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
