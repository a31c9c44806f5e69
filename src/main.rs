use clap::Parser;
use tracing_subscriber::EnvFilter;

use awstags::cli::Cli;
use awstags::search::{run_search, SearchOptions};

/// Maps `-v` counts onto the default log level; RUST_LOG overrides.
/// Logs go to stderr so stdout stays plain JSON.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let opts = SearchOptions::from_cli(&cli)?;
    let reports = run_search(&opts).await?;

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
