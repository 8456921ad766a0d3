mod app;
mod config;
mod crs;
mod geocode;
mod io;
mod ops;
mod query;
mod schema;
mod table;
mod utils;

use anyhow::Result;
use clap::Parser;

use app::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let start = std::time::Instant::now();
    let row_count = app::run(&cli)?;

    let elapsed = start.elapsed();
    tracing::info!(
        "Done! {} rows written in {:.2}s",
        row_count,
        elapsed.as_secs_f64()
    );

    Ok(())
}
