//! # Tide Stations Daemon
//!
//! Keeps each configured tide station's forecast file fresh and, every update
//! interval, publishes the station's current water level, tidal trend and
//! next high or low water as JSON delta lines on stdout. Logs go to stderr.
//!
//! Usage:
//!   tide-stations                           # run continuously
//!   tide-stations --once                    # single download + update cycle
//!   tide-stations --once --skip-download    # scan the files already on disk


use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tide_station_lib::config::{Config, DEFAULT_CONFIG_PATH};
use tide_station_lib::publish::{Publisher, StdoutPublisher};
use tide_station_lib::{download, scanner, station};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tide-stations")]
#[command(about = "Publishes current water level, tidal trend and next extreme per tide station")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "TIDE_STATIONS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Use the forecast files already in the data directory
    #[arg(long)]
    skip_download: bool,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Main application entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(Config::load_from_path(&args.config));
    if config.enabled_devices().next().is_none() {
        warn!(path = %args.config.display(), "no enabled stations configured");
    }

    let publisher: Arc<dyn Publisher> = Arc::new(StdoutPublisher);

    // Create Tokio runtime for downloads and station tasks
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(&args, config, publisher))
}

async fn run(args: &Args, config: Arc<Config>, publisher: Arc<dyn Publisher>) -> Result<()> {
    station::initialise_stations(&config, publisher.as_ref())?;

    let update_every = config.update_interval();
    let download_every = config.download_interval();
    let mut ticker = tokio::time::interval(update_every);
    let mut last_download: Option<Instant> = None;

    loop {
        ticker.tick().await;

        if !args.skip_download && last_download.map_or(true, |at| at.elapsed() >= download_every) {
            match download::download_all(&config).await {
                Ok(count) => info!(stations = count, "forecast downloads finished"),
                Err(e) => error!("forecast downloads failed: {}", e),
            }
            last_download = Some(Instant::now());
        }

        let reference = scanner::reference_instant(Local::now().naive_local(), config.grid_minutes);
        let outcomes =
            station::update_stations(Arc::clone(&config), reference, Arc::clone(&publisher)).await;
        let updated = outcomes
            .iter()
            .filter(|(_, r)| r.as_ref().is_ok_and(|s| s.found_current_level()))
            .count();
        info!(updated, stations = outcomes.len(), "update cycle finished");

        if args.once {
            break;
        }
    }

    Ok(())
}
