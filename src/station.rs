//! # Station Processing
//!
//! Runs one update cycle per station: open the forecast file, scan it for the
//! current level and the next extreme, publish what was found. Stations are
//! independent. A missing or unreadable file is logged for that station and
//! the others carry on.

use crate::config::{Config, StationConfig};
use crate::forecast::{ForecastReader, ReadingError};
use crate::publish::{Delta, PublishError, Publisher};
use crate::scanner::{ExtremeScanner, Phase};
use crate::Reading;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum StationError {
    #[error("cannot open forecast {}: {source}", .path.display())]
    Open { path: PathBuf, source: csv::Error },

    #[error("cannot read forecast: {0}")]
    Read(#[source] ReadingError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("station task failed: {0}")]
    Task(String),
}

/// What one station's update cycle did.
#[derive(Clone, Debug, PartialEq)]
pub struct StationSummary {
    pub station: String,
    /// Phase the scan ended in; `SeekingCurrent` means no reading matched "now"
    pub phase: Phase,
    pub published: usize,
    /// Rows with no forecast value
    pub missing_rows: usize,
    /// Rows that could not be parsed
    pub malformed_rows: usize,
}

impl StationSummary {
    pub fn found_current_level(&self) -> bool {
        self.phase > Phase::SeekingCurrent
    }
}

/// Scan a reading sequence for one station and publish its results.
///
/// Rows that failed to parse are skipped as if absent, so they never take
/// part in a trend. A read failure ends the scan and fails the station
/// without publishing.
pub fn process_readings<I>(
    station: &str,
    readings: I,
    reference: NaiveDateTime,
    publisher: &dyn Publisher,
) -> Result<StationSummary, StationError>
where
    I: IntoIterator<Item = Result<Reading, ReadingError>>,
{
    let mut missing_rows = 0;
    let mut malformed_rows = 0;
    let mut read_error = None;

    let rows = readings.into_iter().map_while(|row| match row {
        Ok(reading) => Some(Some(reading)),
        Err(e) if e.is_io() => {
            read_error = Some(e);
            None
        }
        Err(e) if e.is_missing_level() => {
            missing_rows += 1;
            Some(None)
        }
        Err(e) => {
            debug!(station, "skipping forecast row: {}", e);
            malformed_rows += 1;
            Some(None)
        }
    });
    let report = ExtremeScanner::new(reference).scan(rows.flatten());

    if let Some(e) = read_error {
        return Err(StationError::Read(e));
    }

    if malformed_rows > 0 {
        warn!(station, malformed_rows, "skipped malformed forecast rows");
    }

    for result in &report.results {
        publisher.publish(&Delta::from_result(station, result))?;
    }

    match report.phase {
        Phase::SeekingCurrent => info!(station, %reference, "no current level found"),
        Phase::SeekingExtreme => info!(station, "no tide turn before end of forecast"),
        Phase::Done => debug!(station, readings = report.readings_seen, "scan complete"),
    }

    Ok(StationSummary {
        station: station.to_string(),
        phase: report.phase,
        published: report.results.len(),
        missing_rows,
        malformed_rows,
    })
}

/// Scan one station's forecast file and publish its results.
pub fn process_station(
    device: &StationConfig,
    csv_path: &Path,
    reference: NaiveDateTime,
    publisher: &dyn Publisher,
) -> Result<StationSummary, StationError> {
    debug!(station = %device.station_name, path = %csv_path.display(), "reading forecast");
    let readings = ForecastReader::open(csv_path).map_err(|source| StationError::Open {
        path: csv_path.to_path_buf(),
        source,
    })?;
    process_readings(&device.station_name, readings, reference, publisher)
}

/// Publish fixed station data for every enabled station.
pub fn initialise_stations(config: &Config, publisher: &dyn Publisher) -> Result<(), PublishError> {
    info!("initialising tide stations");
    for device in config.enabled_devices() {
        publisher.publish(&Delta::station_defaults(device))?;
    }
    Ok(())
}

/// Run an update cycle for all enabled stations concurrently.
///
/// Every enabled station gets an entry in the returned list, sorted by
/// station name, whether it succeeded or not.
pub async fn update_stations(
    config: Arc<Config>,
    reference: NaiveDateTime,
    publisher: Arc<dyn Publisher>,
) -> Vec<(String, Result<StationSummary, StationError>)> {
    info!(%reference, "updating tide stations");

    let mut tasks = JoinSet::new();
    // Stations whose task has not reported back yet
    let mut pending = Vec::new();
    for device in config.enabled_devices() {
        let device = device.clone();
        let csv_path = config.csv_path(&device);
        let publisher = Arc::clone(&publisher);
        pending.push(device.station_name.clone());
        tasks.spawn_blocking(move || {
            let result = process_station(&device, &csv_path, reference, publisher.as_ref());
            (device.station_name, result)
        });
    }

    let mut outcomes = Vec::new();
    let mut task_failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((station, result)) => {
                if let Err(e) = &result {
                    error!(station = %station, "station update failed: {}", e);
                }
                if let Some(i) = pending.iter().position(|name| *name == station) {
                    pending.swap_remove(i);
                }
                outcomes.push((station, result));
            }
            Err(e) => task_failures.push(e.to_string()),
        }
    }

    // A panicked task cannot say who it was, but it is one of the stations
    // still pending
    let reason = task_failures.join("; ");
    for station in pending {
        error!(station = %station, "station task failed: {}", reason);
        outcomes.push((station, Err(StationError::Task(reason.clone()))));
    }

    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    outcomes
}
