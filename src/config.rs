//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! tide-stations.toml file. It provides the forecast download endpoint, the
//! data directory where station files live, the update schedule and the list
//! of tide stations to publish.
//!
//! ```toml
//! download_url = "https://example.org/forecast/"
//! data_dir = "data"
//!
//! [[devices]]
//! station_name = "Vlissingen"
//! csv_file_name = "vlissingen.csv"
//! url_suffix = "vlissingen"
//! station_lat = 51.4425
//! station_lon = 3.5961
//! ```

use crate::scanner::DEFAULT_GRID_MINUTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Longest schedule interval; the runtime timer cannot represent much more
const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 3600);

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "tide-stations.toml";

/// Application configuration loaded from tide-stations.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL; each station's `url_suffix` is appended to it
    pub download_url: String,
    /// Directory holding the downloaded station files
    pub data_dir: PathBuf,
    /// Minutes between update cycles
    pub update_interval_minutes: u64,
    /// Hours between forecast downloads
    pub download_interval_hours: u64,
    /// Sampling grid of the forecast files in minutes
    pub grid_minutes: u32,
    /// Per-request download timeout in seconds
    pub download_timeout_secs: u64,
    /// Tide stations
    pub devices: Vec<StationConfig>,
}

/// A single tide station
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StationConfig {
    /// Name used in the published context (`aton.<station_name>`)
    pub station_name: String,
    /// Disabled stations are neither downloaded nor published
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// File name of the station's forecast inside `data_dir`
    pub csv_file_name: String,
    /// Appended to `download_url` to fetch this station's forecast
    #[serde(default)]
    pub url_suffix: String,
    /// Station latitude in decimal degrees
    pub station_lat: f64,
    /// Station longitude in decimal degrees
    pub station_lon: f64,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            download_url: String::new(),
            data_dir: PathBuf::from("data"),
            update_interval_minutes: 10,
            download_interval_hours: 6,
            grid_minutes: DEFAULT_GRID_MINUTES,
            download_timeout_secs: 30,
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from specified path, usually [`DEFAULT_CONFIG_PATH`]
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        stations = config.devices.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), "invalid config file format: {}", e);
                    warn!("using default configuration (no stations)");
                    Self::default()
                }
            },
            Err(_) => {
                warn!(
                    path = %path.display(),
                    "no config file found, using default configuration (no stations)"
                );
                Self::default()
            }
        }
    }

    /// Time between update cycles, at least a minute and at most a year
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes.max(1).saturating_mul(60)).min(MAX_INTERVAL)
    }

    pub fn download_interval(&self) -> Duration {
        Duration::from_secs(self.download_interval_hours.saturating_mul(3600)).min(MAX_INTERVAL)
    }

    /// Stations that should be downloaded and published
    pub fn enabled_devices(&self) -> impl Iterator<Item = &StationConfig> {
        self.devices.iter().filter(|d| d.enabled)
    }

    /// Location of a station's forecast file
    pub fn csv_path(&self, device: &StationConfig) -> PathBuf {
        self.data_dir.join(&device.csv_file_name)
    }

    /// Full download URL of a station's forecast file
    pub fn station_url(&self, device: &StationConfig) -> String {
        format!("{}{}", self.download_url, device.url_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
download_url = "https://example.org/forecast/"
data_dir = "/var/lib/tide"
grid_minutes = 10

[[devices]]
station_name = "Vlissingen"
csv_file_name = "vlissingen.csv"
url_suffix = "vlis"
station_lat = 51.4425
station_lon = 3.5961

[[devices]]
station_name = "Hoek van Holland"
enabled = false
csv_file_name = "hvh.csv"
station_lat = 51.9775
station_lon = 4.12
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.devices.is_empty());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.update_interval_minutes, 10);
        assert_eq!(config.grid_minutes, 10);
    }

    #[test]
    fn test_parse_stations() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert!(config.devices[0].enabled, "enabled should default to true");
        assert!(!config.devices[1].enabled);
        assert_eq!(config.devices[1].url_suffix, "");
        // Unset fields keep their defaults
        assert_eq!(config.download_interval_hours, 6);

        let enabled: Vec<_> = config.enabled_devices().map(|d| d.station_name.as_str()).collect();
        assert_eq!(enabled, vec!["Vlissingen"]);
    }

    #[test]
    fn test_station_paths() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let station = &config.devices[0];
        assert_eq!(
            config.csv_path(station),
            PathBuf::from("/var/lib/tide/vlissingen.csv")
        );
        assert_eq!(
            config.station_url(station),
            "https://example.org/forecast/vlis"
        );
    }

    #[test]
    fn test_intervals() {
        let mut config = Config::default();
        assert_eq!(config.update_interval(), Duration::from_secs(600));
        assert_eq!(config.download_interval(), Duration::from_secs(6 * 3600));

        config.update_interval_minutes = 0;
        assert_eq!(config.update_interval(), Duration::from_secs(60));

        // Huge values from a hand-edited file are capped instead of overflowing
        config.update_interval_minutes = u64::MAX;
        config.download_interval_hours = u64::MAX;
        assert_eq!(config.update_interval(), MAX_INTERVAL);
        assert_eq!(config.download_interval(), MAX_INTERVAL);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.devices[0].station_name, "Vlissingen");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"devices = 12").unwrap();
        let config = Config::load_from_path(file.path());
        assert!(config.devices.is_empty());
    }
}
