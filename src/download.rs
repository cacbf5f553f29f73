//! # Forecast Downloads
//!
//! Fetches each enabled station's forecast file over HTTPS and stores it in
//! the configured data directory, where the update cycle picks it up.
//!
//! ## Error Handling
//!
//! Every station is downloaded independently:
//! - **Network failures**: logged for the station, its previous file stays in place
//! - **Non-200 responses**: treated as a failed download, nothing is written
//! - **File system issues**: logged, other stations still download
//!
//! The body is received in full, written next to the target and renamed over
//! it, so neither an interrupted transfer nor a failed write destroys the last
//! good forecast.

use crate::config::{Config, StationConfig};
use reqwest::{Client, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Errors that can occur while downloading a station's forecast.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request failed (network, TLS or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with anything but 200 OK
    #[error("unexpected status {0}")]
    Status(StatusCode),

    /// Writing the forecast file failed
    #[error("write IO: {0}")]
    Write(#[from] io::Error),
}

/// Build the HTTP client used for all forecast downloads.
pub fn client(config: &Config) -> Result<Client, DownloadError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .build()?)
}

/// Download one file to `target`, returning the number of bytes written.
pub async fn download_file(client: &Client, url: &str, target: &Path) -> Result<usize, DownloadError> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::OK {
        return Err(DownloadError::Status(response.status()));
    }
    let body = response.bytes().await?;

    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let partial = partial_path(target);
    if let Err(e) = tokio::fs::write(&partial, &body).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    tokio::fs::rename(&partial, target).await?;
    Ok(body.len())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Download one station's forecast into the data directory.
pub async fn download_station(
    client: &Client,
    config: &Config,
    device: &StationConfig,
) -> Result<usize, DownloadError> {
    let url = config.station_url(device);
    let target = config.csv_path(device);
    info!(station = %device.station_name, %url, "downloading forecast");
    download_file(client, &url, &target).await
}

/// Download all enabled stations concurrently.
///
/// Returns how many stations were downloaded successfully. Failures are
/// logged per station and do not stop the others.
pub async fn download_all(config: &Config) -> Result<usize, DownloadError> {
    let client = client(config)?;
    let mut tasks = JoinSet::new();

    for device in config.enabled_devices() {
        let client = client.clone();
        let config = config.clone();
        let device = device.clone();
        tasks.spawn(async move {
            let result = download_station(&client, &config, &device).await;
            (device.station_name, result)
        });
    }

    let mut downloaded = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((station, Ok(bytes))) => {
                info!(station = %station, bytes, "forecast downloaded");
                downloaded += 1;
            }
            Ok((station, Err(e))) => error!(station = %station, "forecast download failed: {}", e),
            Err(e) => error!("download task failed: {}", e),
        }
    }
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`, returning the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn config_with_station(download_url: &str, data_dir: PathBuf) -> Config {
        Config {
            download_url: download_url.to_string(),
            data_dir,
            devices: vec![StationConfig {
                station_name: "Vlissingen".to_string(),
                enabled: true,
                csv_file_name: "vlissingen.csv".to_string(),
                url_suffix: "/vlis.csv".to_string(),
                station_lat: 51.4425,
                station_lon: 3.5961,
            }],
            ..Config::default()
        }
    }

    #[test]
    fn client_builds_from_config() {
        assert!(client(&Config::default()).is_ok());
    }

    #[tokio::test]
    async fn not_found_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("vlissingen.csv");
        let base = serve_once("404 Not Found", "gone").await;
        let client = client(&Config::default()).unwrap();

        let result = download_file(&client, &format!("{}/vlis.csv", base), &target).await;

        assert!(matches!(result, Err(DownloadError::Status(StatusCode::NOT_FOUND))));
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn successful_download_replaces_forecast() {
        const BODY: &str = "Datum;Tijd;Verwachting\n5-3-2024;12:00:00;100\n";
        let dir = TempDir::new().unwrap();
        let base = serve_once("200 OK", BODY).await;
        let config = config_with_station(&base, dir.path().to_path_buf());
        let target = config.csv_path(&config.devices[0]);
        std::fs::write(&target, "old forecast").unwrap();

        let downloaded = download_all(&config).await.unwrap();

        assert_eq!(downloaded, 1);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), BODY);
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn unreachable_server_is_isolated_per_station() {
        let dir = TempDir::new().unwrap();
        // Port 9 on localhost refuses connections, no network needed
        let config = config_with_station("http://127.0.0.1:9", dir.path().to_path_buf());

        let downloaded = download_all(&config).await.unwrap();

        assert_eq!(downloaded, 0);
        assert!(!config.csv_path(&config.devices[0]).exists());
    }
}
