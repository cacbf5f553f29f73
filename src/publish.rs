//! # Delta Publishing
//!
//! Scan results leave the crate as Signal K style delta messages, one per
//! station and event:
//!
//! ```json
//! {"context":"aton.Vlissingen","updates":[{"values":[
//!   {"path":"environment.depth.belowSurface","value":"+1.20"},
//!   {"path":"environment.tidalTrend","value":"HW"}]}]}
//! ```
//!
//! Where messages go is behind the [`Publisher`] trait. The binary writes
//! JSON lines to stdout; tests and embedders can collect them with
//! [`MemoryPublisher`].

use crate::config::StationConfig;
use crate::ScanResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::sync::Mutex;
use thiserror::Error;

pub const PATH_POSITION: &str = "navigation.position";
pub const PATH_CURRENT_LEVEL: &str = "environment.depth.belowSurface";
pub const PATH_TIDAL_TREND: &str = "environment.tidalTrend";
pub const PATH_NEXT_EXTREME: &str = "environment.nextExtreme";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("serialize delta: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write delta: {0}")]
    Io(#[from] io::Error),
}

/// One update message for a single context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub context: String,
    pub updates: Vec<Update>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub values: Vec<PathValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    pub value: Value,
}

impl PathValue {
    pub fn new(path: &str, value: impl Into<Value>) -> Self {
        PathValue {
            path: path.to_string(),
            value: value.into(),
        }
    }
}

impl Delta {
    /// A single update carrying `values` for the station's context.
    pub fn for_station(station: &str, values: Vec<PathValue>) -> Self {
        Delta {
            context: station_context(station),
            updates: vec![Update { values }],
        }
    }

    /// Fixed station data published once at startup, with the tide fields
    /// cleared until the first scan fills them.
    pub fn station_defaults(device: &StationConfig) -> Self {
        Delta::for_station(
            &device.station_name,
            vec![
                PathValue::new(
                    PATH_POSITION,
                    json!({ "latitude": device.station_lat, "longitude": device.station_lon }),
                ),
                PathValue::new(PATH_NEXT_EXTREME, ""),
                PathValue::new(PATH_TIDAL_TREND, ""),
            ],
        )
    }

    /// The message announcing a scan result.
    ///
    /// A current level without a known trend leaves the trend path out.
    pub fn from_result(station: &str, result: &ScanResult) -> Self {
        let values = match result {
            ScanResult::CurrentLevel { level, trend, .. } => {
                let mut values = vec![PathValue::new(PATH_CURRENT_LEVEL, format_level(*level))];
                if let Some(trend) = trend {
                    values.push(PathValue::new(PATH_TIDAL_TREND, trend.direction.label()));
                }
                values
            }
            ScanResult::NextExtreme {
                direction,
                timestamp,
                level,
            } => vec![PathValue::new(
                PATH_NEXT_EXTREME,
                format!(
                    "{} {} {}",
                    direction.label(),
                    timestamp.format("%H:%M"),
                    format_level(*level)
                ),
            )],
        };
        Delta::for_station(station, values)
    }

    /// Value published at `path`, if any
    pub fn value(&self, path: &str) -> Option<&Value> {
        self.updates
            .iter()
            .flat_map(|u| u.values.iter())
            .find(|v| v.path == path)
            .map(|v| &v.value)
    }
}

pub fn station_context(station: &str) -> String {
    format!("aton.{}", station)
}

/// Two fractional digits, with an explicit `+` on positive levels.
///
/// ```
/// use tide_station_lib::publish::format_level;
///
/// assert_eq!(format_level(1.2), "+1.20");
/// assert_eq!(format_level(-0.35), "-0.35");
/// assert_eq!(format_level(0.0), "0.00");
/// ```
pub fn format_level(level: f64) -> String {
    if level > 0.0 {
        format!("+{:.2}", level)
    } else {
        format!("{:.2}", level)
    }
}

/// Destination for delta messages. Shared across station tasks.
pub trait Publisher: Send + Sync {
    fn publish(&self, delta: &Delta) -> Result<(), PublishError>;
}

/// Writes each delta as one JSON line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn publish(&self, delta: &Delta) -> Result<(), PublishError> {
        let line = serde_json::to_string(delta)?;
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps published deltas in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    deltas: Mutex<Vec<Delta>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn deltas(&self) -> Vec<Delta> {
        self.deltas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Deltas published for one station, in publish order
    pub fn deltas_for(&self, station: &str) -> Vec<Delta> {
        let context = station_context(station);
        self.deltas()
            .into_iter()
            .filter(|d| d.context == context)
            .collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, delta: &Delta) -> Result<(), PublishError> {
        self.deltas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(delta.clone());
        Ok(())
    }
}
