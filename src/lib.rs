//! # Tide Stations Core Library
//!
//! This library turns a station's pre-computed water level forecast into three
//! facts relative to "now": the current level, the current tidal trend, and the
//! time and level of the next high or low water.
//!
//! ## Design Philosophy
//!
//! ### Forward-only scanning
//! - **Single pass**: forecast files are read row by row and never rewound
//! - **Early exit**: the scan stops as soon as the next extreme is known
//! - **No shared state**: every scan owns its [`scanner::ScanState`], so stations
//!   can be processed concurrently without locks
//!
//! ### Temporal Resolution
//! Forecast series are sampled on a 10-minute grid. "Now" is rounded to the
//! same grid before it is compared against reading timestamps, so exactly one
//! reading can match.
//!
//! ### Data Flow
//! 1. **Download**: fetch each station's CSV forecast ([`download`])
//! 2. **Parse**: lazily turn rows into [`Reading`]s ([`forecast`])
//! 3. **Scan**: classify trends and find the next extreme ([`trend`], [`scanner`])
//! 4. **Publish**: emit delta messages per station ([`station`], [`publish`])
//!
//! ## Core Types
//!
//! - [`Reading`]: a single forecast level at a specific timestamp
//! - [`Direction`] / [`Trend`]: which way the water is moving
//! - [`ScanResult`]: what a scan reports for a station

use chrono::NaiveDateTime;
use std::fmt;

// Module declarations
pub mod config;
pub mod download;
pub mod forecast;
pub mod publish;
pub mod scanner;
pub mod station;
pub mod trend;

/// A single forecast water level at a specific local timestamp.
///
/// Levels are in metres relative to the chart datum of the source file and
/// may be negative.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_station_lib::Reading;
///
/// let timestamp = NaiveDate::from_ymd_opt(2024, 3, 5)
///     .unwrap()
///     .and_hms_opt(12, 20, 0)
///     .unwrap();
/// let reading = Reading { timestamp, level: 1.2 };
/// assert_eq!(reading.level, 1.2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Calendar date and time of day of the sample
    pub timestamp: NaiveDateTime,
    /// Forecast level in metres
    pub level: f64,
}

/// Direction of the water between two consecutive readings.
///
/// Rising water is heading for high water (HW), falling water for low
/// water (LW).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Rising,
    Falling,
}

impl Direction {
    /// Published token for this direction.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Rising => "HW",
            Direction::Falling => "LW",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified change between two consecutive readings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trend {
    pub direction: Direction,
    /// Signed level change in metres; zero on a flat step
    pub delta: f64,
}

/// A fact produced by scanning one station's series.
///
/// A scan yields at most one of each variant, `CurrentLevel` always first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScanResult {
    /// The reading matching the reference instant.
    ///
    /// `trend` is `None` when the match is the first reading of the series.
    CurrentLevel {
        timestamp: NaiveDateTime,
        level: f64,
        trend: Option<Trend>,
    },
    /// The last reading before the trend reversed after the current level.
    NextExtreme {
        direction: Direction,
        timestamp: NaiveDateTime,
        level: f64,
    },
}

impl ScanResult {
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            ScanResult::CurrentLevel { timestamp, .. } => *timestamp,
            ScanResult::NextExtreme { timestamp, .. } => *timestamp,
        }
    }
}
