//! # Next Extreme Scanner
//!
//! A two-phase state machine folded over one station's readings:
//!
//! 1. **SeekingCurrent**: find the reading whose timestamp equals the rounded
//!    reference instant and report it as the current level
//! 2. **SeekingExtreme**: walk forward until the trend reverses and report the
//!    last reading before the reversal as the next extreme
//! 3. **Done**: nothing more to report, input is no longer consumed
//!
//! The true turning point lies somewhere between the last same-trend reading
//! and the first reversed one. Reporting the last same-trend reading is off by
//! at most one sampling interval.

use crate::trend::classify;
use crate::{Direction, Reading, ScanResult};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Default spacing of forecast samples in minutes.
pub const DEFAULT_GRID_MINUTES: u32 = 10;

/// Round `now` to the nearest multiple of `grid_minutes`, halves rounding up.
///
/// Reading timestamps sit exactly on the grid, so the rounded instant can be
/// compared for equality.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_station_lib::scanner::reference_instant;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
/// let now = day.and_hms_opt(12, 24, 59).unwrap();
/// assert_eq!(reference_instant(now, 10), day.and_hms_opt(12, 20, 0).unwrap());
/// ```
pub fn reference_instant(now: NaiveDateTime, grid_minutes: u32) -> NaiveDateTime {
    let step = i64::from(grid_minutes.max(1)) * 60_000;
    let millis = now.and_utc().timestamp_millis();
    let rounded = (millis + step / 2).div_euclid(step) * step;
    DateTime::<Utc>::from_timestamp_millis(rounded)
        .map(|dt| dt.naive_utc())
        .unwrap_or(now)
}

/// Scan progress. Ordered so that a scan only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    SeekingCurrent,
    SeekingExtreme,
    Done,
}

/// State threaded through one scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanState {
    phase: Phase,
    previous: Option<Reading>,
    /// Latest direction seen, held across flat steps
    direction: Option<Direction>,
    /// Direction at the current-level match, the one whose reversal ends the scan
    trend_at_match: Option<Direction>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanState {
    pub fn new() -> Self {
        ScanState {
            phase: Phase::SeekingCurrent,
            previous: None,
            direction: None,
            trend_at_match: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feed the next reading, returning the new state and any result it
    /// produced.
    ///
    /// If the current level matched on the first reading there is no trend to
    /// compare against yet; the first direction established afterwards takes
    /// its place.
    pub fn step(self, reading: Reading, reference: NaiveDateTime) -> (ScanState, Option<ScanResult>) {
        if self.phase == Phase::Done {
            return (self, None);
        }

        let trend = self
            .previous
            .and_then(|prev| classify(prev.level, reading.level, self.direction));

        let mut next = ScanState {
            previous: Some(reading),
            direction: trend.map(|t| t.direction).or(self.direction),
            ..self
        };

        let result = match self.phase {
            Phase::SeekingCurrent if reading.timestamp == reference => {
                next.phase = Phase::SeekingExtreme;
                next.trend_at_match = trend.map(|t| t.direction);
                Some(ScanResult::CurrentLevel {
                    timestamp: reading.timestamp,
                    level: reading.level,
                    trend,
                })
            }
            Phase::SeekingExtreme => match (self.trend_at_match, trend, self.previous) {
                (None, Some(t), _) => {
                    next.trend_at_match = Some(t.direction);
                    None
                }
                (Some(at_match), Some(t), Some(prev)) if t.direction != at_match => {
                    next.phase = Phase::Done;
                    Some(ScanResult::NextExtreme {
                        direction: at_match,
                        timestamp: prev.timestamp,
                        level: prev.level,
                    })
                }
                _ => None,
            },
            _ => None,
        };

        (next, result)
    }
}

/// Outcome of scanning one series.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanReport {
    /// Results in the order they were produced
    pub results: Vec<ScanResult>,
    /// Phase the scan ended in
    pub phase: Phase,
    /// Readings consumed before the scan finished
    pub readings_seen: usize,
}

impl ScanReport {
    pub fn current_level(&self) -> Option<&ScanResult> {
        self.results
            .iter()
            .find(|r| matches!(r, ScanResult::CurrentLevel { .. }))
    }

    pub fn next_extreme(&self) -> Option<&ScanResult> {
        self.results
            .iter()
            .find(|r| matches!(r, ScanResult::NextExtreme { .. }))
    }
}

/// Runs [`ScanState`] over a reading sequence for one reference instant.
#[derive(Clone, Copy, Debug)]
pub struct ExtremeScanner {
    reference: NaiveDateTime,
}

impl ExtremeScanner {
    /// `reference` must already be rounded to the series' grid, see
    /// [`reference_instant`].
    pub fn new(reference: NaiveDateTime) -> Self {
        ExtremeScanner { reference }
    }

    /// Consume readings in order until the next extreme is found or the
    /// sequence ends.
    pub fn scan<I>(&self, readings: I) -> ScanReport
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut state = ScanState::new();
        let mut results = Vec::with_capacity(2);
        let mut readings_seen = 0;

        for reading in readings {
            readings_seen += 1;
            let (next, result) = state.step(reading, self.reference);
            state = next;
            results.extend(result);
            if state.phase() == Phase::Done {
                break;
            }
        }

        ScanReport {
            results,
            phase: state.phase(),
            readings_seen,
        }
    }
}
