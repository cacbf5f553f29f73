//! # Station Forecast Files
//!
//! Forecast files are semicolon-separated with a header row, one row per
//! 10-minute sample:
//!
//! ```text
//! Datum;Tijd;Locatie;Meting;Verwachting
//! 5-3-2024;12:20:00;Vlissingen;;120
//! ```
//!
//! Only `Datum` (day-month-year), `Tijd` (time of day) and `Verwachting`
//! (forecast level in centimetres) are used. Rows are parsed lazily so the
//! scanner can stop reading as soon as it has what it needs. A row that
//! cannot be turned into a [`Reading`] is reported as a [`ReadingError`]
//! without ending the sequence.

use crate::Reading;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

/// A forecast row that could not be turned into a [`Reading`].
///
/// `row` counts data rows from 1, excluding the header.
#[derive(Error, Debug)]
pub enum ReadingError {
    /// The row could not be decoded (bad UTF-8, missing date or time column)
    #[error("row {row}: {source}")]
    Csv { row: u64, source: csv::Error },

    /// The forecast column is empty, common for rows outside the forecast window
    #[error("row {row}: no forecast level")]
    MissingLevel { row: u64 },

    #[error("row {row}: invalid forecast level {value:?}")]
    Level { row: u64, value: String },

    #[error("row {row}: invalid timestamp {date:?} {time:?}")]
    Timestamp { row: u64, date: String, time: String },
}

impl ReadingError {
    /// True for rows that simply carry no forecast, as opposed to broken rows
    pub fn is_missing_level(&self) -> bool {
        matches!(self, ReadingError::MissingLevel { .. })
    }

    /// True when the file itself could not be read; nothing after this row
    /// can be trusted
    pub fn is_io(&self) -> bool {
        matches!(self, ReadingError::Csv { source, .. } if matches!(source.kind(), csv::ErrorKind::Io(_)))
    }
}

#[derive(Debug, Deserialize)]
struct ForecastRow {
    #[serde(rename = "Datum")]
    date: String,
    #[serde(rename = "Tijd")]
    time: String,
    #[serde(rename = "Verwachting", default)]
    forecast: String,
}

/// Lazy, forward-only sequence of readings from one forecast file.
pub struct ForecastReader<R> {
    rows: csv::DeserializeRecordsIntoIter<R, ForecastRow>,
    row: u64,
}

impl ForecastReader<File> {
    /// Open a station's forecast file and read its header row.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, csv::Error> {
        Self::with_reader(reader_builder().from_path(path)?)
    }
}

impl<R: io::Read> ForecastReader<R> {
    pub fn from_reader(rdr: R) -> Result<Self, csv::Error> {
        Self::with_reader(reader_builder().from_reader(rdr))
    }

    fn with_reader(mut rdr: csv::Reader<R>) -> Result<Self, csv::Error> {
        // into_deserialize swallows a failed header read
        rdr.headers()?;
        Ok(ForecastReader {
            rows: rdr.into_deserialize(),
            row: 0,
        })
    }
}

impl<R: io::Read> Iterator for ForecastReader<R> {
    type Item = Result<Reading, ReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.rows.next()?;
        self.row += 1;
        let row = self.row;
        Some(
            record
                .map_err(|source| ReadingError::Csv { row, source })
                .and_then(|record| parse_row(row, &record)),
        )
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}

fn parse_row(row: u64, record: &ForecastRow) -> Result<Reading, ReadingError> {
    let value = record.forecast.trim();
    if value.is_empty() {
        return Err(ReadingError::MissingLevel { row });
    }

    let centimetres = value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|cm| cm.is_finite())
        .ok_or_else(|| ReadingError::Level {
            row,
            value: value.to_string(),
        })?;

    let timestamp =
        parse_timestamp(&record.date, &record.time).ok_or_else(|| ReadingError::Timestamp {
            row,
            date: record.date.clone(),
            time: record.time.clone(),
        })?;

    Ok(Reading {
        timestamp,
        level: centimetres / 100.0,
    })
}

/// Combine a `D-M-YYYY` date and an `HH:MM:SS` (or `HH:MM`) time of day.
///
/// Day and month may be written without leading zeros.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%d-%m-%Y").ok()?;
    let time = time.trim();
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()?;
    Some(date.and_time(time))
}
