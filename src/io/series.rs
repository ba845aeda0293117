//! Reader for pre-aligned half-hourly input series.
//!
//! Expected columns: `timestamp,demand_kw,pv_kw,spot_price`. Timestamps may be
//! written `2024-04-01 00:30:00`, `2024-04-01T00:30:00` or `2024-04-01 00:30`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::SeriesError;
use crate::forecast::ForecastSeries;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    timestamp: String,
    demand_kw: f64,
    pv_kw: f64,
    spot_price: f64,
}

/// Reads an aligned series from a CSV file.
///
/// # Errors
///
/// Returns a `SeriesError` if the file cannot be opened, a row is malformed,
/// or the columns fail [`ForecastSeries::new`] validation.
pub fn read_series(path: &Path) -> Result<ForecastSeries, SeriesError> {
    let file = File::open(path)?;
    let series = parse_series(file)?;
    tracing::info!(path = %path.display(), steps = series.len(), "loaded series");
    Ok(series)
}

/// Parses an aligned series from any CSV reader.
///
/// # Errors
///
/// Same as [`read_series`], minus the file errors.
pub fn parse_series(reader: impl Read) -> Result<ForecastSeries, SeriesError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut timestamps = Vec::new();
    let mut demand_kw = Vec::new();
    let mut pv_kw = Vec::new();
    let mut spot_price = Vec::new();

    for (row, record) in rdr.deserialize::<SeriesRecord>().enumerate() {
        let record = record?;
        let ts = parse_timestamp(&record.timestamp).ok_or_else(|| SeriesError::Row {
            row,
            message: format!("unrecognised timestamp \"{}\"", record.timestamp),
        })?;
        timestamps.push(ts);
        demand_kw.push(record.demand_kw);
        pv_kw.push(record.pv_kw);
        spot_price.push(record.spot_price);
    }

    ForecastSeries::new(timestamps, demand_kw, pv_kw, spot_price)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_both_timestamp_styles() {
        let csv = "timestamp,demand_kw,pv_kw,spot_price\n\
                   2024-04-01 00:00:00,120.5,0,11.2\n\
                   2024-04-01T00:30:00,118.0,0,10.9\n\
                   2024-04-01 01:00,117.0,0.5,10.1\n";
        let series = parse_series(csv.as_bytes()).expect("series should parse");
        assert_eq!(series.len(), 3);
        assert_eq!(series.demand_kw(), &[120.5, 118.0, 117.0]);
        assert_eq!(series.pv_kw()[2], 0.5);
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let csv = "timestamp,demand_kw,pv_kw,spot_price\n\
                   2024-04-01 00:00:00,1,0,1\n\
                   yesterday,1,0,1\n";
        let err = parse_series(csv.as_bytes());
        assert!(matches!(err, Err(SeriesError::Row { row: 1, .. })));
    }

    #[test]
    fn test_non_numeric_value_is_a_csv_error() {
        let csv = "timestamp,demand_kw,pv_kw,spot_price\n2024-04-01 00:00:00,lots,0,1\n";
        assert!(matches!(parse_series(csv.as_bytes()), Err(SeriesError::Csv(_))));
    }

    #[test]
    fn test_negative_pv_is_rejected() {
        let csv = "timestamp,demand_kw,pv_kw,spot_price\n2024-04-01 00:00:00,1,-3,1\n";
        assert!(matches!(
            parse_series(csv.as_bytes()),
            Err(SeriesError::Row { row: 0, .. })
        ));
    }

    #[test]
    fn test_unordered_timestamps_are_rejected() {
        let csv = "timestamp,demand_kw,pv_kw,spot_price\n\
                   2024-04-01 00:30:00,1,0,1\n\
                   2024-04-01 00:00:00,1,0,1\n";
        assert!(matches!(
            parse_series(csv.as_bytes()),
            Err(SeriesError::Misaligned(_))
        ));
    }
}
