use std::io::Cursor;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config;
use crate::data::models::{PriceRow, PriceTable, SentimentEvent};
use crate::error::{Error, Result};

/// Parse a calendar date, dropping any time-of-day component.
/// Accepts YYYY-MM-DD, M/D/YYYY, M/D/YY and the same with a trailing time.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%y").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(|d| d.date()))
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|d| d.date()))
        .or_else(|| {
            // RFC 3339 / ISO 8601 with offset, e.g. 2023-01-05 14:30:00+00:00
            chrono::DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z")
                .or_else(|_| chrono::DateTime::parse_from_rfc3339(s))
                .ok()
                .map(|d| d.date_naive())
        })
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

fn parse_f64(value: &str, line: usize, column: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| Error::MalformedRow {
        line,
        message: format!("'{}' is not a number in column {}", value.trim(), column),
    })
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, line: usize) -> Result<&'a str> {
    record.get(idx).ok_or_else(|| Error::MalformedRow {
        line,
        message: format!("expected at least {} fields, found {}", idx + 1, record.len()),
    })
}

/// Parse sentiment events with Date, Sentiment, Sentiment_Score and
/// Weighted_Sentiment_Exp columns (any order, case-insensitive headers).
pub fn parse_sentiment_csv(text: &str) -> Result<Vec<SentimentEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(Cursor::new(text));

    let headers = reader.headers()?.clone();
    let date_idx = find_column(&headers, config::DATE_COLUMN)?;
    let sentiment_idx = find_column(&headers, config::SENTIMENT_COLUMN)?;
    let score_idx = find_column(&headers, config::SENTIMENT_SCORE_COLUMN)?;
    let weighted_idx = find_column(&headers, config::WEIGHTED_SENTIMENT_COLUMN)?;

    let mut events = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // header is line 1
        let line = i + 2;

        let date_str = field(&record, date_idx, line)?;
        let date = parse_date(date_str).ok_or_else(|| Error::MalformedRow {
            line,
            message: format!("unrecognised date '{}'", date_str.trim()),
        })?;

        let label = parse_f64(field(&record, sentiment_idx, line)?, line, config::SENTIMENT_COLUMN)?;
        if label.fract() != 0.0 || label < 0.0 || label > config::MAX_SENTIMENT_LABEL as f64 {
            return Err(Error::InvalidSentiment {
                line,
                value: label as i64,
            });
        }

        events.push(SentimentEvent {
            date,
            sentiment: label as u8,
            sentiment_score: parse_f64(
                field(&record, score_idx, line)?,
                line,
                config::SENTIMENT_SCORE_COLUMN,
            )?,
            weighted_sentiment: parse_f64(
                field(&record, weighted_idx, line)?,
                line,
                config::WEIGHTED_SENTIMENT_COLUMN,
            )?,
        });
    }

    Ok(events)
}

/// Parse a price table. The Date column (or, when absent, the first column)
/// is the index; every other column must be numeric.
pub fn parse_price_csv(text: &str) -> Result<PriceTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(Cursor::new(text));

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(Error::EmptyInput("price table has no columns"));
    }
    let date_idx = find_column(&headers, config::DATE_COLUMN).unwrap_or(0);

    let value_idx: Vec<usize> = (0..headers.len()).filter(|&i| i != date_idx).collect();
    let columns: Vec<String> = value_idx
        .iter()
        .map(|&i| headers.get(i).unwrap_or("").trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = i + 2;

        let date_str = field(&record, date_idx, line)?;
        let date = parse_date(date_str).ok_or_else(|| Error::MalformedRow {
            line,
            message: format!("unrecognised date '{}'", date_str.trim()),
        })?;

        let mut values = Vec::with_capacity(value_idx.len());
        for (&idx, name) in value_idx.iter().zip(&columns) {
            values.push(parse_f64(field(&record, idx, line)?, line, name)?);
        }

        rows.push(PriceRow { date, values });
    }

    Ok(PriceTable { columns, rows })
}

/// Read and parse a sentiment CSV file.
pub fn load_sentiment_events(path: &Path) -> Result<Vec<SentimentEvent>> {
    let text = std::fs::read_to_string(path)?;
    let events = parse_sentiment_csv(&text)?;
    tracing::info!("Loaded {} sentiment events from {}", events.len(), path.display());
    Ok(events)
}

/// Read and parse a price CSV file.
pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    let text = std::fs::read_to_string(path)?;
    let table = parse_price_csv(&text)?;
    tracing::info!(
        "Loaded {} price rows with {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}
