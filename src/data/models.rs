use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Single message-level sentiment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEvent {
    pub date: NaiveDate,
    /// Label in 0..=2, higher is more positive
    pub sentiment: u8,
    pub sentiment_score: f64,
    pub weighted_sentiment: f64,
}

/// Sentiment collapsed to one row per calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySentiment {
    pub date: NaiveDate,
    /// Most positive label seen that day
    pub sentiment: u8,
    pub sentiment_score: f64,
    pub weighted_sentiment: f64,
}

/// One price observation with arbitrary numeric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

/// Price table indexed by date. Column order matches `PriceRow::values`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub columns: Vec<String>,
    pub rows: Vec<PriceRow>,
}

impl PriceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Price row extended with the sentiment values for its date.
///
/// `None` marks a missing cell (no sentiment recorded that day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Result of joining prices with daily sentiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<MergedRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// All values of one column, top to bottom
    pub fn column(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.values.get(idx).copied().flatten())
            .collect()
    }
}
