use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config;
use crate::data::models::{DailySentiment, FeatureTable, MergedRow, PriceTable};

/// Left-join price rows with daily sentiment on date.
///
/// The price table decides which rows appear: every price row is kept in
/// order, duplicates included, and rows without a matching day get `None`
/// for the three sentiment columns.
pub fn merge_price_sentiment(prices: &PriceTable, sentiment: &[DailySentiment]) -> FeatureTable {
    let by_date: HashMap<NaiveDate, &DailySentiment> =
        sentiment.iter().map(|s| (s.date, s)).collect();

    let mut columns = prices.columns.clone();
    columns.push(config::SENTIMENT_COLUMN.to_string());
    columns.push(config::SENTIMENT_SCORE_COLUMN.to_string());
    columns.push(config::WEIGHTED_SENTIMENT_COLUMN.to_string());

    let mut matched = 0_usize;
    let rows: Vec<MergedRow> = prices
        .rows
        .iter()
        .map(|row| {
            let mut values: Vec<Option<f64>> = row.values.iter().map(|&v| Some(v)).collect();
            match by_date.get(&row.date) {
                Some(day) => {
                    matched += 1;
                    values.push(Some(day.sentiment as f64));
                    values.push(Some(day.sentiment_score));
                    values.push(Some(day.weighted_sentiment));
                }
                None => values.extend([None, None, None]),
            }
            MergedRow {
                date: row.date,
                values,
            }
        })
        .collect();

    tracing::info!(
        "Merged {} price rows with sentiment ({} matched, {} missing)",
        rows.len(),
        matched,
        rows.len() - matched
    );

    FeatureTable { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::PriceRow;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn prices(days: &[u32]) -> PriceTable {
        PriceTable {
            columns: vec!["close".into(), "signal".into()],
            rows: days
                .iter()
                .map(|&d| PriceRow {
                    date: date(d),
                    values: vec![100.0 + d as f64, (d % 2) as f64],
                })
                .collect(),
        }
    }

    fn day(d: u32, sentiment: u8) -> DailySentiment {
        DailySentiment {
            date: date(d),
            sentiment,
            sentiment_score: 0.5,
            weighted_sentiment: 0.25,
        }
    }

    #[test]
    fn test_row_count_follows_price_table() {
        let table = merge_price_sentiment(&prices(&[1, 2, 3, 4]), &[day(2, 1), day(10, 2)]);
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.columns,
            vec!["close", "signal", "Sentiment", "Sentiment_Score", "Weighted_Sentiment_Exp"]
        );
    }

    #[test]
    fn test_unmatched_dates_are_missing() {
        let table = merge_price_sentiment(&prices(&[1, 2]), &[day(2, 1)]);
        assert_eq!(table.rows[0].values[2..], [None, None, None]);
        assert_eq!(table.rows[1].values[2..], [Some(1.0), Some(0.5), Some(0.25)]);
    }

    #[test]
    fn test_duplicate_price_dates_are_kept() {
        let table = merge_price_sentiment(&prices(&[3, 3, 4]), &[day(3, 2)]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].date, table.rows[1].date);
        assert_eq!(table.rows[0].values[2], Some(2.0));
        assert_eq!(table.rows[1].values[2], Some(2.0));
        assert_eq!(table.rows[2].values[2], None);
    }
}
