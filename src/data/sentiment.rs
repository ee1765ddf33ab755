use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::data::models::{DailySentiment, SentimentEvent};

#[derive(Default)]
struct DayAccumulator {
    sentiment: u8,
    score_sum: f64,
    weighted_sum: f64,
    count: usize,
}

/// Collapse message-level sentiment into one row per calendar date.
///
/// The daily label is the most positive label present (2 over 1 over 0),
/// regardless of how often each label occurs. Scores are arithmetic means
/// over the day. Output is sorted by date and never contains a date
/// without events.
pub fn aggregate_daily_sentiment(events: &[SentimentEvent]) -> Vec<DailySentiment> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for event in events {
        let day = days.entry(event.date).or_default();
        day.sentiment = day.sentiment.max(event.sentiment);
        day.score_sum += event.sentiment_score;
        day.weighted_sum += event.weighted_sentiment;
        day.count += 1;
    }

    let daily: Vec<DailySentiment> = days
        .into_iter()
        .map(|(date, day)| {
            let n = day.count as f64;
            DailySentiment {
                date,
                sentiment: day.sentiment,
                sentiment_score: day.score_sum / n,
                weighted_sentiment: day.weighted_sum / n,
            }
        })
        .collect();

    tracing::debug!(
        "Aggregated {} sentiment events into {} days",
        events.len(),
        daily.len()
    );

    daily
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(day: u32, sentiment: u8, score: f64, weighted: f64) -> SentimentEvent {
        SentimentEvent {
            date: NaiveDate::from_ymd_opt(2023, 3, day).unwrap(),
            sentiment,
            sentiment_score: score,
            weighted_sentiment: weighted,
        }
    }

    #[test]
    fn test_positive_label_wins_over_majority() {
        let events = vec![
            event(1, 1, 0.1, 0.2),
            event(1, 1, 0.3, 0.4),
            event(1, 1, 0.5, 0.6),
            event(1, 2, 0.7, 0.8),
        ];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].sentiment, 2);
    }

    #[test]
    fn test_neutral_beats_negative() {
        let events = vec![event(2, 0, 0.0, 0.0), event(2, 0, 0.0, 0.0), event(2, 1, 0.0, 0.0)];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily[0].sentiment, 1);

        let daily = aggregate_daily_sentiment(&[event(3, 0, 0.0, 0.0)]);
        assert_eq!(daily[0].sentiment, 0);
    }

    #[test]
    fn test_scores_are_daily_means() {
        let events = vec![event(4, 0, 0.2, 1.0), event(4, 2, 0.6, 3.0)];
        let daily = aggregate_daily_sentiment(&events);
        assert_relative_eq!(daily[0].sentiment_score, 0.4, epsilon = 1e-12);
        assert_relative_eq!(daily[0].weighted_sentiment, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_one_row_per_date_sorted() {
        let events = vec![
            event(9, 0, 0.0, 0.0),
            event(1, 1, 0.0, 0.0),
            event(5, 2, 0.0, 0.0),
            event(1, 0, 0.0, 0.0),
        ];
        let daily = aggregate_daily_sentiment(&events);
        let days: Vec<u32> = daily.iter().map(|d| chrono::Datelike::day(&d.date)).collect();
        assert_eq!(days, vec![1, 5, 9]);
    }

    #[test]
    fn test_no_events_no_days() {
        assert!(aggregate_daily_sentiment(&[]).is_empty());
    }
}
