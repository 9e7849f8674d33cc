//! Time-in-Range trend bucketing
//!
//! Splits a period into calendar days or ISO weeks (UTC) and runs the
//! Time-in-Range calculation on each. Days or weeks without samples produce
//! no bucket.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::GlucoseSample;
use crate::ranges::GlucoseRanges;
use crate::tir::{calculate_time_in_range, TimeInRangeResult};

/// Width of a trend bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    #[default]
    Daily,
    Weekly,
}

impl TrendGranularity {
    /// Parse a `trendPeriod` value. Anything but "weekly" means daily.
    pub fn from_param(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("weekly") {
            TrendGranularity::Weekly
        } else {
            TrendGranularity::Daily
        }
    }

    /// UTC date that labels the bucket containing `sample`
    pub fn bucket_key(self, sample: &GlucoseSample) -> NaiveDate {
        let date = sample.timestamp.date_naive();
        match self {
            TrendGranularity::Daily => date,
            TrendGranularity::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
        }
    }
}

/// Time-in-Range for one day or week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    /// The day, or the Monday starting the ISO week
    pub period: NaiveDate,
    #[serde(flatten)]
    pub stats: TimeInRangeResult,
}

/// Bucket `samples` by `granularity` and summarize each bucket
///
/// Buckets come out in chronological order.
pub fn calculate_time_in_range_trends(
    samples: &[GlucoseSample],
    granularity: TrendGranularity,
    ranges: &GlucoseRanges,
) -> Vec<TrendBucket> {
    let mut buckets: BTreeMap<NaiveDate, Vec<GlucoseSample>> = BTreeMap::new();
    for sample in samples {
        buckets
            .entry(granularity.bucket_key(sample))
            .or_default()
            .push(*sample);
    }

    buckets
        .into_iter()
        .map(|(period, bucket)| TrendBucket {
            period,
            stats: calculate_time_in_range(&bucket, ranges),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!(TrendGranularity::from_param("weekly"), TrendGranularity::Weekly);
        assert_eq!(TrendGranularity::from_param("WEEKLY"), TrendGranularity::Weekly);
        assert_eq!(TrendGranularity::from_param("daily"), TrendGranularity::Daily);
        assert_eq!(TrendGranularity::from_param("monthly"), TrendGranularity::Daily);
        assert_eq!(TrendGranularity::from_param(""), TrendGranularity::Daily);
    }

    #[test]
    fn test_daily_buckets_skip_empty_days() {
        // 2024-03-04, 2024-03-04, (nothing on 03-05), 2024-03-06
        let samples = vec![
            GlucoseSample::new(100.0, at(2024, 3, 4, 1)),
            GlucoseSample::new(200.0, at(2024, 3, 4, 23)),
            GlucoseSample::new(60.0, at(2024, 3, 6, 12)),
        ];

        let trends =
            calculate_time_in_range_trends(&samples, TrendGranularity::Daily, &GlucoseRanges::STANDARD);

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].period, date(2024, 3, 4));
        assert_eq!(trends[0].stats.sample_count, 2);
        assert_eq!(trends[0].stats.bands.target.count, 1);
        assert_eq!(trends[0].stats.bands.high.count, 1);
        assert_eq!(trends[1].period, date(2024, 3, 6));
        assert_eq!(trends[1].stats.bands.low.percentage, 100.0);
    }

    #[test]
    fn test_weekly_buckets_start_on_monday() {
        // 2024-03-10 is a Sunday, 2024-03-11 a Monday
        let samples = vec![
            GlucoseSample::new(120.0, at(2024, 3, 5, 8)),
            GlucoseSample::new(130.0, at(2024, 3, 10, 22)),
            GlucoseSample::new(140.0, at(2024, 3, 11, 0)),
        ];

        let trends = calculate_time_in_range_trends(
            &samples,
            TrendGranularity::Weekly,
            &GlucoseRanges::STANDARD,
        );

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].period, date(2024, 3, 4));
        assert_eq!(trends[0].stats.sample_count, 2);
        assert_eq!(trends[1].period, date(2024, 3, 11));
        assert_eq!(trends[1].stats.sample_count, 1);
    }

    #[test]
    fn test_bucket_counts_sum_to_total() {
        let start = at(2024, 1, 1, 0);
        let samples: Vec<GlucoseSample> = (0..(288 * 10))
            .map(|i| {
                GlucoseSample::new(
                    60.0 + (i % 250) as f64,
                    start + Duration::minutes(5 * i as i64),
                )
            })
            .collect();

        for granularity in [TrendGranularity::Daily, TrendGranularity::Weekly] {
            let trends =
                calculate_time_in_range_trends(&samples, granularity, &GlucoseRanges::STANDARD);
            let total: usize = trends.iter().map(|t| t.stats.sample_count).sum();
            assert_eq!(total, samples.len());
            for trend in &trends {
                assert_eq!(trend.stats.bands.total_count(), trend.stats.sample_count);
            }
            assert!(trends.windows(2).all(|w| w[0].period < w[1].period));
        }

        let daily =
            calculate_time_in_range_trends(&samples, TrendGranularity::Daily, &GlucoseRanges::STANDARD);
        assert_eq!(daily.len(), 10);
    }

    #[test]
    fn test_no_samples_no_buckets() {
        let trends =
            calculate_time_in_range_trends(&[], TrendGranularity::Weekly, &GlucoseRanges::STANDARD);
        assert!(trends.is_empty());
    }

    #[test]
    fn test_bucket_serializes_flat() {
        let samples = vec![GlucoseSample::new(100.0, at(2024, 3, 4, 9))];
        let trends =
            calculate_time_in_range_trends(&samples, TrendGranularity::Daily, &GlucoseRanges::STANDARD);

        let json = serde_json::to_value(&trends[0]).unwrap();
        assert_eq!(json["period"], "2024-03-04");
        assert_eq!(json["sampleCount"], 1);
        assert_eq!(json["bands"]["target"]["percentage"], 100.0);
    }
}
