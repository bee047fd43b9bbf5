use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::date_util::{day_start_utc, month_start, week_start};
use crate::error::{Error, Result};

/// Calendar granularity for trend bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            other => Err(Error::InvalidGranularity(other.to_string())),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

/// A calendar-aligned half-open time range `[start, end)`.
///
/// Buckets are aligned to calendar boundaries regardless of where the
/// requested range falls; contributions are clipped back to the requested
/// window when intervals are accumulated into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Partition `[range_start, range_end)` into calendar buckets.
///
/// The first bucket starts at the aligned boundary on-or-before `range_start`
/// (Monday for weeks, first of month for months, midnight for days), so the
/// returned buckets are contiguous, non-overlapping, and collectively cover
/// the requested range. Week labels use ISO week numbering.
///
/// Equal bounds yield an empty list, not a single zero-width bucket.
pub fn bucketize(
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    granularity: Granularity,
) -> Result<Vec<Bucket>> {
    if range_start > range_end {
        return Err(Error::InvalidInput(format!(
            "range start {range_start} is after range end {range_end}"
        )));
    }
    if range_start == range_end {
        return Ok(Vec::new());
    }

    let mut cursor = align(range_start.date_naive(), granularity);
    let mut buckets = Vec::new();
    while day_start_utc(cursor) < range_end {
        let next = advance(cursor, granularity);
        buckets.push(Bucket {
            label: label_for(cursor, granularity),
            start: day_start_utc(cursor),
            end: day_start_utc(next),
        });
        cursor = next;
    }
    Ok(buckets)
}

fn align(d: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => d,
        Granularity::Week => week_start(d),
        Granularity::Month => month_start(d),
    }
}

fn advance(d: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => d + Duration::days(1),
        Granularity::Week => d + Duration::days(7),
        Granularity::Month => {
            if d.month() == 12 {
                NaiveDate::from_ymd_opt(d.year() + 1, 1, 1).unwrap()
            } else {
                NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1).unwrap()
            }
        }
    }
}

fn label_for(bucket_start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => bucket_start.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let iw = bucket_start.iso_week();
            format!("{}-W{:02}", iw.year(), iw.week())
        }
        Granularity::Month => bucket_start.format("%Y-%m").to_string(),
    }
}
