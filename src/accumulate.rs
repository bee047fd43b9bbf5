use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One recorded span of activity with an optional break deduction.
///
/// `end == None` means the interval is still open; the injected `now` is used
/// as a provisional end for duration purposes only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub break_minutes: u32,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>, break_minutes: u32) -> Self {
        Self {
            start,
            end,
            break_minutes,
        }
    }
}

/// Total minutes covered by `intervals` within the half-open `window`,
/// with break deductions pro-rated to the portion of each interval that
/// falls inside the window.
///
/// Intervals may be unsorted, duplicated, or lie partly or fully outside the
/// window. An interval whose `end` precedes its `start` is corrupt upstream
/// data and is rejected with [`Error::InvalidInterval`] rather than clamped.
///
/// Rounding to whole minutes happens once on the summed total, not per
/// interval.
pub fn accumulate(
    intervals: &[Interval],
    window: (DateTime<Utc>, DateTime<Utc>),
    now: DateTime<Utc>,
) -> Result<i64> {
    let (range_start, range_end) = window;
    if range_start > range_end {
        return Err(Error::InvalidInput(format!(
            "window start {range_start} is after window end {range_end}"
        )));
    }

    let mut total_minutes = 0.0_f64;
    for iv in intervals {
        if let Some(end) = iv.end {
            if end < iv.start {
                return Err(Error::InvalidInterval {
                    start: iv.start,
                    end,
                });
            }
        }
        let effective_end = iv.end.unwrap_or(now);

        let gross_secs = (effective_end - iv.start).num_seconds();
        if gross_secs <= 0 {
            // Open interval that starts at or after `now`, or a zero-width span.
            continue;
        }

        let clip_start = iv.start.max(range_start);
        let clip_end = effective_end.min(range_end);
        let clipped_secs = (clip_end - clip_start).num_seconds();
        if clipped_secs <= 0 {
            continue;
        }

        let clipped_minutes = clipped_secs as f64 / 60.0;
        let break_share =
            iv.break_minutes as f64 * (clipped_secs as f64 / gross_secs as f64);
        total_minutes += (clipped_minutes - break_share).max(0.0);
    }

    Ok(total_minutes.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn iv(start: &str, end: &str, break_minutes: u32) -> Interval {
        Interval::new(ts(start), Some(ts(end)), break_minutes)
    }

    #[test]
    fn test_fully_inside_no_break() {
        let intervals = vec![iv("2024-03-04T08:00:00Z", "2024-03-04T16:30:00Z", 0)];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-06T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 510);
    }

    #[test]
    fn test_fully_outside_contributes_zero() {
        let intervals = vec![
            iv("2024-03-01T08:00:00Z", "2024-03-01T16:00:00Z", 30),
            iv("2024-03-10T08:00:00Z", "2024-03-10T16:00:00Z", 0),
        ];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-11T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 0);
    }

    #[test]
    fn test_partial_overlap_prorates_break() {
        // [10:00, 14:00) with a 30 minute break, clipped to [12:00, 14:00):
        // half the gross span stays in the window, so half the break applies.
        let intervals = vec![iv("2024-03-04T10:00:00Z", "2024-03-04T14:00:00Z", 30)];
        let window = (ts("2024-03-04T12:00:00Z"), ts("2024-03-04T14:00:00Z"));
        let now = ts("2024-03-05T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 105);
    }

    #[test]
    fn test_break_exceeding_span_clamps_to_zero() {
        let intervals = vec![iv("2024-03-04T10:00:00Z", "2024-03-04T10:30:00Z", 90)];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-05T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 0);
    }

    #[test]
    fn test_open_interval_uses_now() {
        let intervals = vec![Interval::new(ts("2024-03-04T10:00:00Z"), None, 10)];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));

        let now = ts("2024-03-04T12:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 110);

        // Same inputs, later clock: the contribution moves with `now`.
        let later = ts("2024-03-04T13:00:00Z");
        assert_eq!(accumulate(&intervals, window, later).unwrap(), 170);
    }

    #[test]
    fn test_open_interval_starting_after_now() {
        let intervals = vec![Interval::new(ts("2024-03-04T18:00:00Z"), None, 0)];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-04T12:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 0);
    }

    #[test]
    fn test_empty_window() {
        let intervals = vec![iv("2024-03-04T08:00:00Z", "2024-03-04T16:00:00Z", 0)];
        let at = ts("2024-03-04T12:00:00Z");
        assert_eq!(accumulate(&intervals, (at, at), at).unwrap(), 0);
    }

    #[test]
    fn test_reversed_window_rejected() {
        let window = (ts("2024-03-05T00:00:00Z"), ts("2024-03-04T00:00:00Z"));
        let now = ts("2024-03-06T00:00:00Z");
        assert!(matches!(
            accumulate(&[], window, now),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let intervals = vec![iv("2024-03-04T16:00:00Z", "2024-03-04T08:00:00Z", 0)];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-05T00:00:00Z");
        assert!(matches!(
            accumulate(&intervals, window, now),
            Err(Error::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_duplicates_both_count() {
        let entry = iv("2024-03-04T08:00:00Z", "2024-03-04T09:00:00Z", 0);
        let intervals = vec![entry.clone(), entry];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-05T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 120);
    }

    #[test]
    fn test_idempotent_for_fixed_now() {
        let intervals = vec![
            iv("2024-03-04T08:00:00Z", "2024-03-04T12:00:00Z", 15),
            Interval::new(ts("2024-03-04T13:00:00Z"), None, 0),
        ];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-04T15:00:00Z");
        let first = accumulate(&intervals, window, now).unwrap();
        let second = accumulate(&intervals, window, now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rounding_applied_once_at_the_end() {
        // Two spans of 30.4 minutes (1824 seconds). Per-interval rounding
        // would give 30 + 30 = 60; summing first gives round(60.8) = 61.
        let intervals = vec![
            iv("2024-03-04T08:00:00Z", "2024-03-04T08:30:24Z", 0),
            iv("2024-03-04T10:00:00Z", "2024-03-04T10:30:24Z", 0),
        ];
        let window = (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"));
        let now = ts("2024-03-05T00:00:00Z");
        assert_eq!(accumulate(&intervals, window, now).unwrap(), 61);
    }
}
