use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Completion state of one unit of completable work (task, checklist item,
/// training enrollment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    Open,
    InProgress,
    Completed,
}

/// One completable child record feeding a progress roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub status: ChildStatus,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    /// Stored progress (0-100) for partially-gradable items. Ignored when
    /// the record is completed: completed always counts as 100.
    #[serde(default)]
    pub progress: Option<u8>,
}

impl ChildRecord {
    pub fn is_completed(&self) -> bool {
        self.status == ChildStatus::Completed
    }

    fn effective_progress(&self) -> u32 {
        if self.is_completed() {
            100
        } else {
            u32::from(self.progress.unwrap_or(0).min(100))
        }
    }
}

/// Status classification for a progress roll-up, in precedence order:
/// the first matching variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Completed,
    Critical,
    Delayed,
    OnTrack,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Completed => write!(f, "completed"),
            Classification::Critical => write!(f, "critical"),
            Classification::Delayed => write!(f, "delayed"),
            Classification::OnTrack => write!(f, "on-track"),
        }
    }
}

/// Caller-supplied knobs for classification.
#[derive(Debug, Clone)]
pub struct RollupOptions {
    /// Injected current time; never read from the system clock.
    pub now: DateTime<Utc>,
    /// When true, any incomplete child due strictly before `now` makes the
    /// roll-up critical.
    pub critical_if_past_due: bool,
    /// Expected progress percent at this point (pacing check). Below this,
    /// and with no overdue child, the roll-up is delayed.
    pub expected_percent: Option<u8>,
}

impl RollupOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            critical_if_past_due: true,
            expected_percent: None,
        }
    }
}

/// Aggregated completion state over a set of child records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupSummary {
    pub completed_count: u64,
    pub total_count: u64,
    pub percent_complete: u8,
    pub classification: Classification,
}

/// Aggregate child completion states into a percentage and classification.
///
/// `percent_complete` is 0 for an empty set, never NaN. Classification
/// precedence is completed > critical > delayed > on-track; a single overdue
/// incomplete child forces critical regardless of how high the percentage is.
pub fn rollup(children: &[ChildRecord], options: &RollupOptions) -> RollupSummary {
    let total_count = children.len() as u64;
    let completed_count = children.iter().filter(|c| c.is_completed()).count() as u64;

    let percent_complete = if total_count == 0 {
        0
    } else {
        let sum: u32 = children.iter().map(ChildRecord::effective_progress).sum();
        (sum as f64 / total_count as f64).round() as u8
    };

    let today = options.now.date_naive();
    let any_overdue = children
        .iter()
        .any(|c| !c.is_completed() && c.due_on.is_some_and(|d| d < today));

    let classification = if total_count > 0 && completed_count == total_count {
        Classification::Completed
    } else if options.critical_if_past_due && any_overdue {
        Classification::Critical
    } else if options
        .expected_percent
        .is_some_and(|expected| percent_complete < expected)
    {
        Classification::Delayed
    } else {
        Classification::OnTrack
    };

    RollupSummary {
        completed_count,
        total_count,
        percent_complete,
        classification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn child(status: ChildStatus, due_on: Option<&str>, progress: Option<u8>) -> ChildRecord {
        ChildRecord {
            status,
            due_on: due_on.map(date),
            progress,
        }
    }

    fn opts() -> RollupOptions {
        RollupOptions::new(ts("2024-03-15T12:00:00Z"))
    }

    #[test]
    fn test_empty_set_is_zero_on_track() {
        let summary = rollup(&[], &opts());
        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.total_count, 0);
        assert_eq!(summary.percent_complete, 0);
        assert_eq!(summary.classification, Classification::OnTrack);
    }

    #[test]
    fn test_all_completed() {
        let children = vec![
            child(ChildStatus::Completed, None, None),
            // Stale stored progress is ignored once completed.
            child(ChildStatus::Completed, Some("2024-01-01"), Some(40)),
        ];
        let summary = rollup(&children, &opts());
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.percent_complete, 100);
        assert_eq!(summary.classification, Classification::Completed);
    }

    #[test]
    fn test_overdue_beats_high_percentage() {
        let mut children: Vec<ChildRecord> = (0..9)
            .map(|_| child(ChildStatus::Completed, None, None))
            .collect();
        children.push(child(ChildStatus::Open, Some("2024-03-01"), None));

        let summary = rollup(&children, &opts());
        assert_eq!(summary.percent_complete, 90);
        assert_eq!(summary.classification, Classification::Critical);
    }

    #[test]
    fn test_due_today_is_not_overdue() {
        let children = vec![child(ChildStatus::InProgress, Some("2024-03-15"), Some(50))];
        let summary = rollup(&children, &opts());
        assert_eq!(summary.classification, Classification::OnTrack);
    }

    #[test]
    fn test_overdue_check_can_be_disabled() {
        let children = vec![child(ChildStatus::Open, Some("2024-03-01"), None)];
        let mut options = opts();
        options.critical_if_past_due = false;
        let summary = rollup(&children, &options);
        assert_eq!(summary.classification, Classification::OnTrack);
    }

    #[test]
    fn test_delayed_when_behind_expected_pace() {
        let children = vec![
            child(ChildStatus::Completed, None, None),
            child(ChildStatus::InProgress, None, Some(20)),
            child(ChildStatus::Open, None, None),
        ];
        let mut options = opts();
        options.expected_percent = Some(60);
        let summary = rollup(&children, &options);
        assert_eq!(summary.percent_complete, 40);
        assert_eq!(summary.classification, Classification::Delayed);
    }

    #[test]
    fn test_on_track_at_expected_pace() {
        let children = vec![
            child(ChildStatus::Completed, None, None),
            child(ChildStatus::Open, None, None),
        ];
        let mut options = opts();
        options.expected_percent = Some(50);
        let summary = rollup(&children, &options);
        assert_eq!(summary.percent_complete, 50);
        assert_eq!(summary.classification, Classification::OnTrack);
    }

    #[test]
    fn test_stored_progress_clamped_to_100() {
        let children = vec![child(ChildStatus::InProgress, None, Some(250))];
        let summary = rollup(&children, &opts());
        assert_eq!(summary.percent_complete, 100);
    }

    #[test]
    fn test_classification_serializes_kebab_case() {
        let json = serde_json::to_string(&Classification::OnTrack).unwrap();
        assert_eq!(json, "\"on-track\"");
    }
}
