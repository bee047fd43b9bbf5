use serde::{Deserialize, Serialize};

use crate::accumulate::Interval;
use crate::rollup::{Classification, ChildRecord};

/// One time-entry row as supplied by the data-access layer: an interval
/// tagged with the employee it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntryRow {
    pub employee_gid: String,
    #[serde(flatten)]
    pub interval: Interval,
}

/// One task/checklist row tagged with the employee it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub employee_gid: String,
    #[serde(flatten)]
    pub record: ChildRecord,
}

/// Minutes attributed to one calendar bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketMinutes {
    pub label: String,
    pub minutes: i64,
}

/// The computed metrics bundle consumed by callers. Ephemeral plain data;
/// nothing here is cached or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsBundle {
    pub total_minutes: i64,
    pub by_bucket: Vec<BucketMinutes>,
    pub completed_count: u64,
    pub total_count: u64,
    pub percent_complete: u8,
    pub classification: Classification,
}

/// Per-member slice of a team roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberMetrics {
    pub employee_gid: String,
    pub metrics: MetricsBundle,
}

/// Explicit multi-subject aggregation: per-member bundles plus a combined
/// bundle over the whole roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMetricsBundle {
    pub member_count: u64,
    pub combined: MetricsBundle,
    pub members: Vec<MemberMetrics>,
}

/// Metrics for one employee over a period, as fetched from the warehouse.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeMetrics {
    pub employee_gid: String,
    pub employee_name: Option<String>,
    pub period_key: String,
    pub metrics: MetricsBundle,
}

/// Team metrics over a period, as fetched from the warehouse.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMetrics {
    pub period_key: String,
    pub team: TeamMetricsBundle,
}
