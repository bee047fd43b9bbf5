pub mod accumulate;
pub mod bucket;
pub mod date_util;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod rollup;
pub mod storage;

pub use accumulate::{accumulate, Interval};
pub use bucket::{bucketize, Bucket, Granularity};
pub use error::{Error, Result};
pub use ingest::{import_file, ImportReport};
pub use metrics::{
    compute_employee_metrics, compute_metrics, compute_roster_metrics, compute_team_metrics,
    BucketMinutes, EmployeeMetrics, MemberMetrics, MetricsBundle, TaskRow, TeamMetrics,
    TeamMetricsBundle, TimeEntryRow,
};
pub use query::period::Period;
pub use rollup::{rollup, ChildRecord, ChildStatus, Classification, RollupOptions, RollupSummary};
pub use storage::Database;
