pub mod types;

pub use types::*;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::accumulate::{accumulate, Interval};
use crate::bucket::{bucketize, Granularity};
use crate::error::{Error, Result};
use crate::query::period::Period;
use crate::rollup::{rollup, ChildRecord, RollupOptions};
use crate::storage::{repository, Database};

/// Compute the metrics bundle for a single employee from already-fetched rows.
///
/// This is the only aggregation entry point callers should compose on: it
/// runs the window accumulator, the calendar bucketizer, and the progress
/// roll-up against one consistent set of inputs and one injected clock
/// (`options.now`). Pure and synchronous; no I/O, no shared state.
///
/// Every supplied row must belong to `employee_gid` — mixing subjects without
/// the explicit team operation is rejected with [`Error::InvalidInput`].
pub fn compute_metrics(
    employee_gid: &str,
    entries: &[TimeEntryRow],
    tasks: &[TaskRow],
    window: (DateTime<Utc>, DateTime<Utc>),
    granularity: Granularity,
    options: &RollupOptions,
) -> Result<MetricsBundle> {
    if employee_gid.is_empty() {
        return Err(Error::InvalidInput("employee gid is empty".into()));
    }
    for row in entries {
        if row.employee_gid != employee_gid {
            return Err(Error::InvalidInput(format!(
                "time entry for {} mixed into metrics for {employee_gid}",
                row.employee_gid
            )));
        }
    }
    for row in tasks {
        if row.employee_gid != employee_gid {
            return Err(Error::InvalidInput(format!(
                "task for {} mixed into metrics for {employee_gid}",
                row.employee_gid
            )));
        }
    }

    let intervals: Vec<Interval> = entries.iter().map(|r| r.interval.clone()).collect();
    let records: Vec<ChildRecord> = tasks.iter().map(|r| r.record.clone()).collect();

    compute_bundle(&intervals, &records, window, granularity, options)
}

/// Explicit multi-subject aggregation. Rows are grouped by employee, a bundle
/// is computed per member, and a combined bundle is computed over the whole
/// roster. This is the only path on which rows from different employees may
/// meet.
pub fn compute_team_metrics(
    entries: &[TimeEntryRow],
    tasks: &[TaskRow],
    window: (DateTime<Utc>, DateTime<Utc>),
    granularity: Granularity,
    options: &RollupOptions,
) -> Result<TeamMetricsBundle> {
    let mut gids: BTreeSet<&str> = BTreeSet::new();
    for row in entries {
        gids.insert(row.employee_gid.as_str());
    }
    for row in tasks {
        gids.insert(row.employee_gid.as_str());
    }

    let mut members = Vec::with_capacity(gids.len());
    for gid in &gids {
        let member_entries: Vec<TimeEntryRow> = entries
            .iter()
            .filter(|r| r.employee_gid == *gid)
            .cloned()
            .collect();
        let member_tasks: Vec<TaskRow> = tasks
            .iter()
            .filter(|r| r.employee_gid == *gid)
            .cloned()
            .collect();
        let metrics = compute_metrics(
            gid,
            &member_entries,
            &member_tasks,
            window,
            granularity,
            options,
        )?;
        members.push(MemberMetrics {
            employee_gid: gid.to_string(),
            metrics,
        });
    }

    let intervals: Vec<Interval> = entries.iter().map(|r| r.interval.clone()).collect();
    let records: Vec<ChildRecord> = tasks.iter().map(|r| r.record.clone()).collect();
    let combined = compute_bundle(&intervals, &records, window, granularity, options)?;

    Ok(TeamMetricsBundle {
        member_count: gids.len() as u64,
        combined,
        members,
    })
}

fn compute_bundle(
    intervals: &[Interval],
    records: &[ChildRecord],
    window: (DateTime<Utc>, DateTime<Utc>),
    granularity: Granularity,
    options: &RollupOptions,
) -> Result<MetricsBundle> {
    let (window_start, window_end) = window;
    let total_minutes = accumulate(intervals, window, options.now)?;

    // Buckets are calendar-aligned and may extend past the requested window;
    // each bucket's contribution window is the intersection with it.
    let buckets = bucketize(window_start, window_end, granularity)?;
    let mut by_bucket = Vec::with_capacity(buckets.len());
    for bucket in &buckets {
        let clipped = (
            bucket.start.max(window_start),
            bucket.end.min(window_end),
        );
        let minutes = accumulate(intervals, clipped, options.now)?;
        by_bucket.push(BucketMinutes {
            label: bucket.label.clone(),
            minutes,
        });
    }

    let summary = rollup(records, options);

    Ok(MetricsBundle {
        total_minutes,
        by_bucket,
        completed_count: summary.completed_count,
        total_count: summary.total_count,
        percent_complete: summary.percent_complete,
        classification: summary.classification,
    })
}

// ── Warehouse-backed entry points ──────────────────────────────────

/// Compute metrics for an employee over a period, fetching rows from the
/// warehouse. `options.now` drives both to-date period resolution and the
/// open-interval/overdue checks.
pub async fn compute_employee_metrics(
    db: &Database,
    employee_gid: &str,
    period: &Period,
    granularity: Granularity,
    options: &RollupOptions,
) -> Result<EmployeeMetrics> {
    let window = period.window(options.now.date_naive());
    let period_key = period.to_key();
    let gid = employee_gid.to_string();

    let (employee_name, entries, tasks) = db
        .reader()
        .call(move |conn| {
            let name = repository::get_employee_name(conn, &gid)?;
            let entries = repository::fetch_time_entries(conn, &gid, window.0, window.1)?;
            let tasks = repository::fetch_tasks(conn, &gid)?;
            Ok::<_, rusqlite::Error>((name, entries, tasks))
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    let metrics = compute_metrics(employee_gid, &entries, &tasks, window, granularity, options)?;

    Ok(EmployeeMetrics {
        employee_gid: employee_gid.to_string(),
        employee_name,
        period_key,
        metrics,
    })
}

/// Compute team metrics over a period for an explicit roster of employees.
pub async fn compute_roster_metrics(
    db: &Database,
    employee_gids: &[String],
    period: &Period,
    granularity: Granularity,
    options: &RollupOptions,
) -> Result<TeamMetrics> {
    let window = period.window(options.now.date_naive());
    let period_key = period.to_key();
    let gids = employee_gids.to_vec();

    let (entries, tasks) = db
        .reader()
        .call(move |conn| {
            let mut entries = Vec::new();
            let mut tasks = Vec::new();
            for gid in &gids {
                entries.extend(repository::fetch_time_entries(
                    conn, gid, window.0, window.1,
                )?);
                tasks.extend(repository::fetch_tasks(conn, gid)?);
            }
            Ok::<_, rusqlite::Error>((entries, tasks))
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    let team = compute_team_metrics(&entries, &tasks, window, granularity, options)?;

    Ok(TeamMetrics { period_key, team })
}
