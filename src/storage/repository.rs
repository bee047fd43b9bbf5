use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::accumulate::Interval;
use crate::metrics::{TaskRow, TimeEntryRow};
use crate::rollup::{ChildRecord, ChildStatus};

/// Stored timestamp format. Normalizing to UTC with a trailing `Z` keeps
/// lexicographic ordering equal to chronological ordering, so range filters
/// can compare TEXT columns directly.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(col: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ── Employees ──────────────────────────────────────────────────────

pub fn upsert_employee(
    conn: &Connection,
    employee_gid: &str,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO dim_employees (employee_gid, name, email, cached_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(employee_gid) DO UPDATE SET
           name = COALESCE(excluded.name, dim_employees.name),
           email = COALESCE(excluded.email, dim_employees.email),
           cached_at = excluded.cached_at",
        params![employee_gid, name, email],
    )?;
    Ok(())
}

pub fn get_employee_name(
    conn: &Connection,
    employee_gid: &str,
) -> Result<Option<String>, rusqlite::Error> {
    let name: Option<Option<String>> = conn
        .query_row(
            "SELECT name FROM dim_employees WHERE employee_gid = ?1",
            params![employee_gid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name.flatten())
}

/// Resolve an employee identifier to a GID.
/// A known GID is returned as-is; otherwise the email column is consulted.
/// Returns None if no match is found.
pub fn resolve_employee_identifier(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<String>, rusqlite::Error> {
    let by_gid: Option<String> = conn
        .query_row(
            "SELECT employee_gid FROM dim_employees WHERE employee_gid = ?1",
            params![identifier],
            |row| row.get(0),
        )
        .optional()?;
    if by_gid.is_some() {
        return Ok(by_gid);
    }
    let by_email: Option<String> = conn
        .query_row(
            "SELECT employee_gid FROM dim_employees WHERE email = ?1",
            params![identifier],
            |row| row.get(0),
        )
        .optional()?;
    Ok(by_email)
}

pub fn list_employees(conn: &Connection) -> Result<Vec<(String, Option<String>)>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT employee_gid, name FROM dim_employees ORDER BY employee_gid")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Time entries ───────────────────────────────────────────────────

/// Insert one time entry. Timestamps are RFC 3339 strings and are normalized
/// to UTC before storage; `ended_at = None` records an open entry.
pub fn insert_time_entry(
    conn: &Connection,
    entry_gid: &str,
    employee_gid: &str,
    started_at: &str,
    ended_at: Option<&str>,
    break_minutes: u32,
    source: Option<&str>,
) -> Result<(), rusqlite::Error> {
    let started = normalize_ts(started_at)?;
    let ended = ended_at.map(normalize_ts).transpose()?;
    conn.execute(
        "INSERT OR REPLACE INTO fact_time_entries (
            entry_gid, employee_gid, started_at, ended_at, break_minutes, source, imported_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
        params![entry_gid, employee_gid, started, ended, break_minutes, source],
    )?;
    Ok(())
}

fn normalize_ts(s: &str) -> Result<String, rusqlite::Error> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(format_ts(dt.with_timezone(&Utc)))
}

/// Fetch an employee's time entries overlapping the half-open window
/// `[window_start, window_end)`. Open entries (no `ended_at`) are included
/// whenever they start before the window ends; the caller's injected clock
/// decides how much of them counts.
pub fn fetch_time_entries(
    conn: &Connection,
    employee_gid: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<TimeEntryRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT employee_gid, started_at, ended_at, break_minutes
         FROM fact_time_entries
         WHERE employee_gid = ?1
           AND started_at < ?2
           AND (ended_at IS NULL OR ended_at > ?3)
         ORDER BY started_at",
    )?;
    let rows = stmt.query_map(
        params![employee_gid, format_ts(window_end), format_ts(window_start)],
        |row| {
            let gid: String = row.get(0)?;
            let started: String = row.get(1)?;
            let ended: Option<String> = row.get(2)?;
            let break_minutes: u32 = row.get(3)?;

            let start = parse_ts(1, &started)?;
            let end = match ended {
                Some(s) => Some(parse_ts(2, &s)?),
                None => None,
            };
            Ok(TimeEntryRow {
                employee_gid: gid,
                interval: Interval::new(start, end, break_minutes),
            })
        },
    )?;
    rows.collect()
}

// ── Tasks ──────────────────────────────────────────────────────────

pub fn insert_task(
    conn: &Connection,
    task_gid: &str,
    employee_gid: &str,
    name: &str,
    status: &str,
    due_on: Option<&str>,
    progress: Option<u8>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO fact_tasks (
            task_gid, employee_gid, name, status, due_on, progress, imported_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
        params![task_gid, employee_gid, name, status, due_on, progress],
    )?;
    Ok(())
}

/// Fetch an employee's tasks as roll-up child records. Rows whose status
/// string is unrecognized are skipped with a warning rather than failing the
/// whole fetch.
pub fn fetch_tasks(
    conn: &Connection,
    employee_gid: &str,
) -> Result<Vec<TaskRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT task_gid, employee_gid, status, due_on, progress
         FROM fact_tasks
         WHERE employee_gid = ?1
         ORDER BY task_gid",
    )?;
    let rows = stmt.query_map(params![employee_gid], |row| {
        let task_gid: String = row.get(0)?;
        let gid: String = row.get(1)?;
        let status: String = row.get(2)?;
        let due_on: Option<String> = row.get(3)?;
        let progress: Option<u8> = row.get(4)?;
        Ok((task_gid, gid, status, due_on, progress))
    })?;

    let mut tasks = Vec::new();
    for row in rows {
        let (task_gid, gid, status, due_on, progress) = row?;
        let Some(status) = parse_status(&status) else {
            log::warn!("Skipping task {task_gid}: unknown status '{status}'");
            continue;
        };
        let due_on = match due_on {
            Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => {
                    log::warn!("Skipping due date on task {task_gid}: unparseable '{s}'");
                    None
                }
            },
            None => None,
        };
        tasks.push(TaskRow {
            employee_gid: gid,
            record: ChildRecord {
                status,
                due_on,
                progress,
            },
        });
    }
    Ok(tasks)
}

fn parse_status(s: &str) -> Option<ChildStatus> {
    match s {
        "open" => Some(ChildStatus::Open),
        "in_progress" => Some(ChildStatus::InProgress),
        "completed" => Some(ChildStatus::Completed),
        _ => None,
    }
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WarehouseStats {
    pub employees: i64,
    pub time_entries: i64,
    pub open_entries: i64,
    pub tasks: i64,
    pub last_import: Option<String>,
}

pub fn warehouse_stats(conn: &Connection) -> Result<WarehouseStats, rusqlite::Error> {
    let employees: i64 =
        conn.query_row("SELECT COUNT(*) FROM dim_employees", [], |row| row.get(0))?;
    let time_entries: i64 =
        conn.query_row("SELECT COUNT(*) FROM fact_time_entries", [], |row| row.get(0))?;
    let open_entries: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fact_time_entries WHERE ended_at IS NULL",
        [],
        |row| row.get(0),
    )?;
    let tasks: i64 = conn.query_row("SELECT COUNT(*) FROM fact_tasks", [], |row| row.get(0))?;
    let last_import: Option<String> = conn
        .query_row(
            "SELECT MAX(ts) FROM (
                SELECT MAX(imported_at) AS ts FROM fact_time_entries
                UNION ALL
                SELECT MAX(imported_at) FROM fact_tasks
             )",
            [],
            |row| row.get(0),
        )
        .ok()
        .flatten();

    Ok(WarehouseStats {
        employees,
        time_entries,
        open_entries,
        tasks,
        last_import,
    })
}
