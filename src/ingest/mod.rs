use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::storage::{repository, Database};

/// One employee row in a JSON export.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeRecord {
    pub employee_gid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One time-entry row in a JSON export. Timestamps are RFC 3339.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeEntryRecord {
    pub entry_gid: String,
    pub employee_gid: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub source: Option<String>,
}

/// One task row in a JSON export.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub task_gid: String,
    pub employee_gid: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
}

/// A JSON export file: employees first, then their entries and tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportFile {
    #[serde(default)]
    pub employees: Vec<EmployeeRecord>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntryRecord>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

/// Counts from one import run. Skipped rows were malformed (bad timestamp,
/// unknown status, missing employee) and are logged, not fatal.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportReport {
    pub employees: usize,
    pub time_entries: usize,
    pub tasks: usize,
    pub skipped: usize,
}

const KNOWN_STATUSES: [&str; 3] = ["open", "in_progress", "completed"];

/// Import a JSON export file into the warehouse.
pub async fn import_file(db: &Database, path: impl AsRef<Path>) -> Result<ImportReport> {
    let contents =
        std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Import(e.to_string()))?;
    let export: ExportFile = serde_json::from_str(&contents)?;
    import(db, export).await
}

/// Import already-parsed export rows into the warehouse.
pub async fn import(db: &Database, export: ExportFile) -> Result<ImportReport> {
    let report = db
        .writer()
        .call(move |conn| {
            let mut report = ImportReport::default();

            for emp in &export.employees {
                repository::upsert_employee(
                    conn,
                    &emp.employee_gid,
                    emp.name.as_deref(),
                    emp.email.as_deref(),
                )?;
                report.employees += 1;
            }

            for entry in &export.time_entries {
                match repository::insert_time_entry(
                    conn,
                    &entry.entry_gid,
                    &entry.employee_gid,
                    &entry.started_at,
                    entry.ended_at.as_deref(),
                    entry.break_minutes,
                    entry.source.as_deref(),
                ) {
                    Ok(()) => report.time_entries += 1,
                    Err(e) => {
                        log::warn!("Skipping time entry {}: {e}", entry.entry_gid);
                        report.skipped += 1;
                    }
                }
            }

            for task in &export.tasks {
                if !KNOWN_STATUSES.contains(&task.status.as_str()) {
                    log::warn!(
                        "Skipping task {}: unknown status '{}'",
                        task.task_gid,
                        task.status
                    );
                    report.skipped += 1;
                    continue;
                }
                match repository::insert_task(
                    conn,
                    &task.task_gid,
                    &task.employee_gid,
                    &task.name,
                    &task.status,
                    task.due_on.as_deref(),
                    task.progress,
                ) {
                    Ok(()) => report.tasks += 1,
                    Err(e) => {
                        log::warn!("Skipping task {}: {e}", task.task_gid);
                        report.skipped += 1;
                    }
                }
            }

            Ok::<ImportReport, rusqlite::Error>(report)
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    log::info!(
        "Imported {} employees, {} time entries, {} tasks ({} skipped)",
        report.employees,
        report.time_entries,
        report.tasks,
        report.skipped
    );
    Ok(report)
}
