use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use workmetrics::{Granularity, Period, RollupOptions};

#[derive(Parser)]
#[command(name = "workmetrics", about = "Workforce metrics warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.workmetrics/workmetrics.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON export into the warehouse
    Import {
        /// Path to the export file
        file: String,
    },
    /// Compute metrics for an employee over a period
    Metrics {
        /// Employee GID or email (default: configured default_employee)
        employee: Option<String>,
        /// Period (e.g. 2024-W10, 2024-03, 2024-Q1, 30d, wtd, mtd)
        #[arg(long, default_value = "wtd")]
        period: String,
        /// Bucket granularity: day, week, month
        #[arg(long, default_value = "week")]
        granularity: String,
        /// Expected progress percent for the pacing check
        #[arg(long)]
        expected: Option<u8>,
        /// Do not escalate overdue incomplete tasks to critical
        #[arg(long)]
        no_overdue_check: bool,
        /// Evaluate as of this instant (RFC 3339; default: current time)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute combined metrics for a roster of employees
    Team {
        /// Employee GIDs or emails
        #[arg(required = true)]
        employees: Vec<String>,
        #[arg(long, default_value = "wtd")]
        period: String,
        #[arg(long, default_value = "week")]
        granularity: String,
        #[arg(long)]
        as_of: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_as_of(as_of: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match as_of {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| anyhow::anyhow!("invalid --as-of timestamp '{s}': {e}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Resolve an employee identifier (GID or email) via the database.
/// Falls back to the original identifier if no match is found.
async fn resolve_employee(db: &workmetrics::Database, identifier: &str) -> anyhow::Result<String> {
    let id = identifier.to_string();
    let resolved = db
        .reader()
        .call(move |conn| workmetrics::storage::repository::resolve_employee_identifier(conn, &id))
        .await?;
    match resolved {
        Some(gid) => Ok(gid),
        None => {
            log::warn!("Could not resolve employee '{identifier}' in local database — using as-is");
            Ok(identifier.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => workmetrics::Database::open_at(path).await?,
        None => workmetrics::Database::open().await?,
    };

    match cli.command {
        Commands::Import { file } => {
            let report = workmetrics::import_file(&db, &file).await?;
            println!("Import: {file}");
            println!("  Employees:    {}", report.employees);
            println!("  Time entries: {}", report.time_entries);
            println!("  Tasks:        {}", report.tasks);
            println!("  Skipped:      {}", report.skipped);
        }
        Commands::Metrics {
            employee,
            period,
            granularity,
            expected,
            no_overdue_check,
            as_of,
            json,
        } => {
            let now = parse_as_of(as_of.as_deref())?;
            let identifier = match employee {
                Some(e) => e,
                None => db
                    .reader()
                    .call(|c| workmetrics::storage::repository::get_config(c, "default_employee"))
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "No employee given. Pass one or run 'workmetrics config set default_employee <GID>'."
                        )
                    })?,
            };
            let gid = resolve_employee(&db, &identifier).await?;
            let p = Period::parse(&period, now.date_naive())?;
            let g: Granularity = granularity.parse()?;
            let mut options = RollupOptions::new(now);
            options.critical_if_past_due = !no_overdue_check;
            options.expected_percent = expected;

            let m = workmetrics::compute_employee_metrics(&db, &gid, &p, g, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&m)?);
            } else {
                println!(
                    "Employee Metrics: {} ({})",
                    m.employee_name.as_deref().unwrap_or(&m.employee_gid),
                    m.period_key
                );
                print_bundle(&m.metrics);
            }
        }
        Commands::Team {
            employees,
            period,
            granularity,
            as_of,
            json,
        } => {
            let now = parse_as_of(as_of.as_deref())?;
            let mut gids = Vec::with_capacity(employees.len());
            for e in &employees {
                gids.push(resolve_employee(&db, e).await?);
            }
            let p = Period::parse(&period, now.date_naive())?;
            let g: Granularity = granularity.parse()?;
            let options = RollupOptions::new(now);

            let tm = workmetrics::compute_roster_metrics(&db, &gids, &p, g, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tm)?);
            } else {
                println!("Team Metrics ({})", tm.period_key);
                println!("  Members: {}", tm.team.member_count);
                print_bundle(&tm.team.combined);
                for member in &tm.team.members {
                    println!(
                        "  {}: {} min, {}% complete, {}",
                        member.employee_gid,
                        member.metrics.total_minutes,
                        member.metrics.percent_complete,
                        member.metrics.classification
                    );
                }
            }
        }
        Commands::Config { action } => {
            handle_config(&db, action).await?;
        }
        Commands::Status => {
            print_status(&db).await?;
        }
    }

    Ok(())
}

fn print_bundle(m: &workmetrics::MetricsBundle) {
    println!("  Time:");
    println!(
        "    Total: {} minutes ({:.1} h)",
        m.total_minutes,
        m.total_minutes as f64 / 60.0
    );
    for b in &m.by_bucket {
        println!("    {}: {}", b.label, b.minutes);
    }
    println!("  Progress:");
    println!(
        "    Completed: {}/{} ({}%)",
        m.completed_count, m.total_count, m.percent_complete
    );
    println!("    Status:    {}", m.classification);
}

async fn handle_config(db: &workmetrics::Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let val: Option<String> = db
                .reader()
                .call({
                    let key = key.clone();
                    move |conn| workmetrics::storage::repository::get_config(conn, &key)
                })
                .await?;
            match val {
                Some(v) => println!("{key} = {v}"),
                None => println!("{key} is not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            db.writer()
                .call(move |conn| {
                    workmetrics::storage::repository::set_config(conn, &key, &value)?;
                    Ok::<(), rusqlite::Error>(())
                })
                .await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items: Vec<(String, String)> = db
                .reader()
                .call(|conn| workmetrics::storage::repository::list_config(conn))
                .await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(db: &workmetrics::Database) -> anyhow::Result<()> {
    let stats = db
        .reader()
        .call(|conn| workmetrics::storage::repository::warehouse_stats(conn))
        .await?;

    println!("Warehouse Status");
    println!("  Employees:    {}", stats.employees);
    println!("  Time entries: {}", stats.time_entries);
    println!("  Open entries: {}", stats.open_entries);
    println!("  Tasks:        {}", stats.tasks);
    println!(
        "  Last import:  {}",
        stats.last_import.unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}
