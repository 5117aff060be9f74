//! pk-track - Track content jobs
//!
//! Operator tool for turning artifacts into job folders and moving jobs
//! through their lifecycle.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use libpostkeeper::destinations::DestinationRegistry;
use libpostkeeper::logging::{LogFormat, LoggingConfig};
use libpostkeeper::scheduling::parse_schedule;
use libpostkeeper::{
    Config, Job, JobManager, JobStatus, PostkeeperError, Result, Scheduler, SourceType,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pk-track")]
#[command(version)]
#[command(about = "Track content jobs from draft to posted")]
#[command(long_about = "\
pk-track - Track content jobs from draft to posted

DESCRIPTION:
    Every job is a folder in the workspace named ID_YYYY_MM_DD_STATUS plus a
    row in the job store. pk-track creates jobs from images and LaTeX files,
    moves them between draft, ready and posted, schedules ready jobs and
    resets failed ones.

USAGE EXAMPLES:
    # Turn everything in the inbox into draft jobs
    pk-track process

    # Import a folder of LaTeX files and delete the originals
    pk-track process ~/problems -t document -d

    # Promote, then schedule
    pk-track status a1b2c3 ready
    pk-track schedule a1b2c3 2026-02-10

    # See what went wrong and try again
    pk-track failed
    pk-track retry a1b2c3

CONFIGURATION:
    Configuration file: ~/.config/postkeeper/config.toml

    Override with environment variables:
        POSTKEEPER_CONFIG  - Path to config file
        POSTKEEPER_HOME    - Workspace directory

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Workspace error (missing folder, bad artifact)
    3 - Invalid input (unknown job, bad date, wrong status)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show files waiting in the inbox
    Inbox,

    /// Create draft jobs from the inbox or from a folder
    Process {
        /// Folder to import instead of the inbox
        source: Option<PathBuf>,

        /// Kind of file to import from SOURCE
        #[arg(short = 't', long = "type", value_enum, default_value = "image")]
        source_type: SourceKind,

        /// Delete source files after import
        #[arg(short, long)]
        delete: bool,
    },

    /// List jobs with status counts
    List {
        /// Only jobs with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of jobs to show
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move a job to another status and rename its folder
    Status {
        id: String,

        #[arg(value_enum)]
        status: ManualStatus,
    },

    /// Schedule a ready job, or clear its schedule
    Schedule {
        id: String,

        /// YYYY-MM-DD, YYYY_MM_DD, "YYYY-MM-DD HH:MM", "2h", "tomorrow 9am"
        date: Option<String>,

        /// Clear the schedule
        #[arg(short, long)]
        clear: bool,
    },

    /// Show scheduled jobs
    Scheduled,

    /// Show everything known about a job
    Info { id: String },

    /// Reset a failed job to ready
    Retry { id: String },

    /// Show failed jobs with their errors
    Failed,

    /// Post every due job now and exit
    PostDue,

    /// Forget a job; its folder is left on disk
    Delete { id: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    Image,
    Document,
}

impl From<SourceKind> for SourceType {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Image => SourceType::Image,
            SourceKind::Document => SourceType::Document,
        }
    }
}

/// Statuses an operator may set directly; failed and posting belong to the daemon
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ManualStatus {
    Draft,
    Ready,
    Posted,
}

impl From<ManualStatus> for JobStatus {
    fn from(status: ManualStatus) -> Self {
        match status {
            ManualStatus::Draft => JobStatus::Draft,
            ManualStatus::Ready => JobStatus::Ready,
            ManualStatus::Posted => JobStatus::Posted,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "error" };
    LoggingConfig::new(LogFormat::Text, level.to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let manager = JobManager::open(&config).await?;

    match cli.command {
        Commands::Inbox => cmd_inbox(&manager),
        Commands::Process {
            source,
            source_type,
            delete,
        } => cmd_process(&manager, source, source_type.into(), delete).await,
        Commands::List {
            status,
            limit,
            format,
        } => cmd_list(&manager, status.as_deref(), limit, &format).await,
        Commands::Status { id, status } => cmd_status(&manager, &id, status.into()).await,
        Commands::Schedule { id, date, clear } => {
            cmd_schedule(&manager, &id, date.as_deref(), clear).await
        }
        Commands::Scheduled => cmd_scheduled(&manager).await,
        Commands::Info { id } => cmd_info(&manager, &id).await,
        Commands::Retry { id } => cmd_retry(&manager, &id).await,
        Commands::Failed => cmd_failed(&manager).await,
        Commands::PostDue => cmd_post_due(manager, &config).await,
        Commands::Delete { id } => cmd_delete(&manager, &id).await,
    }
}

fn not_found(id: &str) -> PostkeeperError {
    PostkeeperError::InvalidInput(format!("Job not found: {}", id))
}

async fn require_job(manager: &JobManager, id: &str) -> Result<Job> {
    manager.store().get(id).await?.ok_or_else(|| not_found(id))
}

fn format_timestamp(ts: i64, pattern: &str) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn cmd_inbox(manager: &JobManager) -> Result<()> {
    let inbox = manager.list_inbox()?;

    println!("Inbox: {}", manager.inbox_path().display());
    for (label, files) in [("Images", &inbox.images), ("Documents", &inbox.documents)] {
        println!("\n{} ({}):", label, files.len());
        if files.is_empty() {
            println!("  (empty)");
        }
        for file in files {
            println!("  {}", file);
        }
    }

    Ok(())
}

async fn cmd_process(
    manager: &JobManager,
    source: Option<PathBuf>,
    source_type: SourceType,
    delete: bool,
) -> Result<()> {
    let created = match source {
        Some(path) => {
            let created = manager.ingest_folder(&path, source_type, delete).await?;
            println!(
                "Processed {} {} file(s) from {}",
                created.len(),
                source_type,
                path.display()
            );
            created
        }
        None => {
            let report = manager.ingest_inbox(delete).await?;
            println!(
                "Processed {} image(s), {} document(s)",
                report.images.len(),
                report.documents.len()
            );
            report.all().cloned().collect()
        }
    };

    if !created.is_empty() {
        println!("\nCreated jobs:");
        for (id, folder) in &created {
            let name = folder
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  [{}] {}", id, name);
        }
    }

    Ok(())
}

async fn cmd_list(
    manager: &JobManager,
    status: Option<&str>,
    limit: usize,
    format: &str,
) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PostkeeperError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let status = status.map(str::parse::<JobStatus>).transpose()?;
    let jobs = manager.store().list(status, limit).await?;

    if format == "json" {
        let json = serde_json::to_string_pretty(&jobs)
            .map_err(|e| PostkeeperError::InvalidInput(format!("JSON output failed: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    let counts = manager.store().count_by_status().await?;
    println!("Jobs ({} total):", counts.total());
    for s in JobStatus::ALL {
        println!("  {:<8} {}", s.as_str(), counts.get(s));
    }

    if jobs.is_empty() {
        println!("\n(no jobs)");
        return Ok(());
    }

    match status {
        Some(s) => println!("\nJobs ({}):", s),
        None => println!("\nJobs:"),
    }
    for job in &jobs {
        let scheduled = job
            .scheduled_for
            .map(|ts| format!(" @ {}", format_timestamp(ts, "%Y-%m-%d")))
            .unwrap_or_default();
        let error_hint = if job.status == JobStatus::Failed && job.last_error.is_some() {
            " (!)"
        } else {
            ""
        };
        println!(
            "  {:<8} [{}] {}{}{}",
            job.status.as_str(),
            job.id,
            job.display_title(),
            scheduled,
            error_hint
        );
    }

    Ok(())
}

async fn cmd_status(manager: &JobManager, id: &str, status: JobStatus) -> Result<()> {
    let folder = manager
        .transition(id, status)
        .await?
        .ok_or_else(|| not_found(id))?;

    println!("[{}] -> {}", id, status);
    if let Some(name) = folder.file_name() {
        println!("  Folder: {}", name.to_string_lossy());
    }
    Ok(())
}

async fn cmd_schedule(
    manager: &JobManager,
    id: &str,
    date: Option<&str>,
    clear: bool,
) -> Result<()> {
    if clear {
        if !manager.unschedule(id).await? {
            return Err(not_found(id));
        }
        println!("[{}] Schedule cleared", id);
        return Ok(());
    }

    let date = date.ok_or_else(|| {
        PostkeeperError::InvalidInput("Provide a date or use --clear".to_string())
    })?;
    let when = parse_schedule(date, Utc::now())?;

    let job = require_job(manager, id).await?;
    if job.status != JobStatus::Ready {
        return Err(PostkeeperError::InvalidInput(format!(
            "Only ready jobs can be scheduled. Current status: {}",
            job.status
        )));
    }

    if !manager.schedule(id, when.timestamp()).await? {
        return Err(PostkeeperError::InvalidInput(format!(
            "Failed to schedule: {}",
            id
        )));
    }

    println!("[{}] Scheduled for {}", id, when.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}

async fn cmd_scheduled(manager: &JobManager) -> Result<()> {
    let jobs = manager.store().scheduled().await?;

    if jobs.is_empty() {
        println!("(no scheduled jobs)");
        return Ok(());
    }

    let now = Utc::now().timestamp();
    println!("Scheduled jobs ({}):", jobs.len());
    for job in &jobs {
        let when = job
            .scheduled_for
            .map(|ts| format_timestamp(ts, "%Y-%m-%d %H:%M"))
            .unwrap_or_default();
        let due = if job.is_due(now) { "  DUE" } else { "" };
        println!("  [{}] {} - {}{}", job.id, when, job.display_title(), due);
    }

    Ok(())
}

async fn cmd_info(manager: &JobManager, id: &str) -> Result<()> {
    let job = require_job(manager, id).await?;
    let full = "%Y-%m-%d %H:%M:%S";

    println!("Job [{}]", job.id);
    println!("  Title:      {}", job.display_title());
    println!("  Status:     {}", job.status);
    println!("  Created:    {}", format_timestamp(job.created_at, full));
    println!("  Updated:    {}", format_timestamp(job.updated_at, full));
    println!(
        "  Source:     {} - {}",
        job.source_type.map(|t| t.as_str()).unwrap_or("-"),
        job.source_file.as_deref().unwrap_or("-")
    );
    println!("  Folder:     {}", job.folder_path.display());
    if let Some(ts) = job.scheduled_for {
        println!("  Scheduled:  {}", format_timestamp(ts, "%Y-%m-%d %H:%M"));
    }
    if let Some(ts) = job.posted_at {
        println!("  Posted at:  {}", format_timestamp(ts, full));
    }
    if let Some(error) = &job.last_error {
        println!("  Last error: {}", error);
    }
    if !job.post_ids.is_empty() {
        println!("  Post ids:");
        for (destination, post_id) in &job.post_ids {
            println!("    {}: {}", destination, post_id);
        }
    }

    Ok(())
}

async fn cmd_retry(manager: &JobManager, id: &str) -> Result<()> {
    let job = require_job(manager, id).await?;
    if job.status != JobStatus::Failed {
        return Err(PostkeeperError::InvalidInput(format!(
            "Job is not failed. Status: {}",
            job.status
        )));
    }

    if !manager.retry(id).await? {
        return Err(PostkeeperError::InvalidInput(format!(
            "Failed to reset job: {}",
            id
        )));
    }

    println!("[{}] Reset to ready", id);
    println!("  Schedule it again with: pk-track schedule {} DATE", id);
    Ok(())
}

async fn cmd_failed(manager: &JobManager) -> Result<()> {
    let jobs = manager.store().list(Some(JobStatus::Failed), usize::MAX).await?;

    if jobs.is_empty() {
        println!("No failed jobs");
        return Ok(());
    }

    println!("Failed jobs ({}):", jobs.len());
    for job in &jobs {
        println!("\n  [{}] {}", job.id, job.display_title());
        println!(
            "    Error: {}",
            job.last_error.as_deref().unwrap_or("(no error message)")
        );
        println!("    Retry: pk-track retry {}", job.id);
    }

    Ok(())
}

async fn cmd_post_due(manager: JobManager, config: &Config) -> Result<()> {
    let registry = DestinationRegistry::from_config(&config.destinations)?;
    let scheduler = Scheduler::new(manager, registry);
    let report = scheduler.run_once().await?;

    if report.processed() == 0 {
        println!("No jobs due");
        return Ok(());
    }

    for id in &report.posted {
        println!("[{}] posted", id);
    }
    for id in &report.failed {
        println!("[{}] failed", id);
    }
    for id in report.skipped.iter().chain(&report.errored) {
        println!("[{}] not processed", id);
    }
    Ok(())
}

async fn cmd_delete(manager: &JobManager, id: &str) -> Result<()> {
    let job = require_job(manager, id).await?;
    manager.store().delete(id).await?;

    println!("[{}] Deleted", id);
    println!("  Folder left at {}", job.folder_path.display());
    Ok(())
}
