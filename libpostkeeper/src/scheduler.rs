//! Scheduler daemon
//!
//! Polls the store for due jobs and publishes each one to every configured
//! destination in registry order. Jobs are processed one at a time and
//! destinations are called one at a time; nothing runs in parallel.
//!
//! A job counts as posted when at least one destination returned an id,
//! even if others failed. It is marked failed only when no destination
//! succeeded, with every destination error joined into `last_error`.

use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::content::{ContentLoader, FolderContentLoader};
use crate::destinations::DestinationRegistry;
use crate::error::{DestinationError, PostkeeperError, Result};
use crate::manager::JobManager;
use crate::types::{Job, JobStatus, PostIds};

/// Granularity of the sleep between polls; bounds shutdown latency
pub const SLEEP_STEP: Duration = Duration::from_secs(1);

/// What happened to each due job in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Posted to at least one destination
    pub posted: Vec<String>,
    /// No destination succeeded
    pub failed: Vec<String>,
    /// Claimed by another scheduler first, or moved before the result was saved
    pub skipped: Vec<String>,
    /// Processing stopped on a storage fault
    pub errored: Vec<String>,
}

impl CycleReport {
    pub fn processed(&self) -> usize {
        self.posted.len() + self.failed.len() + self.skipped.len() + self.errored.len()
    }
}

/// Result of one publishing attempt across all destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Posted(PostIds),
    Failed(String),
}

pub struct Scheduler {
    manager: JobManager,
    destinations: DestinationRegistry,
    loader: Box<dyn ContentLoader>,
}

impl Scheduler {
    pub fn new(manager: JobManager, destinations: DestinationRegistry) -> Self {
        Self {
            manager,
            destinations,
            loader: Box::new(FolderContentLoader),
        }
    }

    /// Replace the post content loader
    pub fn with_loader(mut self, loader: impl ContentLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn destinations(&self) -> &DestinationRegistry {
        &self.destinations
    }

    /// One due-check-and-post cycle at the current time
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.run_once_at(chrono::Utc::now().timestamp()).await
    }

    /// One cycle treating `now` as the current Unix time
    pub async fn run_once_at(&self, now: i64) -> Result<CycleReport> {
        self.cycle(now, None).await
    }

    /// Poll every `interval` until `shutdown` is cancelled
    ///
    /// Cancellation is checked between jobs and during the sleep, which is
    /// taken in [`SLEEP_STEP`] increments. A job already being posted runs
    /// to completion.
    pub async fn run_forever(&self, interval: Duration, shutdown: CancellationToken) -> Result<()> {
        let interval = if interval.is_zero() {
            warn!("Poll interval of 0s requested, using {}s", SLEEP_STEP.as_secs());
            SLEEP_STEP
        } else {
            interval
        };

        info!("Scheduler daemon started (interval: {}s)", interval.as_secs_f64());

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping daemon loop");
                break;
            }

            let now = chrono::Utc::now().timestamp();
            if let Err(e) = self.cycle(now, Some(&shutdown)).await {
                error!("Error during check: {}", e);
            }

            let mut remaining = interval;
            while !remaining.is_zero() && !shutdown.is_cancelled() {
                let step = remaining.min(SLEEP_STEP);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(step) => {}
                }
                remaining = remaining.saturating_sub(step);
            }
        }

        info!("Scheduler daemon stopped");
        Ok(())
    }

    async fn cycle(&self, now: i64, shutdown: Option<&CancellationToken>) -> Result<CycleReport> {
        let due = self.manager.store().due(now).await?;
        let mut report = CycleReport::default();

        if due.is_empty() {
            debug!("No jobs due");
            return Ok(report);
        }

        info!("Found {} due job(s)", due.len());

        for job in due {
            if shutdown.is_some_and(|token| token.is_cancelled()) {
                info!("Shutdown requested, leaving remaining due jobs for the next run");
                break;
            }

            match self.process_job(&job).await {
                Ok(Some(PublishOutcome::Posted(_))) => report.posted.push(job.id),
                Ok(Some(PublishOutcome::Failed(_))) => report.failed.push(job.id),
                Ok(None) => report.skipped.push(job.id),
                Err(e) => {
                    error!("[{}] Processing aborted: {}", job.id, e);
                    report.errored.push(job.id);
                }
            }
        }

        Ok(report)
    }

    /// Claim, publish and record one job; `Ok(None)` if the claim was lost
    async fn process_job(&self, job: &Job) -> Result<Option<PublishOutcome>> {
        let store = self.manager.store();

        if !store.mark_posting(&job.id).await? {
            warn!("[{}] No longer ready, another scheduler claimed it", job.id);
            return Ok(None);
        }

        info!("Posting [{}] {}...", job.id, job.display_title());
        let outcome = self.publish(job).await;

        match &outcome {
            PublishOutcome::Posted(post_ids) => {
                if !store.mark_posted(&job.id, post_ids).await? {
                    warn!("[{}] Moved while posting, result not recorded", job.id);
                    return Ok(None);
                }
                if let Err(e) = self.manager.transition(&job.id, JobStatus::Posted).await {
                    error!("[{}] Posted but folder rename failed: {}", job.id, e);
                }
                info!("[{}] Posted successfully", job.id);
            }
            PublishOutcome::Failed(message) => {
                if !store.mark_failed(&job.id, message).await? {
                    warn!("[{}] Moved while posting, failure not recorded", job.id);
                    return Ok(None);
                }
                error!("[{}] Failed: {}", job.id, message);
            }
        }

        Ok(Some(outcome))
    }

    /// Attempt every destination that has a caption; never returns early on a
    /// destination error
    pub async fn publish(&self, job: &Job) -> PublishOutcome {
        if !job.folder_path.is_dir() {
            return PublishOutcome::Failed(format!(
                "Folder not found: {}",
                job.folder_path.display()
            ));
        }

        let content = match self.loader.load(&job.folder_path) {
            Ok(content) => content,
            Err(e) => return PublishOutcome::Failed(format!("Failed to load post config: {}", e)),
        };

        let mut post_ids = PostIds::new();
        let mut errors = Vec::new();

        for destination in self.destinations.iter() {
            let name = destination.name();
            let Some(caption) = content.caption_for(name) else {
                debug!("[{}] No caption for {}, skipping", job.id, name);
                continue;
            };

            match destination.post(caption, &content.media).await {
                Ok(post_id) if !post_id.trim().is_empty() => {
                    info!("  Posted to {}: {}", name, post_id);
                    post_ids.insert(name.to_string(), post_id);
                }
                Ok(_) => {
                    let message = format!("{}: {}", name, DestinationError::EmptyResponse);
                    error!("  {}", message);
                    errors.push(message);
                }
                Err(e) => {
                    let message = format!("{}: {}", name, describe(&e));
                    error!("  {}", message);
                    errors.push(message);
                }
            }
        }

        if post_ids.is_empty() {
            if errors.is_empty() {
                let message = "No configured destination has a caption";
                return PublishOutcome::Failed(message.to_string());
            }
            return PublishOutcome::Failed(errors.join("; "));
        }

        if !errors.is_empty() {
            warn!(
                "[{}] Partially posted ({} ok, {} failed): {}",
                job.id,
                post_ids.len(),
                errors.len(),
                errors.join("; ")
            );
        }

        PublishOutcome::Posted(post_ids)
    }
}

fn describe(error: &PostkeeperError) -> String {
    match error {
        PostkeeperError::Destination(inner) => inner.to_string(),
        other => other.to_string(),
    }
}
