//! Core types for Postkeeper

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PostkeeperError;

/// External identifiers returned by each destination, keyed by destination name
pub type PostIds = BTreeMap<String, String>;

/// A publishable unit of content tracked through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub scheduled_for: Option<i64>,
    pub folder_path: PathBuf,
    pub source_type: Option<SourceType>,
    pub source_file: Option<String>,
    pub title: Option<String>,
    pub post_ids: PostIds,
    pub last_error: Option<String>,
    pub posted_at: Option<i64>,
}

impl Job {
    /// Title for display, falling back to a placeholder
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }

    /// A job is due when it is ready and its schedule is at or before `now`
    pub fn is_due(&self, now: i64) -> bool {
        self.status == JobStatus::Ready && self.scheduled_for.is_some_and(|at| at <= now)
    }
}

/// Job lifecycle state
///
/// `draft -> ready -> posting -> posted | failed`, with `failed -> ready` on
/// explicit retry. `posted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Draft,
    Ready,
    Posting,
    Posted,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Draft,
        JobStatus::Ready,
        JobStatus::Posting,
        JobStatus::Posted,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Ready => "ready",
            JobStatus::Posting => "posting",
            JobStatus::Posted => "posted",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PostkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(JobStatus::Draft),
            "ready" => Ok(JobStatus::Ready),
            "posting" => Ok(JobStatus::Posting),
            "posted" => Ok(JobStatus::Posted),
            "failed" => Ok(JobStatus::Failed),
            other => Err(PostkeeperError::InvalidInput(format!(
                "Unknown job status: '{}'",
                other
            ))),
        }
    }
}

/// Kind of artifact a job was created from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Image,
    Document,
}

impl SourceType {
    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &["png", "jpg", "jpeg", "gif"];
    pub const DOCUMENT_EXTENSIONS: &'static [&'static str] = &["tex"];

    /// Detect the source type from a file extension (case insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceType::Image)
        } else if Self::DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceType::Document)
        } else {
            None
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceType::Image => Self::IMAGE_EXTENSIONS,
            SourceType::Document => Self::DOCUMENT_EXTENSIONS,
        }
    }

    /// Whether `ext` is recognised for this source type
    pub fn accepts(&self, ext: &str) -> bool {
        self.extensions().contains(&ext.to_lowercase().as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Image => "image",
            SourceType::Document => "document",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = PostkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(SourceType::Image),
            "document" => Ok(SourceType::Document),
            other => Err(PostkeeperError::InvalidInput(format!(
                "Unknown source type: '{}'. Valid options: image, document",
                other
            ))),
        }
    }
}

/// Number of jobs in each status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts(BTreeMap<JobStatus, u64>);

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn set(&mut self, status: JobStatus, count: u64) {
        self.0.insert(status, count);
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}
