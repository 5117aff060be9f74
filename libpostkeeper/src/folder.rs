//! Job folder naming
//!
//! A job folder is named `{id}_{YYYY}_{MM}_{DD}_{status}`. The name is a pure
//! function of the job id, its creation date and its current status, so it
//! can always be decoded back into those three parts.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::path::Path;

use crate::types::JobStatus;

const DATE_FORMAT: &str = "%Y_%m_%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderName {
    pub id: String,
    pub date: NaiveDate,
    pub status: JobStatus,
}

impl FolderName {
    pub fn new(id: impl Into<String>, date: NaiveDate, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            date,
            status,
        }
    }

    /// Name for a job created at the Unix timestamp `created_at` (UTC date)
    pub fn for_job(id: &str, created_at: i64, status: JobStatus) -> Self {
        let date = DateTime::<Utc>::from_timestamp(created_at, 0)
            .unwrap_or_else(Utc::now)
            .date_naive();
        Self::new(id, date, status)
    }

    /// Decode a folder name, returning `None` when it does not follow the
    /// naming scheme
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 5 || parts[0].is_empty() {
            return None;
        }

        let date = NaiveDate::parse_from_str(&parts[1..4].join("_"), DATE_FORMAT).ok()?;
        let status = parts[4..].join("_").parse().ok()?;

        Some(Self::new(parts[0], date, status))
    }

    /// Decode the final component of `path`
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
    }

    /// Same id and date with a different status
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self::new(self.id.clone(), self.date, status)
    }
}

impl fmt::Display for FolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.id, self.date.format(DATE_FORMAT), self.status)
    }
}
