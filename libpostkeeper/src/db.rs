//! Durable job store backed by SQLite
//!
//! The store holds policy-free data access only. Operations that can fail a
//! precondition (`schedule`, `mark_posting`, `retry`) report it as `false`
//! rather than an error; an `Err` always means the storage engine itself
//! failed.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DbError, Result};
use crate::types::{Job, JobStatus, PostIds, SourceType, StatusCounts};

const JOB_COLUMNS: &str = "id, created_at, updated_at, status, scheduled_for, folder_path, \
     source_type, source_file, title, post_ids, last_error, posted_at";

/// Length of generated job ids
pub const SHORT_ID_LEN: usize = 6;

/// Generate a short opaque job id from a random UUID
pub fn generate_short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..SHORT_ID_LEN].to_string()
}

/// Fields supplied when inserting a job
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    /// Caller-allocated id; generated when `None`
    pub id: Option<String>,
    /// Creation time; defaults to now
    pub created_at: Option<i64>,
    pub folder_path: PathBuf,
    pub source_type: Option<SourceType>,
    pub source_file: Option<String>,
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the store at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    /// Open a private in-memory store (used by tests and dry runs)
    pub async fn in_memory() -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(DbError::SqlxError)?;

        // A single long-lived connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a new job in `draft` and return its id
    pub async fn create(&self, job: &NewJob) -> Result<String> {
        let id = job.id.clone().unwrap_or_else(generate_short_id);
        let created_at = job.created_at.unwrap_or_else(now);

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, created_at, updated_at, status, folder_path, source_type, source_file, title
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(created_at)
        .bind(created_at)
        .bind(JobStatus::Draft.as_str())
        .bind(path_to_string(&job.folder_path))
        .bind(job.source_type.map(|t| t.as_str()))
        .bind(&job.source_file)
        .bind(&job.title)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(id)
    }

    /// Get a job by id
    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// Unconditionally write `status`
    ///
    /// Leaving `ready` drops any schedule. Entering `ready` or `posted` clears
    /// `last_error`, and the first entry into `posted` stamps `posted_at`.
    pub async fn update_status(&self, id: &str, status: JobStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?1,
                updated_at = ?2,
                scheduled_for = CASE WHEN ?1 = 'ready' THEN scheduled_for ELSE NULL END,
                last_error = CASE WHEN ?1 IN ('ready', 'posted') THEN NULL ELSE last_error END,
                posted_at = CASE WHEN ?1 = 'posted' THEN COALESCE(posted_at, ?2) ELSE posted_at END
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record where the job folder now lives
    pub async fn update_folder_path(&self, id: &str, folder_path: &Path) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET folder_path = ?, updated_at = ? WHERE id = ?")
            .bind(path_to_string(folder_path))
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Set `scheduled_for`; only takes effect while the job is `ready`
    pub async fn schedule(&self, id: &str, when: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET scheduled_for = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(when)
        .bind(now())
        .bind(id)
        .bind(JobStatus::Ready.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Clear `scheduled_for` regardless of status
    pub async fn unschedule(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE jobs SET scheduled_for = NULL, updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the external id map without touching status
    pub async fn save_post_ids(&self, id: &str, post_ids: &PostIds) -> Result<bool> {
        let encoded = serde_json::to_string(post_ids).map_err(DbError::Serialization)?;

        let result = sqlx::query("UPDATE jobs SET post_ids = ?, updated_at = ? WHERE id = ?")
            .bind(encoded)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// List jobs newest first, optionally filtered by status
    pub async fn list(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM jobs WHERE status = ? \
                     ORDER BY created_at DESC, rowid DESC LIMIT ?",
                    JOB_COLUMNS
                ))
                .bind(status.as_str())
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?",
                    JOB_COLUMNS
                ))
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        rows.iter().map(job_from_row).collect()
    }

    /// Ready jobs whose schedule is at or before `at`, earliest deadline first
    pub async fn due(&self, at: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM jobs
            WHERE status = ? AND scheduled_for IS NOT NULL AND scheduled_for <= ?
            ORDER BY scheduled_for ASC, created_at ASC, rowid ASC
            "#,
            JOB_COLUMNS
        ))
        .bind(JobStatus::Ready.as_str())
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(job_from_row).collect()
    }

    /// Every scheduled ready job, due or not, earliest first
    pub async fn scheduled(&self) -> Result<Vec<Job>> {
        self.due(i64::MAX).await
    }

    pub async fn count_by_status(&self) -> Result<StatusCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let mut counts = StatusCounts::default();
        for row in &rows {
            let status = decode_status(row)?;
            counts.set(status, row.get::<i64, _>("count") as u64);
        }
        Ok(counts)
    }

    /// Claim a ready job for posting
    ///
    /// Compare-and-swap on `status = 'ready'`: returns `false` when another
    /// writer has already moved the job on.
    pub async fn mark_posting(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, scheduled_for = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Posting.as_str())
        .bind(now())
        .bind(id)
        .bind(JobStatus::Ready.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful posting attempt; only a `posting` job is updated
    pub async fn mark_posted(&self, id: &str, post_ids: &PostIds) -> Result<bool> {
        let encoded = serde_json::to_string(post_ids).map_err(DbError::Serialization)?;
        let now = now();

        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?,
                post_ids = ?,
                posted_at = COALESCE(posted_at, ?),
                last_error = NULL,
                scheduled_for = NULL,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Posted.as_str())
        .bind(encoded)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(JobStatus::Posting.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a posting attempt in which no destination succeeded; only a
    /// `posting` job is updated
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, last_error = ?, scheduled_for = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(now())
        .bind(id)
        .bind(JobStatus::Posting.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a failed job back to ready; a no-op for any other status
    pub async fn retry(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, last_error = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Ready.as_str())
        .bind(now())
        .bind(id)
        .bind(JobStatus::Failed.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Reconciliation lookup by recorded folder path
    pub async fn find_by_folder(&self, folder_path: &Path) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE folder_path = ?",
            JOB_COLUMNS
        ))
        .bind(path_to_string(folder_path))
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(job_from_row).transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// SQLite takes LIMIT as a signed integer
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn decode_status(row: &SqliteRow) -> Result<JobStatus> {
    let raw: String = row.get("status");
    raw.parse().map_err(|_| {
        let message = format!("invalid status '{}'", raw);
        DbError::SqlxError(sqlx::Error::Decode(message.into())).into()
    })
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let post_ids = match row.get::<Option<String>, _>("post_ids") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw).map_err(DbError::Serialization)?,
        _ => PostIds::new(),
    };

    Ok(Job {
        id: row.get("id"),
        status: decode_status(row)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        scheduled_for: row.get("scheduled_for"),
        folder_path: PathBuf::from(row.get::<String, _>("folder_path")),
        source_type: row
            .get::<Option<String>, _>("source_type")
            .and_then(|s| s.parse().ok()),
        source_file: row.get("source_file"),
        title: row.get("title"),
        post_ids,
        last_error: row.get("last_error"),
        posted_at: row.get("posted_at"),
    })
}
