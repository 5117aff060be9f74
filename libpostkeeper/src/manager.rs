//! Folder lifecycle manager
//!
//! Bridges job folders on disk and rows in the [`Store`]. Every job lives in
//! a folder under the workspace named by [`FolderName`]; status changes
//! rename the folder first and only then persist the new status and path.
//! A crash between the two steps leaves the folder ahead of the store, which
//! [`JobManager::reconcile`] repairs.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{generate_short_id, NewJob, Store};
use crate::error::{ArtifactError, PostkeeperError, Result};
use crate::folder::FolderName;
use crate::types::{JobStatus, SourceType};

pub const INBOX_DIR: &str = "inbox";
pub const INBOX_IMAGES_DIR: &str = "images";
pub const INBOX_DOCUMENTS_DIR: &str = "documents";

/// Canonical file stem for the copied source artifact
pub const SOURCE_FILE_STEM: &str = "source";

const MAX_ID_ATTEMPTS: usize = 16;

/// A created job: its id and folder
pub type CreatedJob = (String, PathBuf);

/// Jobs created by one inbox run, split by source type
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub images: Vec<CreatedJob>,
    pub documents: Vec<CreatedJob>,
}

impl IngestReport {
    pub fn len(&self) -> usize {
        self.images.len() + self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> impl Iterator<Item = &CreatedJob> {
        self.images.iter().chain(self.documents.iter())
    }
}

/// Recognised files waiting in the inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxListing {
    pub images: Vec<String>,
    pub documents: Vec<String>,
}

pub struct JobManager {
    base_path: PathBuf,
    inbox_path: PathBuf,
    store: Store,
}

impl JobManager {
    /// Create a manager rooted at `base_path`, creating the workspace and
    /// inbox directories if needed
    pub fn new(base_path: impl Into<PathBuf>, store: Store) -> Result<Self> {
        let base_path = base_path.into();
        let inbox_path = base_path.join(INBOX_DIR);

        std::fs::create_dir_all(inbox_path.join(INBOX_IMAGES_DIR)).map_err(ArtifactError::Io)?;
        std::fs::create_dir_all(inbox_path.join(INBOX_DOCUMENTS_DIR)).map_err(ArtifactError::Io)?;

        Ok(Self {
            base_path,
            inbox_path,
            store,
        })
    }

    /// Open the workspace and store named by `config`
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Store::new(&config.database_path()).await?;
        Self::new(config.workspace_path(), store)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn inbox_path(&self) -> &Path {
        &self.inbox_path
    }

    /// Inbox sub-directory for a source type
    pub fn inbox_dir(&self, source_type: SourceType) -> PathBuf {
        match source_type {
            SourceType::Image => self.inbox_path.join(INBOX_IMAGES_DIR),
            SourceType::Document => self.inbox_path.join(INBOX_DOCUMENTS_DIR),
        }
    }

    pub async fn create_from_image(&self, path: &Path, title: Option<&str>) -> Result<CreatedJob> {
        self.create_job(SourceType::Image, path, title).await
    }

    pub async fn create_from_document(
        &self,
        path: &Path,
        title: Option<&str>,
    ) -> Result<CreatedJob> {
        self.create_job(SourceType::Document, path, title).await
    }

    /// Create a job, detecting the source type from the file extension
    pub async fn create_from_artifact(
        &self,
        path: &Path,
        title: Option<&str>,
    ) -> Result<CreatedJob> {
        if !path.is_file() {
            return Err(ArtifactError::SourceNotFound(path.to_path_buf()).into());
        }
        let source_type = extension_of(path)
            .and_then(|ext| SourceType::from_extension(&ext))
            .ok_or_else(|| ArtifactError::UnsupportedSource(path.to_path_buf()))?;

        self.create_job(source_type, path, title).await
    }

    async fn create_job(
        &self,
        source_type: SourceType,
        source: &Path,
        title: Option<&str>,
    ) -> Result<CreatedJob> {
        if !source.is_file() {
            return Err(ArtifactError::SourceNotFound(source.to_path_buf()).into());
        }

        let id = self.allocate_id().await?;
        let created_at = chrono::Utc::now().timestamp();
        let folder_name = FolderName::for_job(&id, created_at, JobStatus::Draft);
        let folder_path = self.base_path.join(folder_name.to_string());

        std::fs::create_dir_all(&folder_path).map_err(ArtifactError::Io)?;

        let dest = folder_path.join(canonical_file_name(source_type, source));
        if let Err(e) = std::fs::copy(source, &dest) {
            let _ = std::fs::remove_dir_all(&folder_path);
            return Err(ArtifactError::Io(e).into());
        }

        let source_file = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let title = title.map(str::to_string).or_else(|| {
            source
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        });

        let new_job = NewJob {
            id: Some(id.clone()),
            created_at: Some(created_at),
            folder_path: folder_path.clone(),
            source_type: Some(source_type),
            source_file,
            title,
        };

        if let Err(e) = self.store.create(&new_job).await {
            let _ = std::fs::remove_dir_all(&folder_path);
            return Err(e);
        }

        info!("Created job [{}] from {} {}", id, source_type, source.display());
        Ok((id, folder_path))
    }

    /// Draw ids until one is free in both the store and the workspace
    async fn allocate_id(&self) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_short_id();
            if self.store.get(&id).await?.is_none() && self.find_folder_for_id(&id)?.is_none() {
                return Ok(id);
            }
            debug!("Job id {} already taken, drawing another", id);
        }
        Err(ArtifactError::IdExhausted(MAX_ID_ATTEMPTS).into())
    }

    /// Turn every recognised inbox file into a job
    pub async fn ingest_inbox(&self, delete_after: bool) -> Result<IngestReport> {
        let images = self
            .ingest_dir(&self.inbox_dir(SourceType::Image), SourceType::Image, delete_after)
            .await?;
        let documents = self
            .ingest_dir(
                &self.inbox_dir(SourceType::Document),
                SourceType::Document,
                delete_after,
            )
            .await?;

        Ok(IngestReport { images, documents })
    }

    /// Turn every recognised file of `source_type` in an external folder into a job
    pub async fn ingest_folder(
        &self,
        path: &Path,
        source_type: SourceType,
        delete_after: bool,
    ) -> Result<Vec<CreatedJob>> {
        if !path.is_dir() {
            return Err(ArtifactError::NotADirectory(path.to_path_buf()).into());
        }
        self.ingest_dir(path, source_type, delete_after).await
    }

    async fn ingest_dir(
        &self,
        dir: &Path,
        source_type: SourceType,
        delete_after: bool,
    ) -> Result<Vec<CreatedJob>> {
        let mut results = Vec::new();

        for file in recognised_files(dir, source_type)? {
            let created = self.create_job(source_type, &file, None).await?;
            if delete_after {
                std::fs::remove_file(&file).map_err(ArtifactError::Io)?;
            }
            results.push(created);
        }

        Ok(results)
    }

    /// Names of recognised files waiting in each inbox sub-directory
    pub fn list_inbox(&self) -> Result<InboxListing> {
        let names = |source_type| -> Result<Vec<String>> {
            Ok(recognised_files(&self.inbox_dir(source_type), source_type)?
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect())
        };

        Ok(InboxListing {
            images: names(SourceType::Image)?,
            documents: names(SourceType::Document)?,
        })
    }

    /// Rename the job folder to match `new_status`, then persist status and path
    ///
    /// Returns `Ok(None)` when no job has this id. A missing folder or a folder
    /// name that does not decode leaves both the disk and the store untouched.
    ///
    /// `posted` is terminal and `posting` belongs to the scheduler: leaving
    /// either is refused. Re-applying the current status only re-syncs the
    /// folder name.
    pub async fn transition(&self, id: &str, new_status: JobStatus) -> Result<Option<PathBuf>> {
        let Some(job) = self.store.get(id).await? else {
            return Ok(None);
        };

        let locked = matches!(job.status, JobStatus::Posted | JobStatus::Posting);
        if locked && job.status != new_status {
            return Err(PostkeeperError::InvalidInput(format!(
                "Job {} is {} and cannot move to {}",
                id, job.status, new_status
            )));
        }

        let old_path = job.folder_path;
        if !old_path.is_dir() {
            return Err(ArtifactError::FolderNotFound(old_path).into());
        }

        let parsed = FolderName::from_path(&old_path)
            .filter(|name| name.id == id)
            .ok_or_else(|| {
                ArtifactError::UnparseableFolderName(old_path.to_string_lossy().into_owned())
            })?;

        let new_name = parsed.with_status(new_status);
        let new_path = match old_path.parent() {
            Some(parent) => parent.join(new_name.to_string()),
            None => PathBuf::from(new_name.to_string()),
        };

        if new_path != old_path {
            std::fs::rename(&old_path, &new_path).map_err(ArtifactError::Io)?;
        }

        self.store.update_status(id, new_status).await?;
        self.store.update_folder_path(id, &new_path).await?;

        info!("Job [{}] -> {} ({})", id, new_status, new_name);
        Ok(Some(new_path))
    }

    /// Operator promotion to `ready`
    pub async fn promote(&self, id: &str) -> Result<Option<PathBuf>> {
        self.transition(id, JobStatus::Ready).await
    }

    /// Schedule a ready job; `false` when the job is missing or not ready
    pub async fn schedule(&self, id: &str, when: i64) -> Result<bool> {
        let scheduled = self.store.schedule(id, when).await?;
        if scheduled {
            info!("Job [{}] scheduled for {}", id, when);
        }
        Ok(scheduled)
    }

    pub async fn unschedule(&self, id: &str) -> Result<bool> {
        self.store.unschedule(id).await
    }

    /// Reset a failed job to ready; the schedule must be re-issued separately
    pub async fn retry(&self, id: &str) -> Result<bool> {
        let reset = self.store.retry(id).await?;
        if reset {
            info!("Job [{}] reset to ready", id);
        }
        Ok(reset)
    }

    /// Repair a job whose recorded folder no longer exists
    ///
    /// Looks next to the recorded path for a folder whose name decodes to the
    /// same id and records it. When the folder encodes a different status the
    /// rename is taken as authoritative and the status is persisted too.
    /// Returns the folder now recorded, or `None` if the job or its folder
    /// cannot be found.
    pub async fn reconcile(&self, id: &str) -> Result<Option<PathBuf>> {
        let Some(job) = self.store.get(id).await? else {
            return Ok(None);
        };

        if job.folder_path.is_dir() {
            return Ok(Some(job.folder_path));
        }

        let search_root = job
            .folder_path
            .parent()
            .filter(|parent| parent.is_dir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_path.clone());

        let Some((found, name)) = find_folder_in(&search_root, id)? else {
            warn!("Job [{}] has no folder under {}", id, search_root.display());
            return Ok(None);
        };

        if name.status != job.status {
            self.store.update_status(id, name.status).await?;
        }
        self.store.update_folder_path(id, &found).await?;

        info!("Reconciled job [{}] to {}", id, found.display());
        Ok(Some(found))
    }

    fn find_folder_for_id(&self, id: &str) -> Result<Option<PathBuf>> {
        Ok(find_folder_in(&self.base_path, id)?.map(|(path, _)| path))
    }
}

fn find_folder_in(dir: &Path, id: &str) -> Result<Option<(PathBuf, FolderName)>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(ArtifactError::Io)? {
        let path = entry.map_err(ArtifactError::Io)?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = FolderName::from_path(&path).filter(|name| name.id == id) {
            candidates.push((path, name));
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(candidates.into_iter().next())
}

/// Files in `dir` with an extension recognised for `source_type`, sorted by path
fn recognised_files(dir: &Path, source_type: SourceType) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(ArtifactError::Io)? {
        let path = entry.map_err(ArtifactError::Io)?.path();
        if path.is_file() && extension_of(&path).is_some_and(|ext| source_type.accepts(&ext)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

fn canonical_file_name(source_type: SourceType, source: &Path) -> String {
    match source_type {
        SourceType::Image => {
            let ext = extension_of(source).unwrap_or_else(|| "png".to_string());
            format!("{}.{}", SOURCE_FILE_STEM, ext)
        }
        SourceType::Document => format!("{}.tex", SOURCE_FILE_STEM),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostkeeperError;
    use crate::types::PostIds;
    use std::fs;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, JobManager) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::in_memory().await.unwrap();
        let manager = JobManager::new(temp_dir.path().join("posts"), store).unwrap();
        (temp_dir, manager)
    }

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_new_creates_inbox_dirs() {
        let (_temp_dir, manager) = setup().await;
        assert!(manager.inbox_dir(SourceType::Image).is_dir());
        assert!(manager.inbox_dir(SourceType::Document).is_dir());
    }

    #[tokio::test]
    async fn test_create_from_image() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");

        let (id, folder) = manager.create_from_image(&source, None).await.unwrap();

        let name = FolderName::from_path(&folder).unwrap();
        assert_eq!(name.id, id);
        assert_eq!(name.status, JobStatus::Draft);
        assert_eq!(folder.parent().unwrap(), manager.base_path());
        assert_eq!(fs::read(folder.join("source.png")).unwrap(), b"photo.png");
        assert!(source.exists());

        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Draft);
        assert_eq!(job.folder_path, folder);
        assert_eq!(job.title.as_deref(), Some("photo"));
        assert_eq!(job.source_file.as_deref(), Some("photo.png"));
        assert_eq!(job.source_type, Some(SourceType::Image));
        assert_eq!(FolderName::for_job(&id, job.created_at, JobStatus::Draft), name);
    }

    #[tokio::test]
    async fn test_create_from_document_with_title() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "heat.tex");

        let (id, folder) = manager
            .create_from_document(&source, Some("Heat conduction"))
            .await
            .unwrap();

        assert!(folder.join("source.tex").is_file());
        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.title.as_deref(), Some("Heat conduction"));
        assert_eq!(job.source_type, Some(SourceType::Document));
    }

    #[tokio::test]
    async fn test_create_from_missing_source_fails() {
        let (temp_dir, manager) = setup().await;
        let result = manager
            .create_from_image(&temp_dir.path().join("missing.png"), None)
            .await;

        assert!(matches!(
            result,
            Err(PostkeeperError::Artifact(ArtifactError::SourceNotFound(_)))
        ));
        assert_eq!(manager.store().count_by_status().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_create_from_artifact_detects_type() {
        let (temp_dir, manager) = setup().await;
        let image = write_file(temp_dir.path(), "diagram.JPG");
        let unknown = write_file(temp_dir.path(), "notes.pdf");

        let (id, folder) = manager.create_from_artifact(&image, None).await.unwrap();
        assert!(folder.join("source.jpg").is_file());
        assert_eq!(
            manager.store().get(&id).await.unwrap().unwrap().source_type,
            Some(SourceType::Image)
        );

        let result = manager.create_from_artifact(&unknown, None).await;
        assert!(matches!(
            result,
            Err(PostkeeperError::Artifact(ArtifactError::UnsupportedSource(_)))
        ));
    }

    #[tokio::test]
    async fn test_ingest_inbox_sorted_and_deletes() {
        let (_temp_dir, manager) = setup().await;
        let images = manager.inbox_dir(SourceType::Image);
        let documents = manager.inbox_dir(SourceType::Document);
        write_file(&images, "b.png");
        write_file(&images, "a.gif");
        write_file(&images, "skip.txt");
        write_file(&documents, "problem.tex");

        let listing = manager.list_inbox().unwrap();
        assert_eq!(listing.images, vec!["a.gif", "b.png"]);
        assert_eq!(listing.documents, vec!["problem.tex"]);

        let report = manager.ingest_inbox(true).await.unwrap();
        assert_eq!(report.len(), 3);

        let titles: Vec<String> = {
            let mut titles = Vec::new();
            for (id, _) in &report.images {
                let job = manager.store().get(id).await.unwrap().unwrap();
                titles.push(job.title.unwrap());
            }
            titles
        };
        assert_eq!(titles, vec!["a", "b"]);

        let listing = manager.list_inbox().unwrap();
        assert!(listing.images.is_empty());
        assert!(listing.documents.is_empty());
        assert!(images.join("skip.txt").exists());
    }

    #[tokio::test]
    async fn test_ingest_inbox_keeps_sources_without_delete() {
        let (_temp_dir, manager) = setup().await;
        write_file(&manager.inbox_dir(SourceType::Image), "a.png");

        let report = manager.ingest_inbox(false).await.unwrap();
        assert_eq!(report.images.len(), 1);
        assert_eq!(manager.list_inbox().unwrap().images, vec!["a.png"]);
    }

    #[tokio::test]
    async fn test_ingest_folder() {
        let (temp_dir, manager) = setup().await;
        let external = temp_dir.path().join("external");
        write_file(&external, "one.tex");
        write_file(&external, "two.png");

        let created = manager
            .ingest_folder(&external, SourceType::Document, false)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);

        let not_dir = manager
            .ingest_folder(&external.join("one.tex"), SourceType::Document, false)
            .await;
        assert!(matches!(
            not_dir,
            Err(PostkeeperError::Artifact(ArtifactError::NotADirectory(_)))
        ));
    }

    #[tokio::test]
    async fn test_transition_renames_then_persists() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, draft_folder) = manager.create_from_image(&source, None).await.unwrap();

        let ready_folder = manager.promote(&id).await.unwrap().unwrap();

        assert!(!draft_folder.exists());
        assert!(ready_folder.join("source.png").is_file());
        let name = FolderName::from_path(&ready_folder).unwrap();
        assert_eq!(name.status, JobStatus::Ready);
        assert_eq!(name.date, FolderName::from_path(&draft_folder).unwrap().date);

        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.folder_path, ready_folder);
    }

    #[tokio::test]
    async fn test_transition_unknown_job() {
        let (_temp_dir, manager) = setup().await;
        assert!(manager.transition("zzzzzz", JobStatus::Ready).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_missing_folder_leaves_store_untouched() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, folder) = manager.create_from_image(&source, None).await.unwrap();
        fs::remove_dir_all(&folder).unwrap();

        let result = manager.transition(&id, JobStatus::Ready).await;
        assert!(matches!(
            result,
            Err(PostkeeperError::Artifact(ArtifactError::FolderNotFound(_)))
        ));

        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Draft);
        assert_eq!(job.folder_path, folder);
    }

    #[tokio::test]
    async fn test_transition_unparseable_folder_name() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, folder) = manager.create_from_image(&source, None).await.unwrap();

        let odd = manager.base_path().join("holiday photos");
        fs::rename(&folder, &odd).unwrap();
        manager.store().update_folder_path(&id, &odd).await.unwrap();

        let result = manager.transition(&id, JobStatus::Ready).await;
        assert!(matches!(
            result,
            Err(PostkeeperError::Artifact(ArtifactError::UnparseableFolderName(_)))
        ));
        assert!(odd.is_dir());
        assert_eq!(
            manager.store().get(&id).await.unwrap().unwrap().status,
            JobStatus::Draft
        );
    }

    #[tokio::test]
    async fn test_posted_is_terminal() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, _) = manager.create_from_image(&source, None).await.unwrap();
        manager.promote(&id).await.unwrap();

        let mut ids = PostIds::new();
        ids.insert("facebook".to_string(), "fb-1".to_string());
        assert!(manager.store().mark_posting(&id).await.unwrap());
        assert!(manager.store().mark_posted(&id, &ids).await.unwrap());
        let posted_folder = manager.transition(&id, JobStatus::Posted).await.unwrap().unwrap();
        let before = manager.store().get(&id).await.unwrap().unwrap();

        for target in [JobStatus::Ready, JobStatus::Draft, JobStatus::Failed] {
            let result = manager.transition(&id, target).await;
            assert!(matches!(result, Err(PostkeeperError::InvalidInput(_))));
        }

        assert!(posted_folder.is_dir());
        assert_eq!(manager.store().get(&id).await.unwrap().unwrap(), before);
        assert!(!manager.schedule(&id, 1_749_513_600).await.unwrap());
    }

    #[tokio::test]
    async fn test_posting_job_cannot_be_moved() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, _) = manager.create_from_image(&source, None).await.unwrap();
        let ready_folder = manager.promote(&id).await.unwrap().unwrap();
        assert!(manager.store().mark_posting(&id).await.unwrap());

        let result = manager.transition(&id, JobStatus::Draft).await;
        assert!(matches!(result, Err(PostkeeperError::InvalidInput(_))));

        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Posting);
        assert_eq!(job.folder_path, ready_folder);
        assert!(ready_folder.is_dir());
    }

    #[tokio::test]
    async fn test_schedule_only_ready_and_retry_keeps_schedule_clear() {
        let (temp_dir, manager) = setup().await;
        let first = write_file(temp_dir.path(), "first.png");
        let second = write_file(temp_dir.path(), "second.png");
        let (ready_id, _) = manager.create_from_image(&first, None).await.unwrap();
        let (draft_id, _) = manager.create_from_image(&second, None).await.unwrap();

        manager.promote(&ready_id).await.unwrap();
        assert!(manager.schedule(&ready_id, 1_749_513_600).await.unwrap());
        assert!(!manager.schedule(&draft_id, 1_749_513_600).await.unwrap());
        assert!(manager
            .store()
            .get(&draft_id)
            .await
            .unwrap()
            .unwrap()
            .scheduled_for
            .is_none());

        // A ready job cannot be retried
        assert!(!manager.retry(&ready_id).await.unwrap());
        assert!(manager.unschedule(&ready_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_follows_renamed_folder() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, folder) = manager.create_from_image(&source, None).await.unwrap();

        // Simulate a crash after the rename but before the store update
        let name = FolderName::from_path(&folder).unwrap().with_status(JobStatus::Ready);
        let renamed = manager.base_path().join(name.to_string());
        fs::rename(&folder, &renamed).unwrap();

        let reconciled = manager.reconcile(&id).await.unwrap().unwrap();
        assert_eq!(reconciled, renamed);

        let job = manager.store().get(&id).await.unwrap().unwrap();
        assert_eq!(job.folder_path, renamed);
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(
            manager.store().find_by_folder(&renamed).await.unwrap().unwrap().id,
            id
        );
    }

    #[tokio::test]
    async fn test_reconcile_without_folder() {
        let (temp_dir, manager) = setup().await;
        let source = write_file(temp_dir.path(), "photo.png");
        let (id, folder) = manager.create_from_image(&source, None).await.unwrap();

        assert_eq!(manager.reconcile(&id).await.unwrap(), Some(folder.clone()));

        fs::remove_dir_all(&folder).unwrap();
        assert!(manager.reconcile(&id).await.unwrap().is_none());
        assert!(manager.reconcile("zzzzzz").await.unwrap().is_none());
    }
}
