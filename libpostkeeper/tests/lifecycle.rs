//! End-to-end job lifecycle against a file-backed store

use libpostkeeper::content::{MEDIA_DIR, POST_CONFIG_FILE};
use libpostkeeper::destinations::mock::MockDestination;
use libpostkeeper::destinations::DestinationRegistry;
use libpostkeeper::folder::FolderName;
use libpostkeeper::scheduling::parse_schedule;
use libpostkeeper::{JobManager, JobStatus, Scheduler, Store};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

async fn open(temp_dir: &TempDir) -> JobManager {
    let db_path = temp_dir.path().join("posts.db");
    let store = Store::new(db_path.to_str().unwrap()).await.unwrap();
    JobManager::new(temp_dir.path().join("social_posts"), store).unwrap()
}

fn write_post_content(folder: &Path) {
    fs::write(
        folder.join(POST_CONFIG_FILE),
        "title: Sunset\ncaptions:\n  facebook: Look at this\n  instagram: '#sunset'\n",
    )
    .unwrap();
    let media = folder.join(MEDIA_DIR);
    fs::create_dir_all(&media).unwrap();
    fs::write(media.join("02.jpg"), b"jpg").unwrap();
    fs::write(media.join("01.png"), b"png").unwrap();
}

#[tokio::test]
async fn test_draft_to_posted_with_partial_failure() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open(&temp_dir).await;

    let photo = temp_dir.path().join("photo.png");
    fs::write(&photo, b"png").unwrap();

    let (id, draft_folder) = manager.create_from_image(&photo, None).await.unwrap();
    let draft_name = FolderName::from_path(&draft_folder).unwrap();
    assert_eq!(draft_name.id, id);
    assert_eq!(draft_name.status, JobStatus::Draft);
    assert!(draft_folder.join("source.png").is_file());

    let job = manager.store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Draft);
    assert_eq!(job.title.as_deref(), Some("photo"));

    // Drafts cannot be scheduled
    assert!(!manager.schedule(&id, 1_749_513_600).await.unwrap());

    let ready_folder = manager.promote(&id).await.unwrap().unwrap();
    assert!(!draft_folder.exists());
    assert!(ready_folder.to_string_lossy().ends_with("_ready"));
    write_post_content(&ready_folder);

    let when = parse_schedule("2025-06-10", chrono::Utc::now()).unwrap();
    assert!(manager.schedule(&id, when.timestamp()).await.unwrap());

    let facebook = MockDestination::with_id("facebook", "fb-1");
    let instagram = MockDestination::post_failure("instagram", "500");
    let mut registry = DestinationRegistry::new();
    registry.register(Box::new(facebook.clone())).unwrap();
    registry.register(Box::new(instagram.clone())).unwrap();
    let scheduler = Scheduler::new(manager, registry);

    // Not yet due the second before
    let early = scheduler.run_once_at(when.timestamp() - 1).await.unwrap();
    assert_eq!(early.processed(), 0);

    let report = scheduler.run_once_at(when.timestamp() + 1).await.unwrap();
    assert_eq!(report.posted, vec![id.clone()]);

    let calls = facebook.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].caption, "Look at this");
    let media: Vec<_> = calls[0]
        .media
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(media, vec!["01.png", "02.jpg"]);
    assert_eq!(instagram.calls()[0].caption, "#sunset");

    let job = scheduler.manager().store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Posted);
    assert_eq!(job.post_ids.len(), 1);
    assert_eq!(job.post_ids["facebook"], "fb-1");
    assert!(job.posted_at.is_some());
    assert!(job.scheduled_for.is_none());
    assert!(job.folder_path.to_string_lossy().ends_with("_posted"));
    assert!(job.folder_path.join(POST_CONFIG_FILE).is_file());

    // A second cycle has nothing left to do
    let again = scheduler.run_once_at(when.timestamp() + 60).await.unwrap();
    assert_eq!(again.processed(), 0);
    assert_eq!(facebook.call_count(), 1);
}

#[tokio::test]
async fn test_failed_job_retry_requires_new_schedule() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open(&temp_dir).await;

    let photo = temp_dir.path().join("photo.png");
    fs::write(&photo, b"png").unwrap();
    let (id, _) = manager.create_from_image(&photo, Some("Retry me")).await.unwrap();
    let folder = manager.promote(&id).await.unwrap().unwrap();
    write_post_content(&folder);
    assert!(manager.schedule(&id, 1_000).await.unwrap());

    let mut registry = DestinationRegistry::new();
    registry
        .register(Box::new(MockDestination::post_failure("facebook", "500")))
        .unwrap();
    let scheduler = Scheduler::new(manager, registry);

    let report = scheduler.run_once_at(2_000).await.unwrap();
    assert_eq!(report.failed, vec![id.clone()]);

    let manager = scheduler.manager();
    let job = manager.store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some("facebook: Posting failed: 500"));
    assert!(job.folder_path.to_string_lossy().ends_with("_ready"));

    assert!(manager.retry(&id).await.unwrap());
    let job = manager.store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Ready);
    assert!(job.last_error.is_none());
    assert!(job.scheduled_for.is_none());

    // Ready but unscheduled is never due
    assert!(manager.store().due(i64::MAX).await.unwrap().is_empty());

    // Retry only applies to failed jobs
    assert!(!manager.retry(&id).await.unwrap());
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let photo = temp_dir.path().join("photo.png");
    fs::write(&photo, b"png").unwrap();

    let id = {
        let manager = open(&temp_dir).await;
        let (id, _) = manager.create_from_image(&photo, None).await.unwrap();
        manager.promote(&id).await.unwrap();
        manager.schedule(&id, 42).await.unwrap();
        id
    };

    let manager = open(&temp_dir).await;
    let job = manager.store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Ready);
    assert_eq!(job.scheduled_for, Some(42));
    assert!(job.folder_path.is_dir());
}

#[tokio::test]
async fn test_reconcile_after_manual_rename() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open(&temp_dir).await;

    let photo = temp_dir.path().join("photo.png");
    fs::write(&photo, b"png").unwrap();
    let (id, folder) = manager.create_from_image(&photo, None).await.unwrap();

    // Operator renames the folder by hand
    let renamed = FolderName::from_path(&folder)
        .unwrap()
        .with_status(JobStatus::Ready);
    let renamed_path = folder.parent().unwrap().join(renamed.to_string());
    fs::rename(&folder, &renamed_path).unwrap();

    let found = manager.reconcile(&id).await.unwrap();
    assert_eq!(found, Some(renamed_path.clone()));

    let job = manager.store().get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Ready);
    assert_eq!(job.folder_path, renamed_path);
}
