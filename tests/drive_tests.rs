use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use opendrive::blob_store::{BlobStore, BlobStoreError, BlobStream, LocalStore};
use opendrive::drive::{Download, Drive, DriveSettings};
use opendrive::error::DriveError;
use opendrive::storage::models::{FileType, Patch};
use opendrive::storage::{Database, FILES, OWNER_FILES};

fn test_drive(default_total_space: u64) -> (tempfile::TempDir, Drive) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalStore::new(dir.path().join("files")).unwrap());
    (dir, drive_with(db, blobs, default_total_space))
}

fn drive_with(db: Database, blobs: Arc<dyn BlobStore>, default_total_space: u64) -> Drive {
    Drive::new(
        db,
        blobs,
        DriveSettings {
            default_total_space,
            share_base_url: "https://drive.example.com/".to_string(),
        },
    )
}

fn bytes(n: usize) -> Bytes {
    Bytes::from(vec![b'x'; n])
}

async fn read_all(download: Download) -> Vec<u8> {
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    chunks.concat()
}

// ============================================================================
// Quota
// ============================================================================

#[tokio::test]
async fn test_upload_rejected_once_quota_is_spent() {
    let (_dir, drive) = test_drive(1000);

    drive.upload_file("alice", None, bytes(600), "a.bin").await.unwrap();
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 600);
    assert!(!drive.admit("alice", 500).unwrap());

    let result = drive.upload_file("alice", None, bytes(500), "b.bin").await;
    assert!(matches!(
        result,
        Err(DriveError::QuotaExceeded { available: 400 })
    ));

    // Nothing was recorded for the rejected upload
    assert_eq!(drive.db().files_by_owner("alice").unwrap().len(), 1);
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 600);

    // Exactly filling the quota is allowed
    drive.upload_file("alice", None, bytes(400), "c.bin").await.unwrap();
    let info = drive.storage_info("alice").unwrap();
    assert_eq!(info.storage.used_space, 1000);
    assert_eq!(info.percent, 100.0);
}

#[tokio::test]
async fn test_usage_tracks_every_mutation() {
    let (_dir, drive) = test_drive(10_000);

    let a = drive.upload_file("alice", None, bytes(100), "a.bin").await.unwrap();
    let b = drive.upload_file("alice", None, bytes(200), "b.bin").await.unwrap();
    assert_eq!(drive.recompute("alice").unwrap().used_space, 300);

    drive.delete_file("alice", &a.id).unwrap();
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 200);

    drive.restore("alice", &a.id).unwrap();
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 300);

    drive.delete_file("alice", &b.id).unwrap();
    drive.purge("alice", &b.id).await.unwrap();
    let info = drive.storage_info("alice").unwrap();
    assert_eq!(info.storage.used_space, 100);
    assert_eq!(info.file_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_leave_usage_matching_catalog() {
    let (_dir, drive) = test_drive(1000);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let drive = drive.clone();
            tokio::spawn(async move {
                drive
                    .upload_file("alice", None, bytes(300), &format!("part-{i}.bin"))
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(DriveError::QuotaExceeded { .. }) => {}
            Err(e) => panic!("unexpected upload error: {e}"),
        }
    }
    assert!(admitted >= 3);

    let stored: u64 = drive
        .db()
        .files_by_owner("alice")
        .unwrap()
        .iter()
        .filter(|f| !f.is_deleted())
        .map(|f| f.byte_size)
        .sum();
    assert_eq!(stored, 300 * admitted as u64);

    // The cached figure left behind by the last upload is already exact
    let cached = drive.db().ensure_user_storage("alice", 1000).unwrap();
    assert_eq!(cached.used_space, stored);
    assert_eq!(drive.recompute("alice").unwrap().used_space, stored);
}

/// Blob store that corrupts the owner's catalog entries while a blob is
/// written, so the recompute following the metadata commit fails.
struct CorruptingStore {
    inner: LocalStore,
    db: Database,
}

#[async_trait]
impl BlobStore for CorruptingStore {
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String, BlobStoreError> {
        let write_txn = self.db.begin_write().unwrap();
        {
            let mut files = write_txn.open_table(FILES).unwrap();
            files.insert("garbage-id", b"\xc1".as_slice()).unwrap();
            let mut index = write_txn.open_table(OWNER_FILES).unwrap();
            let ids = rmp_serde::to_vec_named(&vec!["garbage-id".to_string()]).unwrap();
            index.insert("alice", ids.as_slice()).unwrap();
        }
        write_txn.commit().unwrap();
        self.inner.put(data, suggested_name).await
    }

    async fn get(&self, key: &str) -> Result<BlobStream, BlobStoreError> {
        self.inner.get(key).await
    }

    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError> {
        self.inner.read(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        self.inner.exists(key).await
    }
}

#[tokio::test]
async fn test_upload_succeeds_when_recompute_after_commit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(CorruptingStore {
        inner: LocalStore::new(dir.path().join("files")).unwrap(),
        db: db.clone(),
    });
    let drive = drive_with(db, blobs, 10_000);

    let file = drive
        .upload_file("alice", None, bytes(10), "a.bin")
        .await
        .unwrap();

    let stored = drive.db().get_file(&file.id).unwrap().unwrap();
    assert_eq!(stored.byte_size, 10);
    assert!(drive.blobs().exists(&file.blob_key).await.unwrap());
    // The ledger could not be refreshed
    assert!(drive.recompute("alice").is_err());
}

#[tokio::test]
async fn test_restore_may_exceed_quota() {
    let (_dir, drive) = test_drive(1000);

    let a = drive.upload_file("alice", None, bytes(600), "a.bin").await.unwrap();
    drive.delete_file("alice", &a.id).unwrap();
    drive.upload_file("alice", None, bytes(600), "b.bin").await.unwrap();

    drive.restore("alice", &a.id).unwrap();
    let info = drive.storage_info("alice").unwrap();
    assert_eq!(info.storage.used_space, 1200);
    assert!(info.percent > 100.0);
}

#[tokio::test]
async fn test_zero_quota_reports_zero_percent() {
    let (_dir, drive) = test_drive(1000);
    drive.set_quota("alice", 0).unwrap();

    let info = drive.storage_info("alice").unwrap();
    assert_eq!(info.percent, 0.0);
    assert!(matches!(
        drive.upload_file("alice", None, bytes(1), "a.bin").await,
        Err(DriveError::QuotaExceeded { .. })
    ));
}

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn test_upload_detects_mime_type_and_round_trips() {
    let (_dir, drive) = test_drive(10_000);

    let file = drive
        .upload_file("alice", None, Bytes::from("%PDF-1.4"), "Report.PDF")
        .await
        .unwrap();
    assert_eq!(file.mime_type, "application/pdf");
    assert_eq!(file.file_type, FileType::Document);
    assert_eq!(file.byte_size, 8);
    assert!(!file.is_shared());

    let download = drive.download_file("alice", &file.id).await.unwrap();
    assert_eq!(download.file.id, file.id);
    assert_eq!(read_all(download).await, b"%PDF-1.4");
}

#[tokio::test]
async fn test_other_users_see_not_found() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();

    assert!(matches!(
        drive.get_file("bob", &file.id),
        Err(DriveError::NotFound(_))
    ));
    assert!(matches!(
        drive.download_file("bob", &file.id).await,
        Err(DriveError::NotFound(_))
    ));
    assert!(matches!(
        drive.delete_file("bob", &file.id),
        Err(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_shared_file_is_readable_but_not_writable_by_others() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();
    drive.share_file("alice", &file.id).unwrap();

    assert_eq!(drive.get_file("bob", &file.id).unwrap().id, file.id);
    assert!(matches!(
        drive.update_file("bob", &file.id, Some("mine.txt"), Patch::Absent),
        Err(DriveError::Forbidden(_))
    ));
    assert!(matches!(
        drive.delete_file("bob", &file.id),
        Err(DriveError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_delete_file_is_idempotent() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();

    drive.delete_file("alice", &file.id).unwrap();
    drive.delete_file("alice", &file.id).unwrap();

    let trash = drive.trash("alice").unwrap();
    assert_eq!(trash.len(), 1);
    assert!(matches!(
        drive.get_file("alice", &file.id),
        Err(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_restore_returns_file_unchanged() {
    let (_dir, drive) = test_drive(10_000);
    let folder = drive.create_folder("alice", "Docs", None).unwrap();
    let file = drive
        .upload_file("alice", Some(&folder.id), bytes(42), "notes.txt")
        .await
        .unwrap();

    drive.delete_file("alice", &file.id).unwrap();
    let restored = drive.restore("alice", &file.id).unwrap();

    assert_eq!(restored.id, file.id);
    assert_eq!(restored.name, file.name);
    assert_eq!(restored.folder, file.folder);
    assert_eq!(restored.byte_size, file.byte_size);
    assert_eq!(restored.blob_key, file.blob_key);
    assert!(!restored.is_deleted());
}

#[tokio::test]
async fn test_purge_requires_trash_and_removes_blob() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();

    assert!(matches!(
        drive.purge("alice", &file.id).await,
        Err(DriveError::InvalidState(_))
    ));

    drive.delete_file("alice", &file.id).unwrap();
    drive.purge("alice", &file.id).await.unwrap();

    assert!(!drive.blobs().exists(&file.blob_key).await.unwrap());
    assert!(matches!(
        drive.restore("alice", &file.id),
        Err(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_upload_into_trashed_folder_is_rejected() {
    let (_dir, drive) = test_drive(10_000);
    let folder = drive.create_folder("alice", "Old", None).unwrap();
    drive.delete_folder("alice", &folder.id).unwrap();

    assert!(matches!(
        drive
            .upload_file("alice", Some(&folder.id), bytes(3), "a.txt")
            .await,
        Err(DriveError::InvalidHierarchy(_))
    ));
}

#[tokio::test]
async fn test_move_file_between_folders() {
    let (_dir, drive) = test_drive(10_000);
    let docs = drive.create_folder("alice", "Docs", None).unwrap();
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();

    let moved = drive
        .update_file(
            "alice",
            &file.id,
            Some("b.txt"),
            Patch::Value(docs.id.clone()),
        )
        .unwrap();
    assert_eq!(moved.name, "b.txt");
    assert_eq!(moved.folder.as_deref(), Some(docs.id.as_str()));

    let back = drive
        .update_file("alice", &file.id, None, Patch::Null)
        .unwrap();
    assert_eq!(back.folder, None);
    assert_eq!(back.name, "b.txt");
}

#[tokio::test]
async fn test_search_and_recent() {
    let (_dir, drive) = test_drive(10_000);
    drive.upload_file("alice", None, bytes(1), "Holiday.JPG").await.unwrap();
    drive.upload_file("alice", None, bytes(1), "budget.xlsx").await.unwrap();
    let last = drive.upload_file("alice", None, bytes(1), "notes.txt").await.unwrap();
    drive.upload_file("bob", None, bytes(1), "holiday-bob.jpg").await.unwrap();

    let by_name = drive.search_files("alice", "holiday").unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name, "Holiday.JPG");

    let by_mime = drive.search_files("alice", "IMAGE/").unwrap();
    assert_eq!(by_mime.len(), 1);

    assert!(drive.search_files("alice", "  ").unwrap().is_empty());

    let recent = drive.recent_files("alice", 1).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, last.id);
}

// ============================================================================
// Sharing
// ============================================================================

#[tokio::test]
async fn test_share_then_unshare() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive
        .upload_file("alice", None, Bytes::from("shared bytes"), "s.txt")
        .await
        .unwrap();

    let link = drive.share_file("alice", &file.id).unwrap();
    assert_eq!(
        link.url,
        format!("https://drive.example.com/shared/{}", link.token)
    );
    assert_eq!(drive.share_file("alice", &file.id).unwrap(), link);

    let shared = drive.fetch_shared(&link.token).unwrap();
    assert_eq!(shared.id, file.id);
    let download = drive.open_shared(&link.token).await.unwrap();
    assert_eq!(read_all(download).await, b"shared bytes");

    drive.unshare_file("alice", &file.id).unwrap();
    assert!(matches!(
        drive.fetch_shared(&link.token),
        Err(DriveError::NotFound(_))
    ));

    let again = drive.share_file("alice", &file.id).unwrap();
    assert_ne!(again.token, link.token);
    assert!(matches!(
        drive.fetch_shared(&link.token),
        Err(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_trashed_shared_file_does_not_resolve() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();
    let link = drive.share_file("alice", &file.id).unwrap();

    drive.delete_file("alice", &file.id).unwrap();
    assert!(matches!(
        drive.fetch_shared(&link.token),
        Err(DriveError::NotFound(_))
    ));

    // The token survives the trash round trip
    drive.restore("alice", &file.id).unwrap();
    assert_eq!(drive.fetch_shared(&link.token).unwrap().id, file.id);
}

#[tokio::test]
async fn test_only_owner_can_share() {
    let (_dir, drive) = test_drive(10_000);
    let file = drive.upload_file("alice", None, bytes(3), "a.txt").await.unwrap();

    assert!(matches!(
        drive.share_file("bob", &file.id),
        Err(DriveError::NotFound(_))
    ));
    drive.share_file("alice", &file.id).unwrap();
    assert!(matches!(
        drive.unshare_file("bob", &file.id),
        Err(DriveError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let (_dir, drive) = test_drive(10_000);
    assert!(matches!(
        drive.fetch_shared("no-such-token"),
        Err(DriveError::NotFound(_))
    ));
}

// ============================================================================
// Folders
// ============================================================================

#[tokio::test]
async fn test_folder_path_and_listing() {
    let (_dir, drive) = test_drive(10_000);
    let a = drive.create_folder("alice", "A", None).unwrap();
    let b = drive.create_folder("alice", "B", Some(&a.id)).unwrap();
    drive
        .upload_file("alice", Some(&b.id), bytes(5), "deep.txt")
        .await
        .unwrap();

    let (folder, path) = drive.get_folder("alice", &b.id).unwrap();
    assert_eq!(folder.id, b.id);
    assert_eq!(path, "A/B");

    let root = drive.list_folder("alice", None).unwrap();
    assert!(root.folder.is_none());
    assert_eq!(root.subfolders.len(), 1);
    assert!(root.files.is_empty());

    let inside = drive.list_folder("alice", Some(&b.id)).unwrap();
    assert_eq!(inside.path, "A/B");
    assert_eq!(inside.files.len(), 1);

    assert!(matches!(
        drive.list_folder("bob", Some(&b.id)),
        Err(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_folder_name_validation_and_conflict() {
    let (_dir, drive) = test_drive(10_000);
    assert!(matches!(
        drive.create_folder("alice", "  ", None),
        Err(DriveError::InvalidInput(_))
    ));

    drive.create_folder("alice", " Docs ", None).unwrap();
    assert!(matches!(
        drive.create_folder("alice", "Docs", None),
        Err(DriveError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_deleting_folder_trashes_its_files() {
    let (_dir, drive) = test_drive(10_000);
    let a = drive.create_folder("alice", "A", None).unwrap();
    let b = drive.create_folder("alice", "B", Some(&a.id)).unwrap();
    let file = drive
        .upload_file("alice", Some(&b.id), bytes(50), "deep.txt")
        .await
        .unwrap();

    drive.delete_folder("alice", &a.id).unwrap();
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 0);
    assert_eq!(drive.trash("alice").unwrap().len(), 1);
    assert_eq!(drive.trashed_folders("alice").unwrap().len(), 1);

    // A file cannot be restored into a trashed folder
    assert!(matches!(
        drive.restore("alice", &file.id),
        Err(DriveError::InvalidHierarchy(_))
    ));

    drive.restore_folder("alice", &a.id).unwrap();
    assert_eq!(drive.storage_info("alice").unwrap().storage.used_space, 50);
    assert_eq!(drive.get_file("alice", &file.id).unwrap().id, file.id);
}

#[tokio::test]
async fn test_purge_folder_deletes_blobs() {
    let (_dir, drive) = test_drive(10_000);
    let a = drive.create_folder("alice", "A", None).unwrap();
    let file = drive
        .upload_file("alice", Some(&a.id), bytes(50), "inside.txt")
        .await
        .unwrap();

    drive.delete_folder("alice", &a.id).unwrap();
    assert_eq!(drive.purge_folder("alice", &a.id).await.unwrap(), 1);

    assert!(!drive.blobs().exists(&file.blob_key).await.unwrap());
    assert!(drive.trash("alice").unwrap().is_empty());
    assert!(drive.trashed_folders("alice").unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_all_clears_blobs() {
    let (_dir, drive) = test_drive(10_000);
    let a = drive.upload_file("alice", None, bytes(5), "a.txt").await.unwrap();
    let b = drive.upload_file("bob", None, bytes(5), "b.txt").await.unwrap();

    let stats = drive.purge_all().await.unwrap();
    assert_eq!(stats.files, 2);
    assert!(!drive.blobs().exists(&a.blob_key).await.unwrap());
    assert!(!drive.blobs().exists(&b.blob_key).await.unwrap());
}
