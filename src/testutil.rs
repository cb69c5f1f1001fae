//! Shared test helpers for in-crate router tests.

use std::sync::Arc;

use crate::blob_store::{BlobStore, LocalStore};
use crate::config::{Config, NodeConfig, QuotaConfig, StorageConfig};
use crate::drive::{Drive, DriveSettings};
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and local blob store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
        },
        quota: QuotaConfig::default(),
        public_url: "http://drive.test".to_string(),
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let blobs: Arc<dyn BlobStore> =
        Arc::new(LocalStore::new(&files_dir).expect("Failed to create test blob store"));
    let drive = Drive::new(
        db,
        blobs,
        DriveSettings {
            default_total_space: config.quota.default_total_space,
            share_base_url: config.public_url.clone(),
        },
    );

    Arc::new(AppState { config, drive })
}
