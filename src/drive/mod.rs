//! The storage-accounting and sharing core.
//!
//! [`Drive`] composes the catalog, the quota ledger, the share registry and the
//! blob store into the operations the HTTP layer exposes. Every operation takes
//! the requesting user's id explicitly, so the whole surface can be exercised
//! without an HTTP harness.

mod files;
mod folders;
mod quota;
mod sharing;

pub use folders::FolderContents;
pub use quota::StorageInfo;
pub use sharing::ShareLink;

use std::sync::Arc;

use crate::access::{self, Operation};
use crate::blob_store::{BlobStore, BlobStream};
use crate::error::{DriveError, Result};
use crate::storage::models::{FileRecord, FolderRecord, UserStorage};
use crate::storage::{Database, PurgeStats};

const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct DriveSettings {
    /// Quota ceiling given to users on first use
    pub default_total_space: u64,
    /// Public base URL that share links are built from
    pub share_base_url: String,
}

/// File metadata plus its content stream.
pub struct Download {
    pub file: FileRecord,
    pub stream: BlobStream,
}

#[derive(Clone)]
pub struct Drive {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    settings: Arc<DriveSettings>,
}

impl Drive {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>, settings: DriveSettings) -> Self {
        Self {
            db,
            blobs,
            settings: Arc::new(settings),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Authoritative resync of the user's `used_space`.
    pub fn recompute(&self, user: &str) -> Result<UserStorage> {
        Ok(self
            .db
            .recompute_usage(user, self.settings.default_total_space)?)
    }

    /// Recompute after a mutation that has already committed. Failures are
    /// logged only; the next recompute repairs the cached figure.
    fn settle_usage(&self, user: &str) {
        if let Err(e) = self.recompute(user) {
            tracing::warn!(user = %user, error = %e, "Usage recompute failed after commit");
        }
    }

    /// Load a file and enforce `op` for `user`. Trashed files are only
    /// reachable when `include_trashed` is set, and then only by their owner.
    fn authorized_file(
        &self,
        user: Option<&str>,
        id: &str,
        op: Operation,
        include_trashed: bool,
    ) -> Result<FileRecord> {
        let file = self.db.get_file(id)?.ok_or(DriveError::NotFound("File"))?;
        if file.is_deleted() && (!include_trashed || user != Some(file.owner.as_str())) {
            return Err(DriveError::NotFound("File"));
        }
        access::check(user, &file, op)?;
        Ok(file)
    }

    /// A folder owned by `user`, in any lifecycle state.
    fn owned_folder(&self, user: &str, id: &str) -> Result<FolderRecord> {
        match self.db.get_folder(id)? {
            Some(folder) if folder.owner == user => Ok(folder),
            _ => Err(DriveError::NotFound("Folder")),
        }
    }

    /// An active folder owned by `user`.
    fn active_folder(&self, user: &str, id: &str) -> Result<FolderRecord> {
        let folder = self.owned_folder(user, id)?;
        if folder.is_deleted() {
            return Err(DriveError::NotFound("Folder"));
        }
        Ok(folder)
    }

    /// Wipe every user's catalog, ledger and blobs. Test mode only.
    pub async fn purge_all(&self) -> Result<PurgeStats> {
        let stats = self.db.purge_all()?;
        for key in &stats.blob_keys {
            if let Err(e) = self.blobs.delete(key).await {
                tracing::warn!(blob_key = %key, error = %e, "Failed to delete blob during purge");
            }
        }
        Ok(stats)
    }

    /// Delete blobs whose metadata is already gone. Failures only leave orphans.
    async fn discard_blobs(&self, files: &[FileRecord]) {
        for file in files {
            if let Err(e) = self.blobs.delete(&file.blob_key).await {
                tracing::warn!(
                    file_id = %file.id,
                    blob_key = %file.blob_key,
                    error = %e,
                    "Failed to delete blob; leaving orphan"
                );
            }
        }
    }
}

/// Validate a user supplied file or folder name and return it trimmed.
pub(crate) fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DriveError::InvalidInput("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DriveError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if name == "." || name == ".." || name.contains('/') || name.chars().any(char::is_control) {
        return Err(DriveError::InvalidInput(format!("invalid name '{name}'")));
    }
    Ok(name)
}
