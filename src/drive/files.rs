use bytes::Bytes;

use super::{validate_name, Download, Drive};
use crate::access::Operation;
use crate::blob_store::BlobStoreError;
use crate::error::{DriveError, Result};
use crate::storage::models::{FileRecord, Patch};

impl Drive {
    /// Store an uploaded file.
    ///
    /// Usage is recomputed before the admission check so the decision is made
    /// against fresh numbers. Two concurrent uploads can still both be admitted;
    /// the recompute that follows each upload reflects the true total.
    pub async fn upload_file(
        &self,
        user: &str,
        folder: Option<&str>,
        data: Bytes,
        filename: &str,
    ) -> Result<FileRecord> {
        let name = validate_name(filename)?;
        if let Some(folder_id) = folder {
            let target = self.owned_folder(user, folder_id)?;
            if target.is_deleted() {
                return Err(DriveError::InvalidHierarchy(format!(
                    "Folder '{}' is in the trash",
                    target.name
                )));
            }
        }

        let byte_size = data.len() as u64;
        let storage = self.recompute(user)?;
        if !storage.has_space_for(byte_size) {
            return Err(DriveError::QuotaExceeded {
                available: storage.available(),
            });
        }

        // Bytes first, metadata second: a crash in between leaves an orphan
        // blob, never a record pointing at nothing.
        let blob_key = self.blobs.put(data, name).await?;
        let file = FileRecord::new(name, user, folder, &blob_key, byte_size);
        if let Err(e) = self.db.insert_file(&file) {
            self.discard_blobs(std::slice::from_ref(&file)).await;
            return Err(e);
        }
        self.settle_usage(user);

        tracing::debug!(file_id = %file.id, owner = %user, bytes = byte_size, "Uploaded file");
        Ok(file)
    }

    /// Metadata of an active file the user owns or that is shared.
    pub fn get_file(&self, user: &str, id: &str) -> Result<FileRecord> {
        self.authorized_file(Some(user), id, Operation::Read, false)
    }

    pub fn update_file(
        &self,
        user: &str,
        id: &str,
        name: Option<&str>,
        folder: Patch<String>,
    ) -> Result<FileRecord> {
        self.authorized_file(Some(user), id, Operation::Write, false)?;
        let name = name.map(validate_name).transpose()?;
        let file = self.db.update_file(id, name, folder.as_deref())?;
        tracing::debug!(file_id = %id, owner = %user, "Updated file");
        Ok(file)
    }

    /// Move a file to the trash. Deleting a trashed file is a no-op.
    pub fn delete_file(&self, user: &str, id: &str) -> Result<()> {
        self.authorized_file(Some(user), id, Operation::Write, true)?;
        if self.db.soft_delete_file(id)? {
            self.settle_usage(user);
            tracing::debug!(file_id = %id, owner = %user, "Trashed file");
        }
        Ok(())
    }

    pub async fn download_file(&self, user: &str, id: &str) -> Result<Download> {
        let file = self.authorized_file(Some(user), id, Operation::Read, false)?;
        self.open(file).await
    }

    /// Trashed files, most recently deleted first.
    pub fn trash(&self, user: &str) -> Result<Vec<FileRecord>> {
        Ok(self.db.trashed_files(user)?)
    }

    pub fn restore(&self, user: &str, id: &str) -> Result<FileRecord> {
        let file = self.db.restore_file(id, user)?;
        self.settle_usage(user);
        tracing::debug!(file_id = %id, owner = %user, "Restored file");
        Ok(file)
    }

    /// Permanently delete a trashed file: metadata first, then the blob.
    pub async fn purge(&self, user: &str, id: &str) -> Result<()> {
        let file = self.db.purge_file(id, user)?;
        self.discard_blobs(std::slice::from_ref(&file)).await;
        self.settle_usage(user);
        tracing::debug!(file_id = %id, owner = %user, "Purged file");
        Ok(())
    }

    /// Case-insensitive substring match on name or MIME type over the user's
    /// active files. An empty query matches nothing.
    pub fn search_files(&self, user: &str, query: &str) -> Result<Vec<FileRecord>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut files: Vec<FileRecord> = self
            .db
            .files_by_owner(user)?
            .into_iter()
            .filter(|f| !f.is_deleted())
            .filter(|f| {
                f.name.to_lowercase().contains(&needle)
                    || f.mime_type.to_lowercase().contains(&needle)
            })
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    /// The user's newest active files.
    pub fn recent_files(&self, user: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let mut files: Vec<FileRecord> = self
            .db
            .files_by_owner(user)?
            .into_iter()
            .filter(|f| !f.is_deleted())
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        files.truncate(limit);
        Ok(files)
    }

    pub(super) async fn open(&self, file: FileRecord) -> Result<Download> {
        match self.blobs.get(&file.blob_key).await {
            Ok(stream) => Ok(Download { file, stream }),
            Err(BlobStoreError::NotFound(_)) => {
                tracing::error!(
                    file_id = %file.id,
                    blob_key = %file.blob_key,
                    "Catalog references a missing blob"
                );
                Err(DriveError::NotFound("File content"))
            }
            Err(e) => Err(e.into()),
        }
    }
}
