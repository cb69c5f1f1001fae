use super::{validate_name, Drive};
use crate::error::Result;
use crate::storage::models::{FileRecord, FolderRecord, Patch};

/// Direct, active children of a folder (or of the root).
#[derive(Debug)]
pub struct FolderContents {
    /// `None` when listing the root
    pub folder: Option<FolderRecord>,
    pub path: String,
    pub files: Vec<FileRecord>,
    pub subfolders: Vec<FolderRecord>,
}

impl Drive {
    pub fn create_folder(
        &self,
        user: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<FolderRecord> {
        let name = validate_name(name)?;
        let folder = FolderRecord::new(name, user, parent);
        self.db.insert_folder(&folder)?;

        tracing::debug!(folder_id = %folder.id, owner = %user, "Created folder");
        Ok(folder)
    }

    /// An active folder and its `/`-joined path.
    pub fn get_folder(&self, user: &str, id: &str) -> Result<(FolderRecord, String)> {
        let folder = self.active_folder(user, id)?;
        let path = self.db.folder_path(&folder.id)?;
        Ok((folder, path))
    }

    pub fn list_folder(&self, user: &str, folder_id: Option<&str>) -> Result<FolderContents> {
        let (folder, path) = match folder_id {
            Some(id) => {
                let (folder, path) = self.get_folder(user, id)?;
                (Some(folder), path)
            }
            None => (None, String::new()),
        };

        let mut files = self.db.list_files(user, folder_id)?;
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let subfolders = self.db.list_folders(user, folder_id)?;

        Ok(FolderContents {
            folder,
            path,
            files,
            subfolders,
        })
    }

    /// Rename and/or move a folder.
    pub fn update_folder(
        &self,
        user: &str,
        id: &str,
        name: Option<&str>,
        parent: Patch<String>,
    ) -> Result<FolderRecord> {
        self.owned_folder(user, id)?;
        let name = name.map(validate_name).transpose()?;
        let folder = self.db.update_folder(id, name, parent.as_deref())?;

        tracing::debug!(folder_id = %id, owner = %user, "Updated folder");
        Ok(folder)
    }

    /// Trash a folder with everything beneath it. Idempotent.
    pub fn delete_folder(&self, user: &str, id: &str) -> Result<()> {
        self.owned_folder(user, id)?;
        if self.db.soft_delete_folder(id)? {
            self.settle_usage(user);
            tracing::debug!(folder_id = %id, owner = %user, "Trashed folder");
        }
        Ok(())
    }

    pub fn restore_folder(&self, user: &str, id: &str) -> Result<FolderRecord> {
        let folder = self.db.restore_folder(id, user)?;
        self.settle_usage(user);
        tracing::debug!(folder_id = %id, owner = %user, "Restored folder");
        Ok(folder)
    }

    /// Permanently delete a trashed folder and its subtree. Returns how many
    /// files were removed.
    pub async fn purge_folder(&self, user: &str, id: &str) -> Result<usize> {
        let files = self.db.purge_folder(id, user)?;
        self.discard_blobs(&files).await;
        self.settle_usage(user);

        tracing::debug!(folder_id = %id, owner = %user, files = files.len(), "Purged folder");
        Ok(files.len())
    }

    pub fn trashed_folders(&self, user: &str) -> Result<Vec<FolderRecord>> {
        Ok(self.db.trashed_folders(user)?)
    }
}
