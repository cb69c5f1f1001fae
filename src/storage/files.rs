use chrono::Utc;

use super::db::{
    index_insert, index_remove, load_indexed, load_record, store_record, Database,
    DatabaseError, RecordTable,
};
use super::models::{FileRecord, FolderRecord};
use super::tables::*;
use crate::error::{DriveError, Result};

impl Database {
    // ========================================================================
    // File reads
    // ========================================================================

    /// Get a file by its UUID, whatever its lifecycle state
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        load_record(&table, id)
    }

    /// All files owned by `owner`, active and trashed
    pub fn files_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(OWNER_FILES)?;
        let files = read_txn.open_table(FILES)?;
        load_indexed(&index, &files, owner)
    }

    /// Active files of `owner` directly inside `folder` (`None` = root)
    pub fn list_files(
        &self,
        owner: &str,
        folder: Option<&str>,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        Ok(self
            .files_by_owner(owner)?
            .into_iter()
            .filter(|f| !f.is_deleted() && f.folder.as_deref() == folder)
            .collect())
    }

    /// Trashed files of `owner`, most recently deleted first
    pub fn trashed_files(&self, owner: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut files: Vec<FileRecord> = self
            .files_by_owner(owner)?
            .into_iter()
            .filter(FileRecord::is_deleted)
            .collect();
        files.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(files)
    }

    // ========================================================================
    // File lifecycle
    // ========================================================================

    /// Register a new file. The blob must already exist.
    pub fn insert_file(&self, file: &FileRecord) -> Result<()> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(file.share_token.is_none(), "new files are never shared");

        let write_txn = self.begin_write()?;
        {
            let folders = write_txn.open_table(FOLDERS)?;
            if let Some(folder_id) = file.folder.as_deref() {
                require_active_folder(&folders, folder_id, &file.owner)?;
            }

            let mut table = write_txn.open_table(FILES)?;
            store_record(&mut table, &file.id, file)?;

            let mut owner_index = write_txn.open_table(OWNER_FILES)?;
            index_insert(&mut owner_index, &file.owner, &file.id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Rename and/or move an active file.
    pub fn update_file(
        &self,
        id: &str,
        name: Option<&str>,
        folder: Option<Option<&str>>,
    ) -> Result<FileRecord> {
        let write_txn = self.begin_write()?;
        let file = {
            let mut table = write_txn.open_table(FILES)?;
            let mut file: FileRecord =
                load_record(&table, id)?.ok_or(DriveError::NotFound("File"))?;
            if file.is_deleted() {
                return Err(DriveError::InvalidState(
                    "Trashed files cannot be modified".to_string(),
                ));
            }

            if let Some(name) = name {
                file.name = name.to_string();
            }
            if let Some(target) = folder {
                if let Some(folder_id) = target {
                    let folders = write_txn.open_table(FOLDERS)?;
                    require_active_folder(&folders, folder_id, &file.owner)?;
                }
                file.folder = target.map(str::to_string);
            }
            file.updated_at = Utc::now();
            store_record(&mut table, id, &file)?;
            file
        };
        write_txn.commit()?;
        Ok(file)
    }

    /// Move an active file to the trash. Returns `false` if it was already there.
    pub fn soft_delete_file(&self, id: &str) -> Result<bool> {
        let write_txn = self.begin_write()?;
        let changed = {
            let mut table = write_txn.open_table(FILES)?;
            let mut file: FileRecord =
                load_record(&table, id)?.ok_or(DriveError::NotFound("File"))?;
            if file.is_deleted() {
                false
            } else {
                let now = Utc::now();
                file.deleted_at = Some(now);
                file.updated_at = now;
                store_record(&mut table, id, &file)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(changed)
    }

    /// Bring a trashed file back. Its folder, if any, must be active.
    pub fn restore_file(&self, id: &str, owner: &str) -> Result<FileRecord> {
        let write_txn = self.begin_write()?;
        let file = {
            let mut table = write_txn.open_table(FILES)?;
            let mut file = owned_file(&table, id, owner)?;
            if !file.is_deleted() {
                return Err(DriveError::InvalidState("File is not in the trash".to_string()));
            }
            if let Some(folder_id) = file.folder.as_deref() {
                let folders = write_txn.open_table(FOLDERS)?;
                require_active_folder(&folders, folder_id, owner)?;
            }

            file.deleted_at = None;
            file.updated_at = Utc::now();
            store_record(&mut table, id, &file)?;
            file
        };
        write_txn.commit()?;
        Ok(file)
    }

    /// Permanently remove a trashed file's metadata and share token.
    /// Returns the removed record so the caller can delete its blob.
    pub fn purge_file(&self, id: &str, owner: &str) -> Result<FileRecord> {
        let write_txn = self.begin_write()?;
        let file = {
            let table = write_txn.open_table(FILES)?;
            let file = owned_file(&table, id, owner)?;
            if !file.is_deleted() {
                return Err(DriveError::InvalidState(
                    "Only trashed files can be permanently deleted".to_string(),
                ));
            }
            file
        };
        remove_file_rows(&write_txn, &file)?;
        write_txn.commit()?;
        Ok(file)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn owned_file(table: &RecordTable<'_>, id: &str, owner: &str) -> Result<FileRecord> {
    match load_record::<FileRecord>(table, id)? {
        Some(file) if file.owner == owner => Ok(file),
        _ => Err(DriveError::NotFound("File")),
    }
}

/// A folder that may receive children: exists, belongs to `owner`, not trashed.
pub(crate) fn require_active_folder(
    folders: &impl redb::ReadableTable<&'static str, &'static [u8]>,
    folder_id: &str,
    owner: &str,
) -> Result<FolderRecord> {
    match load_record::<FolderRecord>(folders, folder_id)? {
        Some(folder) if folder.owner == owner => {
            if folder.is_deleted() {
                Err(DriveError::InvalidHierarchy(format!(
                    "Folder '{}' is in the trash",
                    folder.name
                )))
            } else {
                Ok(folder)
            }
        }
        _ => Err(DriveError::NotFound("Folder")),
    }
}

/// Remove a file row, its owner index entry and its share token (retiring it).
pub(crate) fn remove_file_rows(
    write_txn: &redb::WriteTransaction,
    file: &FileRecord,
) -> Result<(), DatabaseError> {
    {
        let mut table = write_txn.open_table(FILES)?;
        table.remove(file.id.as_str())?;
    }
    {
        let mut owner_index = write_txn.open_table(OWNER_FILES)?;
        index_remove(&mut owner_index, &file.owner, &file.id)?;
    }
    if let Some(token) = file.share_token.as_deref() {
        let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
        tokens.remove(token)?;
        let mut retired = write_txn.open_table(RETIRED_SHARE_TOKENS)?;
        retired.insert(token, Utc::now().timestamp())?;
    }
    Ok(())
}
