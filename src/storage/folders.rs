use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use redb::ReadableTable;

use super::db::{
    index_insert, index_remove, load_indexed, load_record, store_record, Database,
    DatabaseError,
};
use super::files::{remove_file_rows, require_active_folder};
use super::models::{FileRecord, FolderRecord};
use super::tables::*;
use crate::error::{DriveError, Result};

/// Key in the active-name index enforcing (owner, parent, name) uniqueness.
fn folder_name_key(owner: &str, parent: Option<&str>, name: &str) -> String {
    format!("{owner}\u{1f}{}\u{1f}{name}", parent.unwrap_or(""))
}

impl Database {
    // ========================================================================
    // Folder reads
    // ========================================================================

    pub fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;
        load_record(&table, id)
    }

    /// All folders owned by `owner`, active and trashed
    pub fn folders_by_owner(&self, owner: &str) -> Result<Vec<FolderRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(OWNER_FOLDERS)?;
        let folders = read_txn.open_table(FOLDERS)?;
        load_indexed(&index, &folders, owner)
    }

    /// Active subfolders of `parent` (`None` = root)
    pub fn list_folders(
        &self,
        owner: &str,
        parent: Option<&str>,
    ) -> Result<Vec<FolderRecord>, DatabaseError> {
        let mut folders: Vec<FolderRecord> = self
            .folders_by_owner(owner)?
            .into_iter()
            .filter(|f| !f.is_deleted() && f.parent.as_deref() == parent)
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    /// Trashed folders that were deleted directly, not swept up by a parent's
    /// deletion. Most recent first.
    pub fn trashed_folders(&self, owner: &str) -> Result<Vec<FolderRecord>, DatabaseError> {
        let all = self.folders_by_owner(owner)?;
        let mut roots: Vec<FolderRecord> = all
            .iter()
            .filter(|f| f.is_deleted())
            .filter(|f| {
                let parent = f
                    .parent
                    .as_deref()
                    .and_then(|p| all.iter().find(|candidate| candidate.id == p));
                match parent {
                    Some(parent) => parent.deleted_at != f.deleted_at,
                    None => true,
                }
            })
            .cloned()
            .collect();
        roots.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(roots)
    }

    /// Folders from the root down to `id`, inclusive.
    pub fn folder_ancestry(&self, id: &str) -> Result<Vec<FolderRecord>> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;
        ancestry(&table, id)
    }

    /// `/`-joined names from the root down to `id`, e.g. `A/B`.
    pub fn folder_path(&self, id: &str) -> Result<String> {
        let names: Vec<String> = self
            .folder_ancestry(id)?
            .into_iter()
            .map(|f| f.name)
            .collect();
        Ok(names.join("/"))
    }

    // ========================================================================
    // Folder lifecycle
    // ========================================================================

    pub fn insert_folder(&self, folder: &FolderRecord) -> Result<()> {
        let write_txn = self.begin_write()?;
        {
            let mut folders = write_txn.open_table(FOLDERS)?;
            if let Some(parent) = folder.parent.as_deref() {
                require_active_folder(&folders, parent, &folder.owner)?;
            }

            let mut names = write_txn.open_table(FOLDER_NAMES)?;
            let key = folder_name_key(&folder.owner, folder.parent.as_deref(), &folder.name);
            if names.get(key.as_str())?.is_some() {
                return Err(DriveError::Conflict(format!(
                    "A folder named '{}' already exists here",
                    folder.name
                )));
            }
            names.insert(key.as_str(), folder.id.as_str())?;

            store_record(&mut folders, &folder.id, folder)?;

            let mut owner_index = write_txn.open_table(OWNER_FOLDERS)?;
            index_insert(&mut owner_index, &folder.owner, &folder.id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Rename and/or move an active folder. A folder can never be moved
    /// beneath itself.
    pub fn update_folder(
        &self,
        id: &str,
        name: Option<&str>,
        parent: Option<Option<&str>>,
    ) -> Result<FolderRecord> {
        let write_txn = self.begin_write()?;
        let folder = {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let mut folder: FolderRecord =
                load_record(&folders, id)?.ok_or(DriveError::NotFound("Folder"))?;
            if folder.is_deleted() {
                return Err(DriveError::InvalidState(
                    "Trashed folders cannot be modified".to_string(),
                ));
            }

            let new_parent = match parent {
                Some(target) => target.map(str::to_string),
                None => folder.parent.clone(),
            };
            if let Some(target) = new_parent.as_deref() {
                require_active_folder(&folders, target, &folder.owner)?;
                if ancestry(&folders, target)?.iter().any(|f| f.id == id) {
                    return Err(DriveError::InvalidHierarchy(
                        "A folder cannot be moved inside itself".to_string(),
                    ));
                }
            }
            let new_name = name.unwrap_or(folder.name.as_str()).to_string();

            let old_key = folder_name_key(&folder.owner, folder.parent.as_deref(), &folder.name);
            let new_key = folder_name_key(&folder.owner, new_parent.as_deref(), &new_name);
            if new_key != old_key {
                let mut names = write_txn.open_table(FOLDER_NAMES)?;
                if names.get(new_key.as_str())?.is_some() {
                    return Err(DriveError::Conflict(format!(
                        "A folder named '{new_name}' already exists here"
                    )));
                }
                names.remove(old_key.as_str())?;
                names.insert(new_key.as_str(), id)?;
            }

            folder.name = new_name;
            folder.parent = new_parent;
            folder.updated_at = Utc::now();
            store_record(&mut folders, id, &folder)?;
            folder
        };
        write_txn.commit()?;
        Ok(folder)
    }

    /// Trash a folder together with every active folder and file beneath it.
    /// All of them share one `deleted_at`, which is how `restore_folder`
    /// recognises the batch. Returns `false` if the folder was already trashed.
    pub fn soft_delete_folder(&self, id: &str) -> Result<bool> {
        let write_txn = self.begin_write()?;
        {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let root: FolderRecord =
                load_record(&folders, id)?.ok_or(DriveError::NotFound("Folder"))?;
            if root.is_deleted() {
                return Ok(false);
            }

            let owner_folders = write_txn.open_table(OWNER_FOLDERS)?;
            let all: Vec<FolderRecord> = load_indexed(&owner_folders, &folders, &root.owner)?;
            let subtree = subtree_ids(&root.id, &all);

            let now = Utc::now();
            let mut names = write_txn.open_table(FOLDER_NAMES)?;
            for mut folder in all
                .into_iter()
                .filter(|f| subtree.contains(f.id.as_str()) && !f.is_deleted())
            {
                names.remove(
                    folder_name_key(&folder.owner, folder.parent.as_deref(), &folder.name)
                        .as_str(),
                )?;
                folder.deleted_at = Some(now);
                folder.updated_at = now;
                store_record(&mut folders, &folder.id, &folder)?;
            }

            let owner_files = write_txn.open_table(OWNER_FILES)?;
            let mut files = write_txn.open_table(FILES)?;
            let owned: Vec<FileRecord> = load_indexed(&owner_files, &files, &root.owner)?;
            for mut file in owned.into_iter().filter(|f| {
                !f.is_deleted()
                    && f.folder
                        .as_deref()
                        .is_some_and(|folder| subtree.contains(folder))
            }) {
                file.deleted_at = Some(now);
                file.updated_at = now;
                store_record(&mut files, &file.id, &file)?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Restore a trashed folder and everything trashed with it in the same batch.
    pub fn restore_folder(&self, id: &str, owner: &str) -> Result<FolderRecord> {
        let write_txn = self.begin_write()?;
        let restored_root = {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let root = match load_record::<FolderRecord>(&folders, id)? {
                Some(folder) if folder.owner == owner => folder,
                _ => return Err(DriveError::NotFound("Folder")),
            };
            let Some(batch) = root.deleted_at else {
                return Err(DriveError::InvalidState(
                    "Folder is not in the trash".to_string(),
                ));
            };
            if let Some(parent) = root.parent.as_deref() {
                require_active_folder(&folders, parent, owner)?;
            }

            let owner_folders = write_txn.open_table(OWNER_FOLDERS)?;
            let all: Vec<FolderRecord> = load_indexed(&owner_folders, &folders, owner)?;

            let now = Utc::now();
            let mut names = write_txn.open_table(FOLDER_NAMES)?;
            let mut restored: HashSet<String> = HashSet::new();
            let mut queue = VecDeque::from([root.clone()]);
            let mut restored_root = None;

            while let Some(mut folder) = queue.pop_front() {
                if !restored.insert(folder.id.clone()) {
                    continue;
                }
                let key = folder_name_key(owner, folder.parent.as_deref(), &folder.name);
                if names.get(key.as_str())?.is_some() {
                    return Err(DriveError::Conflict(format!(
                        "A folder named '{}' already exists here",
                        folder.name
                    )));
                }
                names.insert(key.as_str(), folder.id.as_str())?;

                folder.deleted_at = None;
                folder.updated_at = now;
                store_record(&mut folders, &folder.id, &folder)?;

                queue.extend(
                    all.iter()
                        .filter(|child| child.parent.as_deref() == Some(folder.id.as_str()))
                        .filter(|child| child.deleted_at == Some(batch))
                        .cloned(),
                );
                if folder.id == id {
                    restored_root = Some(folder);
                }
            }

            let owner_files = write_txn.open_table(OWNER_FILES)?;
            let mut files = write_txn.open_table(FILES)?;
            let owned: Vec<FileRecord> = load_indexed(&owner_files, &files, owner)?;
            for mut file in owned.into_iter().filter(|f| {
                f.deleted_at == Some(batch)
                    && f.folder
                        .as_deref()
                        .is_some_and(|folder| restored.contains(folder))
            }) {
                file.deleted_at = None;
                file.updated_at = now;
                store_record(&mut files, &file.id, &file)?;
            }

            restored_root.ok_or_else(|| DriveError::Internal("restored root missing".into()))?
        };
        write_txn.commit()?;
        Ok(restored_root)
    }

    /// Permanently remove a trashed folder, its whole subtree and every file in
    /// it. Returns the removed files so the caller can delete their blobs.
    pub fn purge_folder(&self, id: &str, owner: &str) -> Result<Vec<FileRecord>> {
        let write_txn = self.begin_write()?;

        let (doomed_folders, doomed_files) = {
            let folders = write_txn.open_table(FOLDERS)?;
            let root = match load_record::<FolderRecord>(&folders, id)? {
                Some(folder) if folder.owner == owner => folder,
                _ => return Err(DriveError::NotFound("Folder")),
            };
            if !root.is_deleted() {
                return Err(DriveError::InvalidState(
                    "Only trashed folders can be permanently deleted".to_string(),
                ));
            }

            let owner_folders = write_txn.open_table(OWNER_FOLDERS)?;
            let all: Vec<FolderRecord> = load_indexed(&owner_folders, &folders, owner)?;
            let subtree = subtree_ids(&root.id, &all);
            let doomed_folders: Vec<FolderRecord> = all
                .into_iter()
                .filter(|f| subtree.contains(f.id.as_str()))
                .collect();

            let owner_files = write_txn.open_table(OWNER_FILES)?;
            let files = write_txn.open_table(FILES)?;
            let doomed_files: Vec<FileRecord> = load_indexed::<FileRecord>(&owner_files, &files, owner)?
                .into_iter()
                .filter(|f| f.folder.as_deref().is_some_and(|folder| subtree.contains(folder)))
                .collect();

            (doomed_folders, doomed_files)
        };

        for file in &doomed_files {
            remove_file_rows(&write_txn, file)?;
        }
        {
            let mut folders = write_txn.open_table(FOLDERS)?;
            let mut names = write_txn.open_table(FOLDER_NAMES)?;
            let mut owner_index = write_txn.open_table(OWNER_FOLDERS)?;
            for folder in &doomed_folders {
                folders.remove(folder.id.as_str())?;
                let key = folder_name_key(owner, folder.parent.as_deref(), &folder.name);
                let indexed_here = names
                    .get(key.as_str())?
                    .is_some_and(|v| v.value() == folder.id);
                if indexed_here {
                    names.remove(key.as_str())?;
                }
                index_remove(&mut owner_index, owner, &folder.id)?;
            }
        }
        write_txn.commit()?;
        Ok(doomed_files)
    }
}

// ============================================================================
// Hierarchy helpers
// ============================================================================

/// Walk parent links from `id` to the root. A repeated id or a dangling
/// parent means the hierarchy is corrupt; the walk stops with an error.
fn ancestry(
    folders: &impl ReadableTable<&'static str, &'static [u8]>,
    id: &str,
) -> Result<Vec<FolderRecord>> {
    let mut chain: Vec<FolderRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut next = Some(id.to_string());

    while let Some(current) = next {
        if !seen.insert(current.clone()) {
            tracing::error!(folder_id = %id, repeated = %current, "Cycle in folder hierarchy");
            return Err(DriveError::InvalidHierarchy(
                "Folder hierarchy contains a cycle".to_string(),
            ));
        }
        let folder: FolderRecord = match load_record(folders, &current)? {
            Some(folder) => folder,
            None if chain.is_empty() => return Err(DriveError::NotFound("Folder")),
            None => {
                tracing::error!(folder_id = %id, missing = %current, "Dangling parent in folder hierarchy");
                return Err(DriveError::InvalidHierarchy(
                    "Folder hierarchy references a missing parent".to_string(),
                ));
            }
        };
        next = folder.parent.clone();
        chain.push(folder);
    }

    chain.reverse();
    Ok(chain)
}

/// Ids of `root_id` and all of its descendants among `all`.
fn subtree_ids(root_id: &str, all: &[FolderRecord]) -> HashSet<String> {
    let mut ids = HashSet::from([root_id.to_string()]);
    let mut queue = VecDeque::from([root_id.to_string()]);

    while let Some(current) = queue.pop_front() {
        for child in all
            .iter()
            .filter(|f| f.parent.as_deref() == Some(current.as_str()))
        {
            if ids.insert(child.id.clone()) {
                queue.push_back(child.id.clone());
            }
        }
    }
    ids
}
