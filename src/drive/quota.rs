use super::Drive;
use crate::error::Result;
use crate::storage::models::UserStorage;

#[derive(Debug, Clone)]
pub struct StorageInfo {
    pub storage: UserStorage,
    pub percent: f64,
    pub file_count: u64,
    pub folder_count: u64,
}

impl Drive {
    /// Usage report. Always recomputes first, which costs one pass over the
    /// user's files.
    pub fn storage_info(&self, user: &str) -> Result<StorageInfo> {
        let storage = self.recompute(user)?;
        let file_count = self
            .db
            .files_by_owner(user)?
            .iter()
            .filter(|f| !f.is_deleted())
            .count() as u64;
        let folder_count = self
            .db
            .folders_by_owner(user)?
            .iter()
            .filter(|f| !f.is_deleted())
            .count() as u64;

        Ok(StorageInfo {
            percent: storage.usage_percent(),
            storage,
            file_count,
            folder_count,
        })
    }

    /// Would an upload of `incoming` bytes fit, judged on the stored usage?
    pub fn admit(&self, user: &str, incoming: u64) -> Result<bool> {
        Ok(self
            .db
            .admit(user, incoming, self.settings.default_total_space)?)
    }

    pub fn set_quota(&self, user: &str, total_space: u64) -> Result<UserStorage> {
        let storage =
            self.db
                .set_total_space(user, total_space, self.settings.default_total_space)?;
        tracing::info!(user = %user, total_space, "Updated quota");
        Ok(storage)
    }
}
