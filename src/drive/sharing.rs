use super::{Download, Drive};
use crate::access::{self, Operation};
use crate::error::{DriveError, Result};
use crate::storage::models::FileRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub token: String,
    pub url: String,
}

impl Drive {
    /// Share a file by link. Sharing an already shared file returns the same link.
    pub fn share_file(&self, user: &str, id: &str) -> Result<ShareLink> {
        self.authorized_file(Some(user), id, Operation::Write, false)?;
        let token = self.db.issue_share_token(id)?;

        tracing::debug!(file_id = %id, owner = %user, "Shared file");
        Ok(ShareLink {
            url: self.share_url(&token),
            token,
        })
    }

    /// Revoke a file's share link. The old token never resolves again.
    pub fn unshare_file(&self, user: &str, id: &str) -> Result<()> {
        self.authorized_file(Some(user), id, Operation::Write, true)?;
        self.db.revoke_share_token(id)?;

        tracing::debug!(file_id = %id, owner = %user, "Unshared file");
        Ok(())
    }

    /// Anonymous lookup of a shared file. Revoked tokens and trashed files are
    /// `NotFound`.
    pub fn fetch_shared(&self, token: &str) -> Result<FileRecord> {
        let file = self
            .db
            .resolve_share_token(token)?
            .filter(|f| !f.is_deleted())
            .ok_or(DriveError::NotFound("Shared file"))?;
        access::check(None, &file, Operation::Read)?;
        Ok(file)
    }

    pub async fn open_shared(&self, token: &str) -> Result<Download> {
        let file = self.fetch_shared(token)?;
        self.open(file).await
    }

    pub fn share_url(&self, token: &str) -> String {
        format!(
            "{}/shared/{token}",
            self.settings.share_base_url.trim_end_matches('/')
        )
    }
}
