use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use redb::ReadableTable;
use ring::rand::{SecureRandom, SystemRandom};

use super::db::{load_record, store_record, Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;
use crate::error::{DriveError, Result};

const TOKEN_BYTES: usize = 32;

/// Generate an opaque, unguessable share token (256 bits, base64url).
pub fn generate_share_token() -> Result<String> {
    let mut buf = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| DriveError::Internal("system random source unavailable".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

impl Database {
    /// Give a file a share token. Idempotent: an already shared file keeps its token.
    pub fn issue_share_token(&self, file_id: &str) -> Result<String> {
        let write_txn = self.begin_write()?;
        let token = {
            let mut files = write_txn.open_table(FILES)?;
            let mut file: FileRecord =
                load_record(&files, file_id)?.ok_or(DriveError::NotFound("File"))?;
            if let Some(existing) = &file.share_token {
                return Ok(existing.clone());
            }

            let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
            let retired = write_txn.open_table(RETIRED_SHARE_TOKENS)?;
            let token = loop {
                let candidate = generate_share_token()?;
                if tokens.get(candidate.as_str())?.is_none()
                    && retired.get(candidate.as_str())?.is_none()
                {
                    break candidate;
                }
            };
            tokens.insert(token.as_str(), file_id)?;

            file.share_token = Some(token.clone());
            file.updated_at = Utc::now();
            store_record(&mut files, file_id, &file)?;
            token
        };
        write_txn.commit()?;
        Ok(token)
    }

    /// Clear a file's share token and retire it. Unshared files are left alone.
    pub fn revoke_share_token(&self, file_id: &str) -> Result<()> {
        let write_txn = self.begin_write()?;
        {
            let mut files = write_txn.open_table(FILES)?;
            let mut file: FileRecord =
                load_record(&files, file_id)?.ok_or(DriveError::NotFound("File"))?;
            let Some(token) = file.share_token.take() else {
                return Ok(());
            };

            let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
            tokens.remove(token.as_str())?;
            let mut retired = write_txn.open_table(RETIRED_SHARE_TOKENS)?;
            retired.insert(token.as_str(), Utc::now().timestamp())?;

            file.updated_at = Utc::now();
            store_record(&mut files, file_id, &file)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up the file currently shared under `token`.
    pub fn resolve_share_token(&self, token: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let tokens = read_txn.open_table(SHARE_TOKENS)?;
        let file_id = match tokens.get(token)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        let files = read_txn.open_table(FILES)?;
        let file: Option<FileRecord> = load_record(&files, &file_id)?;
        Ok(file.filter(|f| f.is_shared() && f.share_token.as_deref() == Some(token)))
    }
}
