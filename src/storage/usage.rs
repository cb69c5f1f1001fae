use chrono::Utc;

use super::db::{load_indexed, load_record, store_record, Database, DatabaseError};
use super::models::{FileRecord, UserStorage};
use super::tables::*;

impl Database {
    /// Get the user's ledger entry, creating it with `default_total` on first use.
    pub fn ensure_user_storage(
        &self,
        user_id: &str,
        default_total: u64,
    ) -> Result<UserStorage, DatabaseError> {
        {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(USER_STORAGE)?;
            if let Some(storage) = load_record(&table, user_id)? {
                return Ok(storage);
            }
        }

        let write_txn = self.begin_write()?;
        let storage = {
            let mut table = write_txn.open_table(USER_STORAGE)?;
            match load_record(&table, user_id)? {
                Some(storage) => storage,
                None => {
                    let storage = UserStorage::new(user_id, default_total);
                    store_record(&mut table, user_id, &storage)?;
                    storage
                }
            }
        };
        write_txn.commit()?;
        Ok(storage)
    }

    /// Overwrite `used_space` with the sum of the user's non-deleted file sizes.
    /// Runs in one write transaction, so it never interleaves with catalog writes.
    pub fn recompute_usage(
        &self,
        user_id: &str,
        default_total: u64,
    ) -> Result<UserStorage, DatabaseError> {
        let write_txn = self.begin_write()?;
        let storage = {
            let owner_files = write_txn.open_table(OWNER_FILES)?;
            let files = write_txn.open_table(FILES)?;
            let used: u64 = load_indexed::<FileRecord>(&owner_files, &files, user_id)?
                .iter()
                .filter(|f| !f.is_deleted())
                .map(|f| f.byte_size)
                .sum();

            let mut table = write_txn.open_table(USER_STORAGE)?;
            let mut storage: UserStorage = load_record(&table, user_id)?
                .unwrap_or_else(|| UserStorage::new(user_id, default_total));
            storage.used_space = used;
            storage.updated_at = Utc::now();
            store_record(&mut table, user_id, &storage)?;
            storage
        };
        write_txn.commit()?;
        Ok(storage)
    }

    /// Change a user's quota ceiling.
    pub fn set_total_space(
        &self,
        user_id: &str,
        total_space: u64,
        default_total: u64,
    ) -> Result<UserStorage, DatabaseError> {
        let write_txn = self.begin_write()?;
        let storage = {
            let mut table = write_txn.open_table(USER_STORAGE)?;
            let mut storage: UserStorage = load_record(&table, user_id)?
                .unwrap_or_else(|| UserStorage::new(user_id, default_total));
            storage.total_space = total_space;
            storage.updated_at = Utc::now();
            store_record(&mut table, user_id, &storage)?;
            storage
        };
        write_txn.commit()?;
        Ok(storage)
    }

    /// Admission check against the stored (not freshly recomputed) usage.
    pub fn admit(
        &self,
        user_id: &str,
        incoming: u64,
        default_total: u64,
    ) -> Result<bool, DatabaseError> {
        Ok(self
            .ensure_user_storage(user_id, default_total)?
            .has_space_for(incoming))
    }
}
