use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::models::FileRecord;
use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Metadata store: files, folders, share tokens and the quota ledger.
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub files: u64,
    pub folders: u64,
    pub users: u64,
    /// Blob keys of the purged files, for the caller to delete
    pub blob_keys: Vec<String>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("opendrive.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(FOLDERS)?;
            let _ = write_txn.open_table(FOLDER_NAMES)?;
            let _ = write_txn.open_table(OWNER_FILES)?;
            let _ = write_txn.open_table(OWNER_FOLDERS)?;
            let _ = write_txn.open_table(SHARE_TOKENS)?;
            let _ = write_txn.open_table(RETIRED_SHARE_TOKENS)?;
            let _ = write_txn.open_table(USER_STORAGE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Purge all data - for testing only. Blobs are left to the caller.
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let blob_keys = {
            let files = write_txn.open_table(FILES)?;
            let mut keys = Vec::new();
            for entry in files.iter()? {
                let (_, data) = entry?;
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                keys.push(file.blob_key);
            }
            keys
        };
        let stats = PurgeStats {
            files: clear_table(&write_txn, FILES)?,
            folders: clear_table(&write_txn, FOLDERS)?,
            users: clear_table(&write_txn, USER_STORAGE)?,
            blob_keys,
        };
        clear_table(&write_txn, FOLDER_NAMES)?;
        clear_table(&write_txn, OWNER_FILES)?;
        clear_table(&write_txn, OWNER_FOLDERS)?;
        clear_table(&write_txn, SHARE_TOKENS)?;
        clear_table(&write_txn, RETIRED_SHARE_TOKENS)?;
        write_txn.commit()?;
        Ok(stats)
    }
}

fn clear_table<V: redb::Value + 'static>(
    write_txn: &WriteTransaction,
    definition: TableDefinition<&'static str, V>,
) -> Result<u64, DatabaseError> {
    let mut table = write_txn.open_table(definition)?;
    let keys: Vec<String> = table
        .iter()?
        .map(|r| r.map(|(k, _)| k.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    for key in &keys {
        table.remove(key.as_str())?;
    }
    Ok(keys.len() as u64)
}

// ============================================================================
// Record and index helpers shared by the catalog modules
// ============================================================================

pub(crate) type RecordTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

/// Load and decode a msgpack record.
pub(crate) fn load_record<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    id: &str,
) -> Result<Option<T>, DatabaseError> {
    match table.get(id)? {
        Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn store_record<T: Serialize>(
    table: &mut RecordTable<'_>,
    id: &str,
    record: &T,
) -> Result<(), DatabaseError> {
    let data = rmp_serde::to_vec_named(record)?;
    table.insert(id, data.as_slice())?;
    Ok(())
}

/// Ids stored under an owner index key.
pub(crate) fn index_ids(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Vec<String>, DatabaseError> {
    Ok(load_record(table, key)?.unwrap_or_default())
}

/// Decode every record listed under `key` in an owner index.
pub(crate) fn load_indexed<T: DeserializeOwned>(
    index: &impl ReadableTable<&'static str, &'static [u8]>,
    records: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    for id in index_ids(index, key)? {
        if let Some(record) = load_record(records, &id)? {
            out.push(record);
        }
    }
    Ok(out)
}

pub(crate) fn index_insert(
    table: &mut RecordTable<'_>,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut ids = index_ids(table, key)?;
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
        store_record(table, key, &ids)?;
    }
    Ok(())
}

pub(crate) fn index_remove(
    table: &mut RecordTable<'_>,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut ids = index_ids(table, key)?;
    ids.retain(|existing| existing != id);
    if ids.is_empty() {
        table.remove(key)?;
    } else {
        store_record(table, key, &ids)?;
    }
    Ok(())
}
