use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Folder records: uuid -> FolderRecord (msgpack)
pub const FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("folders");

/// Active folder names: "owner \x1f parent \x1f name" -> folder uuid.
/// Trashed folders are removed from this index.
pub const FOLDER_NAMES: TableDefinition<&str, &str> = TableDefinition::new("folder_names");

/// Owner index: user id -> msgpack Vec of file UUIDs
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Owner index: user id -> msgpack Vec of folder UUIDs
pub const OWNER_FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_folders");

/// Live share tokens: token -> file uuid
pub const SHARE_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("share_tokens");

/// Revoked share tokens: token -> unix timestamp of revocation. Never reissued.
pub const RETIRED_SHARE_TOKENS: TableDefinition<&str, i64> =
    TableDefinition::new("retired_share_tokens");

/// Quota ledger: user id -> UserStorage (msgpack)
pub const USER_STORAGE: TableDefinition<&str, &[u8]> = TableDefinition::new("user_storage");
