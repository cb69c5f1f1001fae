//! opendrive - personal file storage with folders, share links and quotas
//!
//! This crate provides:
//! - A folder hierarchy with soft delete, trash, restore and purge
//! - A per-user quota ledger reconciled from the set of live files
//! - Revocable, unguessable share links for anonymous downloads
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - REST API with multipart upload and streaming download

pub mod access;
pub mod api;
pub mod blob_store;
pub mod config;
pub mod drive;
pub mod error;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use drive::Drive;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub drive: Drive,
}
