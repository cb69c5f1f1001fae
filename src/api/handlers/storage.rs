use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::format_size;
use crate::api::auth::CurrentUser;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::storage::models::UserStorage;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageResponse {
    pub available_space: u64,
    pub available_space_formatted: String,
    pub file_count: u64,
    pub folder_count: u64,
    pub total_space: u64,
    pub total_space_formatted: String,
    pub updated_at: String,
    pub usage_percent: f64,
    pub used_space: u64,
    pub used_space_formatted: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub total_space: u64,
    pub used_space: u64,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetQuotaRequest {
    pub total_space: u64,
}

pub async fn storage_info(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<JSend<StorageResponse>>, ApiError> {
    let info = state.drive.storage_info(&user)?;
    let storage = &info.storage;

    Ok(JSend::success(StorageResponse {
        available_space: storage.available(),
        available_space_formatted: format_size(storage.available()),
        file_count: info.file_count,
        folder_count: info.folder_count,
        total_space: storage.total_space,
        total_space_formatted: format_size(storage.total_space),
        updated_at: storage.updated_at.to_rfc3339(),
        usage_percent: (info.percent * 100.0).round() / 100.0,
        used_space: storage.used_space,
        used_space_formatted: format_size(storage.used_space),
    }))
}

/// Set a user's quota ceiling. Internal: the gateway does not expose it.
pub async fn set_quota(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<SetQuotaRequest>,
) -> Result<Json<JSend<QuotaResponse>>, ApiError> {
    let storage = state.drive.set_quota(&user_id, req.total_space)?;
    Ok(JSend::success(quota_to_response(storage)))
}

fn quota_to_response(storage: UserStorage) -> QuotaResponse {
    QuotaResponse {
        total_space: storage.total_space,
        used_space: storage.used_space,
        user_id: storage.user_id,
    }
}
