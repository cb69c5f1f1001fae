use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub files_deleted: u64,
    pub folders_deleted: u64,
    pub users_reset: u64,
}

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state.drive.purge_all().await?;

    tracing::warn!(
        files = stats.files,
        folders = stats.folders,
        users = stats.users,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        files_deleted: stats.files,
        folders_deleted: stats.folders,
        users_reset: stats.users,
    }))
}
