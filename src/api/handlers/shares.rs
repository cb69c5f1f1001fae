use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{download_response, format_size};
use crate::api::auth::CurrentUser;
use crate::api::response::{ApiError, AppQuery, JSend};
use crate::storage::models::FileType;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub share_token: String,
    pub share_url: String,
}

/// What an anonymous visitor learns about a shared file. Owner and folder stay private.
#[derive(Debug, Serialize, Deserialize)]
pub struct SharedFileResponse {
    pub byte_size: u64,
    pub created_at: String,
    pub download_url: String,
    pub file_type: FileType,
    pub mime_type: String,
    pub name: String,
    pub size_formatted: String,
}

#[derive(Debug, Deserialize)]
pub struct SharedFileParams {
    #[serde(default)]
    pub download: bool,
}

pub async fn share_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<ShareResponse>>, ApiError> {
    let link = state.drive.share_file(&user, &id)?;
    Ok(JSend::success(ShareResponse {
        share_token: link.token,
        share_url: link.url,
    }))
}

pub async fn unshare_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.drive.unshare_file(&user, &id)?;
    Ok(JSend::success(()))
}

/// Anonymous access by share token. `?download=true` streams the content.
pub async fn shared_file(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    AppQuery(params): AppQuery<SharedFileParams>,
) -> Result<Response, ApiError> {
    if params.download {
        let download = state.drive.open_shared(&token).await?;
        return Ok(download_response(download));
    }

    let file = state.drive.fetch_shared(&token)?;
    let download_url = format!("{}?download=true", state.drive.share_url(&token));
    Ok(JSend::success(SharedFileResponse {
        byte_size: file.byte_size,
        created_at: file.created_at.to_rfc3339(),
        download_url,
        file_type: file.file_type,
        mime_type: file.mime_type,
        name: file.name,
        size_formatted: format_size(file.byte_size),
    })
    .into_response())
}
