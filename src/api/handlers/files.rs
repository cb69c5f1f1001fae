use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{default_limit, download_response, format_size, nullable, paginate, PageParams};
use crate::api::auth::CurrentUser;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated};
use crate::drive::Drive;
use crate::storage::models::{FileRecord, FileType, Patch};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub byte_size: u64,
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub file_type: FileType,
    pub folder_id: Option<String>,
    pub id: String,
    pub is_deleted: bool,
    pub is_shared: bool,
    pub mime_type: String,
    pub name: String,
    pub owner: String,
    pub share_url: Option<String>,
    pub size_formatted: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateFileRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub folder_id: Option<Option<String>>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut folder_id: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }
                file_data = Some(data);
            }
            "folder_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid folder_id: {e}")))?;
                folder_id = Some(text).filter(|t| !t.trim().is_empty());
            }
            "name" => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid name: {e}")))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let display_name = name
        .or(file_name)
        .ok_or_else(|| ApiError::bad_request("file name is required"))?;

    let file = state
        .drive
        .upload_file(&user, folder_id.as_deref(), file_data, &display_name)
        .await?;

    Ok(JSend::success(file_to_response(&state.drive, &file)))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSend<Vec<FileResponse>>>, ApiError> {
    let contents = state
        .drive
        .list_folder(&user, params.folder_id.as_deref())?;
    Ok(JSend::success(files_to_response(&state.drive, &contents.files)))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state.drive.get_file(&user, &id)?;
    Ok(JSend::success(file_to_response(&state.drive, &file)))
}

pub async fn update_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    if req.name.is_none() && req.folder_id.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (name, folder_id) must be provided",
        ));
    }

    let file = state.drive.update_file(
        &user,
        &id,
        req.name.as_deref(),
        Patch::from(req.folder_id),
    )?;
    Ok(JSend::success(file_to_response(&state.drive, &file)))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.drive.delete_file(&user, &id)?;
    Ok(JSend::success(()))
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.drive.download_file(&user, &id).await?;
    Ok(download_response(download))
}

pub async fn trash(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    let files = state.drive.trash(&user)?;
    paginate(files, params.limit, params.offset, |f| {
        file_to_response(&state.drive, f)
    })
}

pub async fn restore_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state.drive.restore(&user, &id)?;
    Ok(JSend::success(file_to_response(&state.drive, &file)))
}

pub async fn purge_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.drive.purge(&user, &id).await?;
    Ok(JSend::success(()))
}

pub async fn recent_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(params): AppQuery<RecentParams>,
) -> Result<Json<JSend<Vec<FileResponse>>>, ApiError> {
    let files = state.drive.recent_files(&user, params.limit as usize)?;
    Ok(JSend::success(files_to_response(&state.drive, &files)))
}

pub async fn search_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    let files = state.drive.search_files(&user, &params.q)?;
    paginate(files, params.limit, params.offset, |f| {
        file_to_response(&state.drive, f)
    })
}

// ============================================================================
// Helpers
// ============================================================================

pub(super) fn file_to_response(drive: &Drive, file: &FileRecord) -> FileResponse {
    FileResponse {
        byte_size: file.byte_size,
        created_at: file.created_at.to_rfc3339(),
        deleted_at: file.deleted_at.map(|d| d.to_rfc3339()),
        file_type: file.file_type,
        folder_id: file.folder.clone(),
        id: file.id.clone(),
        is_deleted: file.is_deleted(),
        is_shared: file.is_shared(),
        mime_type: file.mime_type.clone(),
        name: file.name.clone(),
        owner: file.owner.clone(),
        share_url: file.share_token.as_deref().map(|t| drive.share_url(t)),
        size_formatted: format_size(file.byte_size),
        updated_at: file.updated_at.to_rfc3339(),
    }
}

pub(super) fn files_to_response(drive: &Drive, files: &[FileRecord]) -> Vec<FileResponse> {
    files.iter().map(|f| file_to_response(drive, f)).collect()
}
