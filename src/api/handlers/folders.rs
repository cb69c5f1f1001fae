use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::files::{files_to_response, FileResponse};
use super::{nullable, paginate, PageParams};
use crate::api::auth::CurrentUser;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated};
use crate::storage::models::{FolderRecord, Patch};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderResponse {
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub id: String,
    pub is_deleted: bool,
    pub name: String,
    pub owner: String,
    pub parent_id: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct FolderDetailResponse {
    #[serde(flatten)]
    pub folder: FolderResponse,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FolderContentsResponse {
    pub files: Vec<FileResponse>,
    pub folder: Option<FolderResponse>,
    pub path: String,
    pub subfolders: Vec<FolderResponse>,
}

#[derive(Debug, Serialize)]
pub struct PurgeFolderResponse {
    pub files_deleted: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<String>>,
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<CreateFolderRequest>,
) -> Result<Json<JSend<FolderResponse>>, ApiError> {
    let folder = state
        .drive
        .create_folder(&user, &req.name, req.parent_id.as_deref())?;
    Ok(JSend::success(folder_to_response(&folder)))
}

pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FolderDetailResponse>>, ApiError> {
    let (folder, path) = state.drive.get_folder(&user, &id)?;
    Ok(JSend::success(FolderDetailResponse {
        folder: folder_to_response(&folder),
        path,
    }))
}

/// Files and subfolders directly inside a folder.
pub async fn folder_contents(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FolderContentsResponse>>, ApiError> {
    let contents = state.drive.list_folder(&user, Some(&id))?;
    Ok(JSend::success(FolderContentsResponse {
        files: files_to_response(&state.drive, &contents.files),
        folder: contents.folder.as_ref().map(folder_to_response),
        path: contents.path,
        subfolders: contents.subfolders.iter().map(folder_to_response).collect(),
    }))
}

pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFolderRequest>,
) -> Result<Json<JSend<FolderResponse>>, ApiError> {
    if req.name.is_none() && req.parent_id.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (name, parent_id) must be provided",
        ));
    }

    let folder = state.drive.update_folder(
        &user,
        &id,
        req.name.as_deref(),
        Patch::from(req.parent_id),
    )?;
    Ok(JSend::success(folder_to_response(&folder)))
}

pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.drive.delete_folder(&user, &id)?;
    Ok(JSend::success(()))
}

pub async fn restore_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<FolderResponse>>, ApiError> {
    let folder = state.drive.restore_folder(&user, &id)?;
    Ok(JSend::success(folder_to_response(&folder)))
}

pub async fn purge_folder(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<PurgeFolderResponse>>, ApiError> {
    let files_deleted = state.drive.purge_folder(&user, &id).await?;
    Ok(JSend::success(PurgeFolderResponse { files_deleted }))
}

pub async fn trashed_folders(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<JSendPaginated<FolderResponse>>, ApiError> {
    let folders = state.drive.trashed_folders(&user)?;
    paginate(folders, params.limit, params.offset, folder_to_response)
}

fn folder_to_response(folder: &FolderRecord) -> FolderResponse {
    FolderResponse {
        created_at: folder.created_at.to_rfc3339(),
        deleted_at: folder.deleted_at.map(|d| d.to_rfc3339()),
        id: folder.id.clone(),
        is_deleted: folder.is_deleted(),
        name: folder.name.clone(),
        owner: folder.owner.clone(),
        parent_id: folder.parent.clone(),
        updated_at: folder.updated_at.to_rfc3339(),
    }
}
