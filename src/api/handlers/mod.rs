mod admin;
mod files;
mod folders;
mod shares;
mod storage;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::api::response::{ApiError, JSendPaginated, Pagination};
use crate::drive::Download;

pub use admin::{admin_purge, health};
pub use files::{
    delete_file, download_file, get_file, list_files, purge_file, recent_files, restore_file,
    search_files, trash, update_file, upload_file,
};
pub use folders::{
    create_folder, delete_folder, folder_contents, get_folder, purge_folder, restore_folder,
    trashed_folders, update_folder,
};
pub use shares::{share_file, shared_file, unshare_file};
pub use storage::{set_quota, storage_info};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

/// Distinguishes between a missing field (`None`) and an explicit `null` (`Some(None)`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Slice `items` into one page, JSend-wrapped.
fn paginate<T: serde::Serialize, U>(
    items: Vec<U>,
    limit: u32,
    offset: u32,
    to_response: impl Fn(&U) -> T,
) -> Result<axum::Json<JSendPaginated<T>>, ApiError> {
    if limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let total = items.len() as u64;
    let page: Vec<T> = items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(to_response)
        .collect();

    Ok(JSendPaginated::success(
        page,
        Pagination {
            limit,
            offset,
            total,
        },
    ))
}

/// Stream a file's bytes as an attachment.
fn download_response(download: Download) -> Response {
    let Download { file, stream } = download;
    let mut response = (StatusCode::OK, Body::from_stream(stream)).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.byte_size));

    let filename: String = file
        .name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if let Ok(value) = format!("attachment; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));

    response
}

/// Human readable byte count, e.g. `1.5 MB`.
pub(crate) fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
