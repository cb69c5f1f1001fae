use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DriveError;

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

/// One page of a trash or search listing.
#[derive(Debug, Serialize)]
pub struct JSendPaginated<T: Serialize> {
    pub data: PaginatedData<T>,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize)]
pub struct PaginatedData<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

impl<T: Serialize> JSendPaginated<T> {
    pub fn success(items: Vec<T>, pagination: Pagination) -> Json<JSendPaginated<T>> {
        Json(JSendPaginated {
            data: PaginatedData { items, pagination },
            status: JSendStatus::Success,
        })
    }
}

/// Client error body. `reason` is a stable machine-readable tag, e.g.
/// `quota_exceeded`; `available_space` accompanies quota failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_space: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

// ============================================================================
// ApiError
// ============================================================================

/// Handler error. 4xx statuses render as JSend `fail`, 5xx as `error`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub reason: Option<&'static str>,
    pub available_space: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reason: None,
            available_space: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message).with_reason("invalid_request")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message).with_reason("unauthenticated")
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message).with_reason("upload_too_large")
    }

    fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let body = JSendError {
                message: self.message,
                status: JSendStatus::Error,
            };
            return (self.status, Json(body)).into_response();
        }

        let body = JSendFail {
            data: FailData {
                message: self.message,
                reason: self.reason.map(str::to_string),
                available_space: self.available_space,
            },
            status: JSendStatus::Fail,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DriveError> for ApiError {
    fn from(e: DriveError) -> Self {
        let message = e.to_string();
        let (status, reason) = match &e {
            DriveError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            DriveError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            DriveError::Conflict(_) => (StatusCode::CONFLICT, "name_conflict"),
            DriveError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            DriveError::QuotaExceeded { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "quota_exceeded"),
            DriveError::InvalidHierarchy(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_hierarchy")
            }
            DriveError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            DriveError::StorageUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            DriveError::Database(_) | DriveError::Internal(_) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let mut err = ApiError::new(status, message).with_reason(reason);
        if let DriveError::QuotaExceeded { available } = e {
            err.available_space = Some(available);
        }
        err
    }
}

// ============================================================================
// Extractors that reject with JSend bodies
// ============================================================================

/// `axum::Json` with JSend rejections.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(|rejection| {
                ApiError::bad_request(match rejection {
                    JsonRejection::JsonDataError(err) => {
                        format!("Invalid request body: {}", err.body_text())
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".into(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header".into()
                    }
                    _ => "Failed to read request body".into(),
                })
            })
    }
}

/// `axum::extract::Query` backed by `serde_qs`, with JSend rejections.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(query_error_message(&e.to_string())))
    }
}

/// serde_qs messages name Rust types; callers see plain words.
fn query_error_message(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer")
        .replace("a boolean", "true or false");
    format!("Invalid query parameter: {cleaned}")
}
