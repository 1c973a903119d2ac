use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::CommentError;

use crate::state::DispatchError;

/// JSON error body with the status the failure maps to.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unexpected(what: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Unexpected reply to {}", what),
        }
    }
}

pub fn status_of(e: &CommentError) -> StatusCode {
    match e {
        CommentError::InvalidParent { .. } | CommentError::EmptyBody => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CommentError::VersionConflict { .. }
        | CommentError::InvalidTransition { .. }
        | CommentError::AttachmentSuperseded(_) => StatusCode::CONFLICT,
        CommentError::NotFound(_) => StatusCode::NOT_FOUND,
        CommentError::SessionClosed(_) => StatusCode::GONE,
        CommentError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<CommentError> for ApiError {
    fn from(e: CommentError) -> Self {
        Self {
            status: status_of(&e),
            message: e.to_string(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Rejected(e) => e.into(),
            DispatchError::WorkerClosed => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "Worker closed".into(),
            },
            DispatchError::Timeout => Self {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: "Timeout".into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed: {} {}", self.status, self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
