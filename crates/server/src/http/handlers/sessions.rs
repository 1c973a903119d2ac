use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use domain::{
    protocol::KeyChord, AppCommand, AttachmentRef, NodeId, SessionId, SessionKind, UploadFile,
    UserId,
};
use engine::{AttachmentBinding, CommandReply, PublishOutcome, SessionSnapshot};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::state::AppState;

pub const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub author_id: UserId,
    pub kind: SessionKind,
}

#[derive(Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

async fn session_reply(state: &AppState, cmd: AppCommand) -> Result<Json<SessionSnapshot>, ApiError> {
    match state.dispatch(cmd).await? {
        CommandReply::Session(s) => Ok(Json(s)),
        _ => Err(ApiError::unexpected("session command")),
    }
}

pub async fn open_session(
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let cmd = AppCommand::OpenSession {
        node_id,
        author_id: payload.author_id,
        kind: payload.kind,
    };
    let snapshot = session_reply(&state, cmd).await?;
    Ok((StatusCode::CREATED, snapshot))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.engine.session(session_id)?))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    match state.dispatch(AppCommand::Cancel { session_id }).await? {
        CommandReply::Closed(_) => Ok(StatusCode::NO_CONTENT),
        _ => Err(ApiError::unexpected("cancel")),
    }
}

pub async fn put_draft(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(payload): Json<DraftRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let cmd = AppCommand::TypeText {
        session_id,
        text: payload.text,
    };
    session_reply(&state, cmd).await
}

pub async fn toggle_preview(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    session_reply(&state, AppCommand::TogglePreview { session_id }).await
}

pub async fn refresh_edit_base(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    session_reply(&state, AppCommand::RefreshEditBase { session_id }).await
}

pub async fn key_press(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(chord): Json<KeyChord>,
) -> Result<Json<Option<PublishOutcome>>, ApiError> {
    match state.dispatch(AppCommand::KeyPress { session_id, chord }).await? {
        CommandReply::Published(outcome) => Ok(Json(Some(outcome))),
        CommandReply::Ignored => Ok(Json(None)),
        _ => Err(ApiError::unexpected("key press")),
    }
}

pub async fn publish(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<PublishOutcome>, ApiError> {
    match state.dispatch(AppCommand::Publish { session_id }).await? {
        CommandReply::Published(outcome) => Ok(Json(outcome)),
        _ => Err(ApiError::unexpected("publish")),
    }
}

/// Raw request body is the file; the name travels in `X-File-Name`.
pub async fn attach(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AttachmentBinding>, ApiError> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing X-File-Name header"))?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream");

    let file = UploadFile::new(file_name, content_type, body.to_vec());
    match state.dispatch(AppCommand::Attach { session_id, file }).await? {
        CommandReply::Binding(b) => Ok(Json(b)),
        _ => Err(ApiError::unexpected("attach")),
    }
}

pub async fn detach(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Option<AttachmentRef>>, ApiError> {
    match state.dispatch(AppCommand::Detach { session_id }).await? {
        CommandReply::Detached(file) => Ok(Json(file)),
        _ => Err(ApiError::unexpected("detach")),
    }
}
