use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::{AppCommand, Comment, CommentId, NodeId, UserId};
use engine::CommandReply;
use serde::Deserialize;
use storage::ThreadEntry;

use crate::http::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub author_id: UserId,
    pub body: String,
    pub reply_to: Option<CommentId>,
}

#[derive(Deserialize)]
pub struct EditCommentRequest {
    pub body: String,
    pub expected_version: u64,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> Json<Vec<Comment>> {
    Json(state.engine.list_thread(node_id))
}

pub async fn thread_view(
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> Json<Vec<ThreadEntry>> {
    Json(state.engine.thread_view(node_id))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let cmd = AppCommand::CreateComment {
        node_id,
        author_id: payload.author_id,
        body: payload.body,
        parent_id: payload.reply_to,
    };
    match state.dispatch(cmd).await? {
        CommandReply::Comment(c) => Ok((StatusCode::CREATED, Json(c))),
        _ => Err(ApiError::unexpected("create comment")),
    }
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<CommentId>,
    Json(payload): Json<EditCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let cmd = AppCommand::EditComment {
        comment_id,
        body: payload.body,
        expected_version: payload.expected_version,
    };
    match state.dispatch(cmd).await? {
        CommandReply::Comment(c) => Ok(Json(c)),
        _ => Err(ApiError::unexpected("edit comment")),
    }
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<CommentId>,
) -> Result<StatusCode, ApiError> {
    match state.dispatch(AppCommand::DeleteComment { comment_id }).await? {
        CommandReply::Deleted => Ok(StatusCode::NO_CONTENT),
        _ => Err(ApiError::unexpected("delete comment")),
    }
}
