use axum::{
    extract::{Path, State},
    Json,
};
use domain::{AppCommand, CommentId, Emoji, UserId};
use engine::CommandReply;
use serde::Deserialize;
use storage::ReactionSummary;

use crate::http::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ToggleReactionRequest {
    pub user_id: UserId,
    pub emoji: Emoji,
}

pub async fn list_reactions(
    State(state): State<AppState>,
    Path(comment_id): Path<CommentId>,
) -> Result<Json<Vec<ReactionSummary>>, ApiError> {
    Ok(Json(state.engine.reactions(comment_id)?))
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(comment_id): Path<CommentId>,
    Json(payload): Json<ToggleReactionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cmd = AppCommand::ToggleReaction {
        comment_id,
        user_id: payload.user_id,
        emoji: payload.emoji,
    };
    match state.dispatch(cmd).await? {
        CommandReply::Reaction(present) => Ok(Json(serde_json::json!({
            "emoji": payload.emoji,
            "present": present,
        }))),
        _ => Err(ApiError::unexpected("toggle reaction")),
    }
}
