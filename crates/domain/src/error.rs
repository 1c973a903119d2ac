use crate::models::{CommentId, NodeId, SessionId, SessionState};
use thiserror::Error;

/// Failures surfaced to the UI boundary. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("Comment {parent} is not a live comment of node {node}")]
    InvalidParent { node: NodeId, parent: CommentId },

    /// Never auto-merged: re-fetch and try again.
    #[error("Comment {id} is at version {current}, edit was based on {expected}")]
    VersionConflict {
        id: CommentId,
        expected: u64,
        current: u64,
    },

    #[error("Comment {0} not found")]
    NotFound(CommentId),

    #[error("Comment body is empty")]
    EmptyBody,

    #[error("Session {0} is not open")]
    SessionClosed(SessionId),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Session {session} cannot {action} while {state}")]
    InvalidTransition {
        session: SessionId,
        action: &'static str,
        state: SessionState,
    },

    #[error("Attachment for session {0} was replaced by a newer upload")]
    AttachmentSuperseded(SessionId),
}
