use crate::models::{Comment, CommentId, Emoji, NodeId, UserId};
use serde::{Deserialize, Serialize};

/// Notifications for the presentation layer; wording of toasts is its concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ThreadEvent {
    CommentCreated {
        node_id: NodeId,
        comment: Comment,
    },
    CommentUpdated {
        node_id: NodeId,
        comment: Comment,
    },
    CommentDeleted {
        node_id: NodeId,
        comment_id: CommentId,
    },
    ReactionToggled {
        node_id: NodeId,
        comment_id: CommentId,
        user_id: UserId,
        emoji: Emoji,
        present: bool,
    },
}

impl ThreadEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            ThreadEvent::CommentCreated { node_id, .. }
            | ThreadEvent::CommentUpdated { node_id, .. }
            | ThreadEvent::CommentDeleted { node_id, .. }
            | ThreadEvent::ReactionToggled { node_id, .. } => *node_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThreadEvent::CommentCreated { .. } => "comment_created",
            ThreadEvent::CommentUpdated { .. } => "comment_updated",
            ThreadEvent::CommentDeleted { .. } => "comment_deleted",
            ThreadEvent::ReactionToggled { .. } => "reaction_toggled",
        }
    }
}
