use crate::models::{CommentId, Emoji, NodeId, SessionId, SessionKind, UploadFile, UserId};
use crate::protocol::KeyChord;

#[derive(Debug)]
pub enum AppCommand {
    CreateComment {
        node_id: NodeId,
        author_id: UserId,
        body: String,
        parent_id: Option<CommentId>,
    },
    EditComment {
        comment_id: CommentId,
        body: String,
        expected_version: u64,
    },
    DeleteComment {
        comment_id: CommentId,
    },
    ToggleReaction {
        comment_id: CommentId,
        user_id: UserId,
        emoji: Emoji,
    },
    OpenSession {
        node_id: NodeId,
        author_id: UserId,
        kind: SessionKind,
    },
    TypeText {
        session_id: SessionId,
        text: String,
    },
    TogglePreview {
        session_id: SessionId,
    },
    RefreshEditBase {
        session_id: SessionId,
    },
    Attach {
        session_id: SessionId,
        file: UploadFile,
    },
    Detach {
        session_id: SessionId,
    },
    KeyPress {
        session_id: SessionId,
        chord: KeyChord,
    },
    Publish {
        session_id: SessionId,
    },
    Cancel {
        session_id: SessionId,
    },
}

impl AppCommand {
    /// Commands that wait on the upload collaborator.
    pub fn is_upload(&self) -> bool {
        matches!(self, AppCommand::Attach { .. })
    }
}
