mod commands;
mod error;
mod events;
mod models;
pub mod protocol;

pub use commands::AppCommand;
pub use error::CommentError;
pub use events::ThreadEvent;
pub use models::{
    AttachmentRef, Comment, CommentId, Emoji, NodeId, Reaction, SessionId, SessionKind,
    SessionState, UploadFile, UserId,
};
