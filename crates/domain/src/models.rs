use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A content node (wiki page, research note, question) that owns a thread.
    NodeId
);
id_type!(CommentId);
id_type!(UserId);
id_type!(
    /// One open comment form. Never persisted.
    SessionId
);

/// A stored file as handed back by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub node_id: NodeId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub body: String,
    pub attachments: Vec<AttachmentRef>,
    /// Bumped by every body edit; the token for optimistic concurrency.
    pub version: u64,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Comment {
    pub fn new(
        id: CommentId,
        node_id: NodeId,
        parent_id: Option<CommentId>,
        author_id: UserId,
        body: String,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            node_id,
            parent_id,
            author_id,
            body,
            attachments: Vec::new(),
            version: 1,
            is_deleted: false,
            created_at,
            updated_at: None,
        }
    }
}

/// The reaction set offered by the comment toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Emoji {
    #[serde(rename = "+1")]
    ThumbsUp,
    #[serde(rename = "-1")]
    ThumbsDown,
    #[serde(rename = "laugh")]
    Laugh,
    #[serde(rename = "hooray")]
    Hooray,
    #[serde(rename = "confused")]
    Confused,
    #[serde(rename = "heart")]
    Heart,
}

impl Emoji {
    pub const ALL: [Emoji; 6] = [
        Emoji::ThumbsUp,
        Emoji::ThumbsDown,
        Emoji::Laugh,
        Emoji::Hooray,
        Emoji::Confused,
        Emoji::Heart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "+1",
            Emoji::ThumbsDown => "-1",
            Emoji::Laugh => "laugh",
            Emoji::Hooray => "hooray",
            Emoji::Confused => "confused",
            Emoji::Heart => "heart",
        }
    }

    /// Human label, e.g. "thumbs up".
    pub fn label(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "thumbs up",
            Emoji::ThumbsDown => "thumbs down",
            Emoji::Laugh => "laugh",
            Emoji::Hooray => "hooray",
            Emoji::Confused => "confused",
            Emoji::Heart => "heart",
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emoji {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Emoji::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("Unknown reaction: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reaction {
    pub comment_id: CommentId,
    pub user_id: UserId,
    pub emoji: Emoji,
}

/// Which surface a form session edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum SessionKind {
    New,
    Reply(CommentId),
    Edit(CommentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Closed,
    OpenEmpty,
    OpenDrafting,
    Previewing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Closed => "closed",
            SessionState::OpenEmpty => "empty",
            SessionState::OpenDrafting => "drafting",
            SessionState::Previewing => "previewing",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emoji_short_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Emoji::ThumbsUp).unwrap();
        assert_eq!(json, "\"+1\"");
        assert_eq!("heart".parse::<Emoji>().unwrap(), Emoji::Heart);
        assert!("thumbsup".parse::<Emoji>().is_err());
    }

    #[test]
    fn session_kind_uses_tagged_json() {
        let kind: SessionKind = serde_json::from_str(r#"{"type":"reply","target":42}"#).unwrap();
        assert_eq!(kind, SessionKind::Reply(CommentId::new(42)));

        let kind: SessionKind = serde_json::from_str(r#"{"type":"new"}"#).unwrap();
        assert_eq!(kind, SessionKind::New);
    }
}
