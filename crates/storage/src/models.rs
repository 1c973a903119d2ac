use anyhow::Context;
use chrono::NaiveDateTime;
use domain::{AttachmentRef, Comment, CommentId, Emoji, NodeId, Reaction, UserId};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlComment {
    pub id: i64,
    pub node_id: i64,
    pub parent_id: Option<i64>,
    pub author_id: i64,
    pub body: String,
    // JSON array of AttachmentRef
    pub attachments: String,
    pub version: i64,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl TryFrom<SqlComment> for Comment {
    type Error = anyhow::Error;

    fn try_from(sql: SqlComment) -> anyhow::Result<Self> {
        let attachments: Vec<AttachmentRef> = serde_json::from_str(&sql.attachments)
            .with_context(|| format!("Corrupt attachments column for comment {}", sql.id))?;
        Ok(Comment {
            id: CommentId::new(sql.id as u64),
            node_id: NodeId::new(sql.node_id as u64),
            parent_id: sql.parent_id.map(|p| CommentId::new(p as u64)),
            author_id: UserId::new(sql.author_id as u64),
            body: sql.body,
            attachments,
            version: sql.version as u64,
            is_deleted: sql.is_deleted,
            created_at: sql.created_at,
            updated_at: sql.updated_at,
        })
    }
}

#[derive(FromRow)]
pub struct SqlReaction {
    pub comment_id: i64,
    pub user_id: i64,
    pub emoji: String,
}

impl TryFrom<SqlReaction> for Reaction {
    type Error = anyhow::Error;

    fn try_from(sql: SqlReaction) -> anyhow::Result<Self> {
        let emoji: Emoji = sql.emoji.parse().map_err(anyhow::Error::msg)?;
        Ok(Reaction {
            comment_id: CommentId::new(sql.comment_id as u64),
            user_id: UserId::new(sql.user_id as u64),
            emoji,
        })
    }
}
