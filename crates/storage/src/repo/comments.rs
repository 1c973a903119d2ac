use crate::{models::SqlComment, Db};
use anyhow::Context;
use domain::Comment;

const SELECT_COMMENTS: &str = r#"
    SELECT id, node_id, parent_id, author_id, body, attachments,
           version, is_deleted, created_at, updated_at
    FROM comments
"#;

impl Db {
    // 写入评论：多个连接的写入可能乱序到达，旧快照不得覆盖新行
    // 1. 删除总是生效
    // 2. 版本号更高的覆盖
    // 3. 同一版本内附件只增不减，附件更多的才是新快照
    pub async fn upsert_comment(&self, c: &Comment) -> anyhow::Result<()> {
        let attachments = serde_json::to_string(&c.attachments)?;

        sqlx::query(
            r#"
            INSERT INTO comments (
                id, node_id, parent_id, author_id, body, attachments,
                version, is_deleted, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                attachments = excluded.attachments,
                version = excluded.version,
                is_deleted = excluded.is_deleted,
                updated_at = excluded.updated_at
            WHERE excluded.is_deleted
               OR excluded.version > comments.version
               OR (excluded.version = comments.version
                   AND NOT comments.is_deleted
                   AND json_array_length(excluded.attachments)
                       >= json_array_length(comments.attachments))
            "#,
        )
        .bind(c.id.get() as i64)
        .bind(c.node_id.get() as i64)
        .bind(c.parent_id.map(|p| p.get() as i64))
        .bind(c.author_id.get() as i64)
        .bind(&c.body)
        .bind(attachments)
        .bind(c.version as i64)
        .bind(c.is_deleted)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to persist comment {}", c.id))?;

        Ok(())
    }

    /// 全部行（含墓碑），按创建顺序。
    pub async fn load_comments(&self) -> anyhow::Result<Vec<Comment>> {
        let rows: Vec<SqlComment> =
            sqlx::query_as(&format!("{} ORDER BY id ASC", SELECT_COMMENTS))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Comment::try_from).collect()
    }
}
