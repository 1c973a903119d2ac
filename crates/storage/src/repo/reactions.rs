use crate::{models::SqlReaction, Db};
use chrono::Utc;
use domain::{CommentId, Reaction};

impl Db {
    pub async fn set_reaction(&self, r: &Reaction, present: bool) -> anyhow::Result<()> {
        if present {
            sqlx::query(
                r#"
                INSERT INTO reactions (comment_id, user_id, emoji, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(comment_id, user_id, emoji) DO NOTHING
                "#,
            )
            .bind(r.comment_id.get() as i64)
            .bind(r.user_id.get() as i64)
            .bind(r.emoji.as_str())
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM reactions WHERE comment_id = ? AND user_id = ? AND emoji = ?")
                .bind(r.comment_id.get() as i64)
                .bind(r.user_id.get() as i64)
                .bind(r.emoji.as_str())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn clear_reactions(&self, comment_id: CommentId) -> anyhow::Result<u64> {
        let done = sqlx::query("DELETE FROM reactions WHERE comment_id = ?")
            .bind(comment_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    pub async fn load_reactions(&self) -> anyhow::Result<Vec<Reaction>> {
        let rows: Vec<SqlReaction> =
            sqlx::query_as("SELECT comment_id, user_id, emoji FROM reactions ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Reaction::try_from).collect()
    }
}
