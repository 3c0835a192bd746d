use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub tag: String,
}

impl Tag {
    /// All known tags, alphabetically. An empty catalog is an empty vector.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Tag>("SELECT tag FROM tags ORDER BY tag")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert the tag if it does not exist yet.
    pub async fn upsert(tag: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (tag) VALUES ($1)
            ON CONFLICT (tag) DO UPDATE SET tag = EXCLUDED.tag
            RETURNING tag
            "#,
        )
        .bind(tag)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
