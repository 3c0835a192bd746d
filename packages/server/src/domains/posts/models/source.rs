use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A delivery destination a post can be routed to (e.g. "Telegram").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub source: String,
}

impl Source {
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Source>("SELECT source FROM sources ORDER BY source")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn upsert(source: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Source>(
            r#"
            INSERT INTO sources (source) VALUES ($1)
            ON CONFLICT (source) DO UPDATE SET source = EXCLUDED.source
            RETURNING source
            "#,
        )
        .bind(source)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
