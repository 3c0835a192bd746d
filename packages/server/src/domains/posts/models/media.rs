use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{MediaId, PostId};

/// Uploaded file that posts can reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: MediaId,
    pub filetype: String,
    pub uri: String,
}

impl Media {
    pub async fn create(filetype: &str, uri: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Media>(
            r#"
            INSERT INTO media (id, filetype, uri)
            VALUES ($1, $2, $3)
            RETURNING id, filetype, uri
            "#,
        )
        .bind(MediaId::new())
        .bind(filetype)
        .bind(uri)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Media of a post, in attachment order.
    pub async fn find_for_post(post_id: PostId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Media>(
            r#"
            SELECT m.id, m.filetype, m.uri
            FROM media m
            INNER JOIN posts_media pm ON pm.media_id = m.id
            WHERE pm.post_id = $1
            ORDER BY pm.position
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
