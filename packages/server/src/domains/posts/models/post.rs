use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::common::{MediaId, PostId};

use super::media::Media;

/// A scheduled post with its tags, sources and media resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub publish_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub media: Vec<Media>,
}

/// Input for [`Post::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub publish_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    /// Existing media rows, in display order.
    pub media_ids: Vec<MediaId>,
}

/// Optional filters for [`Post::find_published`]. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilters {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub published_from: Option<DateTime<Utc>>,
    /// Upper bound on the publish date. Unset means the database clock.
    pub published_to: Option<DateTime<Utc>>,
    /// Post has at least one of these tags.
    pub tags: Vec<String>,
    /// Post has at least one of these sources.
    pub sources: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: PostId,
    title: String,
    content: String,
    publish_date: DateTime<Utc>,
    tags: Vec<String>,
    sources: Vec<String>,
    media: Json<Vec<Media>>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            publish_date: row.publish_date,
            tags: row.tags,
            sources: row.sources,
            media: row.media.0,
        }
    }
}

// Tags and sources come back sorted; media in attachment order.
const POST_COLUMNS: &str = r#"
    p.id, p.title, p.content, p.publish_date,
    ARRAY(SELECT pt.tag FROM posts_tags pt WHERE pt.post_id = p.id ORDER BY pt.tag) AS tags,
    ARRAY(SELECT ps.source FROM posts_sources ps
          WHERE ps.post_id = p.id ORDER BY ps.source) AS sources,
    COALESCE(
        (SELECT jsonb_agg(
                    jsonb_build_object('id', m.id, 'filetype', m.filetype, 'uri', m.uri)
                    ORDER BY pm.position)
         FROM posts_media pm
         INNER JOIN media m ON m.id = pm.media_id
         WHERE pm.post_id = p.id),
        '[]'::jsonb
    ) AS media
"#;

impl Post {
    /// Create a post and link its tags, sources and media in one transaction.
    ///
    /// Unknown tags and sources are added to the catalog. Media must already
    /// exist; a dangling media id fails the whole transaction.
    pub async fn create(input: CreatePost, pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await?;
        let id = PostId::new();

        sqlx::query("INSERT INTO tags (tag) SELECT UNNEST($1::text[]) ON CONFLICT DO NOTHING")
            .bind(&input.tags)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO sources (source) SELECT UNNEST($1::text[]) ON CONFLICT DO NOTHING")
            .bind(&input.sources)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, publish_date)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.publish_date)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO posts_tags (post_id, tag) SELECT DISTINCT $1::uuid, UNNEST($2::text[])",
        )
        .bind(id)
        .bind(&input.tags)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO posts_sources (post_id, source)
            SELECT DISTINCT $1::uuid, UNNEST($2::text[])
            "#,
        )
        .bind(id)
        .bind(&input.sources)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO posts_media (post_id, media_id, position)
            SELECT $1, m.id, m.ord::int
            FROM UNNEST($2::uuid[]) WITH ORDINALITY AS m(id, ord)
            "#,
        )
        .bind(id)
        .bind(&input.media_ids)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    pub async fn find_by_id(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Posts whose publish date has arrived, newest first, paged.
    ///
    /// "Arrived" is `published_to` when set, otherwise the database's `NOW()`.
    /// Callers that also pass `published_from` should set both from the same
    /// clock.
    pub async fn find_published(
        filters: &PostFilters,
        offset: i64,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            WHERE p.publish_date <= COALESCE($5::timestamptz, NOW())
              AND ($1::text IS NULL OR p.title ILIKE '%' || $1 || '%')
              AND ($2::timestamptz IS NULL OR p.publish_date >= $2)
              AND (cardinality($3::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM posts_tags f WHERE f.post_id = p.id AND f.tag = ANY($3)))
              AND (cardinality($4::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM posts_sources f WHERE f.post_id = p.id AND f.source = ANY($4)))
            ORDER BY p.publish_date DESC, p.id
            OFFSET $6
            LIMIT $7
            "#
        ))
        .bind(filters.title.as_deref())
        .bind(filters.published_from)
        .bind(&filters.tags)
        .bind(&filters.sources)
        .bind(filters.published_to)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
