//! Test fixtures for creating test data.
//!
//! Names carry a random suffix so tests sharing the database never see each
//! other's rows through a filter.

use anyhow::Result;
use chrono::{DateTime, Utc};
use poster_core::domains::posts::models::{CreatePost, Post};
use poster_core::common::MediaId;
use sqlx::PgPool;
use uuid::Uuid;

/// A name unique to this test run, e.g. `news-3f2a9c1e`.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

pub fn create_post_input(
    title: &str,
    publish_date: DateTime<Utc>,
    tags: &[&str],
    sources: &[&str],
) -> CreatePost {
    CreatePost {
        title: title.to_string(),
        content: format!("{} content", title),
        publish_date,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        media_ids: Vec::<MediaId>::new(),
    }
}

pub async fn create_test_post(
    pool: &PgPool,
    title: &str,
    publish_date: DateTime<Utc>,
    tags: &[&str],
    sources: &[&str],
) -> Result<Post> {
    Post::create(create_post_input(title, publish_date, tags, sources), pool).await
}
