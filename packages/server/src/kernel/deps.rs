//! Server dependencies for domain code (using traits for testability)
//!
//! This module provides the central dependency container used by the scan,
//! the conversation and the delivery handlers. All external services use
//! trait abstractions to enable testing.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use telegram::models::{ParseMode, SendMessage};
use telegram::TelegramService;

use crate::domains::posts::models::{CreatePost, Post, PostFilters, Source, Tag};
use crate::kernel::{BaseCatalog, BaseDedupCache, BaseMessenger, BasePostStore, EventIdSource};

// =============================================================================
// TelegramService Adapter (implements BaseMessenger trait)
// =============================================================================

/// Wrapper around TelegramService that implements BaseMessenger trait
pub struct TelegramAdapter(pub Arc<TelegramService>);

impl TelegramAdapter {
    pub fn new(service: Arc<TelegramService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseMessenger for TelegramAdapter {
    async fn send_text(&self, destination: i64, text: &str) -> Result<()> {
        let message = SendMessage {
            chat_id: destination,
            text: text.to_string(),
            parse_mode: Some(ParseMode::Html),
            reply_markup: None,
        };
        self.0
            .send_message(&message)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// Postgres catalog (implements BasePostStore + BaseCatalog)
// =============================================================================

/// Content catalog backed by the `posts` tables.
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BasePostStore for PgPostStore {
    async fn create_post(&self, input: CreatePost) -> Result<Post> {
        Post::create(input, &self.pool).await
    }

    async fn find_published(
        &self,
        filters: &PostFilters,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>> {
        Post::find_published(filters, offset, limit, &self.pool).await
    }
}

#[async_trait]
impl BaseCatalog for PgPostStore {
    async fn list_tags(&self) -> Result<Vec<String>> {
        let tags = Tag::find_all(&self.pool).await?;
        Ok(tags.into_iter().map(|t| t.tag).collect())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let sources = Source::find_all(&self.pool).await?;
        Ok(sources.into_iter().map(|s| s.source).collect())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to domain code (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub posts: Arc<dyn BasePostStore>,
    pub catalog: Arc<dyn BaseCatalog>,
    /// Delivery channel for published posts
    pub messenger: Arc<dyn BaseMessenger>,
    /// Dedup records of the delivery handlers
    pub dedup_cache: Arc<dyn BaseDedupCache>,
    pub event_ids: Arc<dyn EventIdSource>,
}

impl ServerDeps {
    pub fn new(
        posts: Arc<dyn BasePostStore>,
        catalog: Arc<dyn BaseCatalog>,
        messenger: Arc<dyn BaseMessenger>,
        dedup_cache: Arc<dyn BaseDedupCache>,
        event_ids: Arc<dyn EventIdSource>,
    ) -> Self {
        Self {
            posts,
            catalog,
            messenger,
            dedup_cache,
            event_ids,
        }
    }
}
