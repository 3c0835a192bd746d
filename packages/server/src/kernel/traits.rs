// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The conversation, the scan and the delivery handlers are domain code that
// depend on these traits, never on Postgres/Redis/Telegram directly.
//
// Naming convention: Base* for trait names (e.g., BasePostStore, BaseMessenger)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::common::EventId;
use crate::domains::posts::models::{CreatePost, Post, PostFilters};

// =============================================================================
// Content catalog
// =============================================================================

#[async_trait]
pub trait BasePostStore: Send + Sync {
    /// Persist a finished draft.
    async fn create_post(&self, input: CreatePost) -> Result<Post>;

    /// Posts with `publish_date <= now`, newest first, narrowed by `filters`.
    async fn find_published(
        &self,
        filters: &PostFilters,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>>;
}

/// Names offered as checkboxes while authoring. Empty is a valid answer.
#[async_trait]
pub trait BaseCatalog: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<String>>;

    async fn list_sources(&self) -> Result<Vec<String>>;
}

// =============================================================================
// Delivery channel
// =============================================================================

#[async_trait]
pub trait BaseMessenger: Send + Sync {
    /// Send pre-rendered text to a destination chat.
    async fn send_text(&self, destination: i64, text: &str) -> Result<()>;
}

// =============================================================================
// Key-value cache (dedup records)
// =============================================================================

#[async_trait]
pub trait BaseDedupCache: Send + Sync {
    /// `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set_with_expiration(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

// =============================================================================
// Event identity
// =============================================================================

/// Source of fresh event ids. Fallible so that a broken generator only costs
/// the event being built.
pub trait EventIdSource: Send + Sync {
    fn next_id(&self) -> Result<EventId>;
}

/// Random v4 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomEventIds;

impl EventIdSource for RandomEventIds {
    fn next_id(&self) -> Result<EventId> {
        Ok(EventId::new())
    }
}
