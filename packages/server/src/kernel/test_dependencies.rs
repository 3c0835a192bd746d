// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::cache::MemoryCache;
use super::{BaseCatalog, BaseMessenger, BasePostStore, EventIdSource, RandomEventIds, ServerDeps};
use crate::common::{EventId, PostId};
use crate::domains::posts::models::{CreatePost, Media, Post, PostFilters};

/// A due post with no tags, sources or media.
pub fn fake_post(title: &str, publish_date: DateTime<Utc>) -> Post {
    Post {
        id: PostId::new(),
        title: title.to_string(),
        content: format!("{} content", title),
        publish_date,
        tags: Vec::new(),
        sources: Vec::new(),
        media: Vec::new(),
    }
}

// =============================================================================
// Mock Post Store
// =============================================================================

/// Arguments captured from a find_published call
#[derive(Debug, Clone)]
pub struct FindCall {
    pub filters: PostFilters,
    pub offset: i64,
    pub limit: i64,
}

/// In-memory catalog. Queued pages, when present, are served before the
/// catalog is consulted.
#[derive(Default)]
pub struct MockPostStore {
    posts: Arc<Mutex<Vec<Post>>>,
    pages: Arc<Mutex<VecDeque<Vec<Post>>>>,
    created: Arc<Mutex<Vec<CreatePost>>>,
    find_calls: Arc<Mutex<Vec<FindCall>>>,
    fail_create: Arc<AtomicBool>,
    fail_find_on_call: Arc<Mutex<Option<usize>>>,
}

impl MockPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        self.posts.lock().unwrap().extend(posts);
        self
    }

    /// Queue a page to be returned by the next find_published call
    pub fn with_page(self, page: Vec<Post>) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    /// Make the `n`th find_published call (0-based) fail
    pub fn failing_find_on_call(self, n: usize) -> Self {
        *self.fail_find_on_call.lock().unwrap() = Some(n);
        self
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn add_post(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }

    /// Every creation request, failed ones included
    pub fn created(&self) -> Vec<CreatePost> {
        self.created.lock().unwrap().clone()
    }

    pub fn find_calls(&self) -> Vec<FindCall> {
        self.find_calls.lock().unwrap().clone()
    }

    fn matches(post: &Post, filters: &PostFilters, now: DateTime<Utc>) -> bool {
        let title = filters.title.as_ref().map(|t| t.to_lowercase());
        post.publish_date <= filters.published_to.unwrap_or(now)
            && filters.published_from.map_or(true, |from| post.publish_date >= from)
            && title.map_or(true, |t| post.title.to_lowercase().contains(&t))
            && (filters.tags.is_empty() || post.tags.iter().any(|t| filters.tags.contains(t)))
            && (filters.sources.is_empty()
                || post.sources.iter().any(|s| filters.sources.contains(s)))
    }
}

#[async_trait]
impl BasePostStore for MockPostStore {
    async fn create_post(&self, input: CreatePost) -> Result<Post> {
        self.created.lock().unwrap().push(input.clone());

        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("Mock post store is failing");
        }

        let post = Post {
            id: PostId::new(),
            title: input.title,
            content: input.content,
            publish_date: input.publish_date,
            tags: input.tags,
            sources: input.sources,
            media: input
                .media_ids
                .into_iter()
                .map(|id| Media {
                    id,
                    filetype: "image/jpeg".to_string(),
                    uri: format!("mock://media/{}", id),
                })
                .collect(),
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn find_published(
        &self,
        filters: &PostFilters,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let call_index = {
            let mut calls = self.find_calls.lock().unwrap();
            calls.push(FindCall {
                filters: filters.clone(),
                offset,
                limit,
            });
            calls.len() - 1
        };

        if *self.fail_find_on_call.lock().unwrap() == Some(call_index) {
            anyhow::bail!("Mock post store failed on call {}", call_index);
        }

        if let Some(page) = self.pages.lock().unwrap().pop_front() {
            return Ok(page);
        }

        let now = Utc::now();
        let mut matching: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| Self::matches(p, filters, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.publish_date.cmp(&a.publish_date).then(a.id.cmp(&b.id)));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

// =============================================================================
// Mock Catalog
// =============================================================================

#[derive(Default)]
pub struct MockCatalog {
    tags: Vec<String>,
    sources: Vec<String>,
    failing: AtomicBool,
    tag_calls: AtomicUsize,
    source_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub fn source_calls(&self) -> usize {
        self.source_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseCatalog for MockCatalog {
    async fn list_tags(&self) -> Result<Vec<String>> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Mock catalog is failing");
        }
        Ok(self.tags.clone())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        self.source_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Mock catalog is failing");
        }
        Ok(self.sources.clone())
    }
}

// =============================================================================
// Mock Messenger
// =============================================================================

/// Records successful sends as (destination, text)
#[derive(Default)]
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    failing: AtomicBool,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseMessenger for MockMessenger {
    async fn send_text(&self, destination: i64, text: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Mock messenger is failing");
        }
        self.sent.lock().unwrap().push((destination, text.to_string()));
        Ok(())
    }
}

// =============================================================================
// Sequential event ids
// =============================================================================

/// Deterministic ids 1, 2, 3, ... with configurable failures by call index.
#[derive(Default)]
pub struct SequenceEventIds {
    next: AtomicUsize,
    failing: HashSet<usize>,
}

impl SequenceEventIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given calls (0-based)
    pub fn failing_on(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(calls);
        self
    }
}

impl EventIdSource for SequenceEventIds {
    fn next_id(&self) -> Result<EventId> {
        let call = self.next.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            anyhow::bail!("Mock id source failed on call {}", call);
        }
        Ok(EventId::from_uuid(Uuid::from_u128(call as u128 + 1)))
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub posts: Arc<MockPostStore>,
    pub catalog: Arc<MockCatalog>,
    pub messenger: Arc<MockMessenger>,
    pub dedup_cache: Arc<MemoryCache>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            posts: Arc::new(MockPostStore::new()),
            catalog: Arc::new(MockCatalog::new()),
            messenger: Arc::new(MockMessenger::new()),
            dedup_cache: Arc::new(MemoryCache::new()),
        }
    }

    /// Set a mock post store
    pub fn mock_posts(mut self, posts: MockPostStore) -> Self {
        self.posts = Arc::new(posts);
        self
    }

    /// Set a mock catalog
    pub fn mock_catalog(mut self, catalog: MockCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn into_server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.posts.clone(),
            self.catalog.clone(),
            self.messenger.clone(),
            self.dedup_cache.clone(),
            Arc::new(RandomEventIds),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
