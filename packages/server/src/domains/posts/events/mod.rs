//! Wire events of the posts domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::common::{EventId, PostId};
use crate::domains::posts::models::{Media, Post};

/// A post whose publish time has arrived.
///
/// `event_id` is unique per emission, not per post: the scheduled scan
/// re-emits posts from overlapping windows. Consumers that must act once
/// per post key on `data.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPostEvent {
    pub event_id: EventId,
    pub created_at: DateTime<Utc>,
    pub data: PublishedPost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub publish_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub media: Vec<Media>,
}

impl PublishedPostEvent {
    pub fn new(event_id: EventId, created_at: DateTime<Utc>, post: Post) -> Self {
        Self {
            event_id,
            created_at,
            data: post.into(),
        }
    }

    /// Partition key: every emission of one post lands on one partition.
    pub fn key(&self) -> String {
        self.data.id.to_string()
    }
}

impl From<Post> for PublishedPost {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            publish_date: post.publish_date,
            tags: post.tags,
            sources: post.sources,
            media: post.media,
        }
    }
}
