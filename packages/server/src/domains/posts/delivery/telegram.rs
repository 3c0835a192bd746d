//! Delivers published posts to the Telegram channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay::Handler;
use tracing::{debug, error, info, warn};

use crate::domains::posts::events::{PublishedPost, PublishedPostEvent};
use crate::kernel::{BaseDedupCache, BaseMessenger};

use super::guard::{DeliveryError, DeliveryGuard, DeliveryOutcome};

/// Dedup record of the Telegram channel.
pub const TG_DEDUP_KEY: &str = "tgAlreadyPublished";

/// Matches the event retention upstream: older events are never replayed.
pub const TG_DEDUP_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// `<b>title</b>`, content, space-separated tags and footer, separated by
/// blank lines. Sent with HTML parse mode; the text is not escaped.
pub fn render_post(post: &PublishedPost, footer: &str) -> String {
    format!(
        "<b>{}</b>\n\n{}\n\n{}\n\n{}",
        post.title,
        post.content,
        post.tags.join(" "),
        footer
    )
}

#[derive(Debug, Clone)]
pub struct TelegramChannel {
    pub chat_id: i64,
    pub footer: String,
    /// Posts are routed here when their sources contain this name.
    pub source_name: String,
}

pub struct TelegramPublishHandler {
    messenger: Arc<dyn BaseMessenger>,
    guard: DeliveryGuard,
    channel: TelegramChannel,
}

impl TelegramPublishHandler {
    pub fn new(
        messenger: Arc<dyn BaseMessenger>,
        cache: Arc<dyn BaseDedupCache>,
        channel: TelegramChannel,
    ) -> Self {
        Self {
            messenger,
            guard: DeliveryGuard::new(cache, TG_DEDUP_KEY, TG_DEDUP_TTL),
            channel,
        }
    }

    /// Deliver one event. `None` when the post is not meant for this channel.
    pub async fn publish(
        &self,
        event: &PublishedPostEvent,
    ) -> Result<Option<DeliveryOutcome>, DeliveryError> {
        let post = &event.data;
        if !post.sources.iter().any(|s| s == &self.channel.source_name) {
            debug!(post_id = %post.id, "Post not routed to Telegram");
            return Ok(None);
        }

        let text = render_post(post, &self.channel.footer);
        let outcome = self
            .guard
            .deliver_once(post.id, || self.messenger.send_text(self.channel.chat_id, &text))
            .await?;
        Ok(Some(outcome))
    }
}

#[async_trait]
impl Handler for TelegramPublishHandler {
    async fn handle(&self, payload: &[u8]) {
        let event: PublishedPostEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Dropping malformed published post event");
                return;
            }
        };

        match self.publish(&event).await {
            Ok(Some(DeliveryOutcome::Delivered)) => {
                info!(
                    post_id = %event.data.id,
                    event_id = %event.event_id,
                    "Post published to Telegram"
                );
            }
            Ok(Some(DeliveryOutcome::AlreadyDelivered)) | Ok(None) => {}
            Err(e) => {
                error!(
                    post_id = %event.data.id,
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to publish post to Telegram"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::cache::MemoryCache;
    use crate::kernel::test_dependencies::{fake_post, MockMessenger};
    use crate::common::EventId;
    use chrono::Utc;

    const CHAT: i64 = -100123;

    fn handler(messenger: Arc<MockMessenger>) -> TelegramPublishHandler {
        TelegramPublishHandler::new(
            messenger,
            Arc::new(MemoryCache::new()),
            TelegramChannel {
                chat_id: CHAT,
                footer: "@poster".to_string(),
                source_name: "Telegram".to_string(),
            },
        )
    }

    fn event(sources: &[&str]) -> PublishedPostEvent {
        let mut post = fake_post("Title", Utc::now());
        post.tags = vec!["#news".to_string(), "#city".to_string()];
        post.sources = sources.iter().map(|s| s.to_string()).collect();
        PublishedPostEvent::new(EventId::new(), Utc::now(), post)
    }

    #[test]
    fn test_render_post() {
        let event = event(&["Telegram"]);
        assert_eq!(
            render_post(&event.data, "@poster"),
            format!("<b>Title</b>\n\n{}\n\n#news #city\n\n@poster", event.data.content)
        );
    }

    #[test]
    fn test_render_post_without_tags_or_footer() {
        let mut event = event(&[]);
        event.data.tags.clear();
        event.data.content = "Body".to_string();
        assert_eq!(render_post(&event.data, ""), "<b>Title</b>\n\nBody\n\n\n\n");
    }

    #[tokio::test]
    async fn test_same_post_is_sent_once() {
        let messenger = Arc::new(MockMessenger::new());
        let handler = handler(messenger.clone());
        let first = event(&["Telegram"]);
        let mut replay = event(&["Telegram"]);
        replay.data = first.data.clone();

        handler.handle(&serde_json::to_vec(&first).unwrap()).await;
        handler.handle(&serde_json::to_vec(&replay).unwrap()).await;

        assert_eq!(messenger.send_count(), 1);
        let sent = messenger.sent();
        assert_eq!(sent[0].0, CHAT);
        assert!(sent[0].1.starts_with("<b>Title</b>"));
    }

    #[tokio::test]
    async fn test_other_sources_are_skipped() {
        let messenger = Arc::new(MockMessenger::new());
        let handler = handler(messenger.clone());

        let outcome = handler.publish(&event(&["Site"])).await.unwrap();

        assert_eq!(outcome, None);
        assert_eq!(messenger.send_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let messenger = Arc::new(MockMessenger::new());
        let handler = handler(messenger.clone());

        handler.handle(b"{\"event_id\": 1").await;
        handler.handle(&serde_json::to_vec(&event(&["Telegram"])).unwrap()).await;

        assert_eq!(messenger.send_count(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_retries_on_next_event() {
        let messenger = Arc::new(MockMessenger::new());
        let handler = handler(messenger.clone());
        let event = event(&["Telegram"]);

        messenger.set_failing(true);
        let err = handler.publish(&event).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Deliver(_)));

        messenger.set_failing(false);
        let outcome = handler.publish(&event).await.unwrap();
        assert_eq!(outcome, Some(DeliveryOutcome::Delivered));
        assert_eq!(messenger.send_count(), 1);
    }
}
