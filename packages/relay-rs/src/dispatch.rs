//! Fire-and-forget producer side of the relay.
//!
//! [`AsyncDispatcher::dispatch`] serializes an event, pushes it into a bounded
//! buffer and returns immediately. A background task drains the buffer into a
//! [`Transport`]. Nothing is ever propagated back to the caller: every failure
//! is logged and counted in [`DispatchStats`] so that lost events stay
//! diagnosable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::BusError;

/// Default number of events buffered between `dispatch` and the transport.
pub const DEFAULT_BUFFER: usize = 1024;

/// Outbound side of a message transport.
///
/// `key` selects the partition when present (same key, same partition);
/// keyless messages are spread by the transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, topic: &str, key: Option<&str>, payload: Bytes) -> Result<(), BusError>;
}

/// Counters for everything that went through a dispatcher.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    /// Events handed to `dispatch`.
    pub dispatched: u64,
    /// Events accepted by the transport.
    pub sent: u64,
    /// Events lost to serialization, a full buffer or a transport failure.
    pub dropped: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

struct Outgoing {
    key: Option<String>,
    payload: Bytes,
}

/// Non-blocking, topic-bound event producer.
///
/// Cloning shares the buffer and the counters. The background task stops once
/// every clone has been dropped and the buffer is drained.
///
/// # Example
///
/// ```ignore
/// let bus = MemoryBus::new(3);
/// let (dispatcher, _task) = AsyncDispatcher::spawn(Arc::new(bus.clone()), "published_posts");
///
/// dispatcher.dispatch_keyed(post_id.to_string(), &event);
/// ```
#[derive(Clone)]
pub struct AsyncDispatcher {
    topic: Arc<str>,
    sender: mpsc::Sender<Outgoing>,
    stats: Arc<DispatchStats>,
}

impl AsyncDispatcher {
    /// Start a dispatcher for `topic` with the default buffer size.
    pub fn spawn<T: Transport>(
        transport: Arc<T>,
        topic: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        Self::with_buffer(transport, topic, DEFAULT_BUFFER)
    }

    /// Start a dispatcher whose buffer holds at most `buffer` pending events.
    pub fn with_buffer<T: Transport>(
        transport: Arc<T>,
        topic: impl Into<String>,
        buffer: usize,
    ) -> (Self, JoinHandle<()>) {
        let topic: Arc<str> = Arc::from(topic.into());
        let stats = Arc::new(DispatchStats::default());
        let (sender, receiver) = mpsc::channel(buffer.max(1));

        let task = tokio::spawn(forward(
            transport,
            Arc::clone(&topic),
            receiver,
            Arc::clone(&stats),
        ));

        (
            Self {
                topic,
                sender,
                stats,
            },
            task,
        )
    }

    /// Topic this dispatcher produces to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serialize and enqueue an event without a partition key.
    pub fn dispatch<E: Serialize + ?Sized>(&self, event: &E) {
        self.enqueue(None, event);
    }

    /// Serialize and enqueue an event; events sharing `key` share a partition.
    pub fn dispatch_keyed<E: Serialize + ?Sized>(&self, key: impl Into<String>, event: &E) {
        self.enqueue(Some(key.into()), event);
    }

    /// Shared counters for this dispatcher and all its clones.
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    fn enqueue<E: Serialize + ?Sized>(&self, key: Option<String>, event: &E) {
        self.stats.record_dispatched();

        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                self.stats.record_dropped();
                error!(topic = %self.topic, error = %BusError::from(e), "unable to marshal event");
                return;
            }
        };

        if let Err(e) = self.sender.try_send(Outgoing { key, payload }) {
            self.stats.record_dropped();
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => BusError::BufferFull,
                mpsc::error::TrySendError::Closed(_) => BusError::Closed,
            };
            error!(topic = %self.topic, error = %reason, "event dropped");
        }
    }
}

impl std::fmt::Debug for AsyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDispatcher")
            .field("topic", &self.topic)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

async fn forward<T: Transport>(
    transport: Arc<T>,
    topic: Arc<str>,
    mut receiver: mpsc::Receiver<Outgoing>,
    stats: Arc<DispatchStats>,
) {
    while let Some(Outgoing { key, payload }) = receiver.recv().await {
        match transport.send(&topic, key.as_deref(), payload).await {
            Ok(()) => stats.record_sent(),
            Err(e) => {
                stats.record_dropped();
                warn!(topic = %topic, error = %e, "transport rejected event");
            }
        }
    }

    debug!(topic = %topic, "dispatcher drained");
}
