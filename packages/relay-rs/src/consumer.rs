//! Consumer side: one reader per partition, merged into a single channel.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::BusError;

/// Ordered stream of payloads from one partition.
///
/// An `Err` item is terminal for that partition's reader.
pub type PartitionStream = BoxStream<'static, Result<Bytes, BusError>>;

/// Inbound side of a message transport.
#[async_trait]
pub trait PartitionSource: Send + Sync + 'static {
    /// Partitions currently backing `topic`.
    async fn partitions(&self, topic: &str) -> Result<Vec<u32>, BusError>;

    /// Open a reader on one partition, starting from the oldest retained message.
    async fn open(&self, topic: &str, partition: u32) -> Result<PartitionStream, BusError>;
}

/// Subscribes to every partition of a topic and merges them.
pub struct Consumer {
    source: Arc<dyn PartitionSource>,
    topic: String,
}

impl Consumer {
    pub fn new(source: Arc<dyn PartitionSource>, topic: impl Into<String>) -> Self {
        Self {
            source,
            topic: topic.into(),
        }
    }

    /// Open all partitions and start one reader task per partition.
    ///
    /// Returns the merged channel. Messages of one partition keep their order;
    /// partitions interleave freely. A reader stops on its first error, on end
    /// of stream or on `shutdown`; the channel closes once all readers stopped.
    ///
    /// Failing to list or open partitions is returned to the caller since
    /// nothing has started yet.
    pub async fn start(
        &self,
        shutdown: CancellationToken,
    ) -> Result<mpsc::Receiver<Bytes>, BusError> {
        let partitions = self.source.partitions(&self.topic).await?;

        let mut streams = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let stream = self.source.open(&self.topic, partition).await?;
            streams.push((partition, stream));
        }

        let (sender, receiver) = mpsc::channel(streams.len().max(1));

        info!(topic = %self.topic, partitions = streams.len(), "consumer started");

        for (partition, stream) in streams {
            tokio::spawn(read_partition(
                self.topic.clone(),
                partition,
                stream,
                sender.clone(),
                shutdown.clone(),
            ));
        }

        // Readers hold the only senders left; the channel closes with the last one.
        drop(sender);

        Ok(receiver)
    }
}

async fn read_partition(
    topic: String,
    partition: u32,
    mut stream: PartitionStream,
    sender: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(payload)) => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    sent = sender.send(payload) => {
                        if sent.is_err() {
                            debug!(topic = %topic, partition, "merged channel closed");
                            break;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                error!(topic = %topic, partition, error = %e, "consumer error");
                break;
            }
            None => {
                debug!(topic = %topic, partition, "partition stream ended");
                break;
            }
        }
    }

    debug!(topic = %topic, partition, "partition reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::dispatch::Transport;
    use std::time::Duration;

    async fn recv(rx: &mut mpsc::Receiver<Bytes>) -> Option<Bytes> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for message")
    }

    #[tokio::test]
    async fn test_merges_all_partitions() {
        let bus = MemoryBus::new(3);
        for key in ["a", "b", "c", "d"] {
            bus.send("posts", Some(key), Bytes::from(key)).await.unwrap();
        }

        let consumer = Consumer::new(Arc::new(bus.clone()), "posts");
        let mut rx = consumer.start(CancellationToken::new()).await.unwrap();

        let mut got = Vec::new();
        for _ in 0..4 {
            got.push(recv(&mut rx).await.unwrap());
        }
        got.sort();
        assert_eq!(got, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_preserves_order_within_partition() {
        let bus = MemoryBus::new(4);
        for i in 0..20 {
            bus.send("posts", Some("same-key"), Bytes::from(i.to_string()))
                .await
                .unwrap();
        }

        let consumer = Consumer::new(Arc::new(bus), "posts");
        let mut rx = consumer.start(CancellationToken::new()).await.unwrap();

        for i in 0..20 {
            assert_eq!(recv(&mut rx).await.unwrap(), i.to_string());
        }
    }

    #[tokio::test]
    async fn test_failed_partition_does_not_stop_others() {
        let bus = MemoryBus::new(2);
        bus.fail_partition("posts", 0, "disk on fire").unwrap();
        bus.send_to_partition("posts", 0, Bytes::from("never seen")).unwrap();
        bus.send_to_partition("posts", 1, Bytes::from("one")).unwrap();

        let consumer = Consumer::new(Arc::new(bus.clone()), "posts");
        let mut rx = consumer.start(CancellationToken::new()).await.unwrap();

        assert_eq!(recv(&mut rx).await.unwrap(), "one");

        bus.send_to_partition("posts", 1, Bytes::from("two")).unwrap();
        assert_eq!(recv(&mut rx).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_channel_closes_when_all_readers_stop() {
        let bus = MemoryBus::new(2);
        bus.fail_partition("posts", 0, "gone").unwrap();
        bus.fail_partition("posts", 1, "gone").unwrap();

        let consumer = Consumer::new(Arc::new(bus), "posts");
        let mut rx = consumer.start(CancellationToken::new()).await.unwrap();

        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let bus = MemoryBus::new(2);
        let shutdown = CancellationToken::new();

        let consumer = Consumer::new(Arc::new(bus), "posts");
        let mut rx = consumer.start(shutdown.clone()).await.unwrap();

        shutdown.cancel();
        assert!(recv(&mut rx).await.is_none());
    }
}
