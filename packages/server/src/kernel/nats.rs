//! NATS-backed event bus transport.
//!
//! A topic with N partitions maps onto N subjects `{topic}.{partition}`.
//! Publishing goes through the [`NatsPublisher`] trait so tests can swap in
//! [`TestNats`]; consuming subscribes to every partition subject.
//!
//! Core NATS does not retain messages: a reader sees what is published while
//! it is subscribed. Replay within a retention window needs a retaining
//! broker (the in-memory [`relay::MemoryBus`] behaves that way).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use relay::{BusError, PartitionSource, PartitionStream, Transport};

/// Subject carrying one partition of a topic.
pub fn partition_subject(topic: &str, partition: u32) -> String {
    format!("{}.{}", topic, partition)
}

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Trait for NATS publish operations.
#[async_trait]
pub trait NatsPublisher: Send + Sync {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}

/// Real NATS client publisher.
pub struct NatsClientPublisher {
    client: async_nats::Client,
}

impl NatsClientPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NatsPublisher for NatsClientPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client.publish(subject, payload).await?;
        Ok(())
    }
}

/// Mock NATS publisher that records what would have been published.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl NatsPublisher for TestNats {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
        Ok(())
    }
}

/// Producer side of the bus over NATS subjects.
pub struct NatsTransport {
    publisher: Arc<dyn NatsPublisher>,
    partitions: u32,
    next: AtomicUsize,
}

impl NatsTransport {
    pub fn new(publisher: Arc<dyn NatsPublisher>, partitions: u32) -> Self {
        Self {
            publisher,
            partitions: partitions.max(1),
            next: AtomicUsize::new(0),
        }
    }

    fn select(&self, key: Option<&str>) -> u32 {
        match key {
            Some(key) => relay::partition_for_key(key, self.partitions),
            None => (self.next.fetch_add(1, Ordering::Relaxed) % self.partitions as usize) as u32,
        }
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn send(&self, topic: &str, key: Option<&str>, payload: Bytes) -> Result<(), BusError> {
        let subject = partition_subject(topic, self.select(key));
        self.publisher
            .publish(subject, payload)
            .await
            .map_err(BusError::transport)
    }
}

/// Consumer side of the bus over NATS subjects.
pub struct NatsPartitionSource {
    client: async_nats::Client,
    partitions: u32,
}

impl NatsPartitionSource {
    pub fn new(client: async_nats::Client, partitions: u32) -> Self {
        Self {
            client,
            partitions: partitions.max(1),
        }
    }
}

#[async_trait]
impl PartitionSource for NatsPartitionSource {
    async fn partitions(&self, _topic: &str) -> Result<Vec<u32>, BusError> {
        Ok((0..self.partitions).collect())
    }

    async fn open(&self, topic: &str, partition: u32) -> Result<PartitionStream, BusError> {
        if partition >= self.partitions {
            return Err(BusError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        }

        let subscriber = self
            .client
            .subscribe(partition_subject(topic, partition))
            .await
            .map_err(BusError::transport)?;

        Ok(subscriber.map(|message| Ok(message.payload)).boxed())
    }
}
