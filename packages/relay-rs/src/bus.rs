//! In-memory, partitioned, replayable topic log.
//!
//! # Guarantees
//!
//! - **Retained**: messages stay in their partition log, either for the life
//!   of the bus or up to a per-partition count set with
//!   [`MemoryBus::with_retention`]. Each new reader starts from the oldest
//!   retained message, like a broker consumer opened at the oldest offset. A
//!   reader that falls behind the retention skips ahead to the oldest
//!   message still kept.
//! - **Per-partition order**: a partition is an append-only log.
//! - **Keyed placement**: the same key always lands on the same partition;
//!   keyless messages are spread round-robin.
//!
//! Used by tests and single-process deployments; the latter should bound the
//! log with a retention. It implements both
//! [`Transport`] and [`PartitionSource`], so a dispatcher and a consumer can
//! share one instance.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::consumer::{PartitionSource, PartitionStream};
use crate::dispatch::Transport;
use crate::error::BusError;

/// Default number of partitions per topic.
const DEFAULT_PARTITIONS: u32 = 1;

/// Stable (per process) partition for a message key.
///
/// Shared by every transport so that a key maps to the same partition
/// whichever backend carries it.
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % u64::from(partitions.max(1))) as u32
}

#[derive(Clone)]
enum Entry {
    Message(Bytes),
    Fault(String),
}

/// Retained tail of a partition. `base` is the offset of the first entry.
#[derive(Default)]
struct Log {
    base: usize,
    entries: VecDeque<Entry>,
}

#[derive(Default)]
struct Partition {
    log: RwLock<Log>,
    appended: Notify,
    retention: Option<usize>,
}

impl Partition {
    fn new(retention: Option<usize>) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    fn append(&self, entry: Entry) {
        {
            let mut log = self.log.write().unwrap_or_else(|e| e.into_inner());
            log.entries.push_back(entry);
            if let Some(max) = self.retention {
                while log.entries.len() > max {
                    log.entries.pop_front();
                    log.base += 1;
                }
            }
        }
        self.appended.notify_waiters();
    }

    /// Entry at `offset`, or at the oldest retained offset if `offset` has
    /// already been dropped. Returns the offset actually read.
    fn get(&self, offset: usize) -> Option<(usize, Entry)> {
        let log = self.log.read().unwrap_or_else(|e| e.into_inner());
        let at = offset.max(log.base);
        log.entries.get(at - log.base).cloned().map(|entry| (at, entry))
    }

    fn messages(&self) -> Vec<Bytes> {
        self.log
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Message(bytes) => Some(bytes.clone()),
                Entry::Fault(_) => None,
            })
            .collect()
    }
}

struct Topic {
    partitions: Vec<Arc<Partition>>,
    next: AtomicUsize,
}

impl Topic {
    fn new(partitions: u32, retention: Option<usize>) -> Self {
        Self {
            partitions: (0..partitions.max(1))
                .map(|_| Arc::new(Partition::new(retention)))
                .collect(),
            next: AtomicUsize::new(0),
        }
    }

    fn select(&self, key: Option<&str>) -> usize {
        let count = self.partitions.len();
        match key {
            Some(key) => partition_for_key(key, count as u32) as usize,
            None => self.next.fetch_add(1, Ordering::Relaxed) % count,
        }
    }
}

/// Partitioned in-process message log.
///
/// Cloning shares the topics.
///
/// # Example
///
/// ```ignore
/// let bus = MemoryBus::new(3);
///
/// let (dispatcher, _) = AsyncDispatcher::spawn(Arc::new(bus.clone()), "posts");
/// let rx = Consumer::new(Arc::new(bus.clone()), "posts").start(shutdown).await?;
/// ```
#[derive(Clone)]
pub struct MemoryBus {
    topics: Arc<DashMap<String, Arc<Topic>>>,
    partitions: u32,
    retention: Option<usize>,
}

impl MemoryBus {
    /// Create a bus whose topics are created with `partitions` partitions.
    pub fn new(partitions: u32) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            partitions: partitions.max(1),
            retention: None,
        }
    }

    /// Keep at most `messages` per partition, dropping the oldest first.
    ///
    /// Applies to topics created after the call.
    pub fn with_retention(mut self, messages: usize) -> Self {
        self.retention = Some(messages.max(1));
        self
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.partitions, self.retention)))
            .clone()
    }

    fn partition(&self, topic: &str, partition: u32) -> Result<Arc<Partition>, BusError> {
        self.topic(topic)
            .partitions
            .get(partition as usize)
            .cloned()
            .ok_or_else(|| BusError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    /// Append directly to a partition, bypassing key placement.
    pub fn send_to_partition(
        &self,
        topic: &str,
        partition: u32,
        payload: Bytes,
    ) -> Result<(), BusError> {
        self.partition(topic, partition)?
            .append(Entry::Message(payload));
        Ok(())
    }

    /// Make the next read on `partition` fail with `reason`.
    ///
    /// Readers positioned before the fault stop when they reach it; readers
    /// opened later hit it as soon as they get there.
    pub fn fail_partition(
        &self,
        topic: &str,
        partition: u32,
        reason: &str,
    ) -> Result<(), BusError> {
        self.partition(topic, partition)?
            .append(Entry::Fault(reason.to_string()));
        Ok(())
    }

    /// All messages retained on `topic`, partition by partition.
    pub fn messages(&self, topic: &str) -> Vec<Bytes> {
        self.topic(topic)
            .partitions
            .iter()
            .flat_map(|p| p.messages())
            .collect()
    }

    /// Number of messages retained on `topic`.
    pub fn len(&self, topic: &str) -> usize {
        self.messages(topic).len()
    }

    /// Returns true if nothing was ever sent to `topic`.
    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("topics", &self.topics.len())
            .field("partitions", &self.partitions)
            .field("retention", &self.retention)
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn send(&self, topic: &str, key: Option<&str>, payload: Bytes) -> Result<(), BusError> {
        let topic = self.topic(topic);
        let index = topic.select(key);
        topic.partitions[index].append(Entry::Message(payload));
        Ok(())
    }
}

#[async_trait]
impl PartitionSource for MemoryBus {
    async fn partitions(&self, topic: &str) -> Result<Vec<u32>, BusError> {
        Ok((0..self.topic(topic).partitions.len() as u32).collect())
    }

    async fn open(&self, topic: &str, partition: u32) -> Result<PartitionStream, BusError> {
        let partition = self.partition(topic, partition)?;

        let stream = futures::stream::unfold(
            (partition, 0usize, false),
            |(partition, offset, failed)| async move {
                if failed {
                    return None;
                }
                let (at, entry) = loop {
                    // Register interest before checking, so an append between
                    // the check and the await still wakes us.
                    let appended = partition.appended.notified();
                    if let Some(found) = partition.get(offset) {
                        break found;
                    }
                    appended.await;
                };

                match entry {
                    Entry::Message(bytes) => Some((Ok(bytes), (partition, at + 1, false))),
                    Entry::Fault(reason) => {
                        let err = BusError::transport(anyhow::anyhow!(reason));
                        Some((Err(err), (partition, at + 1, true)))
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
