//! At-most-once delivery per (channel, post) on top of a key-value cache.
//!
//! Each channel owns one cache key holding a JSON array of delivered post ids.
//! The record is written only after a delivery succeeds, and its expiry is
//! refreshed on every write.
//!
//! Check, deliver and record are not one transaction. Two attempts for the
//! same post that both read the record before either writes it will both
//! deliver. Appends made by this process are serialized, so concurrent
//! deliveries of different posts never drop each other's entries; writers in
//! other processes can still overwrite each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::PostId;
use crate::kernel::BaseDedupCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The record already listed the post; nothing was sent.
    AlreadyDelivered,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to read dedup record {key}: {source}")]
    ReadRecord {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("dedup record {key} is corrupt: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("delivery failed: {0}")]
    Deliver(#[source] anyhow::Error),

    #[error("post {id} was delivered but recording it failed: {source}")]
    WriteRecord {
        id: PostId,
        #[source]
        source: anyhow::Error,
    },
}

pub struct DeliveryGuard {
    cache: Arc<dyn BaseDedupCache>,
    key: String,
    ttl: Duration,
    appends: Mutex<()>,
}

impl DeliveryGuard {
    pub fn new(cache: Arc<dyn BaseDedupCache>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            key: key.into(),
            ttl,
            appends: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn is_delivered(&self, id: PostId) -> Result<bool, DeliveryError> {
        let id = id.to_string();
        Ok(self.load().await?.contains(&id))
    }

    /// Run `deliver` unless `id` is already recorded, then record it.
    ///
    /// A failed delivery records nothing, so the next attempt retries it.
    pub async fn deliver_once<F, Fut>(
        &self,
        id: PostId,
        deliver: F,
    ) -> Result<DeliveryOutcome, DeliveryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if self.is_delivered(id).await? {
            debug!(%id, key = %self.key, "Already delivered, skipping");
            return Ok(DeliveryOutcome::AlreadyDelivered);
        }

        deliver().await.map_err(DeliveryError::Deliver)?;
        self.record(id).await?;
        Ok(DeliveryOutcome::Delivered)
    }

    async fn record(&self, id: PostId) -> Result<(), DeliveryError> {
        let _append = self.appends.lock().await;

        // Re-read under the lock so appends from this process never race.
        let mut ids = self.load().await?;
        let entry = id.to_string();
        if !ids.contains(&entry) {
            ids.push(entry);
        }

        let value = serde_json::to_vec(&ids).map_err(|e| DeliveryError::WriteRecord {
            id,
            source: e.into(),
        })?;
        self.cache
            .set_with_expiration(&self.key, value, self.ttl)
            .await
            .map_err(|source| DeliveryError::WriteRecord { id, source })
    }

    async fn load(&self) -> Result<Vec<String>, DeliveryError> {
        let raw = self
            .cache
            .get(&self.key)
            .await
            .map_err(|source| DeliveryError::ReadRecord {
                key: self.key.clone(),
                source,
            })?;

        match raw {
            Some(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|source| DeliveryError::CorruptRecord {
                    key: self.key.clone(),
                    source,
                })
            }
            _ => Ok(Vec::new()),
        }
    }
}
