//! Structured errors for the relay.
//!
//! Producers never see these: the dispatcher logs and counts them. They
//! surface from [`Consumer::start`](crate::Consumer::start) and from
//! transport implementations.

use thiserror::Error;

/// Errors raised by transports, partition sources and the dispatcher.
#[derive(Debug, Error)]
pub enum BusError {
    /// The event could not be serialized to JSON.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The dispatch buffer was full; the event was not enqueued.
    #[error("dispatch buffer is full")]
    BufferFull,

    /// The background sender task is gone.
    #[error("dispatcher is closed")]
    Closed,

    /// The partition does not exist on the topic.
    #[error("partition {partition} does not exist on topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    /// The underlying transport failed (network, broker, injected fault).
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

impl BusError {
    /// Wrap any transport-level error.
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        BusError::Transport(err.into())
    }
}
