//! # Relay
//!
//! A small, topic-based event relay sitting between a producer that must
//! never block and a set of handlers that must see every message.
//!
//! ## Architecture
//!
//! ```text
//! Producer (scheduled scan, ...)
//!     │
//!     ▼ dispatch()               (serialize + enqueue, never awaits the network)
//! AsyncDispatcher ──► Transport.send(topic, key, payload)
//!                               │
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!         partition 0      partition 1      partition N
//!              │                │                │
//!              └──────► Consumer (one reader task per partition)
//!                               │ merged, arrival-ordered channel
//!                               ▼
//!                        Listener.run()
//!                               │ for each message, in registration order
//!                               ├─► Handler A.handle()
//!                               └─► Handler B.handle()
//! ```
//!
//! ## Guarantees
//!
//! - **Fire-and-forget production**: serialization, buffer and transport
//!   failures are logged and counted in [`DispatchStats`], never returned.
//! - **Per-partition ordering**: messages of one partition arrive in order;
//!   there is no ordering across partitions.
//! - **Partition isolation**: a failing partition reader stops on its own,
//!   the others keep going. The merged channel closes when every reader is done.
//! - **Serial handlers**: the listener awaits each handler before the next one
//!   and before pulling the next message. A slow handler throttles the listener.
//!
//! Delivery is at-least-once when the transport replays (see [`MemoryBus`]);
//! handlers with external side effects must be idempotent.

mod bus;
mod consumer;
mod dispatch;
mod error;
mod listener;

pub use bus::{partition_for_key, MemoryBus};
pub use consumer::{Consumer, PartitionSource, PartitionStream};
pub use dispatch::{AsyncDispatcher, DispatchSnapshot, DispatchStats, Transport, DEFAULT_BUFFER};
pub use error::BusError;
pub use listener::{Handler, Listener};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
