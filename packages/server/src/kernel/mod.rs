//! Kernel module - server infrastructure and dependencies.

pub mod cache;
pub mod deps;
pub mod error;
pub mod nats;
pub mod scheduled_tasks;
pub mod session_store;
pub mod test_dependencies;
pub mod traits;

pub use cache::{MemoryCache, RedisCache};
pub use deps::{PgPostStore, ServerDeps, TelegramAdapter};
pub use error::SetupError;
pub use nats::{
    NatsClientPublisher, NatsPartitionSource, NatsPublisher, NatsTransport, PublishedMessage,
    TestNats,
};
pub use scheduled_tasks::{start_scheduler, SessionSweep};
pub use session_store::{MemorySessionStore, SessionStore, UserId, UserLocks};
pub use test_dependencies::TestDependencies;
pub use traits::*;
