use thiserror::Error;

/// Failures while bringing the process up.
///
/// Everything here is fatal: the supervisor should stop the process rather
/// than retry inside it. Recoverable failures (a failed scan page, a bad
/// message, a failed send) never use this type.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("cannot reach database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migrations failed: {0}")]
    Migrations(#[from] sqlx::migrate::MigrateError),

    #[error("cannot reach cache: {0}")]
    Cache(#[source] anyhow::Error),

    #[error("cannot reach message broker: {0}")]
    Broker(#[from] async_nats::ConnectError),

    #[error("cannot subscribe to topic: {0}")]
    Subscribe(#[from] relay::BusError),

    #[error("cannot start scheduler: {0}")]
    Scheduler(#[source] anyhow::Error),
}
