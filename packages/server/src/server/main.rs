// Main entry point for the poster service

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use poster_core::domains::posts::conversation::{Conversation, ConversationSettings, Session};
use poster_core::domains::posts::delivery::{TelegramChannel, TelegramPublishHandler};
use poster_core::kernel::{
    start_scheduler, MemorySessionStore, NatsClientPublisher, NatsPartitionSource, NatsTransport,
    PgPostStore, RandomEventIds, RedisCache, ServerDeps, SessionSweep, SetupError, TelegramAdapter,
};
use poster_core::server::{build_app, AppState, Bot};
use poster_core::Config;
use relay::{AsyncDispatcher, CancellationToken, Consumer, Listener};
use sqlx::postgres::PgPoolOptions;
use telegram::{TelegramOptions, TelegramService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,poster_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting poster");

    // Load configuration
    let config = Config::from_env()
        .map_err(SetupError::Config)
        .context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(SetupError::Database)
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(SetupError::Migrations)
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Connect to Redis
    let cache = RedisCache::connect(&config.redis_url)
        .await
        .map_err(SetupError::Cache)?;
    cache
        .ping()
        .await
        .map_err(SetupError::Cache)
        .context("Redis did not answer PING")?;
    tracing::info!("Redis connected");

    // Connect to NATS
    let nats = async_nats::connect(&config.nats_url)
        .await
        .map_err(SetupError::Broker)
        .context("Failed to connect to NATS")?;
    tracing::info!("NATS connected");

    let telegram = Arc::new(TelegramService::new(TelegramOptions::new(
        config.telegram.bot_token.clone(),
    )));
    let store = Arc::new(PgPostStore::new(pool.clone()));
    let deps = ServerDeps::new(
        store.clone(),
        store,
        Arc::new(TelegramAdapter::new(telegram.clone())),
        Arc::new(cache),
        Arc::new(RandomEventIds),
    );

    let shutdown = CancellationToken::new();
    let topic = config.published_post_topic.clone();

    // Producer side of the published-post topic
    let transport = Arc::new(NatsTransport::new(
        Arc::new(NatsClientPublisher::new(nats.clone())),
        config.topic_partitions,
    ));
    let (dispatcher, dispatch_task) = AsyncDispatcher::spawn(transport, topic.clone());

    // Consumer side: merged partitions → Telegram delivery
    let source = Arc::new(NatsPartitionSource::new(nats, config.topic_partitions));
    let receiver = Consumer::new(source, topic.clone())
        .start(shutdown.clone())
        .await
        .map_err(SetupError::Subscribe)
        .context("Failed to subscribe to published posts")?;
    let publisher = TelegramPublishHandler::new(
        deps.messenger.clone(),
        deps.dedup_cache.clone(),
        TelegramChannel {
            chat_id: config.telegram.publish_chat_id,
            footer: config.telegram.footer.clone(),
            source_name: config.telegram.source_name.clone(),
        },
    );
    let listener_task = Listener::new(receiver)
        .with_handler(Arc::new(publisher))
        .start(shutdown.clone());
    tracing::info!(%topic, partitions = config.topic_partitions, "Listening for published posts");

    // Conversation and bot front-end
    let sessions = Arc::new(MemorySessionStore::<Session>::new());
    let settings = ConversationSettings::new(config.time_zone)
        .allow(config.telegram.allowed_users.iter().copied());
    let conversation = Arc::new(Conversation::new(
        sessions.clone(),
        deps.posts.clone(),
        deps.catalog.clone(),
        settings,
    ));
    let bot_task = tokio::spawn(Bot::new(telegram, conversation.clone()).run(shutdown.clone()));

    // Scheduled scan and session sweep
    let mut scheduler = start_scheduler(
        deps,
        dispatcher.clone(),
        config.scan_interval_minutes,
        SessionSweep {
            sessions,
            conversation,
            max_idle: Duration::from_secs(config.session_idle_minutes * 60),
        },
    )
    .await
    .map_err(SetupError::Scheduler)?;

    // Start server
    let state = AppState {
        db_pool: pool,
        dispatch_stats: dispatcher.stats(),
    };
    let app = build_app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await
        .context("Server error")?;

    // Stop everything else
    shutdown.cancel();
    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to stop scheduler: {}", e);
    }
    let _ = bot_task.await;
    let _ = listener_task.await;

    // Scheduler jobs may still hold dispatcher clones; give the buffer a bounded drain.
    drop(dispatcher);
    if tokio::time::timeout(Duration::from_secs(5), dispatch_task).await.is_err() {
        tracing::warn!("Dispatcher did not drain before shutdown");
    }

    tracing::info!("Poster stopped");
    Ok(())
}
