use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::collections::HashSet;
use std::env;

use crate::kernel::UserId;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub nats_url: String,
    pub published_post_topic: String,
    pub topic_partitions: u32,
    pub telegram: TelegramConfig,
    /// Zone in which authors type publish dates
    pub time_zone: Tz,
    pub scan_interval_minutes: u32,
    pub session_idle_minutes: u64,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub allowed_users: HashSet<UserId>,
    pub publish_chat_id: i64,
    pub footer: String,
    pub source_name: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| var(key).with_context(|| format!("{} must be set", key));
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: or_default("REDIS_URL", "redis://localhost:6379"),
            nats_url: or_default("NATS_URL", "nats://localhost:4222"),
            published_post_topic: required("PUBLISHED_POST_TOPIC")?,
            topic_partitions: or_default("TOPIC_PARTITIONS", "3")
                .parse()
                .context("TOPIC_PARTITIONS must be a valid number")?,
            telegram: TelegramConfig {
                bot_token: required("TG_BOT_TOKEN")?,
                allowed_users: parse_user_ids(&or_default("TG_ALLOWED_USERS", ""))
                    .context("TG_ALLOWED_USERS must be a comma-separated list of user ids")?,
                publish_chat_id: required("TG_PUBLISH_CHAT_ID")?
                    .parse()
                    .context("TG_PUBLISH_CHAT_ID must be a valid chat id")?,
                footer: or_default("TG_FOOTER", ""),
                source_name: or_default("TG_SOURCE_NAME", "Telegram"),
            },
            time_zone: parse_time_zone(&or_default("LOCATION", "Asia/Yekaterinburg"))
                .context("LOCATION must be an IANA time zone name")?,
            scan_interval_minutes: or_default("SCAN_INTERVAL_MINUTES", "30")
                .parse()
                .context("SCAN_INTERVAL_MINUTES must be a valid number")?,
            session_idle_minutes: or_default("SESSION_IDLE_MINUTES", "60")
                .parse()
                .context("SESSION_IDLE_MINUTES must be a valid number")?,
            port: or_default("PORT", "8080")
                .parse()
                .context("PORT must be a valid number")?,
        })
    }
}

fn parse_user_ids(raw: &str) -> Result<HashSet<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<UserId>().with_context(|| format!("invalid user id {:?}", id)))
        .collect()
}

/// IANA zone name such as `Asia/Yekaterinburg` or `UTC`.
fn parse_time_zone(raw: &str) -> Result<Tz> {
    let raw = raw.trim();
    raw.parse::<Tz>()
        .map_err(|e| anyhow!("unknown time zone {:?}: {}", raw, e))
}
