pub mod guard;
pub mod telegram;

pub use guard::{DeliveryError, DeliveryGuard, DeliveryOutcome};
pub use telegram::{
    render_post, TelegramChannel, TelegramPublishHandler, TG_DEDUP_KEY, TG_DEDUP_TTL,
};
