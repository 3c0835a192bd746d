// Process front-ends: HTTP health endpoint and the Telegram bot
pub mod app;
pub mod bot;
pub mod routes;

pub use app::*;
pub use bot::Bot;
