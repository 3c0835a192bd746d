// Poster - scheduled post authoring and publishing
//
// Authors compose posts through a Telegram conversation; a scheduled scan
// emits events for posts that became due and delivery handlers publish each
// post once per channel.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
