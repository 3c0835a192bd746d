pub mod activities;
pub mod conversation;
pub mod delivery;
pub mod events;
pub mod models;

pub use events::{PublishedPost, PublishedPostEvent};
pub use models::{CreatePost, Media, Post, PostFilters, Source, Tag};
