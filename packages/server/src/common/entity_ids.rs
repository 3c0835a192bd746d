//! Typed ids for the persisted entities.

pub use super::id::{Id, V4, V7};

/// Marker for scheduled posts.
pub struct Post;

/// Marker for uploaded media attached to posts.
pub struct Media;

/// Marker for one emission of a published-post event.
pub struct Event;

pub type PostId = Id<Post>;
pub type MediaId = Id<Media>;
/// Random rather than time-ordered: event ids are never stored as row keys.
pub type EventId = Id<Event, V4>;
